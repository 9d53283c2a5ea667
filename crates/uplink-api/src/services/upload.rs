//! Upload state machine
//!
//! Everything that mutates an upload record goes through this service:
//! initiation, chunk appends, status queries, and cancellation. Chunk
//! appends follow a strict precondition order (transport shape, chunk cap,
//! record existence, length known, offset match) so that validation failures
//! never mutate state; the compare-on-offset commit at the end is the only
//! concurrency control an append needs.

use std::fmt::Display;
use std::sync::Arc;

use bytes::Bytes;
use chrono::Utc;
use futures::Stream;
use uuid::Uuid;

use uplink_core::mime::{is_multimedia, mime_allowed};
use uplink_core::models::{UploadRecord, UploadStatus};
use uplink_core::{AppError, TokenGrant, UploadConfig};
use uplink_processing::detect_content_type;
use uplink_storage::ChunkVault;
use uplink_store::{ProgressUpdate, UploadStore};
use uplink_worker::QueueHandle;

/// Transport content type for raw chunk bodies (tus 1.0).
pub const CHUNK_CONTENT_TYPE: &str = "application/offset+octet-stream";

/// What a chunk append reports back to the protocol layer.
#[derive(Debug, Clone, Copy)]
pub struct AppendResult {
    pub offset: u64,
    pub length: u64,
}

/// File name under the vault: record id plus the client filename's
/// extension when it has one. The extension is cosmetic; routing decisions
/// use sniffed bytes, never the name.
fn storage_key_for(id: Uuid, filename: Option<&str>) -> String {
    let ext = filename
        .and_then(|f| std::path::Path::new(f).extension())
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase());
    match ext {
        Some(ext) if !ext.is_empty() => format!("uploads/{}.{}", id, ext),
        _ => format!("uploads/{}", id),
    }
}

pub struct UploadService {
    store: Arc<dyn UploadStore>,
    vault: ChunkVault,
    queue: QueueHandle,
    config: UploadConfig,
}

impl UploadService {
    pub fn new(
        store: Arc<dyn UploadStore>,
        vault: ChunkVault,
        queue: QueueHandle,
        config: UploadConfig,
    ) -> Self {
        UploadService {
            store,
            vault,
            queue,
            config,
        }
    }

    /// Create a new upload record in `initiated` state.
    pub async fn initiate(
        &self,
        grant: &TokenGrant,
        declared_length: Option<u64>,
        declared_type: String,
        filename: Option<String>,
        metadata: serde_json::Map<String, serde_json::Value>,
    ) -> Result<UploadRecord, AppError> {
        if let Some(length) = declared_length {
            if length > grant.max_size_bytes {
                return Err(AppError::PayloadTooLarge(format!(
                    "Declared size {} exceeds limit {}",
                    length, grant.max_size_bytes
                )));
            }
        }

        if !mime_allowed(&declared_type, &grant.allowed_types) {
            return Err(AppError::UnsupportedMediaType(format!(
                "File type '{}' not allowed for this token",
                declared_type
            )));
        }

        if grant.remaining == 0 {
            return Err(AppError::QuotaExhausted("Upload limit reached".to_string()));
        }

        let id = Uuid::new_v4();
        let record = UploadRecord {
            id,
            declared_length,
            offset: 0,
            declared_type,
            detected_type: None,
            status: UploadStatus::Initiated,
            storage_key: storage_key_for(id, filename.as_deref()),
            filename,
            metadata,
            created_at: Utc::now(),
            completed_at: None,
        };

        self.store.insert(record.clone()).await?;
        tracing::info!(upload_id = %id, declared_length = ?declared_length, "Initiated upload");
        Ok(record)
    }

    /// Current offset/length for a known upload.
    pub async fn status(&self, id: Uuid) -> Result<UploadRecord, AppError> {
        let record = self
            .store
            .get(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Upload {} not found", id)))?;

        if record.declared_length.is_none() {
            return Err(AppError::Conflict("Upload length unknown".to_string()));
        }

        Ok(record)
    }

    /// Append one chunk at the claimed offset.
    pub async fn append_chunk<S, E>(
        &self,
        id: Uuid,
        claimed_offset: u64,
        content_length_hint: Option<u64>,
        transport_type: &str,
        body: S,
    ) -> Result<AppendResult, AppError>
    where
        S: Stream<Item = Result<Bytes, E>> + Unpin,
        E: Display,
    {
        if transport_type != CHUNK_CONTENT_TYPE {
            return Err(AppError::UnsupportedMediaType(format!(
                "Invalid Content-Type, expected {}",
                CHUNK_CONTENT_TYPE
            )));
        }

        if let Some(hint) = content_length_hint {
            if hint > self.config.max_chunk_bytes {
                return Err(AppError::PayloadTooLarge(format!(
                    "Chunk too large. Max {} bytes",
                    self.config.max_chunk_bytes
                )));
            }
        }

        let mut record = self
            .store
            .get(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Upload {} not found", id)))?;

        let declared_length = record
            .declared_length
            .ok_or_else(|| AppError::Conflict("Upload length unknown".to_string()))?;

        // Crash recovery: the file on disk is ground truth. If a previous
        // append landed bytes without committing the offset, adopt the disk
        // size before judging the client's claim.
        if record.status.accepts_bytes() {
            let disk_size = self.vault.size(&record.storage_key).await?;
            if disk_size != record.offset {
                tracing::warn!(
                    upload_id = %id,
                    recorded_offset = record.offset,
                    disk_size,
                    "Offset out of sync with disk, reconciling"
                );
                record = self
                    .store
                    .commit_progress(
                        id,
                        record.offset,
                        ProgressUpdate {
                            offset: disk_size,
                            status: record.status,
                            detected_type: None,
                            completed_at: None,
                        },
                    )
                    .await?;
            }
        }

        if claimed_offset != record.offset {
            return Err(AppError::OffsetConflict {
                expected: record.offset,
                claimed: claimed_offset,
            });
        }

        // Idempotent re-delivery of a chunk the server already has. Once a
        // record stops accepting bytes the backing file belongs to the
        // post-processing worker; never touch the vault for it.
        if !record.status.accepts_bytes() {
            if record.status == UploadStatus::Failed {
                return Err(AppError::Conflict(
                    "Upload failed, cannot append".to_string(),
                ));
            }
            return Ok(AppendResult {
                offset: record.offset,
                length: declared_length,
            });
        }

        let remaining = declared_length.saturating_sub(record.offset);
        if let Some(hint) = content_length_hint {
            if hint > remaining {
                return Err(AppError::PayloadTooLarge(
                    "Upload exceeds declared length".to_string(),
                ));
            }
        }

        let outcome = self
            .vault
            .append(&record.storage_key, body, remaining)
            .await?;

        if outcome.overflowed {
            // Discard whatever this call wrote; the committed offset stays
            // authoritative.
            self.vault
                .truncate(&record.storage_key, record.offset)
                .await?;
            return Err(AppError::PayloadTooLarge(
                "Upload exceeds declared length".to_string(),
            ));
        }

        if outcome.bytes_written == 0 {
            // Reconciliation can adopt a disk size that already covers the
            // declared length; the client's zero-byte resync at the full
            // offset is the only call left that can finish such an upload.
            if record.is_full() {
                return self.complete(record, claimed_offset, declared_length).await;
            }
            return Ok(AppendResult {
                offset: record.offset,
                length: declared_length,
            });
        }

        let new_offset = record.offset + outcome.bytes_written;

        if new_offset == declared_length {
            self.complete(record, new_offset, declared_length).await
        } else {
            let updated = self
                .store
                .commit_progress(
                    id,
                    record.offset,
                    ProgressUpdate {
                        offset: new_offset,
                        status: UploadStatus::InProgress,
                        detected_type: None,
                        completed_at: None,
                    },
                )
                .await?;

            Ok(AppendResult {
                offset: updated.offset,
                length: declared_length,
            })
        }
    }

    /// Final-chunk path: sniff the finished file, enforce the allow-list,
    /// and either complete synchronously or hand off to post-processing.
    async fn complete(
        &self,
        record: UploadRecord,
        new_offset: u64,
        declared_length: u64,
    ) -> Result<AppendResult, AppError> {
        let path = self.vault.path_for(&record.storage_key)?;
        let detected = detect_content_type(&path).await?;

        if !mime_allowed(&detected, &self.config.allowed_types) {
            self.vault.delete(&record.storage_key).await?;
            self.store.delete(record.id).await?;
            tracing::info!(
                upload_id = %record.id,
                detected_type = %detected,
                "Deleted upload with disallowed content type"
            );
            return Err(AppError::UnsupportedMediaType(format!(
                "Actual file type '{}' does not match allowed types",
                detected
            )));
        }

        let multimedia = is_multimedia(&detected);
        let update = if multimedia {
            ProgressUpdate {
                offset: new_offset,
                status: UploadStatus::Postprocessing,
                detected_type: Some(detected.clone()),
                completed_at: None,
            }
        } else {
            ProgressUpdate {
                offset: new_offset,
                status: UploadStatus::Completed,
                detected_type: Some(detected.clone()),
                completed_at: Some(Utc::now()),
            }
        };

        let updated = self
            .store
            .commit_progress(record.id, record.offset, update)
            .await?;

        // Enqueue only after the commit; a failed commit must not leave a
        // phantom queue item.
        if multimedia {
            self.queue.enqueue(record.id);
        } else {
            tracing::info!(upload_id = %record.id, detected_type = %detected, "Upload completed");
        }

        Ok(AppendResult {
            offset: updated.offset,
            length: declared_length,
        })
    }

    /// Delete the upload's file and record. Completed uploads cannot be
    /// cancelled.
    pub async fn cancel(&self, id: Uuid) -> Result<(), AppError> {
        let record = self
            .store
            .get(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Upload {} not found", id)))?;

        if record.status == UploadStatus::Completed {
            return Err(AppError::BadRequest(
                "Cannot cancel completed upload".to_string(),
            ));
        }

        self.vault.delete(&record.storage_key).await?;
        self.store.delete(id).await?;
        tracing::info!(upload_id = %id, "Cancelled upload");
        Ok(())
    }
}
