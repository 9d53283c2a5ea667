//! Upload record store trait

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use uplink_core::models::{UploadRecord, UploadStatus};
use uplink_core::AppError;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Upload record not found: {0}")]
    NotFound(Uuid),

    #[error("Offset moved: expected {expected}, record has {actual}")]
    OffsetConflict { expected: u64, actual: u64 },

    #[error("Store backend error: {0}")]
    Backend(String),
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => AppError::NotFound(format!("Upload {} not found", id)),
            StoreError::OffsetConflict { expected, actual } => AppError::OffsetConflict {
                expected: actual,
                claimed: expected,
            },
            StoreError::Backend(msg) => AppError::Storage(msg),
        }
    }
}

/// Fields a successful append commits in one step.
#[derive(Debug, Clone)]
pub struct ProgressUpdate {
    pub offset: u64,
    pub status: UploadStatus,
    pub detected_type: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Record store for upload state.
///
/// `commit_progress` is the concurrency control point: it only applies when
/// the stored offset still equals `expected_offset`, so two interleaved
/// appends cannot both commit against the same base offset.
#[async_trait]
pub trait UploadStore: Send + Sync {
    async fn insert(&self, record: UploadRecord) -> Result<(), StoreError>;

    async fn get(&self, id: Uuid) -> Result<Option<UploadRecord>, StoreError>;

    async fn delete(&self, id: Uuid) -> Result<(), StoreError>;

    /// Compare-on-offset commit. Applies `update` only if the stored offset
    /// equals `expected_offset`; otherwise fails with `OffsetConflict` and
    /// leaves the record untouched. Returns the updated record.
    async fn commit_progress(
        &self,
        id: Uuid,
        expected_offset: u64,
        update: ProgressUpdate,
    ) -> Result<UploadRecord, StoreError>;

    /// Terminal update from the post-processing worker: set the status, merge
    /// `metadata_patch` into the record's metadata, and stamp `completed_at`.
    async fn finish(
        &self,
        id: Uuid,
        status: UploadStatus,
        metadata_patch: serde_json::Map<String, serde_json::Value>,
        completed_at: Option<DateTime<Utc>>,
    ) -> Result<UploadRecord, StoreError>;
}
