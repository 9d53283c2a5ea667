//! Per-upload post-processing routine
//!
//! Runs after the final chunk lands, on the worker task. Multimedia files
//! get a faststart rewrite and an ffprobe report; everything else goes
//! straight to `completed`. Tool failures are contained here: a failed remux
//! or probe degrades the result, it does not fail the upload.

use std::sync::Arc;

use chrono::Utc;

use uplink_core::mime::is_multimedia;
use uplink_core::models::{UploadRecord, UploadStatus};
use uplink_storage::ChunkVault;
use uplink_store::UploadStore;

use crate::{faststart, probe};

/// Paths of the external tools the pipeline shells out to.
#[derive(Clone, Debug)]
pub struct ProcessingTools {
    pub ffmpeg_path: String,
    pub ffprobe_path: String,
}

/// Process one upload to its terminal state.
///
/// Errors returned from here mean the record could not be updated at all;
/// the caller marks the upload failed. A missing backing file is handled
/// internally and produces a `failed` record with an error note.
pub async fn process_upload(
    store: &Arc<dyn UploadStore>,
    vault: &ChunkVault,
    tools: &ProcessingTools,
    record: UploadRecord,
) -> anyhow::Result<()> {
    let path = vault.path_for(&record.storage_key)?;

    if !vault.exists(&record.storage_key).await? {
        tracing::error!(upload_id = %record.id, path = %path.display(), "Upload file missing at processing time");
        let mut patch = serde_json::Map::new();
        patch.insert("error".to_string(), serde_json::json!("File not found"));
        store
            .finish(record.id, UploadStatus::Failed, patch, None)
            .await?;
        return Ok(());
    }

    let content_type = record
        .detected_type
        .as_deref()
        .unwrap_or(&record.declared_type);

    let mut patch = serde_json::Map::new();

    if is_multimedia(content_type) {
        tracing::info!(upload_id = %record.id, content_type = %content_type, "Processing multimedia upload");

        match faststart::ensure_faststart(&path, content_type, &tools.ffmpeg_path).await {
            Ok(true) => {
                tracing::info!(upload_id = %record.id, "Applied faststart layout");
            }
            Ok(false) => {}
            Err(e) => {
                tracing::warn!(upload_id = %record.id, error = %e, "Faststart rewrite failed, keeping original layout");
            }
        }

        match probe::extract_probe(&path, &tools.ffprobe_path).await {
            Ok(report) => {
                patch.insert("probe".to_string(), report);
                tracing::info!(upload_id = %record.id, "Extracted probe metadata");
            }
            Err(e) => {
                tracing::warn!(upload_id = %record.id, error = %e, "Probe failed, completing without media metadata");
            }
        }
    }

    store
        .finish(record.id, UploadStatus::Completed, patch, Some(Utc::now()))
        .await?;
    tracing::info!(upload_id = %record.id, "Completed post-processing");

    Ok(())
}
