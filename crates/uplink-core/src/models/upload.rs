//! Upload record model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Lifecycle state of an upload.
///
/// Transitions: `initiated` → `in_progress` → `postprocessing` →
/// `completed` | `failed`. Non-multimedia uploads skip `postprocessing`
/// and complete on the final chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum UploadStatus {
    Initiated,
    InProgress,
    Postprocessing,
    Completed,
    Failed,
}

impl UploadStatus {
    /// Whether bytes may still be appended in this state.
    pub fn accepts_bytes(&self) -> bool {
        matches!(self, UploadStatus::Initiated | UploadStatus::InProgress)
    }
}

impl std::fmt::Display for UploadStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            UploadStatus::Initiated => "initiated",
            UploadStatus::InProgress => "in_progress",
            UploadStatus::Postprocessing => "postprocessing",
            UploadStatus::Completed => "completed",
            UploadStatus::Failed => "failed",
        };
        write!(f, "{}", s)
    }
}

/// One resumable upload.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UploadRecord {
    pub id: Uuid,
    /// Total size the client declared at initiation; None until known
    pub declared_length: Option<u64>,
    /// Bytes committed so far
    pub offset: u64,
    /// Content type the client declared at initiation
    pub declared_type: String,
    /// Content type detected from the file's leading bytes on completion
    pub detected_type: Option<String>,
    pub status: UploadStatus,
    /// Key of the backing file in chunk storage
    pub storage_key: String,
    /// Client-supplied filename, for display only
    pub filename: Option<String>,
    /// Free-form metadata; post-processing merges probe results under "probe"
    #[schema(value_type = Object)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl UploadRecord {
    /// Bytes still expected, when the total length is known.
    pub fn remaining(&self) -> Option<u64> {
        self.declared_length
            .map(|len| len.saturating_sub(self.offset))
    }

    /// Whether every declared byte has been committed.
    pub fn is_full(&self) -> bool {
        match self.declared_length {
            Some(len) => self.offset >= len,
            None => false,
        }
    }
}
