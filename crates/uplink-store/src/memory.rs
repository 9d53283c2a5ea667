//! In-memory upload record store

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use uplink_core::models::{UploadRecord, UploadStatus};

use crate::traits::{ProgressUpdate, StoreError, UploadStore};

/// Map-backed store. The write lock around `commit_progress` is what makes
/// the compare-on-offset check and the update atomic.
#[derive(Default)]
pub struct MemoryStore {
    records: RwLock<HashMap<Uuid, UploadRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UploadStore for MemoryStore {
    async fn insert(&self, record: UploadRecord) -> Result<(), StoreError> {
        self.records.write().await.insert(record.id, record);
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<UploadRecord>, StoreError> {
        Ok(self.records.read().await.get(&id).cloned())
    }

    async fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        self.records
            .write()
            .await
            .remove(&id)
            .map(|_| ())
            .ok_or(StoreError::NotFound(id))
    }

    async fn commit_progress(
        &self,
        id: Uuid,
        expected_offset: u64,
        update: ProgressUpdate,
    ) -> Result<UploadRecord, StoreError> {
        let mut records = self.records.write().await;
        let record = records.get_mut(&id).ok_or(StoreError::NotFound(id))?;

        if record.offset != expected_offset {
            tracing::warn!(
                upload_id = %id,
                expected_offset,
                actual_offset = record.offset,
                "Rejecting progress commit against stale offset"
            );
            return Err(StoreError::OffsetConflict {
                expected: expected_offset,
                actual: record.offset,
            });
        }

        record.offset = update.offset;
        record.status = update.status;
        if update.detected_type.is_some() {
            record.detected_type = update.detected_type;
        }
        if update.completed_at.is_some() {
            record.completed_at = update.completed_at;
        }

        Ok(record.clone())
    }

    async fn finish(
        &self,
        id: Uuid,
        status: UploadStatus,
        metadata_patch: serde_json::Map<String, serde_json::Value>,
        completed_at: Option<DateTime<Utc>>,
    ) -> Result<UploadRecord, StoreError> {
        let mut records = self.records.write().await;
        let record = records.get_mut(&id).ok_or(StoreError::NotFound(id))?;

        record.status = status;
        for (key, value) in metadata_patch {
            record.metadata.insert(key, value);
        }
        if completed_at.is_some() {
            record.completed_at = completed_at;
        }

        Ok(record.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: Uuid) -> UploadRecord {
        UploadRecord {
            id,
            declared_length: Some(100),
            offset: 0,
            declared_type: "video/mp4".to_string(),
            detected_type: None,
            status: UploadStatus::Initiated,
            storage_key: format!("uploads/{}", id),
            filename: None,
            metadata: serde_json::Map::new(),
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    #[tokio::test]
    async fn test_insert_get_delete() {
        let store = MemoryStore::new();
        let id = Uuid::new_v4();
        store.insert(record(id)).await.unwrap();

        let found = store.get(id).await.unwrap().unwrap();
        assert_eq!(found.id, id);

        store.delete(id).await.unwrap();
        assert!(store.get(id).await.unwrap().is_none());
        assert!(matches!(
            store.delete(id).await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_commit_progress_advances_offset() {
        let store = MemoryStore::new();
        let id = Uuid::new_v4();
        store.insert(record(id)).await.unwrap();

        let updated = store
            .commit_progress(
                id,
                0,
                ProgressUpdate {
                    offset: 40,
                    status: UploadStatus::InProgress,
                    detected_type: None,
                    completed_at: None,
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.offset, 40);
        assert_eq!(updated.status, UploadStatus::InProgress);
    }

    #[tokio::test]
    async fn test_commit_progress_rejects_stale_offset() {
        let store = MemoryStore::new();
        let id = Uuid::new_v4();
        store.insert(record(id)).await.unwrap();

        store
            .commit_progress(
                id,
                0,
                ProgressUpdate {
                    offset: 40,
                    status: UploadStatus::InProgress,
                    detected_type: None,
                    completed_at: None,
                },
            )
            .await
            .unwrap();

        // A second commit against the old base offset must not apply.
        let err = store
            .commit_progress(
                id,
                0,
                ProgressUpdate {
                    offset: 60,
                    status: UploadStatus::InProgress,
                    detected_type: None,
                    completed_at: None,
                },
            )
            .await
            .unwrap_err();

        match err {
            StoreError::OffsetConflict { expected, actual } => {
                assert_eq!(expected, 0);
                assert_eq!(actual, 40);
            }
            other => panic!("unexpected error: {other:?}"),
        }

        let record = store.get(id).await.unwrap().unwrap();
        assert_eq!(record.offset, 40);
    }

    #[tokio::test]
    async fn test_finish_merges_metadata() {
        let store = MemoryStore::new();
        let id = Uuid::new_v4();
        let mut rec = record(id);
        rec.metadata
            .insert("client".to_string(), serde_json::json!("uploader-v2"));
        store.insert(rec).await.unwrap();

        let mut patch = serde_json::Map::new();
        patch.insert("probe".to_string(), serde_json::json!({"format": {}}));

        let now = Utc::now();
        let updated = store
            .finish(id, UploadStatus::Completed, patch, Some(now))
            .await
            .unwrap();

        assert_eq!(updated.status, UploadStatus::Completed);
        assert_eq!(updated.completed_at, Some(now));
        assert!(updated.metadata.contains_key("client"));
        assert!(updated.metadata.contains_key("probe"));
    }
}
