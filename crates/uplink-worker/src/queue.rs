//! Post-processing queue
//!
//! Uploads are enqueued by id after their final chunk commits. One worker
//! task drains the queue in FIFO order; pipeline errors mark the record
//! failed and the loop keeps going. `stop` aborts the worker, so an item
//! in flight at shutdown stays `postprocessing` (no recovery sweep yet).

use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use uuid::Uuid;

use uplink_core::models::UploadStatus;
use uplink_processing::{process_upload, ProcessingTools};
use uplink_storage::ChunkVault;
use uplink_store::UploadStore;

/// Cheap clonable producer side of the queue.
#[derive(Clone)]
pub struct QueueHandle {
    tx: mpsc::UnboundedSender<Uuid>,
}

impl QueueHandle {
    pub fn new(tx: mpsc::UnboundedSender<Uuid>) -> Self {
        QueueHandle { tx }
    }

    /// Enqueue an upload for post-processing. Never blocks; if the worker
    /// side is gone the item is dropped with a warning.
    pub fn enqueue(&self, upload_id: Uuid) {
        match self.tx.send(upload_id) {
            Ok(()) => {
                tracing::info!(upload_id = %upload_id, "Enqueued upload for post-processing");
            }
            Err(_) => {
                tracing::warn!(upload_id = %upload_id, "Processing queue is closed, dropping item");
            }
        }
    }
}

/// The queue plus its single consumer.
pub struct ProcessingQueue {
    handle: QueueHandle,
    rx: Mutex<Option<mpsc::UnboundedReceiver<Uuid>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    store: Arc<dyn UploadStore>,
    vault: ChunkVault,
    tools: ProcessingTools,
}

impl ProcessingQueue {
    pub fn new(store: Arc<dyn UploadStore>, vault: ChunkVault, tools: ProcessingTools) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        ProcessingQueue {
            handle: QueueHandle::new(tx),
            rx: Mutex::new(Some(rx)),
            worker: Mutex::new(None),
            store,
            vault,
            tools,
        }
    }

    pub fn handle(&self) -> QueueHandle {
        self.handle.clone()
    }

    /// Spawn the worker task. Calling this twice is a no-op with a warning.
    pub fn start(&self) {
        let rx = match self.rx.lock() {
            Ok(mut guard) => guard.take(),
            Err(_) => None,
        };

        let Some(rx) = rx else {
            tracing::warn!("Processing worker already started");
            return;
        };

        let store = self.store.clone();
        let vault = self.vault.clone();
        let tools = self.tools.clone();
        let task = tokio::spawn(run_worker(rx, store, vault, tools));

        if let Ok(mut guard) = self.worker.lock() {
            *guard = Some(task);
        }
        tracing::info!("Started post-processing worker");
    }

    /// Abort the worker. Anything mid-flight is abandoned in
    /// `postprocessing` state.
    pub async fn stop(&self) {
        let task = match self.worker.lock() {
            Ok(mut guard) => guard.take(),
            Err(_) => None,
        };

        if let Some(task) = task {
            task.abort();
            let _ = task.await;
            tracing::info!("Stopped post-processing worker");
        }
    }
}

async fn run_worker(
    mut rx: mpsc::UnboundedReceiver<Uuid>,
    store: Arc<dyn UploadStore>,
    vault: ChunkVault,
    tools: ProcessingTools,
) {
    tracing::info!("Post-processing worker started");

    while let Some(upload_id) = rx.recv().await {
        let record = match store.get(upload_id).await {
            Ok(Some(record)) => record,
            Ok(None) => {
                tracing::warn!(upload_id = %upload_id, "Upload not found for processing");
                continue;
            }
            Err(e) => {
                tracing::error!(upload_id = %upload_id, error = %e, "Failed to load upload for processing");
                continue;
            }
        };

        if let Err(e) = process_upload(&store, &vault, &tools, record).await {
            tracing::error!(upload_id = %upload_id, error = %e, "Post-processing failed");
            let mut patch = serde_json::Map::new();
            patch.insert("error".to_string(), serde_json::json!(e.to_string()));
            if let Err(e) = store
                .finish(upload_id, UploadStatus::Failed, patch, None)
                .await
            {
                tracing::error!(upload_id = %upload_id, error = %e, "Failed to mark upload as failed");
            }
        }
    }

    tracing::info!("Post-processing worker exiting, queue closed");
}
