//! Test helpers: build AppState and router for integration tests.
//!
//! Run from workspace root: `cargo test -p uplink-api --test uploads_test` or
//! `cargo test -p uplink-api`.

use std::sync::Arc;

use axum_test::TestServer;
use serde_json::json;
use tempfile::TempDir;
use uuid::Uuid;

use uplink_api::quota::ConfigQuotaGate;
use uplink_api::services::upload::UploadService;
use uplink_api::setup::routes::build_router;
use uplink_api::state::AppState;
use uplink_core::models::{UploadRecord, UploadStatus};
use uplink_core::{QuotaGate, UploadConfig};
use uplink_processing::ProcessingTools;
use uplink_storage::ChunkVault;
use uplink_store::{MemoryStore, UploadStore};
use uplink_worker::{ProcessingQueue, QueueHandle};

pub const TEST_TOKEN: &str = "test-token";
pub const CHUNK_CONTENT_TYPE: &str = "application/offset+octet-stream";

/// Test application: server plus the in-process collaborators the tests
/// inspect directly.
pub struct TestApp {
    pub server: TestServer,
    pub store: Arc<dyn UploadStore>,
    pub _queue: Arc<ProcessingQueue>,
    pub _temp_dir: TempDir,
}

/// Config with no allow-list and limits small enough to exercise in tests.
/// Tool paths are deliberately bogus; post-processing must degrade, not hang.
pub fn test_config(storage_path: &std::path::Path) -> UploadConfig {
    UploadConfig {
        storage_path: storage_path.to_string_lossy().into_owned(),
        max_chunk_bytes: 64 * 1024,
        max_upload_bytes: 1024 * 1024,
        allowed_types: Vec::new(),
        ffmpeg_path: "/nonexistent/ffmpeg-binary".to_string(),
        ffprobe_path: "/nonexistent/ffprobe-binary".to_string(),
    }
}

pub async fn setup_test_app() -> TestApp {
    let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
    let config = test_config(temp_dir.path());
    setup_test_app_with(config, temp_dir).await
}

pub async fn setup_test_app_with(config: UploadConfig, temp_dir: TempDir) -> TestApp {
    let store: Arc<dyn UploadStore> = Arc::new(MemoryStore::new());
    let vault = ChunkVault::new(temp_dir.path())
        .await
        .expect("Failed to create chunk vault");

    let tools = ProcessingTools {
        ffmpeg_path: config.ffmpeg_path.clone(),
        ffprobe_path: config.ffprobe_path.clone(),
    };
    let queue = Arc::new(ProcessingQueue::new(store.clone(), vault.clone(), tools));
    queue.start();

    let uploads = Arc::new(UploadService::new(
        store.clone(),
        vault,
        queue.handle(),
        config.clone(),
    ));
    let quota: Arc<dyn QuotaGate> = Arc::new(ConfigQuotaGate::new(config.clone()));

    let state = AppState { uploads, quota };
    let router = build_router(state, &["*".to_string()], config.max_chunk_bytes);
    let server = TestServer::new(router).expect("Failed to start test server");

    TestApp {
        server,
        store,
        _queue: queue,
        _temp_dir: temp_dir,
    }
}

/// Build an UploadService wired to a caller-owned queue handle, for tests
/// that need to observe what gets enqueued.
pub async fn service_with_queue(
    config: UploadConfig,
    temp_dir: &TempDir,
    handle: QueueHandle,
) -> (Arc<UploadService>, Arc<dyn UploadStore>) {
    let store: Arc<dyn UploadStore> = Arc::new(MemoryStore::new());
    let vault = ChunkVault::new(temp_dir.path())
        .await
        .expect("Failed to create chunk vault");
    let service = Arc::new(UploadService::new(store.clone(), vault, handle, config));
    (service, store)
}

/// Initiate an upload over HTTP and return its id.
pub async fn initiate(app: &TestApp, length: u64, content_type: &str) -> Uuid {
    let response = app
        .server
        .post("/api/uploads/initiate")
        .add_query_param("token", TEST_TOKEN)
        .json(&json!({
            "length": length,
            "content_type": content_type,
        }))
        .await;
    response.assert_status(axum::http::StatusCode::CREATED);
    let body: serde_json::Value = response.json();
    body["upload_id"]
        .as_str()
        .and_then(|s| s.parse().ok())
        .expect("initiate response missing upload_id")
}

/// PATCH one chunk at the claimed offset.
pub async fn patch_chunk(
    app: &TestApp,
    id: Uuid,
    offset: u64,
    bytes: &[u8],
) -> axum_test::TestResponse {
    app.server
        .patch(&format!("/api/uploads/{}/tus", id))
        .add_header("Upload-Offset", offset.to_string())
        .add_header("Content-Type", CHUNK_CONTENT_TYPE)
        .bytes(bytes.to_vec().into())
        .await
}

/// Append bytes straight to an upload's backing file, bypassing the
/// service. Simulates a crash window where bytes landed on disk but the
/// offset commit was lost.
pub async fn append_to_backing_file(app: &TestApp, id: Uuid, bytes: &[u8]) {
    use tokio::io::AsyncWriteExt;

    let path = app._temp_dir.path().join("uploads").join(id.to_string());
    let mut file = tokio::fs::OpenOptions::new()
        .append(true)
        .open(&path)
        .await
        .expect("backing file missing");
    file.write_all(bytes)
        .await
        .expect("Failed to append to backing file");
    file.flush().await.expect("Failed to flush backing file");
}

/// Poll the store until the upload reaches the wanted status.
pub async fn wait_for_status(app: &TestApp, id: Uuid, status: UploadStatus) -> UploadRecord {
    for _ in 0..250 {
        if let Some(record) = app.store.get(id).await.unwrap() {
            if record.status == status {
                return record;
            }
        }
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    }
    panic!("upload {id} never reached status {status}");
}

/// Minimal MP4: a valid `ftyp` box, then `mdat` then `moov` markers so the
/// content sniffer reports video/mp4 and the faststart check fires.
pub fn mp4_bytes() -> Vec<u8> {
    let mut bytes = Vec::new();
    bytes.extend_from_slice(&[0x00, 0x00, 0x00, 0x18]);
    bytes.extend_from_slice(b"ftypisom");
    bytes.extend_from_slice(b"\x00\x00\x02\x00isomiso2");
    bytes.extend_from_slice(b"mdat");
    bytes.extend_from_slice(&[0u8; 64]);
    bytes.extend_from_slice(b"moov");
    bytes.extend_from_slice(&[0u8; 16]);
    bytes
}
