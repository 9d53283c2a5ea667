mod api_doc;
mod error;
mod handlers;
mod quota;
mod services;
mod setup;
mod state;

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use uplink_core::{QuotaGate, ServerConfig, UploadConfig};
use uplink_processing::ProcessingTools;
use uplink_storage::ChunkVault;
use uplink_store::{MemoryStore, UploadStore};
use uplink_worker::ProcessingQueue;

use crate::quota::ConfigQuotaGate;
use crate::services::upload::UploadService;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let server_config = ServerConfig::from_env()?;
    let upload_config = UploadConfig::from_env()?;

    let store: Arc<dyn UploadStore> = Arc::new(MemoryStore::new());
    let vault = ChunkVault::new(upload_config.storage_path.clone()).await?;

    let tools = ProcessingTools {
        ffmpeg_path: upload_config.ffmpeg_path.clone(),
        ffprobe_path: upload_config.ffprobe_path.clone(),
    };
    let queue = ProcessingQueue::new(store.clone(), vault.clone(), tools);
    queue.start();

    let uploads = Arc::new(UploadService::new(
        store.clone(),
        vault,
        queue.handle(),
        upload_config.clone(),
    ));
    let quota: Arc<dyn QuotaGate> = Arc::new(ConfigQuotaGate::new(upload_config.clone()));

    let app_state = AppState { uploads, quota };
    let router = setup::routes::build_router(
        app_state,
        &server_config.cors_origins,
        upload_config.max_chunk_bytes,
    );

    let addr = format!("0.0.0.0:{}", server_config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(addr = %addr, "Server listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutdown signal received");
        })
        .await?;

    queue.stop().await;

    Ok(())
}
