//! Configuration module
//!
//! Configuration is read from the environment once at startup and passed
//! explicitly into constructors. Nothing in the service reads env vars at
//! request time.

use std::env;

use crate::mime::MimePattern;

const DEFAULT_PORT: u16 = 4000;
const DEFAULT_MAX_CHUNK_MB: u64 = 90;
const DEFAULT_MAX_UPLOAD_MB: u64 = 4096;

/// HTTP server configuration
#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub port: u16,
    pub cors_origins: Vec<String>,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        let port = env::var("PORT")
            .unwrap_or_else(|_| DEFAULT_PORT.to_string())
            .parse()
            .map_err(|_| anyhow::anyhow!("PORT must be a valid number"))?;

        let cors_origins = env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "*".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        Ok(ServerConfig { port, cors_origins })
    }
}

/// Upload and post-processing configuration
#[derive(Clone, Debug)]
pub struct UploadConfig {
    /// Directory where upload files are appended
    pub storage_path: String,
    /// Largest single PATCH body accepted
    pub max_chunk_bytes: u64,
    /// Default per-upload size ceiling when the grant does not set one
    pub max_upload_bytes: u64,
    /// Content-type allow-list; empty allows everything
    pub allowed_types: Vec<MimePattern>,
    pub ffmpeg_path: String,
    pub ffprobe_path: String,
}

impl UploadConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        let storage_path = env::var("UPLOAD_STORAGE_PATH")
            .map_err(|_| anyhow::anyhow!("UPLOAD_STORAGE_PATH must be set"))?;

        let max_chunk_bytes = env_mb("MAX_CHUNK_SIZE_MB", DEFAULT_MAX_CHUNK_MB)?;
        let max_upload_bytes = env_mb("MAX_UPLOAD_SIZE_MB", DEFAULT_MAX_UPLOAD_MB)?;

        let allowed_types = env::var("ALLOWED_UPLOAD_TYPES")
            .unwrap_or_default()
            .split(',')
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty())
            .map(|s| MimePattern::parse(&s))
            .collect();

        Ok(UploadConfig {
            storage_path,
            max_chunk_bytes,
            max_upload_bytes,
            allowed_types,
            ffmpeg_path: env::var("FFMPEG_PATH").unwrap_or_else(|_| "ffmpeg".to_string()),
            ffprobe_path: env::var("FFPROBE_PATH").unwrap_or_else(|_| "ffprobe".to_string()),
        })
    }
}

fn env_mb(key: &str, default_mb: u64) -> Result<u64, anyhow::Error> {
    let mb = match env::var(key) {
        Ok(v) => v
            .parse::<u64>()
            .map_err(|_| anyhow::anyhow!("{} must be a valid number of megabytes", key))?,
        Err(_) => default_mb,
    };
    Ok(mb * 1024 * 1024)
}
