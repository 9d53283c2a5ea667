//! Chunk vault: append-only local file storage for uploads
//!
//! Each upload owns one file under the base directory. Chunks arrive as a
//! byte stream and are appended in open-append mode; the vault enforces a
//! byte cap per append and tolerates mid-stream disconnects (whatever was
//! written stays on disk and the next chunk resumes from there).

use std::fmt::Display;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use futures::{Stream, StreamExt};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;

use uplink_core::AppError;

#[derive(Debug, thiserror::Error)]
pub enum VaultError {
    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("IO error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl From<VaultError> for AppError {
    fn from(err: VaultError) -> Self {
        match err {
            VaultError::InvalidKey(msg) => AppError::InvalidInput(msg),
            VaultError::Io { .. } => AppError::Storage(err.to_string()),
        }
    }
}

/// Result of streaming one chunk to disk.
#[derive(Debug, Clone, Copy)]
pub struct AppendOutcome {
    /// Bytes actually appended to the file
    pub bytes_written: u64,
    /// The stream had more data than `cap` allowed; nothing past the cap
    /// was written
    pub overflowed: bool,
    /// The stream errored mid-transfer (client disconnect); partial data
    /// up to the error was kept
    pub disconnected: bool,
}

/// Local filesystem chunk storage.
#[derive(Clone)]
pub struct ChunkVault {
    base_path: PathBuf,
}

impl ChunkVault {
    pub async fn new(base_path: impl Into<PathBuf>) -> Result<Self, VaultError> {
        let base_path = base_path.into();
        fs::create_dir_all(&base_path)
            .await
            .map_err(|e| VaultError::Io {
                path: base_path.display().to_string(),
                source: e,
            })?;
        Ok(ChunkVault { base_path })
    }

    /// Convert a storage key to a filesystem path, rejecting keys that could
    /// escape the base directory.
    fn key_to_path(&self, storage_key: &str) -> Result<PathBuf, VaultError> {
        if storage_key.contains("..") || storage_key.starts_with('/') {
            return Err(VaultError::InvalidKey(
                "Storage key contains invalid characters".to_string(),
            ));
        }
        Ok(self.base_path.join(storage_key))
    }

    /// Absolute path of the file backing a key. Used by post-processing to
    /// hand the file to external tools.
    pub fn path_for(&self, storage_key: &str) -> Result<PathBuf, VaultError> {
        self.key_to_path(storage_key)
    }

    /// Append a chunk stream to the file, writing at most `cap` bytes.
    ///
    /// A whole-buffer check runs before each write: if appending the next
    /// buffer would exceed the cap, the append stops with `overflowed` set
    /// and that buffer is not written. Stream errors are treated as a client
    /// disconnect, not a failure.
    pub async fn append<S, E>(
        &self,
        storage_key: &str,
        mut stream: S,
        cap: u64,
    ) -> Result<AppendOutcome, VaultError>
    where
        S: Stream<Item = Result<Bytes, E>> + Unpin,
        E: Display,
    {
        let path = self.key_to_path(storage_key)?;
        self.ensure_parent_dir(&path).await?;

        let io_err = |source| VaultError::Io {
            path: path.display().to_string(),
            source,
        };

        let mut file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(&path)
            .await
            .map_err(io_err)?;

        let mut outcome = AppendOutcome {
            bytes_written: 0,
            overflowed: false,
            disconnected: false,
        };

        while let Some(next) = stream.next().await {
            let buf = match next {
                Ok(buf) => buf,
                Err(e) => {
                    tracing::warn!(
                        storage_key = %storage_key,
                        bytes_written = outcome.bytes_written,
                        error = %e,
                        "Chunk stream interrupted, keeping partial data"
                    );
                    outcome.disconnected = true;
                    break;
                }
            };

            if buf.is_empty() {
                continue;
            }

            if outcome.bytes_written + buf.len() as u64 > cap {
                outcome.overflowed = true;
                break;
            }

            file.write_all(&buf).await.map_err(io_err)?;
            outcome.bytes_written += buf.len() as u64;
        }

        file.flush().await.map_err(io_err)?;
        file.sync_all().await.map_err(io_err)?;

        Ok(outcome)
    }

    /// Current on-disk size of the file for a key; 0 when the file does not
    /// exist yet.
    pub async fn size(&self, storage_key: &str) -> Result<u64, VaultError> {
        let path = self.key_to_path(storage_key)?;
        match fs::metadata(&path).await {
            Ok(meta) => Ok(meta.len()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(0),
            Err(e) => Err(VaultError::Io {
                path: path.display().to_string(),
                source: e,
            }),
        }
    }

    pub async fn exists(&self, storage_key: &str) -> Result<bool, VaultError> {
        let path = self.key_to_path(storage_key)?;
        Ok(fs::try_exists(&path).await.unwrap_or(false))
    }

    /// Truncate the file back to `len` bytes. Used to discard a partial
    /// append that failed its commit.
    pub async fn truncate(&self, storage_key: &str, len: u64) -> Result<(), VaultError> {
        let path = self.key_to_path(storage_key)?;
        let file = OpenOptions::new()
            .write(true)
            .open(&path)
            .await
            .map_err(|e| VaultError::Io {
                path: path.display().to_string(),
                source: e,
            })?;
        file.set_len(len).await.map_err(|e| VaultError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        Ok(())
    }

    /// Delete the file for a key. A missing file is not an error; cancel
    /// must work on uploads that never received a byte.
    pub async fn delete(&self, storage_key: &str) -> Result<(), VaultError> {
        let path = self.key_to_path(storage_key)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(VaultError::Io {
                path: path.display().to_string(),
                source: e,
            }),
        }
    }

    async fn ensure_parent_dir(&self, path: &Path) -> Result<(), VaultError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| VaultError::Io {
                path: parent.display().to_string(),
                source: e,
            })?;
        }
        Ok(())
    }
}
