//! Uplink Core Library
//!
//! This crate provides the domain models, error types, configuration, and
//! MIME matching that are shared across all Uplink components.

pub mod config;
pub mod error;
pub mod mime;
pub mod models;
pub mod quota;

// Re-export commonly used types
pub use config::{ServerConfig, UploadConfig};
pub use error::{AppError, ErrorMetadata, LogLevel};
pub use mime::{is_multimedia, mime_allowed, MimePattern};
pub use quota::{QuotaGate, TokenGrant};
