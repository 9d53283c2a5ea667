//! Quota gate
//!
//! Upload initiation is authorized by an opaque token exchanged out of band.
//! The gate resolves a token into the limits that govern the upload; the
//! default implementation is config-backed, but the seam exists so a
//! deployment can plug in a remote entitlement service.

use async_trait::async_trait;

use crate::error::AppError;
use crate::mime::MimePattern;

/// Limits granted to a validated token.
#[derive(Clone, Debug)]
pub struct TokenGrant {
    /// Hard ceiling for the upload's total size in bytes
    pub max_size_bytes: u64,
    /// Content types this token may upload; empty allows everything
    pub allowed_types: Vec<MimePattern>,
    /// How many more uploads the token may initiate
    pub remaining: u32,
}

#[async_trait]
pub trait QuotaGate: Send + Sync {
    /// Resolve a token into its grant. Returns `QuotaExhausted` when the
    /// token is unknown, expired, or out of uploads.
    async fn check(&self, token: &str) -> Result<TokenGrant, AppError>;
}
