//! Config-backed quota gate
//!
//! Token issuance and accounting live outside this service. This gate
//! accepts any non-empty token and grants it the configured global limits;
//! deployments with a real entitlement backend swap in their own `QuotaGate`.

use async_trait::async_trait;

use uplink_core::{AppError, QuotaGate, TokenGrant, UploadConfig};

pub struct ConfigQuotaGate {
    config: UploadConfig,
}

impl ConfigQuotaGate {
    pub fn new(config: UploadConfig) -> Self {
        ConfigQuotaGate { config }
    }
}

#[async_trait]
impl QuotaGate for ConfigQuotaGate {
    async fn check(&self, token: &str) -> Result<TokenGrant, AppError> {
        if token.trim().is_empty() {
            return Err(AppError::QuotaExhausted("Missing upload token".to_string()));
        }

        Ok(TokenGrant {
            max_size_bytes: self.config.max_upload_bytes,
            allowed_types: self.config.allowed_types.clone(),
            remaining: u32::MAX,
        })
    }
}
