//! Shared application state

use std::sync::Arc;

use uplink_core::QuotaGate;

use crate::services::upload::UploadService;

#[derive(Clone)]
pub struct AppState {
    pub uploads: Arc<UploadService>,
    pub quota: Arc<dyn QuotaGate>,
}
