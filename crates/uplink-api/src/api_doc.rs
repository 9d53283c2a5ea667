//! OpenAPI document

use axum::Json;
use utoipa::OpenApi;

use crate::error::ErrorResponse;
use crate::handlers::uploads::{InitiateRequest, InitiateResponse};
use uplink_core::models::{UploadRecord, UploadStatus};

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::uploads::initiate_upload,
        crate::handlers::uploads::tus_head,
        crate::handlers::uploads::tus_patch,
        crate::handlers::uploads::tus_options,
        crate::handlers::uploads::tus_delete,
    ),
    components(schemas(
        InitiateRequest,
        InitiateResponse,
        UploadRecord,
        UploadStatus,
        ErrorResponse
    )),
    tags((name = "uploads", description = "Resumable upload protocol"))
)]
pub struct ApiDoc;

pub async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
