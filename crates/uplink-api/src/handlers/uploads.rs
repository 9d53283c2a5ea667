//! Resumable upload handlers (tus 1.0 surface)

use axum::body::Body;
use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use uplink_core::models::UploadStatus;
use uplink_core::AppError;

use crate::error::HttpAppError;
use crate::state::AppState;

const TUS_VERSION: &str = "1.0.0";

#[derive(Debug, Deserialize)]
pub struct TokenParam {
    pub token: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct InitiateRequest {
    /// Total upload size in bytes
    pub length: Option<u64>,
    /// Client-asserted content type
    pub content_type: String,
    pub filename: Option<String>,
    #[serde(default)]
    #[schema(value_type = Object)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct InitiateResponse {
    pub upload_id: Uuid,
    pub upload_url: String,
    pub length: Option<u64>,
    pub status: UploadStatus,
}

/// Create a new resumable upload.
#[utoipa::path(
    post,
    path = "/api/uploads/initiate",
    params(("token" = String, Query, description = "Upload token")),
    request_body = InitiateRequest,
    responses(
        (status = 201, description = "Upload created", body = InitiateResponse),
        (status = 403, description = "Token rejected", body = crate::error::ErrorResponse),
        (status = 413, description = "Declared size exceeds limit", body = crate::error::ErrorResponse),
        (status = 415, description = "Declared type not allowed", body = crate::error::ErrorResponse),
    ),
    tag = "uploads"
)]
pub async fn initiate_upload(
    State(state): State<AppState>,
    Query(params): Query<TokenParam>,
    Json(payload): Json<InitiateRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    let grant = state.quota.check(&params.token).await?;

    let record = state
        .uploads
        .initiate(
            &grant,
            payload.length,
            payload.content_type,
            payload.filename,
            payload.metadata,
        )
        .await?;

    let body = InitiateResponse {
        upload_id: record.id,
        upload_url: format!("/api/uploads/{}/tus", record.id),
        length: record.declared_length,
        status: record.status,
    };

    Ok((StatusCode::CREATED, Json(body)))
}

/// Report the current offset for an upload.
#[utoipa::path(
    head,
    path = "/api/uploads/{upload_id}/tus",
    params(("upload_id" = Uuid, Path, description = "Upload id")),
    responses(
        (status = 200, description = "Offset headers returned"),
        (status = 404, description = "Unknown upload", body = crate::error::ErrorResponse),
        (status = 409, description = "Upload length unknown", body = crate::error::ErrorResponse),
    ),
    tag = "uploads"
)]
pub async fn tus_head(
    State(state): State<AppState>,
    Path(upload_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpAppError> {
    let record = state.uploads.status(upload_id).await?;
    let length = record.declared_length.unwrap_or(0);

    Ok((
        StatusCode::OK,
        [
            ("Upload-Offset", record.offset.to_string()),
            ("Upload-Length", length.to_string()),
            ("Tus-Resumable", TUS_VERSION.to_string()),
        ],
    ))
}

/// Append a chunk of bytes at the claimed offset.
#[utoipa::path(
    patch,
    path = "/api/uploads/{upload_id}/tus",
    params(("upload_id" = Uuid, Path, description = "Upload id")),
    responses(
        (status = 204, description = "Chunk accepted, offset advanced"),
        (status = 404, description = "Unknown upload", body = crate::error::ErrorResponse),
        (status = 409, description = "Offset mismatch or length unknown", body = crate::error::ErrorResponse),
        (status = 413, description = "Chunk or total size exceeded", body = crate::error::ErrorResponse),
        (status = 415, description = "Wrong transport type or disallowed content", body = crate::error::ErrorResponse),
    ),
    tag = "uploads"
)]
pub async fn tus_patch(
    State(state): State<AppState>,
    Path(upload_id): Path<Uuid>,
    headers: HeaderMap,
    body: Body,
) -> Result<impl IntoResponse, HttpAppError> {
    let claimed_offset = headers
        .get("upload-offset")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok())
        .ok_or_else(|| {
            HttpAppError(AppError::InvalidInput(
                "Missing or invalid Upload-Offset header".to_string(),
            ))
        })?;

    let content_length_hint = headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok());

    let transport_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    let stream = Box::pin(body.into_data_stream());

    let result = state
        .uploads
        .append_chunk(
            upload_id,
            claimed_offset,
            content_length_hint,
            transport_type,
            stream,
        )
        .await?;

    Ok((
        StatusCode::NO_CONTENT,
        [
            ("Upload-Offset", result.offset.to_string()),
            ("Upload-Length", result.length.to_string()),
            ("Tus-Resumable", TUS_VERSION.to_string()),
        ],
    ))
}

/// Declare the server's tus capabilities.
#[utoipa::path(
    options,
    path = "/api/uploads/tus",
    responses((status = 204, description = "Capability headers returned")),
    tag = "uploads"
)]
pub async fn tus_options() -> impl IntoResponse {
    (
        StatusCode::NO_CONTENT,
        [
            ("Tus-Resumable", TUS_VERSION.to_string()),
            ("Tus-Version", TUS_VERSION.to_string()),
            ("Tus-Extension", "creation,termination".to_string()),
        ],
    )
}

/// Cancel an upload, deleting its file and record.
#[utoipa::path(
    delete,
    path = "/api/uploads/{upload_id}/tus",
    params(("upload_id" = Uuid, Path, description = "Upload id")),
    responses(
        (status = 204, description = "Upload deleted"),
        (status = 400, description = "Upload already completed", body = crate::error::ErrorResponse),
        (status = 404, description = "Unknown upload", body = crate::error::ErrorResponse),
    ),
    tag = "uploads"
)]
pub async fn tus_delete(
    State(state): State<AppState>,
    Path(upload_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpAppError> {
    state.uploads.cancel(upload_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
