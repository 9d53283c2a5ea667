//! Router assembly

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, head, options, post};
use axum::Router;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::api_doc;
use crate::handlers::uploads;
use crate::state::AppState;

/// Build the application router.
///
/// `max_chunk_bytes` feeds the body limit; axum's default 2 MB cap would
/// otherwise reject chunks the service is configured to accept.
pub fn build_router(state: AppState, cors_origins: &[String], max_chunk_bytes: u64) -> Router {
    let cors = build_cors(cors_origins);

    Router::new()
        .route("/api/uploads/initiate", post(uploads::initiate_upload))
        .route("/api/uploads/tus", options(uploads::tus_options))
        .route(
            "/api/uploads/{upload_id}/tus",
            head(uploads::tus_head)
                .patch(uploads::tus_patch)
                .delete(uploads::tus_delete),
        )
        .route("/api/openapi.json", get(api_doc::openapi_json))
        .layer(DefaultBodyLimit::max(max_chunk_bytes as usize))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

fn build_cors(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|o| o == "*") {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let parsed: Vec<axum::http::HeaderValue> =
            origins.iter().filter_map(|o| o.parse().ok()).collect();
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(parsed))
            .allow_methods(Any)
            .allow_headers(Any)
    }
}
