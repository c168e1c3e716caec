//! RAW-to-JPEG conversion backend.
//!
//! HTTP service that accepts camera RAW uploads and returns viewable JPEGs,
//! preferring the container's embedded preview and falling back to a full
//! decode when none is usable.

pub mod api;
pub mod config;
pub mod services;
pub mod utils;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::config::ConverterConfig;

/// Headroom for multipart framing on top of the configured upload ceiling.
const MULTIPART_OVERHEAD: usize = 10 * 1024 * 1024;

#[derive(OpenApi)]
#[openapi(
    paths(
        api::handlers::convert::convert_image,
        api::handlers::health::health_check,
    ),
    components(schemas(api::handlers::health::HealthResponse)),
    tags(
        (name = "convert", description = "RAW image conversion"),
        (name = "system", description = "Service health"),
    )
)]
pub struct ApiDoc;

#[derive(Clone)]
pub struct AppState {
    pub config: ConverterConfig,
}

pub fn create_app(config: ConverterConfig) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
        .expose_headers(Any);

    let body_limit = config.max_upload_size + MULTIPART_OVERHEAD;
    let state = AppState { config };

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/health", get(api::handlers::health::health_check))
        .route("/convert", post(api::handlers::convert::convert_image))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .with_state(state)
}
