//! `POST /convert`: multipart RAW upload in, JPEG out.

use axum::extract::{Multipart, State};
use axum::http::{header, HeaderName};
use axum::response::IntoResponse;
use bytes::Bytes;
use tracing::debug;

use crate::api::error::AppError;
use crate::services::pipeline;
use crate::utils::validation::{file_extension, is_raw_extension, output_filename};
use crate::AppState;

/// Header carrying the resolved camera model back to the client.
pub const CAMERA_MODEL_HEADER: &str = "x-camera-model";

/// Convert an uploaded RAW image to JPEG.
///
/// Multipart fields: `file` (required), `quality` (optional, 1-100,
/// default from config).
#[utoipa::path(
    post,
    path = "/convert",
    responses(
        (status = 200, description = "Converted JPEG image", body = Vec<u8>, content_type = "image/jpeg"),
        (status = 400, description = "Invalid upload or unrecognized RAW container"),
        (status = 500, description = "RAW decode or JPEG encode failed"),
    ),
    tag = "convert"
)]
pub async fn convert_image(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let config = &state.config;

    let mut upload: Option<(String, Bytes)> = None;
    let mut quality_field: Option<String> = None;

    while let Some(field) = multipart.next_field().await? {
        match field.name() {
            Some("file") => {
                let filename = field.file_name().unwrap_or_default().to_string();
                let data = field.bytes().await?;
                upload = Some((filename, data));
            }
            Some("quality") => {
                quality_field = Some(field.text().await?);
            }
            _ => {}
        }
    }

    let (filename, payload) = upload.ok_or(AppError::MissingFilePart)?;
    if filename.is_empty() {
        return Err(AppError::NoSelectedFile);
    }
    if !config.allow_any_extension && !is_raw_extension(&filename) {
        let ext = file_extension(&filename).unwrap_or_default();
        return Err(AppError::UnsupportedExtension(ext));
    }

    // Invalid or out-of-range quality silently falls back to the default.
    let quality = quality_field
        .as_deref()
        .and_then(|q| q.trim().parse::<u8>().ok())
        .filter(|q| (1..=100).contains(q))
        .unwrap_or(config.default_quality);

    debug!(filename = %filename, bytes = payload.len(), quality, "received upload");

    let result = pipeline::convert_upload(config, &filename, payload, quality).await?;

    let headers = [
        (header::CONTENT_TYPE, mime::IMAGE_JPEG.to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", output_filename(&filename)),
        ),
        (
            HeaderName::from_static(CAMERA_MODEL_HEADER),
            result.camera.model.clone(),
        ),
    ];

    Ok((headers, result.jpeg))
}
