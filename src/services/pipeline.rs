//! Per-request conversion pipeline.
//!
//! One pipeline run per request, no shared state. The upload is persisted
//! to a temp file (RAW files run 20-100+ MB), the container is opened and
//! probed for an embedded preview, and only when the preview is unusable
//! does the full decode run. Decode and re-encode happen on the blocking
//! pool under a timeout.
//!
//! Cleanup is ownership-driven: the `NamedTempFile` lives in this scope, so
//! the backing file is removed on every exit path, timeout included.

use std::io::Write;
use std::time::Duration;

use bytes::Bytes;
use tempfile::NamedTempFile;
use tokio::task;
use tokio::time::timeout;
use tracing::{debug, info};

use super::container::RawContainer;
use super::encoder::encode_jpeg;
use super::metadata::{self, CameraMetadata};
use crate::api::error::AppError;
use crate::config::{ConversionMode, ConverterConfig};
use crate::utils::validation::file_extension;

/// Which path produced the response image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageSource {
    EmbeddedPreview,
    Decoded,
}

#[derive(Debug)]
pub struct ConversionResult {
    pub jpeg: Vec<u8>,
    pub camera: CameraMetadata,
    pub source: ImageSource,
}

/// Run the full conversion for one upload.
pub async fn convert_upload(
    config: &ConverterConfig,
    filename: &str,
    payload: Bytes,
    quality: u8,
) -> Result<ConversionResult, AppError> {
    if payload.is_empty() {
        return Err(AppError::EmptyUpload);
    }

    let tmp = persist_upload(config, filename, payload.clone()).await?;
    let container = RawContainer::open(tmp.path(), payload)
        .map_err(|e| AppError::ContainerOpen(e.to_string()))?;

    // Preview extraction walks the whole upload in the worst case, so it
    // runs on the blocking pool under the same deadline as the decode.
    let deadline = Duration::from_secs(config.decode_timeout_secs);
    let scan = task::spawn_blocking(move || {
        let preview = container.extract_preview();
        (container, preview)
    });
    let (container, preview) = with_deadline(deadline, scan).await?;

    let (container, jpeg, source) = match preview {
        Some(preview) if preview.is_jpeg() => {
            debug!(bytes = preview.bytes.len(), "serving embedded preview");
            (container, preview.bytes, ImageSource::EmbeddedPreview)
        }
        _ => {
            if config.mode == ConversionMode::PreviewOnly {
                return Err(AppError::NoUsablePreview);
            }
            let (container, jpeg) = decode_and_encode(config, container, quality).await?;
            (container, jpeg, ImageSource::Decoded)
        }
    };

    let camera = metadata::resolve(&container);
    drop(container);
    tmp.close()?;

    info!(
        camera = %camera.model,
        source = ?source,
        jpeg_bytes = jpeg.len(),
        "conversion complete"
    );

    Ok(ConversionResult {
        jpeg,
        camera,
        source,
    })
}

/// Buffer the upload to a named temp file in the configured directory.
async fn persist_upload(
    config: &ConverterConfig,
    filename: &str,
    payload: Bytes,
) -> Result<NamedTempFile, AppError> {
    let suffix = file_extension(filename)
        .map(|ext| format!(".{ext}"))
        .unwrap_or_default();
    let temp_dir = config.temp_dir.clone();

    task::spawn_blocking(move || -> Result<NamedTempFile, AppError> {
        let mut tmp = tempfile::Builder::new()
            .prefix("raw-convert-")
            .suffix(&suffix)
            .tempfile_in(&temp_dir)?;
        tmp.write_all(&payload)?;
        tmp.flush()?;
        Ok(tmp)
    })
    .await
    .map_err(|e| AppError::Internal(e.to_string()))?
}

/// Decode on the blocking pool under the configured deadline. The container
/// moves into the closure and comes back on success so metadata resolution
/// can still run against it.
async fn decode_and_encode(
    config: &ConverterConfig,
    container: RawContainer,
    quality: u8,
) -> Result<(RawContainer, Vec<u8>), AppError> {
    let half = config.half_resolution_decode;
    let deadline = Duration::from_secs(config.decode_timeout_secs);

    let work = task::spawn_blocking(move || -> Result<(RawContainer, Vec<u8>), AppError> {
        let grid = container
            .decode(half)
            .map_err(|e| AppError::Decode(e.to_string()))?;
        let jpeg = encode_jpeg(&grid, quality).map_err(|e| AppError::Encode(e.to_string()))?;
        Ok((container, jpeg))
    });

    with_deadline(deadline, work).await?
}

/// Await a blocking task up to the deadline; past it the task is abandoned
/// and the request fails.
async fn with_deadline<T>(
    deadline: Duration,
    work: task::JoinHandle<T>,
) -> Result<T, AppError> {
    match timeout(deadline, work).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(join)) => Err(AppError::Internal(join.to_string())),
        Err(_) => Err(AppError::Timeout(deadline.as_secs())),
    }
}
