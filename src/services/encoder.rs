//! JPEG re-encoding of decoded rasters.

use image::codecs::jpeg::JpegEncoder;
use image::{ExtendedColorType, ImageEncoder};
use thiserror::Error;

use super::container::PixelGrid;

#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("invalid image dimensions {0}x{1}")]
    InvalidDimensions(usize, usize),

    #[error("pixel buffer length {0} does not match {1}x{2} RGB")]
    BufferMismatch(usize, usize, usize),

    #[error("JPEG encoder failed: {0}")]
    Encoder(String),
}

/// Encode an RGB8 raster as JPEG. Quality is clamped to 1..=100.
pub fn encode_jpeg(grid: &PixelGrid, quality: u8) -> Result<Vec<u8>, EncodeError> {
    if grid.width == 0 || grid.height == 0 {
        return Err(EncodeError::InvalidDimensions(grid.width, grid.height));
    }
    let expected = grid
        .width
        .checked_mul(grid.height)
        .and_then(|n| n.checked_mul(3))
        .ok_or(EncodeError::InvalidDimensions(grid.width, grid.height))?;
    if grid.pixels.len() != expected {
        return Err(EncodeError::BufferMismatch(
            grid.pixels.len(),
            grid.width,
            grid.height,
        ));
    }

    let quality = quality.clamp(1, 100);
    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, quality)
        .write_image(
            &grid.pixels,
            grid.width as u32,
            grid.height as u32,
            ExtendedColorType::Rgb8,
        )
        .map_err(|e| EncodeError::Encoder(e.to_string()))?;
    Ok(out)
}
