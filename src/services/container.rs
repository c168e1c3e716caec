//! Opened RAW container: validated structure plus the operations the
//! pipeline needs (preview extraction, camera model, full decode).
//!
//! Opening is cheap (header + IFD0 only); sensor data is only touched by
//! `decode`, which routes through `rawloader`/`imagepipe` on the caller's
//! thread. The container owns nothing on disk; the temp file backing `path`
//! belongs to the pipeline, and dropping the container releases only memory.

use std::path::{Path, PathBuf};

use bytes::Bytes;

use super::preview::{self, PreviewImage};
use super::tiff::{self, TagDirectory};
use super::RawError;

/// Decoded RGB8 raster. Transient: produced by `decode`, consumed by the
/// encoder, dropped before the response leaves the pipeline.
#[derive(Debug)]
pub struct PixelGrid {
    pub width: usize,
    pub height: usize,
    /// Interleaved RGB, `width * height * 3` bytes.
    pub pixels: Vec<u8>,
}

#[derive(Debug)]
pub struct RawContainer {
    path: PathBuf,
    bytes: Bytes,
    /// `None` for recognized RAW layouts without a readable TIFF tag
    /// directory (CR3, ORF, RW2); preview extraction degrades to the
    /// marker scan and the native model tag is unavailable.
    directory: Option<TagDirectory>,
}

/// RAW layouts the decode backend handles that do not start with classic
/// TIFF magic: ISO-BMFF (CR3), Olympus ORF, Panasonic RW2.
fn has_raw_magic(bytes: &[u8]) -> bool {
    if bytes.len() >= 12 && &bytes[4..8] == b"ftyp" {
        return true;
    }
    matches!(
        bytes.get(..4),
        Some(
            [0x49, 0x49, 0x52, 0x4F] // IIRO
                | [0x49, 0x49, 0x52, 0x53] // IIRS
                | [0x4D, 0x4D, 0x4F, 0x52] // MMOR
                | [0x49, 0x49, 0x55, 0x00] // IIU\0
        )
    )
}

impl RawContainer {
    /// Validate the container structure without decoding sensor data.
    /// TIFF-derived layouts get a parsed tag directory; the other
    /// recognized RAW magics open directory-less.
    pub fn open(path: &Path, bytes: Bytes) -> Result<Self, RawError> {
        let directory = match TagDirectory::parse(&bytes) {
            Ok(directory) => Some(directory),
            Err(RawError::UnrecognizedContainer) if has_raw_magic(&bytes) => None,
            Err(e) => return Err(e),
        };
        Ok(Self {
            path: path.to_path_buf(),
            bytes,
            directory,
        })
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Embedded preview, if the container stores one. No decode side effect.
    pub fn extract_preview(&self) -> Option<PreviewImage> {
        match &self.directory {
            Some(directory) => preview::extract_preview(&self.bytes, directory),
            None => preview::scan_only(&self.bytes),
        }
    }

    /// Camera model from the container's native Model tag.
    pub fn camera_model(&self) -> Option<String> {
        self.directory
            .as_ref()?
            .ascii_value(&self.bytes, tiff::TAG_MODEL)
    }

    /// Full demosaic through the RAW pipeline. Blocking and CPU-bound; run
    /// on the blocking pool. Camera white balance is always applied.
    ///
    /// With `half_resolution` the output is bounded to half the native
    /// sensor dimensions, which quarters the work and is plenty for a
    /// viewable conversion.
    pub fn decode(&self, half_resolution: bool) -> Result<PixelGrid, RawError> {
        let (max_width, max_height) = if half_resolution {
            // rawloader has no header-only probe; learning the native
            // dimensions costs an extra pass over the sensor data before
            // imagepipe decodes it for real.
            let raw = rawloader::decode_file(&self.path)
                .map_err(|e| RawError::Decode(e.to_string()))?;
            (raw.width.div_ceil(2), raw.height.div_ceil(2))
        } else {
            (0, 0)
        };

        let decoded = imagepipe::simple_decode_8bit(&self.path, max_width, max_height)
            .map_err(RawError::Decode)?;
        if decoded.width == 0 || decoded.height == 0 || decoded.data.is_empty() {
            return Err(RawError::Decode("decoder produced an empty image".into()));
        }

        Ok(PixelGrid {
            width: decoded.width,
            height: decoded.height,
            pixels: decoded.data,
        })
    }
}
