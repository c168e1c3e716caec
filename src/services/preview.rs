//! Embedded preview extraction.
//!
//! RAW containers usually carry a ready-made JPEG preview next to the sensor
//! data, and serving it verbatim skips the demosaic entirely, so the pipeline
//! always looks here first. The preview hides in one of a few places: the
//! SubIFD (large previews, common on Sony and Nikon bodies), IFD1 (the
//! classic EXIF thumbnail), strip data in IFD0, or, as a last resort,
//! anywhere in the file a large SOI..EOI span can be found.
//!
//! Extraction never triggers a sensor-data decode.

use super::tiff::{self, ByteOrder, IfdEntry, TagDirectory};

// TIFF compression values that mean "the strips hold JPEG data".
const COMPRESSION_JPEG: u32 = 6;
const COMPRESSION_JPEG_NEW: u32 = 7;

/// Smallest span the blind marker scan will trust. Real previews are
/// comfortably larger; stray marker pairs and tiny thumbnails are not.
const MIN_SCANNED_JPEG: usize = 50_000;

/// Where the marker scan starts, clearing the header region where stray
/// 0xFFD8 pairs are common.
const SCAN_START: usize = 8 * 1024;

/// SubIFD previews at or below this size are likely tiny thumbnails; prefer
/// IFD1 when it exists before settling for one.
const SMALL_SUBIFD_PREVIEW: usize = 10_000;

/// Declared format of an extracted preview. Only JPEG previews can be served
/// by the pipeline; anything else forces the decode fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreviewFormat {
    Jpeg,
    Other,
}

#[derive(Debug)]
pub struct PreviewImage {
    pub bytes: Vec<u8>,
    pub format: PreviewFormat,
}

impl PreviewImage {
    pub fn is_jpeg(&self) -> bool {
        self.format == PreviewFormat::Jpeg
    }

    /// Wrap extracted bytes, sniffing the declared format from content.
    fn tagged(bytes: Vec<u8>) -> Self {
        let format = match infer::get(&bytes) {
            Some(kind) if kind.mime_type() == mime::IMAGE_JPEG.essence_str() => {
                PreviewFormat::Jpeg
            }
            _ => PreviewFormat::Other,
        };
        Self { bytes, format }
    }
}

/// Pull the embedded preview out of a parsed container, if it stores one.
pub fn extract_preview(bytes: &[u8], dir: &TagDirectory) -> Option<PreviewImage> {
    // SubIFD first: on cameras that populate it this is the full-size
    // preview rather than the postage-stamp thumbnail.
    if let Some(offset) = dir.sub_ifd_offset {
        if let Some(candidate) = preview_from_ifd_at(bytes, dir.order, offset) {
            if candidate.bytes.len() > SMALL_SUBIFD_PREVIEW || dir.ifd1_offset.is_none() {
                return Some(candidate);
            }
        }
    }

    if let Some(offset) = dir.ifd1_offset {
        if let Some(candidate) = preview_from_ifd_at(bytes, dir.order, offset) {
            return Some(candidate);
        }
    }

    if let Some(candidate) = preview_from_entries(bytes, &dir.ifd0) {
        return Some(candidate);
    }

    scan_for_jpeg(bytes).map(PreviewImage::tagged)
}

fn preview_from_ifd_at(bytes: &[u8], order: ByteOrder, offset: u32) -> Option<PreviewImage> {
    let (entries, _) = tiff::read_ifd(bytes, order, offset).ok()?;
    preview_from_entries(bytes, &entries)
}

fn preview_from_entries(bytes: &[u8], entries: &[IfdEntry]) -> Option<PreviewImage> {
    let value_of = |tag: u16| entries.iter().find(|e| e.tag == tag).map(|e| e.value);

    // JPEGInterchangeFormat pair is the common case.
    if let (Some(offset), Some(length)) = (
        value_of(tiff::TAG_JPEG_OFFSET),
        value_of(tiff::TAG_JPEG_LENGTH),
    ) {
        if let Some(data) = slice_at(bytes, offset, length) {
            return Some(PreviewImage::tagged(data.to_vec()));
        }
    }

    // Strip-based storage, used by some bodies; only worth pulling when the
    // compression tag says the strips hold JPEG data, otherwise the strips
    // are sensor data.
    if let (Some(offset), Some(length), Some(compression)) = (
        value_of(tiff::TAG_STRIP_OFFSETS),
        value_of(tiff::TAG_STRIP_BYTE_COUNTS),
        value_of(tiff::TAG_COMPRESSION),
    ) {
        if compression == COMPRESSION_JPEG || compression == COMPRESSION_JPEG_NEW {
            if let Some(data) = slice_at(bytes, offset, length) {
                return Some(PreviewImage::tagged(data.to_vec()));
            }
        }
    }

    None
}

fn slice_at(bytes: &[u8], offset: u32, length: u32) -> Option<&[u8]> {
    if length == 0 {
        return None;
    }
    let start = offset as usize;
    bytes.get(start..start.checked_add(length as usize)?)
}

/// Marker-scan only, for containers without a readable tag directory
/// (CR3 and the other non-TIFF-table layouts).
pub fn scan_only(bytes: &[u8]) -> Option<PreviewImage> {
    scan_for_jpeg(bytes).map(PreviewImage::tagged)
}

/// Blind scan for a large SOI..EOI span. Single pass: any span from a
/// later SOI is shorter than the span from the first one, so only the
/// first SOI needs remembering.
fn scan_for_jpeg(bytes: &[u8]) -> Option<Vec<u8>> {
    let start = SCAN_START.min(bytes.len());
    let mut soi: Option<usize> = None;
    for i in start..bytes.len().saturating_sub(1) {
        match (bytes[i], bytes[i + 1]) {
            (0xFF, 0xD8) if soi.is_none() => soi = Some(i),
            (0xFF, 0xD9) => {
                if let Some(at) = soi {
                    if i + 2 - at >= MIN_SCANNED_JPEG {
                        return Some(bytes[at..i + 2].to_vec());
                    }
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::tiff::TagDirectory;

    /// Real JPEG bytes, small but structurally valid.
    fn sample_jpeg() -> Vec<u8> {
        use crate::services::container::PixelGrid;
        use crate::services::encoder::encode_jpeg;

        let mut pixels = Vec::with_capacity(16 * 16 * 3);
        for y in 0..16u32 {
            for x in 0..16u32 {
                pixels.push((x * 16) as u8);
                pixels.push((y * 16) as u8);
                pixels.push(128);
            }
        }
        encode_jpeg(
            &PixelGrid {
                width: 16,
                height: 16,
                pixels,
            },
            90,
        )
        .unwrap()
    }

    fn le_entry(tag: u16, field_type: u16, count: u32, value: u32) -> Vec<u8> {
        let mut e = Vec::with_capacity(12);
        e.extend_from_slice(&tag.to_le_bytes());
        e.extend_from_slice(&field_type.to_le_bytes());
        e.extend_from_slice(&count.to_le_bytes());
        e.extend_from_slice(&value.to_le_bytes());
        e
    }

    /// Little-endian container with an IFD0 JPEGInterchangeFormat preview.
    fn container_with_interchange_preview(payload: &[u8]) -> Vec<u8> {
        let data_start = 8 + 2 + 2 * 12 + 4;
        let mut out = vec![0x49, 0x49, 0x2A, 0x00];
        out.extend_from_slice(&8u32.to_le_bytes());
        out.extend_from_slice(&2u16.to_le_bytes());
        out.extend_from_slice(&le_entry(tiff::TAG_JPEG_OFFSET, 4, 1, data_start as u32));
        out.extend_from_slice(&le_entry(tiff::TAG_JPEG_LENGTH, 4, 1, payload.len() as u32));
        out.extend_from_slice(&0u32.to_le_bytes());
        out.extend_from_slice(payload);
        out
    }

    #[test]
    fn finds_interchange_format_preview() {
        let jpeg = sample_jpeg();
        let file = container_with_interchange_preview(&jpeg);
        let dir = TagDirectory::parse(&file).unwrap();

        let preview = extract_preview(&file, &dir).unwrap();
        assert!(preview.is_jpeg());
        assert_eq!(preview.bytes, jpeg);
    }

    #[test]
    fn non_jpeg_preview_is_tagged_other() {
        let not_jpeg = vec![0x00u8; 4096];
        let file = container_with_interchange_preview(&not_jpeg);
        let dir = TagDirectory::parse(&file).unwrap();

        let preview = extract_preview(&file, &dir).unwrap();
        assert_eq!(preview.format, PreviewFormat::Other);
    }

    #[test]
    fn finds_strip_based_jpeg_preview() {
        let jpeg = sample_jpeg();
        let data_start = 8 + 2 + 3 * 12 + 4;
        let mut file = vec![0x49, 0x49, 0x2A, 0x00];
        file.extend_from_slice(&8u32.to_le_bytes());
        file.extend_from_slice(&3u16.to_le_bytes());
        file.extend_from_slice(&le_entry(tiff::TAG_COMPRESSION, 3, 1, 6));
        file.extend_from_slice(&le_entry(tiff::TAG_STRIP_OFFSETS, 4, 1, data_start as u32));
        file.extend_from_slice(&le_entry(
            tiff::TAG_STRIP_BYTE_COUNTS,
            4,
            1,
            jpeg.len() as u32,
        ));
        file.extend_from_slice(&0u32.to_le_bytes());
        file.extend_from_slice(&jpeg);

        let dir = TagDirectory::parse(&file).unwrap();
        let preview = extract_preview(&file, &dir).unwrap();
        assert!(preview.is_jpeg());
        assert_eq!(preview.bytes, jpeg);
    }

    #[test]
    fn uncompressed_strips_are_not_a_preview() {
        let data_start = 8 + 2 + 3 * 12 + 4;
        let mut file = vec![0x49, 0x49, 0x2A, 0x00];
        file.extend_from_slice(&8u32.to_le_bytes());
        file.extend_from_slice(&3u16.to_le_bytes());
        file.extend_from_slice(&le_entry(tiff::TAG_COMPRESSION, 3, 1, 1));
        file.extend_from_slice(&le_entry(tiff::TAG_STRIP_OFFSETS, 4, 1, data_start as u32));
        file.extend_from_slice(&le_entry(tiff::TAG_STRIP_BYTE_COUNTS, 4, 1, 64));
        file.extend_from_slice(&0u32.to_le_bytes());
        file.resize(file.len() + 64, 0xAB);

        let dir = TagDirectory::parse(&file).unwrap();
        assert!(extract_preview(&file, &dir).is_none());
    }

    #[test]
    fn empty_ifd_yields_no_preview() {
        let mut file = vec![0x49, 0x49, 0x2A, 0x00];
        file.extend_from_slice(&8u32.to_le_bytes());
        file.extend_from_slice(&0u16.to_le_bytes());
        file.extend_from_slice(&0u32.to_le_bytes());

        let dir = TagDirectory::parse(&file).unwrap();
        assert!(extract_preview(&file, &dir).is_none());
    }

    #[test]
    fn marker_scan_finds_large_span_only() {
        // Empty directory, but a marker-delimited span past the header zone.
        let mut file = vec![0x49, 0x49, 0x2A, 0x00];
        file.extend_from_slice(&8u32.to_le_bytes());
        file.extend_from_slice(&0u16.to_le_bytes());
        file.extend_from_slice(&0u32.to_le_bytes());
        file.resize(80_000, 0);
        file[10_000] = 0xFF;
        file[10_001] = 0xD8;
        file[70_000] = 0xFF;
        file[70_001] = 0xD9;

        let dir = TagDirectory::parse(&file).unwrap();
        let preview = extract_preview(&file, &dir).unwrap();
        assert_eq!(preview.bytes.len(), 70_002 - 10_000);
        assert_eq!(&preview.bytes[..2], &[0xFF, 0xD8]);

        // A small span is ignored.
        let mut small = file.clone();
        small[70_000] = 0;
        small[70_001] = 0;
        small[12_000] = 0xFF;
        small[12_001] = 0xD9;
        let dir = TagDirectory::parse(&small).unwrap();
        assert!(extract_preview(&small, &dir).is_none());
    }

    #[test]
    fn repeated_soi_tail_without_eoi_terminates() {
        // A long run of SOI markers with no EOI must not blow up the scan;
        // the pass is linear and comes back empty.
        let mut file = vec![0x49, 0x49, 0x2A, 0x00];
        file.extend_from_slice(&8u32.to_le_bytes());
        file.extend_from_slice(&0u16.to_le_bytes());
        file.extend_from_slice(&0u32.to_le_bytes());
        while file.len() < 256 * 1024 {
            file.extend_from_slice(&[0xFF, 0xD8]);
        }

        let dir = TagDirectory::parse(&file).unwrap();
        assert!(extract_preview(&file, &dir).is_none());
    }

    #[test]
    fn scan_only_works_without_a_directory() {
        let mut file = vec![0u8; 80_000];
        file[10_000] = 0xFF;
        file[10_001] = 0xD8;
        file[70_000] = 0xFF;
        file[70_001] = 0xD9;

        let preview = scan_only(&file).unwrap();
        assert_eq!(preview.bytes.len(), 70_002 - 10_000);
    }

    #[test]
    fn preview_length_past_eof_is_rejected() {
        let jpeg = sample_jpeg();
        let mut file = container_with_interchange_preview(&jpeg);
        // Corrupt the length entry to run past the end of the file.
        let len_value_at = 8 + 2 + 12 + 8;
        file[len_value_at..len_value_at + 4].copy_from_slice(&0x00FF_FFFFu32.to_le_bytes());

        let dir = TagDirectory::parse(&file).unwrap();
        assert!(extract_preview(&file, &dir).is_none());
    }
}
