//! Camera-model resolution.
//!
//! Three strategies, tried in order, first success wins. Resolution never
//! fails: when every strategy comes up empty the sentinel is returned. The
//! result is sanitized for HTTP header transport.

use std::io::Cursor;

use super::container::RawContainer;
use crate::utils::validation::sanitize_header_value;

pub const UNKNOWN_CAMERA: &str = "Unknown Camera";

/// Brand tokens the heuristic scan looks for near the top of the file.
const BRAND_TOKENS: &[&str] = &[
    "Canon",
    "NIKON",
    "SONY",
    "FUJIFILM",
    "LEICA",
    "Panasonic",
    "OLYMPUS",
    "PENTAX",
    "HASSELBLAD",
    "RICOH",
    "SIGMA",
];

/// How far into the file the heuristic scan looks.
const SCAN_WINDOW: usize = 4096;

/// Longest model string the heuristic scan will take from a brand token.
const MODEL_SNIPPET: usize = 50;

/// Which strategy produced the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provenance {
    NativeField,
    TagDirectory,
    HeuristicScan,
    Unknown,
}

#[derive(Debug, Clone)]
pub struct CameraMetadata {
    pub model: String,
    pub provenance: Provenance,
}

/// Resolve the camera model for an open container. Deterministic for a
/// given input; strategies below the first success are never evaluated.
pub fn resolve(container: &RawContainer) -> CameraMetadata {
    let strategies: &[(Provenance, fn(&RawContainer) -> Option<String>)] = &[
        (Provenance::NativeField, native_field),
        (Provenance::TagDirectory, tag_directory),
        (Provenance::HeuristicScan, heuristic_scan),
    ];

    for (provenance, strategy) in strategies {
        if let Some(model) = strategy(container) {
            let model = sanitize_header_value(&model);
            if !model.is_empty() {
                return CameraMetadata {
                    model,
                    provenance: *provenance,
                };
            }
        }
    }

    CameraMetadata {
        model: UNKNOWN_CAMERA.to_string(),
        provenance: Provenance::Unknown,
    }
}

fn native_field(container: &RawContainer) -> Option<String> {
    let model = container.camera_model()?;
    let model = model.trim().to_string();
    if model.is_empty() || model.eq_ignore_ascii_case("unknown") {
        return None;
    }
    Some(model)
}

fn tag_directory(container: &RawContainer) -> Option<String> {
    let mut cursor = Cursor::new(container.bytes());
    let reader = exif::Reader::new()
        .read_from_container(&mut cursor)
        .ok()?;
    let field = reader.get_field(exif::Tag::Model, exif::In::PRIMARY)?;
    let model = field
        .display_value()
        .to_string()
        .trim_matches('"')
        .trim()
        .to_string();
    if model.is_empty() || model == "None" {
        return None;
    }
    Some(model)
}

/// Last resort: scan the head of the file for a known brand token and take
/// the text that follows it. Lossy decoding is fine here; binary garbage
/// stops the snippet at the first disallowed character.
fn heuristic_scan(container: &RawContainer) -> Option<String> {
    let bytes = container.bytes();
    let head = &bytes[..SCAN_WINDOW.min(bytes.len())];
    let text = String::from_utf8_lossy(head);

    for token in BRAND_TOKENS {
        if let Some(at) = text.find(token) {
            let snippet: String = text[at..]
                .chars()
                .take(MODEL_SNIPPET)
                .take_while(|c| {
                    c.is_ascii_alphanumeric() || *c == ' ' || *c == '-' || *c == '_'
                })
                .collect();
            let snippet = snippet.trim();
            if snippet.len() > 3 {
                return Some(snippet.to_string());
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use std::path::Path;

    fn le_entry(tag: u16, field_type: u16, count: u32, value: u32) -> Vec<u8> {
        let mut e = Vec::with_capacity(12);
        e.extend_from_slice(&tag.to_le_bytes());
        e.extend_from_slice(&field_type.to_le_bytes());
        e.extend_from_slice(&count.to_le_bytes());
        e.extend_from_slice(&value.to_le_bytes());
        e
    }

    fn container_from(data: Vec<u8>) -> RawContainer {
        RawContainer::open(Path::new("/tmp/meta.nef"), Bytes::from(data)).unwrap()
    }

    fn with_model_tag(model: &[u8], trailer: &[u8]) -> Vec<u8> {
        let value_at = 8 + 2 + 12 + 4;
        let mut data = vec![0x49, 0x49, 0x2A, 0x00];
        data.extend_from_slice(&8u32.to_le_bytes());
        data.extend_from_slice(&1u16.to_le_bytes());
        data.extend_from_slice(&le_entry(
            crate::services::tiff::TAG_MODEL,
            2,
            model.len() as u32,
            value_at as u32,
        ));
        data.extend_from_slice(&0u32.to_le_bytes());
        data.extend_from_slice(model);
        data.extend_from_slice(trailer);
        data
    }

    fn bare_container(trailer: &[u8]) -> Vec<u8> {
        let mut data = vec![0x49, 0x49, 0x2A, 0x00];
        data.extend_from_slice(&8u32.to_le_bytes());
        data.extend_from_slice(&0u16.to_le_bytes());
        data.extend_from_slice(&0u32.to_le_bytes());
        data.extend_from_slice(trailer);
        data
    }

    #[test]
    fn native_field_wins_over_heuristic_token() {
        // A conflicting brand token sits in the scan window, but the native
        // tag takes priority.
        let container = container_from(with_model_tag(b"ILCE-7M3\0", b"  Canon EOS R5  "));
        let meta = resolve(&container);
        assert_eq!(meta.model, "ILCE-7M3");
        assert_eq!(meta.provenance, Provenance::NativeField);
    }

    #[test]
    fn native_unknown_is_skipped() {
        // Strategy 1 rejects the literal "unknown"; strategy 2 reads the
        // same tag through the EXIF library and only rejects "None", so it
        // takes over.
        let container = container_from(with_model_tag(b"unknown\0", b""));
        let meta = resolve(&container);
        assert_ne!(meta.provenance, Provenance::NativeField);
    }

    #[test]
    fn heuristic_scan_truncates_at_disallowed_char() {
        let container = container_from(bare_container(b"xx FUJIFILM X-T4\x00\xffjunk"));
        let meta = resolve(&container);
        assert_eq!(meta.model, "FUJIFILM X-T4");
        assert_eq!(meta.provenance, Provenance::HeuristicScan);
    }

    #[test]
    fn short_heuristic_match_is_rejected() {
        let container = container_from(bare_container(b"LEICA\x00\x01"));
        let meta = resolve(&container);
        assert_eq!(meta.model, "LEICA");
        assert_eq!(meta.provenance, Provenance::HeuristicScan);

        // Token truncated to 3 chars or fewer is not a model.
        let container = container_from(bare_container(b"zzSIG\x00"));
        let meta = resolve(&container);
        assert_eq!(meta.model, UNKNOWN_CAMERA);
        assert_eq!(meta.provenance, Provenance::Unknown);
    }

    #[test]
    fn token_outside_scan_window_is_ignored() {
        let mut trailer = vec![b'.'; SCAN_WINDOW + 16];
        trailer.extend_from_slice(b"Canon EOS 90D");
        let container = container_from(bare_container(&trailer));
        let meta = resolve(&container);
        assert_eq!(meta.model, UNKNOWN_CAMERA);
    }

    #[test]
    fn sentinel_when_nothing_matches() {
        let container = container_from(bare_container(&[0u8; 256]));
        let meta = resolve(&container);
        assert_eq!(meta.model, UNKNOWN_CAMERA);
        assert_eq!(meta.provenance, Provenance::Unknown);
    }

    #[test]
    fn resolution_is_deterministic() {
        let data = with_model_tag(b"PENTAX K-1 Mark II\0", b"");
        let a = resolve(&container_from(data.clone()));
        let b = resolve(&container_from(data));
        assert_eq!(a.model, b.model);
        assert_eq!(a.provenance, b.provenance);
    }

    #[test]
    fn control_bytes_are_stripped_from_model() {
        let container = container_from(with_model_tag(b"EVIL\rX: injected\nMODEL\0", b""));
        let meta = resolve(&container);
        assert!(!meta.model.contains('\r'));
        assert!(!meta.model.contains('\n'));
    }
}
