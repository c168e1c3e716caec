//! Filename and header-value helpers.

use std::path::Path;

/// Extensions the service recognizes as camera RAW files. The check is
/// advisory: content validation happens when the container is opened.
pub const RAW_EXTENSIONS: &[&str] = &[
    "cr2", "cr3", "nef", "arw", "dng", "raf", "orf", "rw2", "pef", "srw",
];

/// Lowercased extension of a filename, if it has one.
pub fn file_extension(filename: &str) -> Option<String> {
    Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
}

pub fn is_raw_extension(filename: &str) -> bool {
    file_extension(filename)
        .map(|ext| RAW_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or(false)
}

/// Name for the converted download: the upload's stem with a `.jpg`
/// extension, `converted.jpg` when the stem is unusable.
pub fn output_filename(upload_name: &str) -> String {
    let stem = Path::new(upload_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .map(|s| {
            s.chars()
                .filter(|c| !c.is_control() && *c != '"' && *c != '\\')
                .collect::<String>()
        })
        .unwrap_or_default();
    let stem = stem.trim();
    if stem.is_empty() {
        "converted.jpg".to_string()
    } else {
        format!("{stem}.jpg")
    }
}

/// Strip everything that cannot travel in an HTTP header: CR, LF, and any
/// other control byte, plus non-ASCII.
pub fn sanitize_header_value(value: &str) -> String {
    value
        .chars()
        .filter(|c| c.is_ascii() && !c.is_ascii_control())
        .collect::<String>()
        .trim()
        .to_string()
}
