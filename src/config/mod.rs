//! Service configuration, loaded from environment variables.

use std::env;
use std::path::PathBuf;

/// What the pipeline does when a container carries no usable preview.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversionMode {
    /// Serve the embedded preview when usable, otherwise run a full decode.
    PreviewThenDecode,
    /// Preview extraction only; a missing preview is a client error.
    PreviewOnly,
}

impl ConversionMode {
    fn parse(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "preview-then-decode" | "fallback" => Some(Self::PreviewThenDecode),
            "preview-only" => Some(Self::PreviewOnly),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ConverterConfig {
    /// Upload size ceiling in bytes, enforced before buffering the body.
    pub max_upload_size: usize,
    /// JPEG quality used when the client sends none (or an invalid one).
    pub default_quality: u8,
    pub mode: ConversionMode,
    /// Decode at half the native sensor dimensions. Quarters the work and
    /// is the deployment default.
    pub half_resolution_decode: bool,
    /// Ceiling on a single decode, in seconds.
    pub decode_timeout_secs: u64,
    /// Skip the RAW extension allow-list check.
    pub allow_any_extension: bool,
    pub temp_dir: PathBuf,
    pub port: u16,
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            max_upload_size: 200 * 1024 * 1024,
            default_quality: 90,
            mode: ConversionMode::PreviewThenDecode,
            half_resolution_decode: true,
            decode_timeout_secs: 60,
            allow_any_extension: false,
            temp_dir: env::temp_dir(),
            port: 5000,
        }
    }
}

impl ConverterConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            max_upload_size: env::var("MAX_UPLOAD_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_upload_size),
            default_quality: env::var("DEFAULT_JPEG_QUALITY")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|q| (1..=100).contains(q))
                .unwrap_or(defaults.default_quality),
            mode: env::var("CONVERSION_MODE")
                .ok()
                .and_then(|v| ConversionMode::parse(&v))
                .unwrap_or(defaults.mode),
            half_resolution_decode: env::var("HALF_RESOLUTION_DECODE")
                .map(|v| v.to_lowercase() != "false" && v != "0")
                .unwrap_or(defaults.half_resolution_decode),
            decode_timeout_secs: env::var("DECODE_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|secs| *secs > 0)
                .unwrap_or(defaults.decode_timeout_secs),
            allow_any_extension: env::var("ALLOW_ANY_EXTENSION")
                .map(|v| v.to_lowercase() == "true" || v == "1")
                .unwrap_or(defaults.allow_any_extension),
            temp_dir: env::var("TEMP_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.temp_dir),
            port: env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.port),
        }
    }

    /// Settings for tests and local development: small uploads, short
    /// decode ceiling.
    pub fn development() -> Self {
        Self {
            max_upload_size: 50 * 1024 * 1024,
            decode_timeout_secs: 10,
            ..Self::default()
        }
    }
}
