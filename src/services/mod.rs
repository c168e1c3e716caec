pub mod container;
pub mod encoder;
pub mod metadata;
pub mod pipeline;
pub mod preview;
pub mod tiff;

use thiserror::Error;

/// Failures raised while working with a RAW container.
#[derive(Debug, Error)]
pub enum RawError {
    #[error("not a recognized RAW container")]
    UnrecognizedContainer,

    #[error("corrupted RAW structure: {0}")]
    Corrupted(String),

    #[error("RAW decode failed: {0}")]
    Decode(String),
}
