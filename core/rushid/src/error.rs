use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RushIdError {
    #[error("failed to read input image: {0}")]
    InputReadError(String),

    #[error("image dimensions are zero")]
    ZeroDimensions,

    #[error("failed to resize image: {0}")]
    ResizeError(String),

    #[error("failed to encode image: {0}")]
    EncodeError(String),

    #[error("failed to write {}: {source}", path.display())]
    WriteError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("quality must be between 0.0 and 1.0, got {0}")]
    InvalidQuality(f32),

    #[error("output size must be > 0")]
    InvalidOutputSize,

    #[error("invalid crop tuning: {0}")]
    InvalidTuning(String),

    #[error("failed to load detector model: {0}")]
    ModelLoad(String),
}
