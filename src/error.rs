use thiserror::Error;

/// Errors raised by the recognition pipeline and its collaborators.
#[derive(Debug, Error)]
pub enum DigitError {
    /// Uploaded bytes could not be decoded as an image.
    #[error("failed to decode image: {0}")]
    Decode(String),

    /// The classifier artifact is missing or could not be loaded.
    #[error("classifier unavailable ({path}): {reason}")]
    ClassifierUnavailable { path: String, reason: String },

    /// A tensor was built from the wrong number of values.
    #[error("tensor shape mismatch: {0}")]
    Shape(String),

    #[error("classifier inference failed: {0}")]
    Inference(String),

    #[error("failed to encode preview image: {0}")]
    Encode(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, DigitError>;
