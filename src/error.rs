//! Error types for caption generation.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CaptionError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Config document missing, unreadable or describing unusable geometry.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Encoder/decoder weights missing or failed to load.
    #[error("model not available: {0}")]
    ModelUnavailable(String),

    /// `vocab.json` present but not a string to token-id object.
    #[error("tokenizer error: {0}")]
    Tokenizer(String),

    #[error("image decode error: {0}")]
    ImageDecode(String),

    /// Encoder or decoder invocation failed, or returned malformed outputs.
    #[error("inference error: {0}")]
    Inference(String),
}

pub type Result<T> = std::result::Result<T, CaptionError>;
