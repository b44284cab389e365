//! Text processing error types.

use thiserror::Error;

pub type TextResult<T> = Result<T, TextError>;

#[derive(Debug, Error)]
pub enum TextError {
    #[error("Text generation request failed: {0}")]
    GenerationFailed(String),

    #[error("Text generation capability not configured: {0}")]
    GenerationUnavailable(String),

    #[error("Segment count mismatch: requested {requested}, got {returned}")]
    SegmentCountMismatch { requested: usize, returned: usize },

    #[error("Strategy produced no segments")]
    NoSegments,

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl TextError {
    pub fn generation_failed(msg: impl Into<String>) -> Self {
        Self::GenerationFailed(msg.into())
    }

    pub fn generation_unavailable(msg: impl Into<String>) -> Self {
        Self::GenerationUnavailable(msg.into())
    }
}
