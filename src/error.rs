use std::fmt::Display;

use thiserror::Error;

/// Failure of a single transfer step.
///
/// Batch runs record these per item and keep going; a direct transfer hands them
/// back to the caller untouched.
#[derive(Debug, Error)]
pub enum TransferError {
    /// The page carried no video stream (image note, deleted note or login wall).
    #[error("no playable video stream found; the note may be an image post or require login")]
    NoPlayableStream,

    #[error("network error: {0}")]
    Network(String),

    #[error("authorization error: {0}")]
    Auth(String),

    #[error("upload failed: {0}")]
    Upload(String),

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl TransferError {
    pub fn network(context: impl Display, err: impl Display) -> Self {
        Self::Network(format!("{context}: {err}"))
    }

    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Whether retrying the whole item later may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network(_))
    }
}
