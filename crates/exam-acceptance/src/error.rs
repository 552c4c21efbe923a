//! Error types for the acceptance client.

use thiserror::Error;

/// Boxed transport error.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result type alias for acceptance operations.
pub type Result<T> = std::result::Result<T, AcceptanceError>;

/// Errors reported by [`RestResult`](crate::RestResult) and client setup.
#[derive(Debug, Error)]
pub enum AcceptanceError {
    /// The request could not be sent or the response not read.
    #[error("transport error: {0}")]
    Transport(#[source] BoxError),

    /// Every attempt failed; carries the last transport error.
    #[error("failed after {attempts} attempts")]
    RetriesExhausted {
        /// Attempts made.
        attempts: u32,
        /// Last transport error.
        #[source]
        source: BoxError,
    },

    /// No response was ever captured.
    #[error("no response")]
    NoResponse,

    /// A response arrived with a different status.
    #[error("expected status {expected}, got {actual}")]
    UnexpectedStatus {
        /// Expected status code.
        expected: u16,
        /// Received status code.
        actual: u16,
    },

    /// Retrying was cancelled.
    #[error("interrupted while retrying")]
    Interrupted,

    /// Invalid client configuration.
    #[error("configuration error: {0}")]
    Config(String),
}

impl AcceptanceError {
    /// Creates a new configuration error.
    #[must_use]
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Returns true if no response was obtained at all.
    #[must_use]
    pub const fn is_no_response(&self) -> bool {
        matches!(self, Self::NoResponse)
    }

    /// Returns true if every retry was used up by transport errors.
    #[must_use]
    pub const fn is_retries_exhausted(&self) -> bool {
        matches!(self, Self::RetriesExhausted { .. })
    }
}
