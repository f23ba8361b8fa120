//! Remote backend error types.

use thiserror::Error;

/// Errors returned by a [`WorkoutApi`](super::WorkoutApi) implementation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// The request never reached the backend.
    #[error("network error: {0}")]
    Network(String),

    /// The backend answered with an error status.
    #[error("server error ({status}): {message}")]
    Server {
        /// HTTP-like status code
        status: u16,
        /// Server-provided message
        message: String,
    },

    /// The requested resource does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The response could not be decoded.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl ApiError {
    /// Returns true if sending the same request again may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network(_) => true,
            Self::Server { status, .. } => *status >= 500 || *status == 429,
            Self::NotFound(_) | Self::InvalidResponse(_) => false,
        }
    }

    /// Returns a user-friendly suggestion for resolving this error.
    #[must_use]
    pub fn suggestion(&self) -> &'static str {
        match self {
            Self::Network(_) => "Check your connection and try again",
            Self::Server { .. } if self.is_retryable() => "The server is busy, try again shortly",
            Self::Server { .. } => "Contact support if this keeps happening",
            Self::NotFound(_) => "Refresh to load the latest data",
            Self::InvalidResponse(_) => "Update the app to the latest version",
        }
    }
}
