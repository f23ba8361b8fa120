//! Local notification error types.

use thiserror::Error;

/// Errors that can occur while scheduling a local notification.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NotificationError {
    /// The platform rejected the notification request.
    #[error("failed to schedule notification: {0}")]
    ScheduleFailed(String),

    /// The notification content is invalid.
    #[error("invalid notification content: {0}")]
    InvalidContent(String),

    /// No notification backend is available.
    #[error("notifications are not available")]
    NotAvailable,
}

impl NotificationError {
    /// Returns a user-friendly suggestion for resolving this error.
    #[must_use]
    pub fn suggestion(&self) -> &'static str {
        match self {
            Self::ScheduleFailed(_) => "Try again later",
            Self::InvalidContent(_) => "Report this problem to support",
            Self::NotAvailable => "Notifications are not supported on this device",
        }
    }
}
