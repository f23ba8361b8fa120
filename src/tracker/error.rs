//! Set tracker error types.

use thiserror::Error;

use crate::types::LoggingType;

/// Errors returned by [`SetTracker`](super::SetTracker) edits.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum TrackerError {
    /// No set exists at the given index.
    #[error("set {index} does not exist ({len} sets logged)")]
    SetIndexOutOfRange {
        /// Requested index
        index: usize,
        /// Number of sets logged
        len: usize,
    },

    /// The field cannot be edited for this kind of exercise.
    #[error("{field} cannot be edited for {} exercises", .logging_type.as_str())]
    FieldNotEditable {
        /// Field name
        field: &'static str,
        /// Logging type of the exercise
        logging_type: LoggingType,
    },

    /// The value is out of range.
    #[error("invalid value: {0}")]
    InvalidValue(String),
}
