//! Session error types.

use thiserror::Error;

use crate::api::ApiError;
use crate::circuit::CircuitError;
use crate::tracker::TrackerError;

/// Errors returned by session operations.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SessionError {
    /// The session is not positioned on an exercise.
    #[error("no exercise is active (session is {0})")]
    NotReady(&'static str),

    /// The operation needs the workout to be started first.
    #[error("the workout has not been started")]
    NotStarted,

    /// Per-exercise actions are not available inside a circuit block.
    #[error("'{0}' is a circuit block; complete the whole block instead")]
    CircuitBlock(String),

    /// Block-level completion was requested for a non-circuit block.
    #[error("'{0}' is not a circuit block")]
    NotCircuitBlock(String),

    /// There is no countdown to run for the current exercise or block.
    #[error("'{0}' has no target duration")]
    NoTargetDuration(String),

    /// A timed set was completed before its countdown ran.
    #[error("the timer for '{0}' has not run yet")]
    TimerNotRun(String),

    /// The session configuration was rejected.
    #[error("invalid session configuration: {0}")]
    InvalidConfig(String),

    /// Fetching the active workout failed.
    #[error("failed to load today's workout: {0}")]
    LoadFailed(#[source] ApiError),

    /// One or more completions could not be saved.
    #[error("failed to save {} exercise(s): {source}", exercise_ids.len())]
    PersistFailed {
        /// Exercises whose completion is still pending
        exercise_ids: Vec<String>,
        /// First error returned by the backend
        #[source]
        source: ApiError,
    },

    /// A set edit was rejected.
    #[error(transparent)]
    Tracker(#[from] TrackerError),

    /// A circuit entry was rejected.
    #[error(transparent)]
    Circuit(#[from] CircuitError),
}

impl SessionError {
    /// Returns true if repeating the operation may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::LoadFailed(e) => e.is_retryable(),
            Self::PersistFailed { source, .. } => source.is_retryable(),
            _ => false,
        }
    }

    /// Returns true if local progress is kept but not yet saved.
    #[must_use]
    pub fn is_sync_error(&self) -> bool {
        matches!(self, Self::PersistFailed { .. })
    }

    /// Returns a user-friendly suggestion for resolving this error.
    #[must_use]
    pub fn suggestion(&self) -> &'static str {
        match self {
            Self::NotReady(_) => "Load today's workout first",
            Self::NotStarted => "Start the workout first",
            Self::CircuitBlock(_) => "Log your rounds, then complete the block",
            Self::NotCircuitBlock(_) => "Complete or skip the current exercise instead",
            Self::NoTargetDuration(_) => "Log sets for this exercise instead",
            Self::TimerNotRun(_) => "Start the exercise timer first",
            Self::InvalidConfig(_) => "Check the session settings",
            Self::LoadFailed(e) => e.suggestion(),
            Self::PersistFailed { .. } => "Your progress is kept; retry syncing when back online",
            Self::Tracker(_) | Self::Circuit(_) => "Check the value and try again",
        }
    }
}
