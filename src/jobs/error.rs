//! Background job error types.

use thiserror::Error;

use crate::api::ApiError;

/// Errors returned when starting or tracking generation jobs.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum JobError {
    /// A generation job is already running.
    #[error("a workout is already being generated (job {job_id})")]
    GenerationInProgress {
        /// Id of the running job
        job_id: String,
    },

    /// The backend did not hand out a job id.
    #[error("failed to start job: {0}")]
    StartFailed(String),

    /// The tracker configuration was rejected.
    #[error("invalid job tracker configuration: {0}")]
    InvalidConfig(String),

    /// There is no loaded plan day to regenerate.
    #[error("no plan day is loaded")]
    NoActivePlanDay,

    /// The backend call failed.
    #[error(transparent)]
    Api(#[from] ApiError),
}

impl JobError {
    /// Returns true if this error came from the caller-side generation guard.
    #[must_use]
    pub fn is_in_progress(&self) -> bool {
        matches!(self, Self::GenerationInProgress { .. })
    }

    /// Returns a user-friendly suggestion for resolving this error.
    #[must_use]
    pub fn suggestion(&self) -> &'static str {
        match self {
            Self::GenerationInProgress { .. } => "Wait for the current generation to finish",
            Self::StartFailed(_) => "Try again in a moment",
            Self::InvalidConfig(_) => "Check the job tracker settings",
            Self::NoActivePlanDay => "Open today's workout first",
            Self::Api(e) => e.suggestion(),
        }
    }
}
