//! Remote backend interface.
//!
//! The session controller and job tracker only talk to the backend through
//! [`WorkoutApi`]. Transport is left to the implementation; this crate ships
//! [`InMemoryWorkoutApi`] for tests and the offline `simulate` command.

mod error;
mod memory;

use async_trait::async_trait;

pub use error::ApiError;
pub use memory::{InMemoryWorkoutApi, PersistedCompletion};

use crate::types::{CompletionStatus, JobStartResponse, JobStatusReport, PlanDay, SetRecord};

/// Operations the workout core consumes from the backend.
#[async_trait]
pub trait WorkoutApi: Send + Sync {
    /// Fetches today's active plan day, if any.
    async fn fetch_active_workout(&self) -> Result<Option<PlanDay>, ApiError>;

    /// Persists the logged sets of one exercise.
    async fn persist_exercise_completion(
        &self,
        exercise_id: &str,
        sets: &[SetRecord],
        status: CompletionStatus,
    ) -> Result<(), ApiError>;

    /// Starts generating a new plan.
    async fn generate_workout_plan(&self, user_id: &str) -> Result<JobStartResponse, ApiError>;

    /// Starts regenerating the plan from feedback.
    async fn regenerate_workout_plan(
        &self,
        user_id: &str,
        feedback: &str,
    ) -> Result<JobStartResponse, ApiError>;

    /// Starts regenerating a single plan day from feedback.
    async fn regenerate_daily_workout(
        &self,
        user_id: &str,
        plan_day_id: &str,
        feedback: &str,
    ) -> Result<JobStartResponse, ApiError>;

    /// Polls the status of one job.
    async fn poll_job_status(&self, job_id: &str) -> Result<JobStatusReport, ApiError>;

    /// Lists the jobs the backend still considers active for a user.
    async fn list_active_jobs(&self, user_id: &str) -> Result<Vec<JobStatusReport>, ApiError>;

    /// Registers the device for push notifications.
    ///
    /// Returns whether permission was granted.
    async fn register_for_push_notifications(&self) -> Result<bool, ApiError>;
}
