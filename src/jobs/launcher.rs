//! Starting generation jobs.

use std::sync::Arc;

use tokio::sync::Mutex;

use super::{JobError, JobTracker};
use crate::api::WorkoutApi;
use crate::types::{JobStartResponse, JobType};

/// Starts generation and regeneration jobs and registers them for tracking.
///
/// Only one generation may run at a time. The launcher checks the tracker
/// before calling the backend and rejects a second request without any
/// network call.
pub struct JobLauncher {
    api: Arc<dyn WorkoutApi>,
    tracker: Arc<JobTracker>,
    launching: Mutex<()>,
}

impl JobLauncher {
    pub fn new(api: Arc<dyn WorkoutApi>, tracker: Arc<JobTracker>) -> Self {
        Self {
            api,
            tracker,
            launching: Mutex::new(()),
        }
    }

    pub fn tracker(&self) -> &Arc<JobTracker> {
        &self.tracker
    }

    /// Starts generating a new plan. Returns the job id.
    pub async fn generate_plan(&self) -> Result<String, JobError> {
        self.launch(JobType::Generation, None, "").await
    }

    /// Starts regenerating the plan from user feedback.
    pub async fn regenerate_plan(&self, feedback: &str) -> Result<String, JobError> {
        self.launch(JobType::Regeneration, None, feedback).await
    }

    /// Starts regenerating one plan day from user feedback.
    pub async fn regenerate_day(&self, plan_day_id: &str, feedback: &str) -> Result<String, JobError> {
        self.launch(JobType::DailyRegeneration, Some(plan_day_id), feedback)
            .await
    }

    async fn launch(
        &self,
        job_type: JobType,
        plan_day_id: Option<&str>,
        feedback: &str,
    ) -> Result<String, JobError> {
        // Held until the job is registered so two launches cannot both pass the check
        let _launching = self.launching.lock().await;

        if let Some(active) = self.tracker.active_generation() {
            tracing::info!(job_id = %active.id, "generation already in progress");
            return Err(JobError::GenerationInProgress { job_id: active.id });
        }

        if self.tracker.config().request_push_permission {
            self.register_push().await;
        }

        let user_id = self.tracker.config().user_id.as_str();
        let response = match (job_type, plan_day_id) {
            (JobType::DailyRegeneration, Some(plan_day_id)) => {
                self.api
                    .regenerate_daily_workout(user_id, plan_day_id, feedback)
                    .await?
            }
            (JobType::Regeneration, _) => self.api.regenerate_workout_plan(user_id, feedback).await?,
            _ => self.api.generate_workout_plan(user_id).await?,
        };

        let job_id = Self::job_id(response)?;
        self.tracker.add_job(&job_id, job_type);
        Ok(job_id)
    }

    fn job_id(response: JobStartResponse) -> Result<String, JobError> {
        if !response.success {
            let message = response
                .message
                .unwrap_or_else(|| "request was rejected".to_string());
            tracing::warn!(error = %message, "job start rejected");
            return Err(JobError::StartFailed(message));
        }
        response
            .job_id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| JobError::StartFailed("no job id returned".to_string()))
    }

    async fn register_push(&self) {
        match self.api.register_for_push_notifications().await {
            Ok(granted) => tracing::debug!(granted, "push registration"),
            Err(e) => tracing::warn!(error = %e, "push registration failed"),
        }
    }
}
