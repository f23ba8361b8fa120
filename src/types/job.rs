//! Background job wire types.
//!
//! Jobs are server-side workout generation tasks. The client only tracks
//! their id, type, status and progress.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of generation work a job performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum JobType {
    /// A fresh workout plan
    Generation,
    /// A plan regenerated from user feedback
    Regeneration,
    /// A single day regenerated from user feedback
    DailyRegeneration,
}

impl JobType {
    /// Returns the string representation of the job type.
    pub fn as_str(&self) -> &'static str {
        match self {
            JobType::Generation => "generation",
            JobType::Regeneration => "regeneration",
            JobType::DailyRegeneration => "daily-regeneration",
        }
    }

    /// Returns true if the job writes to the user's plan.
    ///
    /// Every job type currently does, so no two may run at once.
    pub fn is_generation(&self) -> bool {
        matches!(
            self,
            JobType::Generation | JobType::Regeneration | JobType::DailyRegeneration
        )
    }

    /// Title used for the local notification on success.
    pub fn completion_title(&self) -> &'static str {
        match self {
            JobType::Generation => "Your workout plan is ready",
            JobType::Regeneration => "Your updated plan is ready",
            JobType::DailyRegeneration => "Today's workout has been updated",
        }
    }
}

/// Job status as reported by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Queued, not yet picked up
    Pending,
    /// Running
    Processing,
    /// Finished successfully
    Complete,
    /// Finished with an error
    Failed,
}

impl JobStatus {
    /// Returns the string representation of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Complete => "complete",
            JobStatus::Failed => "failed",
        }
    }

    /// Returns true if the job will not change any more.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Complete | JobStatus::Failed)
    }
}

/// A job tracked by the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackgroundJob {
    /// Job id assigned by the backend
    pub id: String,
    /// Job type
    pub job_type: JobType,
    /// Last known status
    pub status: JobStatus,
    /// Progress percentage (0-100)
    pub progress: u8,
    /// Estimated seconds remaining
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eta_seconds: Option<u32>,
    /// When the job was created
    pub created_at: DateTime<Utc>,
}

impl BackgroundJob {
    /// Creates a pending job.
    pub fn new(id: impl Into<String>, job_type: JobType) -> Self {
        Self {
            id: id.into(),
            job_type,
            status: JobStatus::Pending,
            progress: 0,
            eta_seconds: None,
            created_at: Utc::now(),
        }
    }

    /// Applies a status report, clamping progress to 100.
    pub fn apply(&mut self, report: &JobStatusReport) {
        self.status = report.status;
        self.progress = report.progress.min(100);
        self.eta_seconds = report.eta_seconds;
    }
}

/// Response to a generation or regeneration request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStartResponse {
    /// Whether the backend accepted the request
    pub success: bool,
    /// Id of the created job
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
    /// Error or info message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl JobStartResponse {
    /// Creates an accepted response.
    pub fn accepted(job_id: impl Into<String>) -> Self {
        Self {
            success: true,
            job_id: Some(job_id.into()),
            message: None,
        }
    }

    /// Creates a rejected response.
    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            success: false,
            job_id: None,
            message: Some(message.into()),
        }
    }
}

/// Status report for one job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatusReport {
    /// Job id
    pub job_id: String,
    /// Job type (present in listings)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_type: Option<JobType>,
    /// Current status
    pub status: JobStatus,
    /// Progress percentage
    #[serde(default)]
    pub progress: u8,
    /// Estimated seconds remaining
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eta_seconds: Option<u32>,
    /// Failure reason
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Creation time (present in listings)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl JobStatusReport {
    /// Creates a report with the given status and progress.
    pub fn new(job_id: impl Into<String>, status: JobStatus, progress: u8) -> Self {
        Self {
            job_id: job_id.into(),
            job_type: None,
            status,
            progress,
            eta_seconds: None,
            error: None,
            created_at: None,
        }
    }
}
