//! Registry of background generation jobs.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

use super::JobError;
use crate::api::WorkoutApi;
use crate::notification::{LocalNotification, NotificationScheduler};
use crate::types::{BackgroundJob, JobStatus, JobStatusReport, JobTrackerConfig, JobType};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Changes to the job registry.
#[derive(Debug, Clone, PartialEq)]
pub enum JobEvent {
    /// A job was registered.
    Added { job: BackgroundJob },
    /// A poll reported a non-terminal status.
    Progress {
        job_id: String,
        status: JobStatus,
        progress: u8,
        eta_seconds: Option<u32>,
    },
    /// A job finished successfully and was removed.
    Completed { job_id: String, job_type: JobType },
    /// A job failed and was removed.
    Failed {
        job_id: String,
        job_type: JobType,
        message: String,
    },
    /// A job was removed by the user.
    Dismissed { job_id: String },
    /// The registry was replaced with the server's view.
    Reloaded { count: usize },
}

/// A job that ended in failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobFailure {
    pub job_id: String,
    pub job_type: JobType,
    pub message: String,
    pub failed_at: DateTime<Utc>,
}

/// Counts from one polling pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollSummary {
    /// Jobs that reported a non-terminal status
    pub updated: usize,
    pub completed: usize,
    pub failed: usize,
    /// Jobs whose status could not be fetched
    pub errors: usize,
}

/// Tracks generation jobs and polls them until they finish.
///
/// The tracker lives for the whole app, independent of any screen. Call
/// [`init`](Self::init) once to start polling; jobs added later are picked
/// up on the next poll.
pub struct JobTracker {
    api: Arc<dyn WorkoutApi>,
    notifier: Arc<dyn NotificationScheduler>,
    config: JobTrackerConfig,
    jobs: Mutex<Vec<BackgroundJob>>,
    failures: Mutex<Vec<JobFailure>>,
    event_tx: mpsc::UnboundedSender<JobEvent>,
    poller: Mutex<Option<JoinHandle<()>>>,
}

impl JobTracker {
    /// Creates a tracker with an empty registry.
    ///
    /// Returns an error if the configuration is out of range.
    pub fn new(
        api: Arc<dyn WorkoutApi>,
        notifier: Arc<dyn NotificationScheduler>,
        config: JobTrackerConfig,
        event_tx: mpsc::UnboundedSender<JobEvent>,
    ) -> Result<Self, JobError> {
        config.validate().map_err(JobError::InvalidConfig)?;
        Ok(Self {
            api,
            notifier,
            config,
            jobs: Mutex::new(Vec::new()),
            failures: Mutex::new(Vec::new()),
            event_tx,
            poller: Mutex::new(None),
        })
    }

    /// Starts the polling loop. Calling it again while polling does nothing.
    ///
    /// The loop holds a weak reference and ends once the tracker is dropped.
    pub fn init(self: &Arc<Self>) {
        let mut poller = lock(&self.poller);
        if poller.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return;
        }

        let weak = Arc::downgrade(self);
        let period = self.config.poll_interval();
        tracing::debug!(?period, "starting job poller");

        *poller = Some(tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // The first tick completes immediately
            ticker.tick().await;

            loop {
                ticker.tick().await;
                let Some(tracker) = weak.upgrade() else {
                    break;
                };
                if tracker.has_jobs() {
                    tracker.poll_once().await;
                }
            }
        }));
    }

    /// Stops the polling loop. Registered jobs are kept.
    pub fn dispose(&self) {
        if let Some(handle) = lock(&self.poller).take() {
            handle.abort();
            tracing::debug!("job poller stopped");
        }
    }

    /// Returns true while the polling loop is running.
    pub fn is_polling(&self) -> bool {
        lock(&self.poller)
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    pub fn config(&self) -> &JobTrackerConfig {
        &self.config
    }

    // ------------------------------------------------------------------------
    // Registry
    // ------------------------------------------------------------------------

    /// Registers a job in the pending state.
    ///
    /// Registering an id that is already tracked returns the existing job.
    pub fn add_job(&self, job_id: &str, job_type: JobType) -> BackgroundJob {
        let job = {
            let mut jobs = lock(&self.jobs);
            if let Some(existing) = jobs.iter().find(|job| job.id == job_id) {
                return existing.clone();
            }
            let job = BackgroundJob::new(job_id, job_type);
            jobs.push(job.clone());
            job
        };

        tracing::info!(job_id, job_type = job_type.as_str(), "job registered");
        self.emit(JobEvent::Added { job: job.clone() });
        job
    }

    /// Returns true while any generation job is tracked.
    pub fn is_generating(&self) -> bool {
        self.active_generation().is_some()
    }

    /// Returns the oldest tracked generation job.
    pub fn active_generation(&self) -> Option<BackgroundJob> {
        lock(&self.jobs)
            .iter()
            .find(|job| job.job_type.is_generation())
            .cloned()
    }

    pub fn jobs(&self) -> Vec<BackgroundJob> {
        lock(&self.jobs).clone()
    }

    pub fn job(&self, job_id: &str) -> Option<BackgroundJob> {
        lock(&self.jobs).iter().find(|job| job.id == job_id).cloned()
    }

    pub fn has_jobs(&self) -> bool {
        !lock(&self.jobs).is_empty()
    }

    /// Stops tracking a job without waiting for it.
    pub fn dismiss(&self, job_id: &str) -> Option<BackgroundJob> {
        let removed = {
            let mut jobs = lock(&self.jobs);
            let position = jobs.iter().position(|job| job.id == job_id)?;
            jobs.remove(position)
        };
        tracing::info!(job_id, "job dismissed");
        self.emit(JobEvent::Dismissed {
            job_id: job_id.to_string(),
        });
        Some(removed)
    }

    /// Returns and clears the jobs that failed since the last call.
    pub fn take_failures(&self) -> Vec<JobFailure> {
        std::mem::take(&mut *lock(&self.failures))
    }

    // ------------------------------------------------------------------------
    // Polling
    // ------------------------------------------------------------------------

    /// Polls every tracked job once.
    ///
    /// Finished jobs are removed. A completed job schedules a local
    /// notification; a failed job is recorded for [`take_failures`](Self::take_failures).
    /// Jobs whose status cannot be fetched stay tracked for the next pass.
    pub async fn poll_once(&self) -> PollSummary {
        let mut summary = PollSummary::default();
        let ids: Vec<String> = lock(&self.jobs).iter().map(|job| job.id.clone()).collect();

        for job_id in ids {
            let report = match self.api.poll_job_status(&job_id).await {
                Ok(report) => report,
                Err(e) => {
                    tracing::warn!(job_id = %job_id, error = %e, "failed to poll job");
                    summary.errors += 1;
                    continue;
                }
            };

            let Some(finished) = self.apply_report(&job_id, &report) else {
                summary.updated += 1;
                continue;
            };

            match finished.status {
                JobStatus::Failed => {
                    summary.failed += 1;
                    self.record_failure(&finished, report.error);
                }
                _ => {
                    summary.completed += 1;
                    tracing::info!(job_id = %finished.id, "job complete");
                    self.emit(JobEvent::Completed {
                        job_id: finished.id.clone(),
                        job_type: finished.job_type,
                    });
                    self.notify(&finished).await;
                }
            }
        }
        summary
    }

    /// Replaces the registry with the jobs the server still reports as active.
    ///
    /// Jobs the server no longer lists are dropped. Returns the number of
    /// tracked jobs.
    pub async fn reload_jobs(&self) -> Result<usize, JobError> {
        let reports = self.api.list_active_jobs(&self.config.user_id).await?;

        let count = {
            let mut jobs = lock(&self.jobs);
            let previous = std::mem::take(&mut *jobs);

            for report in reports.iter().filter(|r| !r.status.is_terminal()) {
                let known = previous.iter().find(|job| job.id == report.job_id);
                let Some(job_type) = report.job_type.or(known.map(|job| job.job_type)) else {
                    tracing::warn!(job_id = %report.job_id, "skipping job of unknown type");
                    continue;
                };

                let mut job = BackgroundJob::new(report.job_id.clone(), job_type);
                if let Some(created_at) = report.created_at.or(known.map(|job| job.created_at)) {
                    job.created_at = created_at;
                }
                job.apply(report);
                jobs.push(job);
            }
            jobs.len()
        };

        tracing::info!(count, "jobs reloaded");
        self.emit(JobEvent::Reloaded { count });
        Ok(count)
    }

    /// Applies a report to a tracked job. Returns the job if it finished.
    fn apply_report(&self, job_id: &str, report: &JobStatusReport) -> Option<BackgroundJob> {
        let mut jobs = lock(&self.jobs);
        let Some(position) = jobs.iter().position(|job| job.id == job_id) else {
            tracing::debug!(job_id, "job removed while polling");
            return None;
        };

        jobs[position].apply(report);
        if report.status.is_terminal() {
            return Some(jobs.remove(position));
        }

        let job = &jobs[position];
        tracing::debug!(job_id, status = job.status.as_str(), progress = job.progress, "job progress");
        self.emit(JobEvent::Progress {
            job_id: job.id.clone(),
            status: job.status,
            progress: job.progress,
            eta_seconds: job.eta_seconds,
        });
        None
    }

    fn record_failure(&self, job: &BackgroundJob, error: Option<String>) {
        let message = error.unwrap_or_else(|| "generation failed".to_string());
        tracing::warn!(job_id = %job.id, error = %message, "job failed");

        lock(&self.failures).push(JobFailure {
            job_id: job.id.clone(),
            job_type: job.job_type,
            message: message.clone(),
            failed_at: Utc::now(),
        });
        self.emit(JobEvent::Failed {
            job_id: job.id.clone(),
            job_type: job.job_type,
            message,
        });
    }

    async fn notify(&self, job: &BackgroundJob) {
        if !self.config.notify_on_complete {
            return;
        }
        let notification = LocalNotification::job_complete(job);
        if let Err(e) = self.notifier.schedule(&notification).await {
            tracing::warn!(
                job_id = %job.id,
                error = %e,
                suggestion = e.suggestion(),
                "failed to schedule notification"
            );
        }
    }

    fn emit(&self, event: JobEvent) {
        if self.event_tx.send(event).is_err() {
            tracing::trace!("job event receiver dropped");
        }
    }
}

impl Drop for JobTracker {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl std::fmt::Debug for JobTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobTracker")
            .field("config", &self.config)
            .field("jobs", &self.jobs)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Tests
// ============================================================================
