//! In-memory backend.
//!
//! Holds one active plan day, records every persisted completion and serves
//! scripted job status sequences. Failure switches let tests exercise the
//! retry paths of the session and job tracker.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use super::{ApiError, WorkoutApi};
use crate::types::{
    CompletionStatus, JobStartResponse, JobStatus, JobStatusReport, JobType, PlanDay, SetRecord,
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// One call to `persist_exercise_completion` as received by the backend.
#[derive(Debug, Clone, PartialEq)]
pub struct PersistedCompletion {
    /// Block exercise id
    pub exercise_id: String,
    /// Sets sent
    pub sets: Vec<SetRecord>,
    /// Status sent
    pub status: CompletionStatus,
}

/// Backend kept entirely in memory.
#[derive(Debug, Default)]
pub struct InMemoryWorkoutApi {
    plan: Mutex<Option<PlanDay>>,
    persisted: Mutex<Vec<PersistedCompletion>>,
    started_jobs: Mutex<Vec<(JobType, String)>>,
    job_scripts: Mutex<HashMap<String, VecDeque<JobStatusReport>>>,
    active_jobs: Mutex<Vec<JobStatusReport>>,
    next_job_id: AtomicU64,
    fetch_calls: AtomicUsize,
    persist_calls: AtomicUsize,
    generation_calls: AtomicUsize,
    poll_calls: AtomicUsize,
    push_calls: AtomicUsize,
    fail_fetch: AtomicBool,
    fail_persist: AtomicBool,
    fail_generation: AtomicBool,
    reject_generation: AtomicBool,
    fail_push: AtomicBool,
}

impl InMemoryWorkoutApi {
    /// Creates a backend with no active workout.
    #[must_use]
    pub fn new() -> Self {
        Self {
            next_job_id: AtomicU64::new(1),
            ..Self::default()
        }
    }

    /// Creates a backend serving the given plan day.
    #[must_use]
    pub fn with_plan(plan: PlanDay) -> Self {
        let api = Self::new();
        api.set_plan(Some(plan));
        api
    }

    /// Replaces the active plan day.
    pub fn set_plan(&self, plan: Option<PlanDay>) {
        *lock(&self.plan) = plan;
    }

    /// Sets the id handed out by the next generation request.
    pub fn set_next_job_id(&self, id: u64) {
        self.next_job_id.store(id, Ordering::SeqCst);
    }

    /// Queues status reports for a job.
    ///
    /// Each poll consumes one report; the last one is repeated forever.
    pub fn script_job(&self, job_id: &str, reports: Vec<JobStatusReport>) {
        lock(&self.job_scripts).insert(job_id.to_string(), reports.into());
    }

    /// Sets the jobs returned by `list_active_jobs`.
    pub fn set_active_jobs(&self, jobs: Vec<JobStatusReport>) {
        *lock(&self.active_jobs) = jobs;
    }

    pub fn set_fail_fetch(&self, fail: bool) {
        self.fail_fetch.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_persist(&self, fail: bool) {
        self.fail_persist.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_generation(&self, fail: bool) {
        self.fail_generation.store(fail, Ordering::SeqCst);
    }

    pub fn set_reject_generation(&self, reject: bool) {
        self.reject_generation.store(reject, Ordering::SeqCst);
    }

    pub fn set_fail_push(&self, fail: bool) {
        self.fail_push.store(fail, Ordering::SeqCst);
    }

    /// Completions received so far, in arrival order.
    #[must_use]
    pub fn persisted(&self) -> Vec<PersistedCompletion> {
        lock(&self.persisted).clone()
    }

    /// Jobs started so far.
    #[must_use]
    pub fn started_jobs(&self) -> Vec<(JobType, String)> {
        lock(&self.started_jobs).clone()
    }

    #[must_use]
    pub fn fetch_call_count(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn persist_call_count(&self) -> usize {
        self.persist_calls.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn generation_call_count(&self) -> usize {
        self.generation_calls.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn poll_call_count(&self) -> usize {
        self.poll_calls.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn push_call_count(&self) -> usize {
        self.push_calls.load(Ordering::SeqCst)
    }

    fn start_job(&self, job_type: JobType) -> Result<JobStartResponse, ApiError> {
        self.generation_calls.fetch_add(1, Ordering::SeqCst);

        if self.fail_generation.load(Ordering::SeqCst) {
            return Err(ApiError::Network("connection reset".to_string()));
        }
        if self.reject_generation.load(Ordering::SeqCst) {
            return Ok(JobStartResponse::rejected("generation is not available"));
        }

        let job_id = self.next_job_id.fetch_add(1, Ordering::SeqCst).to_string();
        lock(&self.job_scripts)
            .entry(job_id.clone())
            .or_insert_with(|| VecDeque::from([JobStatusReport::new(&job_id, JobStatus::Pending, 0)]));
        lock(&self.started_jobs).push((job_type, job_id.clone()));

        Ok(JobStartResponse::accepted(job_id))
    }
}

#[async_trait]
impl WorkoutApi for InMemoryWorkoutApi {
    async fn fetch_active_workout(&self) -> Result<Option<PlanDay>, ApiError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_fetch.load(Ordering::SeqCst) {
            return Err(ApiError::Network("request timed out".to_string()));
        }
        Ok(lock(&self.plan).clone())
    }

    async fn persist_exercise_completion(
        &self,
        exercise_id: &str,
        sets: &[SetRecord],
        status: CompletionStatus,
    ) -> Result<(), ApiError> {
        self.persist_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_persist.load(Ordering::SeqCst) {
            return Err(ApiError::Server {
                status: 503,
                message: "service unavailable".to_string(),
            });
        }

        lock(&self.persisted).push(PersistedCompletion {
            exercise_id: exercise_id.to_string(),
            sets: sets.to_vec(),
            status,
        });

        // Mirror the server marking the exercise done in the plan
        if status != CompletionStatus::Completed {
            return Ok(());
        }
        if let Some(plan) = lock(&self.plan).as_mut() {
            for exercise in plan.blocks.iter_mut().flat_map(|b| b.exercises.iter_mut()) {
                if exercise.id == exercise_id {
                    exercise.completed = true;
                }
            }
        }
        Ok(())
    }

    async fn generate_workout_plan(&self, _user_id: &str) -> Result<JobStartResponse, ApiError> {
        self.start_job(JobType::Generation)
    }

    async fn regenerate_workout_plan(
        &self,
        _user_id: &str,
        _feedback: &str,
    ) -> Result<JobStartResponse, ApiError> {
        self.start_job(JobType::Regeneration)
    }

    async fn regenerate_daily_workout(
        &self,
        _user_id: &str,
        _plan_day_id: &str,
        _feedback: &str,
    ) -> Result<JobStartResponse, ApiError> {
        self.start_job(JobType::DailyRegeneration)
    }

    async fn poll_job_status(&self, job_id: &str) -> Result<JobStatusReport, ApiError> {
        self.poll_calls.fetch_add(1, Ordering::SeqCst);

        let mut scripts = lock(&self.job_scripts);
        let queue = scripts
            .get_mut(job_id)
            .ok_or_else(|| ApiError::NotFound(format!("job {}", job_id)))?;

        let report = if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        };
        report.ok_or_else(|| ApiError::InvalidResponse(format!("no status for job {}", job_id)))
    }

    async fn list_active_jobs(&self, _user_id: &str) -> Result<Vec<JobStatusReport>, ApiError> {
        Ok(lock(&self.active_jobs).clone())
    }

    async fn register_for_push_notifications(&self) -> Result<bool, ApiError> {
        self.push_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_push.load(Ordering::SeqCst) {
            return Err(ApiError::Network("push registration failed".to_string()));
        }
        Ok(true)
    }
}
