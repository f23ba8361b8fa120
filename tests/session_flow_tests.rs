//! Session Flow Tests for the workout session core.
//!
//! These tests drive a [`WorkoutSession`] against the in-memory backend:
//! - TC-S-001: Full traditional workout with a skipped exercise
//! - TC-S-002: Completing a completed workout is a no-op
//! - TC-S-003: Failed saves stay queued until retried
//! - TC-S-004: Saves that land after a reset are dropped
//! - TC-S-005: AMRAP block clamped to its time cap by the ticker
//! - TC-S-006: Ticker pause and rest countdown
//! - TC-S-007: Load failures, empty days and resumed days
//! - TC-S-008: Regenerating the loaded day
//! - TC-S-009: Configuration is checked when the session is built

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tokio::sync::Notify;

use workout_session::api::{ApiError, InMemoryWorkoutApi, WorkoutApi};
use workout_session::jobs::{JobError, JobLauncher, JobTracker};
use workout_session::notification::MockNotificationScheduler;
use workout_session::session::{
    Advance, LoadOutcome, SessionError, SessionEvent, SessionState, WorkoutSession,
};
use workout_session::types::{
    Block, BlockExercise, BlockMode, CompletionStatus, JobStartResponse, JobStatusReport,
    JobTrackerConfig, JobType, PlanDay, SessionConfig, SetRecord,
};

// ============================================================================
// Test Helpers
// ============================================================================

fn date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 10, 17).unwrap()
}

/// Three 3x10 exercises in one traditional block.
fn three_exercise_day() -> PlanDay {
    PlanDay::new("day-1", date()).with_block(
        Block::new("main", "Main", BlockMode::Traditional, 0)
            .with_exercise(BlockExercise::sets_reps("e1", "Squat", 3, 10))
            .with_exercise(BlockExercise::sets_reps("e2", "Bench Press", 3, 10))
            .with_exercise(BlockExercise::sets_reps("e3", "Row", 3, 10)),
    )
}

/// A single 10-minute AMRAP block with two stations.
fn amrap_day() -> PlanDay {
    PlanDay::new("day-amrap", date()).with_block(
        Block::new("finisher", "Finisher", BlockMode::Amrap, 0)
            .with_time_cap(600)
            .with_exercise(BlockExercise::sets_reps("burpee", "Burpee", 1, 10))
            .with_exercise(BlockExercise::sets_reps("swing", "Kettlebell Swing", 1, 15)),
    )
}

fn create_session(
    api: Arc<dyn WorkoutApi>,
    config: SessionConfig,
) -> (WorkoutSession, UnboundedReceiver<SessionEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (WorkoutSession::new(api, config, tx).unwrap(), rx)
}

fn drain(rx: &mut UnboundedReceiver<SessionEvent>) -> Vec<SessionEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

async fn log_sets(session: &WorkoutSession, count: usize) {
    for _ in 0..count {
        session.with_controller(|c| c.add_set()).await.unwrap();
    }
}

/// Backend whose saves wait until the test opens the gate.
struct GatedApi {
    inner: InMemoryWorkoutApi,
    gate: Notify,
}

impl GatedApi {
    fn new(plan: PlanDay) -> Self {
        Self {
            inner: InMemoryWorkoutApi::with_plan(plan),
            gate: Notify::new(),
        }
    }
}

#[async_trait]
impl WorkoutApi for GatedApi {
    async fn fetch_active_workout(&self) -> Result<Option<PlanDay>, ApiError> {
        self.inner.fetch_active_workout().await
    }

    async fn persist_exercise_completion(
        &self,
        exercise_id: &str,
        sets: &[SetRecord],
        status: CompletionStatus,
    ) -> Result<(), ApiError> {
        self.gate.notified().await;
        self.inner
            .persist_exercise_completion(exercise_id, sets, status)
            .await
    }

    async fn generate_workout_plan(&self, user_id: &str) -> Result<JobStartResponse, ApiError> {
        self.inner.generate_workout_plan(user_id).await
    }

    async fn regenerate_workout_plan(
        &self,
        user_id: &str,
        feedback: &str,
    ) -> Result<JobStartResponse, ApiError> {
        self.inner.regenerate_workout_plan(user_id, feedback).await
    }

    async fn regenerate_daily_workout(
        &self,
        user_id: &str,
        plan_day_id: &str,
        feedback: &str,
    ) -> Result<JobStartResponse, ApiError> {
        self.inner
            .regenerate_daily_workout(user_id, plan_day_id, feedback)
            .await
    }

    async fn poll_job_status(&self, job_id: &str) -> Result<JobStatusReport, ApiError> {
        self.inner.poll_job_status(job_id).await
    }

    async fn list_active_jobs(&self, user_id: &str) -> Result<Vec<JobStatusReport>, ApiError> {
        self.inner.list_active_jobs(user_id).await
    }

    async fn register_for_push_notifications(&self) -> Result<bool, ApiError> {
        self.inner.register_for_push_notifications().await
    }
}

// ============================================================================
// TC-S-001: Full traditional workout
// ============================================================================

/// Complete e1 with three sets, skip e2, complete e3 with two sets.
///
/// The backend receives three writes in order, the skipped exercise is
/// counted and the session ends in `Completed`.
#[tokio::test]
async fn test_full_workout_with_skip() {
    let api = Arc::new(InMemoryWorkoutApi::with_plan(three_exercise_day()));
    let (session, mut rx) = create_session(api.clone(), SessionConfig::default());

    assert_eq!(session.load().await.unwrap(), LoadOutcome::Ready);
    session.start().await.unwrap();
    assert!(session.is_ticking());

    log_sets(&session, 3).await;
    let advance = session.complete_current_exercise().await.unwrap();
    assert!(matches!(
        advance,
        Advance::Moved {
            block_index: 0,
            exercise_index: 1
        }
    ));

    session.skip_current_exercise().await.unwrap();

    log_sets(&session, 2).await;
    let advance = session.complete_current_exercise().await.unwrap();
    assert_eq!(advance, Advance::Finished);

    let persisted = api.persisted();
    assert_eq!(persisted.len(), 3);
    assert_eq!(persisted[0].exercise_id, "e1");
    assert_eq!(persisted[0].status, CompletionStatus::Completed);
    assert_eq!(persisted[0].sets.len(), 3);
    assert!(persisted[0].sets.iter().all(|s| s.reps == Some(10)));
    assert_eq!(persisted[1].exercise_id, "e2");
    assert_eq!(persisted[1].status, CompletionStatus::Skipped);
    assert!(persisted[1].sets.is_empty());
    assert_eq!(persisted[2].exercise_id, "e3");
    assert_eq!(persisted[2].sets.len(), 2);

    let snapshot = session.snapshot().await;
    assert_eq!(snapshot.state, "completed");
    assert_eq!(snapshot.skipped_exercises, 1);
    assert_eq!(snapshot.percent_complete, 100);
    assert_eq!(snapshot.pending_sync, 0);

    let completions = drain(&mut rx)
        .into_iter()
        .filter(|e| e.name() == "workout_completed")
        .count();
    assert_eq!(completions, 1);
}

/// Set numbers stay contiguous after a set is removed.
#[tokio::test]
async fn test_removed_set_is_not_sent() {
    let api = Arc::new(InMemoryWorkoutApi::with_plan(three_exercise_day()));
    let (session, _rx) = create_session(api.clone(), SessionConfig::default());
    session.load().await.unwrap();

    log_sets(&session, 3).await;
    session.with_controller(|c| c.remove_set(1)).await.unwrap();
    session.complete_current_exercise().await.unwrap();

    let persisted = api.persisted();
    let numbers: Vec<u32> = persisted[0].sets.iter().map(|s| s.set_number).collect();
    assert_eq!(numbers, vec![1, 2]);
}

// ============================================================================
// TC-S-002: Idempotent completion
// ============================================================================

/// Once the workout is completed, further completes and skips change nothing.
#[tokio::test]
async fn test_complete_after_completed_is_noop() {
    let plan = PlanDay::new("day-1", date()).with_block(
        Block::new("main", "Main", BlockMode::Traditional, 0)
            .with_exercise(BlockExercise::sets_reps("e1", "Squat", 1, 5)),
    );
    let api = Arc::new(InMemoryWorkoutApi::with_plan(plan));
    let (session, mut rx) = create_session(api.clone(), SessionConfig::default());
    session.load().await.unwrap();

    log_sets(&session, 1).await;
    assert_eq!(session.complete_current_exercise().await.unwrap(), Advance::Finished);
    let calls = api.persist_call_count();
    drain(&mut rx);

    assert_eq!(session.complete_current_exercise().await.unwrap(), Advance::Unchanged);
    assert_eq!(session.skip_current_exercise().await.unwrap(), Advance::Unchanged);
    assert!(session.complete_circuit_block().await.unwrap().is_none());

    assert_eq!(api.persist_call_count(), calls);
    assert!(drain(&mut rx).is_empty());
}

// ============================================================================
// TC-S-003: Failed saves
// ============================================================================

/// A failed save is reported but the session has already moved on.
/// The record is sent again by `retry_sync` once the backend recovers.
#[tokio::test]
async fn test_failed_save_is_retried() {
    let api = Arc::new(InMemoryWorkoutApi::with_plan(three_exercise_day()));
    api.set_fail_persist(true);
    let (session, mut rx) = create_session(api.clone(), SessionConfig::default());
    session.load().await.unwrap();

    log_sets(&session, 3).await;
    let err = session.complete_current_exercise().await.unwrap_err();
    assert!(err.is_sync_error());
    assert!(err.is_retryable());

    let snapshot = session.snapshot().await;
    assert_eq!(snapshot.exercise_index, Some(1));
    assert_eq!(snapshot.pending_sync, 1);
    assert!(drain(&mut rx)
        .iter()
        .any(|e| matches!(e, SessionEvent::SyncFailed { exercise_id, .. } if exercise_id == "e1")));

    // Still failing: nothing is lost
    assert!(session.retry_sync().await.is_err());
    assert_eq!(session.snapshot().await.pending_sync, 1);

    api.set_fail_persist(false);
    assert_eq!(session.retry_sync().await.unwrap(), 1);
    assert_eq!(session.snapshot().await.pending_sync, 0);
    assert_eq!(session.retry_sync().await.unwrap(), 0);

    let persisted = api.persisted();
    assert_eq!(persisted.len(), 1);
    assert_eq!(persisted[0].sets.len(), 3);
}

/// Reloading keeps completions that were not saved yet.
#[tokio::test]
async fn test_reload_keeps_pending_saves() {
    let api = Arc::new(InMemoryWorkoutApi::with_plan(three_exercise_day()));
    api.set_fail_persist(true);
    let (session, _rx) = create_session(api.clone(), SessionConfig::default());
    session.load().await.unwrap();

    session.skip_current_exercise().await.unwrap_err();
    session.load().await.unwrap();
    assert_eq!(session.snapshot().await.pending_sync, 1);

    api.set_fail_persist(false);
    assert_eq!(session.retry_sync().await.unwrap(), 1);
    assert_eq!(api.persisted()[0].status, CompletionStatus::Skipped);
}

// ============================================================================
// TC-S-004: Late results after reset
// ============================================================================

/// A save that finishes after the session was reset does not touch the new
/// session. The completion stays queued and can still be sent.
#[tokio::test]
async fn test_late_save_after_reset_is_dropped() {
    let api = Arc::new(GatedApi::new(three_exercise_day()));
    api.inner.set_fail_persist(true);
    let (session, mut rx) = create_session(api.clone(), SessionConfig::default());
    let session = Arc::new(session);
    session.load().await.unwrap();
    log_sets(&session, 1).await;

    let in_flight = {
        let session = Arc::clone(&session);
        tokio::spawn(async move { session.complete_current_exercise().await })
    };
    tokio::task::yield_now().await;

    session.reset().await;
    drain(&mut rx);
    api.gate.notify_one();

    // The failure belongs to the old session, so it is not reported
    let advance = in_flight.await.unwrap().unwrap();
    assert!(matches!(advance, Advance::Moved { .. }));

    let snapshot = session.snapshot().await;
    assert_eq!(snapshot.state, "idle");
    assert_eq!(snapshot.pending_sync, 1);
    assert!(drain(&mut rx).is_empty());

    api.inner.set_fail_persist(false);
    api.gate.notify_one();
    assert_eq!(session.retry_sync().await.unwrap(), 1);
    assert_eq!(session.snapshot().await.pending_sync, 0);
    let persisted = api.inner.persisted();
    assert_eq!(persisted.len(), 1);
    assert_eq!(persisted[0].exercise_id, "e1");
}

/// Completions that could not be saved outlive a reset and are not offered again.
#[tokio::test]
async fn test_unsaved_completion_survives_reset() {
    let api = Arc::new(InMemoryWorkoutApi::with_plan(three_exercise_day()));
    api.set_fail_persist(true);
    let (session, _rx) = create_session(api.clone(), SessionConfig::default());
    session.load().await.unwrap();
    log_sets(&session, 3).await;
    session.complete_current_exercise().await.unwrap();

    session.reset().await;
    assert_eq!(session.snapshot().await.pending_sync, 1);

    // The backend never saw e1, so only the local queue knows it is done
    session.load().await.unwrap();
    let exercise_id = session
        .with_controller(|c| c.current_exercise().map(|e| e.id.clone()))
        .await;
    assert_eq!(exercise_id.as_deref(), Some("e2"));

    api.set_fail_persist(false);
    assert_eq!(session.retry_sync().await.unwrap(), 1);
    let persisted = api.persisted();
    assert_eq!(persisted.len(), 1);
    assert_eq!(persisted[0].exercise_id, "e1");
    assert_eq!(persisted[0].sets.len(), 3);
}

/// A load that resolves after a reset leaves the session idle.
#[tokio::test]
async fn test_reset_clears_session() {
    let api = Arc::new(InMemoryWorkoutApi::with_plan(three_exercise_day()));
    let (session, _rx) = create_session(api.clone(), SessionConfig::default());
    session.load().await.unwrap();
    session.start().await.unwrap();

    session.reset().await;
    assert!(!session.is_ticking());
    assert_eq!(session.with_controller(|c| c.state().clone()).await, SessionState::Idle);
    assert!(session.with_controller(|c| c.plan_day().is_none()).await);

    // A fresh load starts over
    assert_eq!(session.load().await.unwrap(), LoadOutcome::Ready);
}

// ============================================================================
// TC-S-005: AMRAP time cap
// ============================================================================

/// Running past the 600 s cap clamps the recorded time and flags the cap.
#[tokio::test(start_paused = true)]
async fn test_amrap_clamped_to_time_cap() {
    let api = Arc::new(InMemoryWorkoutApi::with_plan(amrap_day()));
    let (session, mut rx) = create_session(api.clone(), SessionConfig::default());
    session.load().await.unwrap();
    session.start().await.unwrap();

    let cap = session
        .with_controller(|c| c.start_exercise_timer())
        .await
        .unwrap();
    assert_eq!(cap, 600);
    session
        .with_controller(|c| {
            c.log_circuit_entry(0, Some(10), None)?;
            c.log_circuit_entry(1, Some(15), Some(16.0))
        })
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_secs(700)).await;

    let completion = session.complete_circuit_block().await.unwrap().unwrap();
    assert_eq!(completion.elapsed_seconds, 600);
    assert!(completion.time_cap_reached);
    assert_eq!(completion.rounds_completed, 1);
    assert_eq!(completion.exercises.len(), 2);

    let persisted = api.persisted();
    assert_eq!(persisted.len(), 2);
    assert!(persisted.iter().all(|p| p.status == CompletionStatus::Completed));

    let caps = drain(&mut rx)
        .into_iter()
        .filter(|e| matches!(e, SessionEvent::TimeCapReached { .. }))
        .count();
    assert_eq!(caps, 1);

    // The ticker exits once the workout is over
    tokio::time::sleep(Duration::from_secs(2)).await;
    assert!(!session.is_ticking());
}

/// Per-exercise actions are rejected inside a circuit block.
#[tokio::test]
async fn test_circuit_rejects_exercise_actions() {
    let api = Arc::new(InMemoryWorkoutApi::with_plan(amrap_day()));
    let (session, _rx) = create_session(api.clone(), SessionConfig::default());
    session.load().await.unwrap();

    assert!(session.complete_current_exercise().await.is_err());
    assert!(session.skip_current_exercise().await.is_err());
    assert_eq!(api.persist_call_count(), 0);
}

// ============================================================================
// TC-S-006: Ticker
// ============================================================================

/// The workout clock does not move while paused.
#[tokio::test(start_paused = true)]
async fn test_pause_stops_workout_clock() {
    let api = Arc::new(InMemoryWorkoutApi::with_plan(three_exercise_day()));
    let (session, _rx) = create_session(api, SessionConfig::default());
    session.load().await.unwrap();
    session.start().await.unwrap();

    tokio::time::sleep(Duration::from_millis(10_500)).await;
    assert!(session.toggle_pause().await.unwrap());
    let paused_at = session.snapshot().await.timers.workout_elapsed_seconds;
    assert!(paused_at >= 10);

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(session.snapshot().await.timers.workout_elapsed_seconds, paused_at);

    assert!(!session.toggle_pause().await.unwrap());
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert!(session.snapshot().await.timers.workout_elapsed_seconds > paused_at);
}

/// Logging a set starts the exercise's rest, which signals when it runs out.
#[tokio::test(start_paused = true)]
async fn test_rest_countdown_after_set() {
    let plan = PlanDay::new("day-1", date()).with_block(
        Block::new("main", "Main", BlockMode::Traditional, 0)
            .with_exercise(BlockExercise::sets_reps("e1", "Squat", 3, 10).with_rest(30)),
    );
    let api = Arc::new(InMemoryWorkoutApi::with_plan(plan));
    let (session, mut rx) = create_session(api, SessionConfig::default());
    session.load().await.unwrap();
    session.start().await.unwrap();

    log_sets(&session, 1).await;
    assert!(session.snapshot().await.timers.rest_remaining_seconds > 0);

    tokio::time::sleep(Duration::from_secs(32)).await;
    let rests = drain(&mut rx)
        .into_iter()
        .filter(|e| e.name() == "rest_complete")
        .count();
    assert_eq!(rests, 1);
    assert_eq!(session.snapshot().await.timers.rest_remaining_seconds, 0);
}

// ============================================================================
// TC-S-007: Loading
// ============================================================================

/// A failed load can be retried.
#[tokio::test]
async fn test_load_failure_then_retry() {
    let api = Arc::new(InMemoryWorkoutApi::with_plan(three_exercise_day()));
    api.set_fail_fetch(true);
    let (session, _rx) = create_session(api.clone(), SessionConfig::default());

    let err = session.load().await.unwrap_err();
    assert!(err.is_retryable());
    assert_eq!(session.snapshot().await.state, "load_failed");

    api.set_fail_fetch(false);
    assert_eq!(session.load().await.unwrap(), LoadOutcome::Ready);
    assert_eq!(api.fetch_call_count(), 2);
}

/// No plan for today is not an error.
#[tokio::test]
async fn test_no_active_workout() {
    let api = Arc::new(InMemoryWorkoutApi::new());
    let (session, _rx) = create_session(api, SessionConfig::default());

    assert_eq!(session.load().await.unwrap(), LoadOutcome::NoActiveWorkout);
    assert!(session.start().await.is_err());
}

/// Exercises completed in an earlier session are not offered again.
#[tokio::test]
async fn test_load_resumes_at_first_open_exercise() {
    let api = Arc::new(InMemoryWorkoutApi::with_plan(three_exercise_day()));
    let (session, _rx) = create_session(api.clone(), SessionConfig::default());
    session.load().await.unwrap();
    log_sets(&session, 3).await;
    session.complete_current_exercise().await.unwrap();

    // The backend marked e1 as done
    let (resumed, _rx) = create_session(api, SessionConfig::default());
    assert_eq!(resumed.load().await.unwrap(), LoadOutcome::Ready);
    let exercise_id = resumed
        .with_controller(|c| c.current_exercise().map(|e| e.id.clone()))
        .await;
    assert_eq!(exercise_id.as_deref(), Some("e2"));
}

/// A skipped exercise is saved as skipped and offered again on the next load.
#[tokio::test]
async fn test_skip_is_not_resumed_as_completed() {
    let api = Arc::new(InMemoryWorkoutApi::with_plan(three_exercise_day()));
    let (session, _rx) = create_session(api.clone(), SessionConfig::default());
    session.load().await.unwrap();
    log_sets(&session, 3).await;
    session.complete_current_exercise().await.unwrap();
    session.skip_current_exercise().await.unwrap();

    let (resumed, _rx) = create_session(api, SessionConfig::default());
    resumed.load().await.unwrap();
    let snapshot = resumed.snapshot().await;
    assert_eq!(snapshot.completed_exercises, 1);
    assert_eq!(snapshot.skipped_exercises, 0);
    let exercise_id = resumed
        .with_controller(|c| c.current_exercise().map(|e| e.id.clone()))
        .await;
    assert_eq!(exercise_id.as_deref(), Some("e2"));
}

// ============================================================================
// TC-S-008: Regenerating the day
// ============================================================================

/// The loaded day can be regenerated once; a second request is refused locally.
#[tokio::test]
async fn test_regenerate_loaded_day() {
    let api = Arc::new(InMemoryWorkoutApi::with_plan(three_exercise_day()));
    let (session, _rx) = create_session(api.clone(), SessionConfig::default());
    let (job_tx, _job_rx) = mpsc::unbounded_channel();
    let tracker = Arc::new(JobTracker::new(
        api.clone(),
        Arc::new(MockNotificationScheduler::new()),
        JobTrackerConfig::new("user-1"),
        job_tx,
    )
    .unwrap());
    let launcher = JobLauncher::new(api.clone(), Arc::clone(&tracker));

    let err = session.regenerate_day(&launcher, "too easy").await.unwrap_err();
    assert_eq!(err, JobError::NoActivePlanDay);

    session.load().await.unwrap();
    let job_id = session.regenerate_day(&launcher, "too easy").await.unwrap();
    assert_eq!(api.started_jobs(), vec![(JobType::DailyRegeneration, job_id.clone())]);
    assert!(tracker.is_generating());

    let err = session.regenerate_day(&launcher, "again").await.unwrap_err();
    assert!(err.is_in_progress());
    assert_eq!(api.generation_call_count(), 1);
}

// ============================================================================
// TC-S-009: Configuration
// ============================================================================

/// Out-of-range settings are refused before any timer runs.
#[test]
fn test_invalid_config_is_rejected() {
    let api: Arc<dyn WorkoutApi> = Arc::new(InMemoryWorkoutApi::new());
    let (tx, _rx) = mpsc::unbounded_channel();

    let result = WorkoutSession::new(
        Arc::clone(&api),
        SessionConfig::default().with_tick_interval_ms(0),
        tx.clone(),
    );
    assert!(matches!(result, Err(SessionError::InvalidConfig(_))));

    let result = WorkoutSession::new(
        api,
        SessionConfig::default().with_default_rest_seconds(901),
        tx,
    );
    assert!(matches!(result, Err(SessionError::InvalidConfig(_))));
}
