//! Session state machine.
//!
//! [`SessionController`] is the synchronous core of a workout session. It
//! owns the plan day, the per-exercise set trackers, the active circuit
//! engine and the timer service. Every transition goes through it, so the
//! rules about where the session may go live in one place.
//!
//! The controller never talks to the network. Transitions that need a
//! remote write return a [`PersistBatch`] tagged with the session epoch;
//! the caller sends it and reports back with [`SessionController::record_sync`].
//! Results carrying an old epoch are dropped.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::mpsc;

use super::{SessionError, SessionEvent};
use crate::api::ApiError;
use crate::circuit::{CircuitCompletion, CircuitEngine};
use crate::timer::{TickOutcome, TimerService, TimerSnapshot};
use crate::tracker::{SetField, SetTracker};
use crate::types::{
    Block, BlockExercise, BlockMode, CompletionStatus, ExerciseCompletion, LoggingType, PlanDay,
    SessionConfig, SetRecord,
};

// ============================================================================
// States and outcomes
// ============================================================================

/// Where the session is.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionState {
    /// Nothing loaded yet
    #[default]
    Idle,
    /// Waiting for the active workout
    Loading,
    /// Positioned on an exercise (or on the first exercise of a circuit block)
    Ready {
        block_index: usize,
        exercise_index: usize,
    },
    /// The backend has no workout for today
    NoActiveWorkout,
    /// Loading failed; `load` may be retried
    LoadFailed { message: String },
    /// Every exercise has been completed or skipped
    Completed,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::Loading => "loading",
            SessionState::Ready { .. } => "ready",
            SessionState::NoActiveWorkout => "no_active_workout",
            SessionState::LoadFailed { .. } => "load_failed",
            SessionState::Completed => "completed",
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, SessionState::Ready { .. })
    }

    /// Returns `(block_index, exercise_index)` when ready.
    pub fn position(&self) -> Option<(usize, usize)> {
        match self {
            SessionState::Ready {
                block_index,
                exercise_index,
            } => Some((*block_index, *exercise_index)),
            _ => None,
        }
    }
}

/// Result of applying a load response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// Positioned on the first exercise still to do
    Ready,
    /// Every exercise of the day was already completed
    AlreadyCompleted,
    /// The backend has no workout for today
    NoActiveWorkout,
    /// The response belonged to an earlier load and was ignored
    Stale,
}

/// Where a transition moved the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    Moved {
        block_index: usize,
        exercise_index: usize,
    },
    Finished,
    /// The session was already completed
    Unchanged,
}

/// Completion records that must be written to the backend.
#[derive(Debug, Clone, PartialEq)]
pub struct PersistBatch {
    /// Session epoch the records belong to
    pub epoch: u64,
    pub records: Vec<ExerciseCompletion>,
}

/// Result of a complete or skip transition.
#[derive(Debug, Clone, PartialEq)]
pub struct StepOutcome {
    pub advance: Advance,
    pub persist: Option<PersistBatch>,
    /// Set when a circuit block was completed
    pub circuit: Option<CircuitCompletion>,
}

impl StepOutcome {
    fn unchanged() -> Self {
        Self {
            advance: Advance::Unchanged,
            persist: None,
            circuit: None,
        }
    }
}

/// Everything the screen needs to render the session.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub state: &'static str,
    pub plan_day_id: Option<String>,
    pub block_index: Option<usize>,
    pub exercise_index: Option<usize>,
    pub block_name: Option<String>,
    pub block_mode: Option<BlockMode>,
    pub exercise_name: Option<String>,
    pub logging_type: Option<LoggingType>,
    pub current_sets: Vec<SetRecord>,
    pub circuit_round: Option<u32>,
    pub started: bool,
    pub paused: bool,
    pub timers: TimerSnapshot,
    pub total_exercises: usize,
    pub completed_exercises: usize,
    pub skipped_exercises: usize,
    pub percent_complete: u8,
    pub pending_sync: usize,
    pub error: Option<String>,
}

// ============================================================================
// SessionController
// ============================================================================

/// Synchronous state machine for one workout session.
#[derive(Debug)]
pub struct SessionController {
    config: SessionConfig,
    state: SessionState,
    /// Bumped on reset; persist results from older epochs are dropped
    epoch: u64,
    /// Bumped on every load and reset; load results must match it
    load_token: u64,
    plan: Option<PlanDay>,
    /// One tracker per exercise; empty for circuit blocks
    trackers: Vec<Vec<SetTracker>>,
    circuit: Option<CircuitEngine>,
    timers: TimerService,
    started: bool,
    started_at: Option<DateTime<Utc>>,
    completed_ids: BTreeSet<String>,
    skipped_ids: BTreeSet<String>,
    pending_sync: Vec<ExerciseCompletion>,
    event_tx: mpsc::UnboundedSender<SessionEvent>,
}

impl SessionController {
    /// Creates an idle controller.
    pub fn new(config: SessionConfig, event_tx: mpsc::UnboundedSender<SessionEvent>) -> Self {
        Self {
            config,
            state: SessionState::Idle,
            epoch: 0,
            load_token: 0,
            plan: None,
            trackers: Vec::new(),
            circuit: None,
            timers: TimerService::new(),
            started: false,
            started_at: None,
            completed_ids: BTreeSet::new(),
            skipped_ids: BTreeSet::new(),
            pending_sync: Vec::new(),
            event_tx,
        }
    }

    // ------------------------------------------------------------------------
    // Loading
    // ------------------------------------------------------------------------

    /// Enters `Loading` and returns the token the response must carry.
    ///
    /// Local progress of the previous load is discarded. Completions still
    /// waiting to be saved are kept.
    pub fn begin_load(&mut self) -> u64 {
        self.load_token += 1;
        self.clear_workout();
        self.state = SessionState::Loading;
        tracing::debug!(token = self.load_token, "loading active workout");
        self.load_token
    }

    /// Applies the response of a fetch started with [`begin_load`](Self::begin_load).
    pub fn apply_load(
        &mut self,
        token: u64,
        result: Result<Option<PlanDay>, ApiError>,
    ) -> Result<LoadOutcome, SessionError> {
        if token != self.load_token || self.state != SessionState::Loading {
            tracing::debug!(token, current = self.load_token, "dropping stale load result");
            return Ok(LoadOutcome::Stale);
        }

        match result {
            Ok(Some(plan)) => Ok(self.initialize(plan)),
            Ok(None) => {
                tracing::info!("no active workout for today");
                self.state = SessionState::NoActiveWorkout;
                self.emit(SessionEvent::NoActiveWorkout);
                Ok(LoadOutcome::NoActiveWorkout)
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to load workout");
                let message = e.to_string();
                self.state = SessionState::LoadFailed {
                    message: message.clone(),
                };
                self.emit(SessionEvent::LoadFailed { message });
                Err(SessionError::LoadFailed(e))
            }
        }
    }

    fn initialize(&mut self, plan: PlanDay) -> LoadOutcome {
        let plan = plan.into_execution_order();

        self.trackers = plan
            .blocks
            .iter()
            .map(|block| {
                if block.is_circuit() {
                    Vec::new()
                } else {
                    block.exercises.iter().map(SetTracker::new).collect()
                }
            })
            .collect();
        self.completed_ids = plan
            .blocks
            .iter()
            .flat_map(|block| block.exercises.iter())
            .filter(|exercise| exercise.completed)
            .map(|exercise| exercise.id.clone())
            .collect();
        // Completions that were never saved still count as done
        for record in &self.pending_sync {
            match record.status {
                CompletionStatus::Completed => {
                    self.completed_ids.insert(record.exercise_id.clone());
                }
                CompletionStatus::Skipped => {
                    self.skipped_ids.insert(record.exercise_id.clone());
                }
            }
        }

        tracing::info!(
            plan_day_id = %plan.id,
            blocks = plan.blocks.len(),
            already_completed = self.completed_ids.len(),
            "workout loaded"
        );
        let event = SessionEvent::Loaded {
            plan_day_id: plan.id.clone(),
            block_count: plan.blocks.len(),
            exercise_count: plan.exercise_count(),
        };
        self.plan = Some(plan);
        self.emit(event);

        match self.find_open(0, 0) {
            Some((block_index, exercise_index)) => {
                self.enter(block_index, exercise_index);
                LoadOutcome::Ready
            }
            None => {
                self.state = SessionState::Completed;
                LoadOutcome::AlreadyCompleted
            }
        }
    }

    // ------------------------------------------------------------------------
    // Workout timer
    // ------------------------------------------------------------------------

    /// Starts the workout. Returns false if it was already started.
    pub fn start(&mut self) -> Result<bool, SessionError> {
        self.current_position()?;
        if self.started {
            return Ok(false);
        }

        self.started = true;
        self.started_at = Some(Utc::now());
        self.timers.start_workout();
        tracing::info!("workout started");
        self.emit(SessionEvent::Started);
        Ok(true)
    }

    /// Pauses or resumes the workout timer. Returns the new paused state.
    pub fn toggle_pause(&mut self) -> Result<bool, SessionError> {
        if !self.started || !self.timers.is_workout_running() {
            return Err(SessionError::NotStarted);
        }
        let paused = self.timers.toggle_pause();
        self.emit(if paused {
            SessionEvent::Paused
        } else {
            SessionEvent::Resumed
        });
        Ok(paused)
    }

    /// Advances the timers by one second and raises their signals.
    pub fn tick(&mut self) -> TickOutcome {
        let Some((block_index, exercise_index)) = self.state.position() else {
            return TickOutcome::default();
        };
        if !self.started {
            return TickOutcome::default();
        }

        let outcome = self.timers.tick();
        self.emit(SessionEvent::Tick {
            timers: self.timers.snapshot(),
        });

        if outcome.rest_completed {
            tracing::debug!(block_index, exercise_index, "rest complete");
            self.emit(SessionEvent::RestComplete {
                block_index,
                exercise_index,
            });
        }
        if outcome.exercise_finished {
            match self.circuit.as_mut() {
                Some(engine) => {
                    engine.mark_time_cap_reached();
                    tracing::info!(block_id = %engine.block_id(), "time cap reached");
                    let block_id = engine.block_id().to_string();
                    self.emit(SessionEvent::TimeCapReached { block_id });
                }
                None => self.emit(SessionEvent::ExerciseTimerFinished {
                    block_index,
                    exercise_index,
                }),
            }
        }
        outcome
    }

    // ------------------------------------------------------------------------
    // Transitions
    // ------------------------------------------------------------------------

    /// Completes the current exercise with whatever sets were logged.
    ///
    /// Reaching the target set count is not required. Completing an already
    /// completed session changes nothing.
    pub fn complete_current_exercise(&mut self) -> Result<StepOutcome, SessionError> {
        if self.state == SessionState::Completed {
            tracing::debug!("complete ignored, workout already completed");
            return Ok(StepOutcome::unchanged());
        }
        let (block_index, exercise_index) = self.current_position()?;
        let block_id = self.check_not_circuit(block_index)?;
        let tracker = self.tracker_at(block_index, exercise_index)?;

        let record = ExerciseCompletion {
            exercise_id: tracker.exercise_id().to_string(),
            block_id,
            status: CompletionStatus::Completed,
            sets: tracker.sets().to_vec(),
        };
        let target_met = tracker.is_complete();
        if !target_met {
            tracing::debug!(
                exercise_id = %record.exercise_id,
                logged = tracker.completed_set_count(),
                required = tracker.required_sets(),
                "completing below target"
            );
        }

        tracing::info!(exercise_id = %record.exercise_id, sets = record.sets.len(), "exercise completed");
        self.completed_ids.insert(record.exercise_id.clone());
        self.emit(SessionEvent::ExerciseCompleted {
            exercise_id: record.exercise_id.clone(),
            sets_logged: record.sets.len(),
            target_met,
        });

        let persist = self.queue(vec![record]);
        let advance = self.advance();
        Ok(StepOutcome {
            advance,
            persist,
            circuit: None,
        })
    }

    /// Skips the current exercise. Logged sets are not sent.
    pub fn skip_current_exercise(&mut self) -> Result<StepOutcome, SessionError> {
        if self.state == SessionState::Completed {
            tracing::debug!("skip ignored, workout already completed");
            return Ok(StepOutcome::unchanged());
        }
        let (block_index, exercise_index) = self.current_position()?;
        let block_id = self.check_not_circuit(block_index)?;
        let exercise_id = self
            .tracker_at(block_index, exercise_index)?
            .exercise_id()
            .to_string();

        tracing::info!(exercise_id = %exercise_id, "exercise skipped");
        self.skipped_ids.insert(exercise_id.clone());
        self.emit(SessionEvent::ExerciseSkipped {
            exercise_id: exercise_id.clone(),
        });

        let persist = self.queue(vec![ExerciseCompletion {
            exercise_id,
            block_id,
            status: CompletionStatus::Skipped,
            sets: Vec::new(),
        }]);
        let advance = self.advance();
        Ok(StepOutcome {
            advance,
            persist,
            circuit: None,
        })
    }

    /// Completes the current circuit block as one unit and moves to the next block.
    pub fn complete_circuit_block(&mut self) -> Result<StepOutcome, SessionError> {
        if self.state == SessionState::Completed {
            tracing::debug!("circuit completion ignored, workout already completed");
            return Ok(StepOutcome::unchanged());
        }
        let (block_index, _) = self.current_position()?;
        let block = self.block(block_index).ok_or(SessionError::NotReady("ready"))?;
        if !block.is_circuit() {
            return Err(SessionError::NotCircuitBlock(block.name.clone()));
        }
        let elapsed = self.timers.workout_elapsed_seconds();
        let fallback = self
            .circuit
            .is_none()
            .then(|| CircuitEngine::new(block, elapsed));

        let completion = match self.circuit.take().or(fallback) {
            Some(engine) => engine.finish(elapsed),
            None => return Err(SessionError::NotReady("ready")),
        };

        for record in &completion.exercises {
            self.completed_ids.insert(record.exercise_id.clone());
        }
        self.emit(SessionEvent::CircuitBlockCompleted {
            completion: completion.clone(),
        });

        let persist = self.queue(completion.exercises.clone());
        let advance = self.advance();
        Ok(StepOutcome {
            advance,
            persist,
            circuit: Some(completion),
        })
    }

    // ------------------------------------------------------------------------
    // Set edits
    // ------------------------------------------------------------------------

    /// Logs a new set for the current exercise and starts the rest countdown.
    pub fn add_set(&mut self) -> Result<usize, SessionError> {
        let index = self.current_tracker_mut()?.add_set();
        self.start_rest_after_set();
        Ok(index)
    }

    /// Edits weight or reps of a logged set.
    pub fn update_set(&mut self, index: usize, field: SetField) -> Result<(), SessionError> {
        self.current_tracker_mut()?.update_set(index, field)?;
        Ok(())
    }

    /// Removes a logged set.
    pub fn remove_set(&mut self, index: usize) -> Result<SetRecord, SessionError> {
        Ok(self.current_tracker_mut()?.remove_set(index)?)
    }

    /// Restores a set to the exercise targets.
    pub fn reset_set_to_target(&mut self, index: usize) -> Result<(), SessionError> {
        self.current_tracker_mut()?.reset_set_to_target(index)?;
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Exercise timer
    // ------------------------------------------------------------------------

    /// Starts the countdown for the current timed exercise, or the time cap
    /// of the current circuit block. Returns the countdown length.
    pub fn start_exercise_timer(&mut self) -> Result<u32, SessionError> {
        let (block_index, exercise_index) = self.current_position()?;
        if !self.started {
            return Err(SessionError::NotStarted);
        }
        let block = self.block(block_index).ok_or(SessionError::NotReady("ready"))?;

        let seconds = if block.is_circuit() {
            let cap = block
                .time_cap_seconds
                .ok_or_else(|| SessionError::NoTargetDuration(block.name.clone()))?;
            let now = self.timers.workout_elapsed_seconds();
            if let Some(engine) = self.circuit.as_mut() {
                engine.reopen(now);
            }
            cap
        } else {
            let exercise = block
                .exercises
                .get(exercise_index)
                .ok_or(SessionError::NotReady("ready"))?;
            exercise
                .target_duration_seconds
                .ok_or_else(|| SessionError::NoTargetDuration(exercise.name().to_string()))?
        };

        self.timers.start_exercise(seconds);
        tracing::debug!(seconds, "exercise timer started");
        Ok(seconds)
    }

    /// Ends the running countdown and logs a completed set with the time it ran.
    pub fn complete_timed_set(&mut self) -> Result<usize, SessionError> {
        let elapsed = self.timers.exercise_elapsed_seconds();
        let started = self.started;
        let tracker = self.current_tracker_mut()?;
        let target = tracker
            .target_duration_seconds()
            .ok_or_else(|| SessionError::NoTargetDuration(tracker.exercise_id().to_string()))?;
        if !started {
            return Err(SessionError::NotStarted);
        }
        if elapsed == 0 {
            return Err(SessionError::TimerNotRun(tracker.exercise_id().to_string()));
        }

        let index = tracker.add_set();
        tracker.record_duration(index, elapsed)?;

        self.timers.arm_exercise(target);
        self.start_rest_after_set();
        Ok(index)
    }

    /// Holds the exercise countdown without touching the workout clock.
    pub fn pause_exercise_timer(&mut self) -> Result<(), SessionError> {
        self.current_position()?;
        if !self.started {
            return Err(SessionError::NotStarted);
        }
        self.timers.cancel_exercise();
        Ok(())
    }

    /// Continues a held exercise countdown.
    pub fn resume_exercise_timer(&mut self) -> Result<(), SessionError> {
        self.current_position()?;
        if !self.started {
            return Err(SessionError::NotStarted);
        }
        self.timers.resume_exercise();
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Circuit entries
    // ------------------------------------------------------------------------

    /// Logs one effort for an exercise of the current circuit block.
    pub fn log_circuit_entry(
        &mut self,
        exercise_index: usize,
        reps: Option<u32>,
        weight: Option<f64>,
    ) -> Result<usize, SessionError> {
        Ok(self.circuit_mut()?.log_entry(exercise_index, reps, weight)?)
    }

    /// Logs a timed effort for an exercise of the current circuit block.
    pub fn log_circuit_timed_entry(&mut self, exercise_index: usize, seconds: u32) -> Result<usize, SessionError> {
        Ok(self.circuit_mut()?.log_timed_entry(exercise_index, seconds)?)
    }

    /// Removes a logged circuit entry.
    pub fn remove_circuit_entry(&mut self, exercise_index: usize, set_index: usize) -> Result<(), SessionError> {
        self.circuit_mut()?.remove_entry(exercise_index, set_index)?;
        Ok(())
    }

    /// Starts the next round of the current circuit block.
    pub fn next_circuit_round(&mut self) -> Result<u32, SessionError> {
        Ok(self.circuit_mut()?.next_round())
    }

    // ------------------------------------------------------------------------
    // Sync
    // ------------------------------------------------------------------------

    /// Records the result of one completion write.
    ///
    /// Returns false if the result belongs to an earlier session and was
    /// dropped.
    pub fn record_sync(&mut self, epoch: u64, exercise_id: &str, result: Result<(), ApiError>) -> bool {
        if epoch != self.epoch {
            tracing::debug!(epoch, current = self.epoch, exercise_id, "dropping late sync result");
            return false;
        }

        match result {
            Ok(()) => {
                self.pending_sync.retain(|r| r.exercise_id != exercise_id);
            }
            Err(e) => {
                tracing::warn!(exercise_id, error = %e, "failed to save exercise");
                self.emit(SessionEvent::SyncFailed {
                    exercise_id: exercise_id.to_string(),
                    message: e.to_string(),
                });
            }
        }
        true
    }

    /// Builds a batch with every completion still waiting to be saved.
    pub fn pending_batch(&self) -> Option<PersistBatch> {
        if self.pending_sync.is_empty() {
            return None;
        }
        Some(PersistBatch {
            epoch: self.epoch,
            records: self.pending_sync.clone(),
        })
    }

    // ------------------------------------------------------------------------
    // Reset
    // ------------------------------------------------------------------------

    /// Tears the session down. Results of requests still in flight are
    /// dropped, while unsaved completions stay queued for `retry_sync`.
    pub fn reset(&mut self) {
        self.epoch += 1;
        self.load_token += 1;
        self.clear_workout();
        self.state = SessionState::Idle;
        tracing::info!(epoch = self.epoch, "session reset");
        self.emit(SessionEvent::Reset);
    }

    // ------------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------------

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn plan_day(&self) -> Option<&PlanDay> {
        self.plan.as_ref()
    }

    pub fn plan_day_id(&self) -> Option<&str> {
        self.plan.as_ref().map(|plan| plan.id.as_str())
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn timers(&self) -> &TimerService {
        &self.timers
    }

    pub fn current_block(&self) -> Option<&Block> {
        let (block_index, _) = self.state.position()?;
        self.block(block_index)
    }

    pub fn current_exercise(&self) -> Option<&BlockExercise> {
        let (block_index, exercise_index) = self.state.position()?;
        self.block(block_index)?.exercises.get(exercise_index)
    }

    /// Set tracker of the current exercise, outside circuit blocks.
    pub fn current_tracker(&self) -> Option<&SetTracker> {
        let (block_index, exercise_index) = self.state.position()?;
        self.trackers.get(block_index)?.get(exercise_index)
    }

    /// Engine of the current circuit block.
    pub fn circuit(&self) -> Option<&CircuitEngine> {
        self.circuit.as_ref()
    }

    pub fn skipped_exercise_ids(&self) -> &BTreeSet<String> {
        &self.skipped_ids
    }

    pub fn skipped_count(&self) -> usize {
        self.skipped_ids.len()
    }

    pub fn completed_exercise_ids(&self) -> &BTreeSet<String> {
        &self.completed_ids
    }

    /// Completions that have not been saved yet.
    pub fn pending_sync(&self) -> &[ExerciseCompletion] {
        &self.pending_sync
    }

    /// Returns the view of the session for the screen.
    pub fn snapshot(&self) -> SessionSnapshot {
        let position = self.state.position();
        let block = self.current_block();
        let exercise = self.current_exercise();
        let total = self.plan.as_ref().map(PlanDay::exercise_count).unwrap_or(0);
        let done = self.completed_ids.len() + self.skipped_ids.len();
        let percent_complete = if total == 0 {
            0
        } else {
            (done.min(total) * 100 / total) as u8
        };

        SessionSnapshot {
            state: self.state.as_str(),
            plan_day_id: self.plan_day_id().map(str::to_string),
            block_index: position.map(|(b, _)| b),
            exercise_index: position.map(|(_, e)| e),
            block_name: block.map(|b| b.name.clone()),
            block_mode: block.map(|b| b.mode),
            exercise_name: exercise.map(|e| e.name().to_string()),
            logging_type: exercise.map(BlockExercise::logging_type),
            current_sets: self
                .current_tracker()
                .map(|t| t.sets().to_vec())
                .unwrap_or_default(),
            circuit_round: self.circuit.as_ref().map(CircuitEngine::current_round),
            started: self.started,
            paused: self.timers.is_paused(),
            timers: self.timers.snapshot(),
            total_exercises: total,
            completed_exercises: self.completed_ids.len(),
            skipped_exercises: self.skipped_ids.len(),
            percent_complete,
            pending_sync: self.pending_sync.len(),
            error: match &self.state {
                SessionState::LoadFailed { message } => Some(message.clone()),
                _ => None,
            },
        }
    }

    // ------------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------------

    fn emit(&self, event: SessionEvent) {
        let name = event.name();
        if self.event_tx.send(event).is_err() {
            tracing::trace!(event = name, "session event receiver dropped");
        }
    }

    fn clear_workout(&mut self) {
        self.plan = None;
        self.trackers.clear();
        self.circuit = None;
        self.timers.reset_all();
        self.started = false;
        self.started_at = None;
        self.completed_ids.clear();
        self.skipped_ids.clear();
    }

    fn block(&self, index: usize) -> Option<&Block> {
        self.plan.as_ref()?.blocks.get(index)
    }

    fn current_position(&self) -> Result<(usize, usize), SessionError> {
        self.state
            .position()
            .ok_or(SessionError::NotReady(self.state.as_str()))
    }

    /// Returns the block id, or an error for circuit blocks.
    fn check_not_circuit(&self, block_index: usize) -> Result<String, SessionError> {
        let block = self.block(block_index).ok_or(SessionError::NotReady("ready"))?;
        if block.is_circuit() {
            return Err(SessionError::CircuitBlock(block.name.clone()));
        }
        Ok(block.id.clone())
    }

    fn tracker_at(&self, block_index: usize, exercise_index: usize) -> Result<&SetTracker, SessionError> {
        self.trackers
            .get(block_index)
            .and_then(|trackers| trackers.get(exercise_index))
            .ok_or(SessionError::NotReady("ready"))
    }

    fn current_tracker_mut(&mut self) -> Result<&mut SetTracker, SessionError> {
        let (block_index, exercise_index) = self.current_position()?;
        self.check_not_circuit(block_index)?;
        self.trackers
            .get_mut(block_index)
            .and_then(|trackers| trackers.get_mut(exercise_index))
            .ok_or(SessionError::NotReady("ready"))
    }

    fn circuit_mut(&mut self) -> Result<&mut CircuitEngine, SessionError> {
        let (block_index, _) = self.current_position()?;
        let block = self.block(block_index).ok_or(SessionError::NotReady("ready"))?;
        if !block.is_circuit() {
            return Err(SessionError::NotCircuitBlock(block.name.clone()));
        }
        let name = block.name.clone();
        self.circuit.as_mut().ok_or(SessionError::NotCircuitBlock(name))
    }

    fn start_rest_after_set(&mut self) {
        if !self.started || !self.config.auto_start_rest {
            return;
        }
        let rest = self
            .current_exercise()
            .and_then(|exercise| exercise.rest_seconds)
            .unwrap_or(self.config.default_rest_seconds);
        self.timers.start_rest(rest);
    }

    fn is_open(&self, exercise: &BlockExercise) -> bool {
        !self.completed_ids.contains(&exercise.id) && !self.skipped_ids.contains(&exercise.id)
    }

    /// Finds the first exercise still to do, starting at the given position.
    ///
    /// Circuit blocks are entered at their first exercise and only if some
    /// exercise in them is still open. Empty blocks are passed over.
    fn find_open(&self, from_block: usize, from_exercise: usize) -> Option<(usize, usize)> {
        let plan = self.plan.as_ref()?;
        for (block_index, block) in plan.blocks.iter().enumerate().skip(from_block) {
            let start = if block_index == from_block { from_exercise } else { 0 };
            if block.is_circuit() {
                if start == 0 && block.exercises.iter().any(|e| self.is_open(e)) {
                    return Some((block_index, 0));
                }
                continue;
            }
            if let Some(offset) = block.exercises.iter().skip(start).position(|e| self.is_open(e)) {
                return Some((block_index, start + offset));
            }
        }
        None
    }

    fn enter(&mut self, block_index: usize, exercise_index: usize) {
        self.state = SessionState::Ready {
            block_index,
            exercise_index,
        };
        self.timers.reset_rest();
        self.timers.reset_exercise();

        let Some(block) = self.plan.as_ref().and_then(|plan| plan.blocks.get(block_index)) else {
            return;
        };
        if block.is_circuit() {
            self.circuit = Some(CircuitEngine::new(block, self.timers.workout_elapsed_seconds()));
            if let Some(cap) = block.time_cap_seconds {
                self.timers.arm_exercise(cap);
            }
        } else {
            self.circuit = None;
            if let Some(seconds) = block
                .exercises
                .get(exercise_index)
                .and_then(|exercise| exercise.target_duration_seconds)
            {
                self.timers.arm_exercise(seconds);
            }
        }
        tracing::debug!(block_index, exercise_index, "moved to exercise");
    }

    fn advance(&mut self) -> Advance {
        let Some((block_index, exercise_index)) = self.state.position() else {
            return Advance::Unchanged;
        };
        let in_circuit = self.block(block_index).map(Block::is_circuit).unwrap_or(false);
        let next = if in_circuit {
            self.find_open(block_index + 1, 0)
        } else {
            self.find_open(block_index, exercise_index + 1)
        };

        match next {
            Some((block_index, exercise_index)) => {
                self.enter(block_index, exercise_index);
                Advance::Moved {
                    block_index,
                    exercise_index,
                }
            }
            None => {
                self.finish_workout();
                Advance::Finished
            }
        }
    }

    fn finish_workout(&mut self) {
        self.state = SessionState::Completed;
        self.circuit = None;
        self.timers.stop_workout();
        self.timers.reset_rest();
        self.timers.reset_exercise();

        let elapsed_seconds = self.timers.workout_elapsed_seconds();
        tracing::info!(
            completed = self.completed_ids.len(),
            skipped = self.skipped_ids.len(),
            elapsed_seconds,
            "workout completed"
        );
        self.emit(SessionEvent::WorkoutCompleted {
            completed: self.completed_ids.len(),
            skipped: self.skipped_ids.len(),
            elapsed_seconds,
        });
    }

    /// Adds records to the sync queue, replacing older entries for the same exercise.
    fn queue(&mut self, records: Vec<ExerciseCompletion>) -> Option<PersistBatch> {
        if records.is_empty() {
            return None;
        }
        self.pending_sync
            .retain(|pending| !records.iter().any(|r| r.exercise_id == pending.exercise_id));
        self.pending_sync.extend(records.iter().cloned());
        Some(PersistBatch {
            epoch: self.epoch,
            records,
        })
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracker::TrackerError;
    use chrono::NaiveDate;

    fn controller() -> (SessionController, mpsc::UnboundedReceiver<SessionEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (SessionController::new(SessionConfig::default(), tx), rx)
    }

    fn load(controller: &mut SessionController, plan: PlanDay) -> LoadOutcome {
        let token = controller.begin_load();
        controller.apply_load(token, Ok(Some(plan))).unwrap()
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<SessionEvent>) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    fn count(events: &[SessionEvent], name: &str) -> usize {
        events.iter().filter(|e| e.name() == name).count()
    }

    fn day() -> PlanDay {
        PlanDay::new("day-1", NaiveDate::from_ymd_opt(2026, 10, 17).unwrap())
    }

    fn three_exercise_day() -> PlanDay {
        day().with_block(
            Block::new("main", "Main", BlockMode::Traditional, 0)
                .with_exercise(BlockExercise::sets_reps("e1", "Squat", 3, 10))
                .with_exercise(BlockExercise::sets_reps("e2", "Bench Press", 3, 10))
                .with_exercise(BlockExercise::sets_reps("e3", "Row", 3, 10)),
        )
    }

    fn amrap_day() -> PlanDay {
        day().with_block(
            Block::new("finisher", "Finisher", BlockMode::Amrap, 0)
                .with_time_cap(600)
                .with_exercise(BlockExercise::sets_reps("burpee", "Burpee", 1, 10))
                .with_exercise(BlockExercise::sets_reps("swing", "Swing", 1, 15)),
        )
    }

    // ------------------------------------------------------------------------
    // Load Tests
    // ------------------------------------------------------------------------

    mod load_tests {
        use super::*;

        #[test]
        fn test_load_positions_on_first_exercise() {
            let (mut c, mut rx) = controller();
            assert_eq!(load(&mut c, three_exercise_day()), LoadOutcome::Ready);

            assert_eq!(
                c.state(),
                &SessionState::Ready {
                    block_index: 0,
                    exercise_index: 0
                }
            );
            assert_eq!(c.current_exercise().unwrap().id, "e1");
            let events = drain(&mut rx);
            assert!(matches!(
                events.as_slice(),
                [SessionEvent::Loaded {
                    exercise_count: 3,
                    ..
                }]
            ));
        }

        #[test]
        fn test_blocks_run_in_order_and_empty_blocks_are_passed() {
            let plan = day()
                .with_block(
                    Block::new("late", "Late", BlockMode::Cooldown, 2)
                        .with_exercise(BlockExercise::timed("stretch", "Stretch", 60)),
                )
                .with_block(Block::new("empty", "Empty", BlockMode::Warmup, 0))
                .with_block(
                    Block::new("early", "Early", BlockMode::Traditional, 1)
                        .with_exercise(BlockExercise::sets_reps("squat", "Squat", 3, 5)),
                );
            let (mut c, _rx) = controller();
            load(&mut c, plan);

            assert_eq!(c.current_block().unwrap().id, "early");
            c.complete_current_exercise().unwrap();
            assert_eq!(c.current_block().unwrap().id, "late");
        }

        #[test]
        fn test_resumes_at_first_incomplete_exercise() {
            let mut plan = three_exercise_day();
            plan.blocks[0].exercises[0].completed = true;
            let (mut c, _rx) = controller();
            load(&mut c, plan);

            assert_eq!(c.current_exercise().unwrap().id, "e2");
            assert_eq!(c.snapshot().completed_exercises, 1);
        }

        #[test]
        fn test_all_completed_loads_as_completed() {
            let mut plan = three_exercise_day();
            for exercise in &mut plan.blocks[0].exercises {
                exercise.completed = true;
            }
            let (mut c, _rx) = controller();

            assert_eq!(load(&mut c, plan), LoadOutcome::AlreadyCompleted);
            assert_eq!(c.state(), &SessionState::Completed);
        }

        #[test]
        fn test_no_active_workout() {
            let (mut c, _rx) = controller();
            let token = c.begin_load();
            assert_eq!(c.apply_load(token, Ok(None)).unwrap(), LoadOutcome::NoActiveWorkout);
            assert_eq!(c.state(), &SessionState::NoActiveWorkout);
            assert!(c.start().is_err());
        }

        #[test]
        fn test_load_failure_is_retryable() {
            let (mut c, _rx) = controller();
            let token = c.begin_load();
            let err = c
                .apply_load(token, Err(ApiError::Network("offline".to_string())))
                .unwrap_err();

            assert!(err.is_retryable());
            assert_eq!(c.snapshot().error.as_deref(), Some("network error: offline"));

            assert_eq!(load(&mut c, three_exercise_day()), LoadOutcome::Ready);
        }

        #[test]
        fn test_stale_load_result_is_dropped() {
            let (mut c, _rx) = controller();
            let first = c.begin_load();
            let second = c.begin_load();

            let outcome = c.apply_load(first, Ok(Some(three_exercise_day()))).unwrap();
            assert_eq!(outcome, LoadOutcome::Stale);
            assert_eq!(c.state(), &SessionState::Loading);

            c.reset();
            let outcome = c.apply_load(second, Ok(Some(three_exercise_day()))).unwrap();
            assert_eq!(outcome, LoadOutcome::Stale);
            assert_eq!(c.state(), &SessionState::Idle);
        }
    }

    // ------------------------------------------------------------------------
    // Transition Tests
    // ------------------------------------------------------------------------

    mod transition_tests {
        use super::*;

        #[test]
        fn test_complete_skip_and_early_complete() {
            let (mut c, mut rx) = controller();
            load(&mut c, three_exercise_day());
            c.start().unwrap();

            for _ in 0..3 {
                c.add_set().unwrap();
            }
            let first = c.complete_current_exercise().unwrap();
            assert_eq!(
                first.advance,
                Advance::Moved {
                    block_index: 0,
                    exercise_index: 1
                }
            );
            let record = &first.persist.unwrap().records[0];
            assert_eq!(record.status, CompletionStatus::Completed);
            assert_eq!(record.sets.len(), 3);

            let second = c.skip_current_exercise().unwrap();
            let record = &second.persist.unwrap().records[0];
            assert_eq!(record.status, CompletionStatus::Skipped);
            assert!(record.sets.is_empty());

            c.add_set().unwrap();
            c.add_set().unwrap();
            let third = c.complete_current_exercise().unwrap();
            assert_eq!(third.advance, Advance::Finished);
            assert_eq!(third.persist.unwrap().records[0].sets.len(), 2);

            assert_eq!(c.state(), &SessionState::Completed);
            assert_eq!(c.skipped_count(), 1);
            assert!(!c.completed_exercise_ids().contains("e2"));
            assert_eq!(count(&drain(&mut rx), "workout_completed"), 1);
        }

        #[test]
        fn test_completed_session_ignores_further_transitions() {
            let (mut c, mut rx) = controller();
            load(&mut c, three_exercise_day());
            for _ in 0..3 {
                c.skip_current_exercise().unwrap();
            }
            drain(&mut rx);

            let outcome = c.complete_current_exercise().unwrap();
            assert_eq!(outcome.advance, Advance::Unchanged);
            assert!(outcome.persist.is_none());
            assert_eq!(c.skip_current_exercise().unwrap().advance, Advance::Unchanged);
            assert_eq!(c.complete_circuit_block().unwrap().advance, Advance::Unchanged);

            assert!(drain(&mut rx).is_empty());
            assert_eq!(c.state(), &SessionState::Completed);
        }

        #[test]
        fn test_transitions_need_a_loaded_workout() {
            let (mut c, _rx) = controller();
            assert_eq!(
                c.complete_current_exercise().unwrap_err(),
                SessionError::NotReady("idle")
            );
            assert!(c.add_set().is_err());
        }

        #[test]
        fn test_set_edits_go_to_current_exercise() {
            let (mut c, _rx) = controller();
            load(&mut c, three_exercise_day());

            let index = c.add_set().unwrap();
            c.update_set(index, SetField::Weight(Some(60.0))).unwrap();
            c.update_set(index, SetField::Reps(Some(8))).unwrap();
            c.add_set().unwrap();

            let sets = c.current_tracker().unwrap().sets();
            assert_eq!(sets[1].weight, Some(60.0));
            assert_eq!(sets[1].reps, Some(8));

            c.remove_set(0).unwrap();
            c.reset_set_to_target(0).unwrap();
            let sets = c.current_tracker().unwrap().sets();
            assert_eq!(sets.len(), 1);
            assert_eq!(sets[0].set_number, 1);
            assert_eq!(sets[0].reps, Some(10));
        }

        #[test]
        fn test_reps_rejected_for_timed_exercise() {
            let plan = day().with_block(
                Block::new("core", "Core", BlockMode::Traditional, 0)
                    .with_exercise(BlockExercise::timed("plank", "Plank", 30)),
            );
            let (mut c, _rx) = controller();
            load(&mut c, plan);
            c.add_set().unwrap();

            let err = c.update_set(0, SetField::Reps(Some(5))).unwrap_err();
            assert!(matches!(
                err,
                SessionError::Tracker(TrackerError::FieldNotEditable { .. })
            ));
        }

        #[test]
        fn test_snapshot_progress() {
            let (mut c, _rx) = controller();
            load(&mut c, three_exercise_day());
            c.complete_current_exercise().unwrap();

            let snapshot = c.snapshot();
            assert_eq!(snapshot.state, "ready");
            assert_eq!(snapshot.exercise_name.as_deref(), Some("Bench Press"));
            assert_eq!(snapshot.percent_complete, 33);
            assert_eq!(snapshot.pending_sync, 1);
        }
    }

    // ------------------------------------------------------------------------
    // Timer Tests
    // ------------------------------------------------------------------------

    mod timer_tests {
        use super::*;

        fn single(exercise: BlockExercise) -> PlanDay {
            day().with_block(Block::new("b", "Block", BlockMode::Traditional, 0).with_exercise(exercise))
        }

        #[test]
        fn test_ticks_need_a_started_workout() {
            let (mut c, mut rx) = controller();
            load(&mut c, three_exercise_day());
            drain(&mut rx);

            c.tick();
            assert!(drain(&mut rx).is_empty());
            assert_eq!(c.timers().workout_elapsed_seconds(), 0);
        }

        #[test]
        fn test_start_is_idempotent() {
            let (mut c, mut rx) = controller();
            load(&mut c, three_exercise_day());

            assert!(c.start().unwrap());
            assert!(!c.start().unwrap());
            assert!(c.started_at().is_some());
            assert_eq!(count(&drain(&mut rx), "started"), 1);
        }

        #[test]
        fn test_pause_requires_start() {
            let (mut c, _rx) = controller();
            load(&mut c, three_exercise_day());
            assert_eq!(c.toggle_pause().unwrap_err(), SessionError::NotStarted);

            c.start().unwrap();
            assert!(c.toggle_pause().unwrap());
            c.tick();
            assert_eq!(c.timers().workout_elapsed_seconds(), 0);
            assert!(!c.toggle_pause().unwrap());
        }

        #[test]
        fn test_rest_complete_fires_once() {
            let (mut c, mut rx) = controller();
            load(&mut c, single(BlockExercise::sets_reps("e", "Squat", 3, 5).with_rest(2)));
            c.start().unwrap();
            c.add_set().unwrap();
            assert!(c.timers().is_resting());

            for _ in 0..5 {
                c.tick();
            }
            assert_eq!(count(&drain(&mut rx), "rest_complete"), 1);
        }

        #[test]
        fn test_zero_rest_never_fires() {
            let (mut c, mut rx) = controller();
            load(&mut c, single(BlockExercise::sets_reps("e", "Squat", 3, 5).with_rest(0)));
            c.start().unwrap();
            c.add_set().unwrap();

            for _ in 0..5 {
                c.tick();
            }
            assert_eq!(count(&drain(&mut rx), "rest_complete"), 0);
        }

        #[test]
        fn test_default_rest_when_exercise_has_none() {
            let (mut c, _rx) = controller();
            load(&mut c, three_exercise_day());
            c.start().unwrap();
            c.add_set().unwrap();
            assert_eq!(c.timers().rest_remaining_seconds(), 90);
        }

        #[test]
        fn test_rest_not_started_when_disabled() {
            let (tx, _rx) = mpsc::unbounded_channel();
            let mut c = SessionController::new(SessionConfig::default().with_auto_start_rest(false), tx);
            load(&mut c, three_exercise_day());
            c.start().unwrap();
            c.add_set().unwrap();
            assert!(!c.timers().is_resting());
        }

        #[test]
        fn test_timed_set_records_countdown() {
            let (mut c, mut rx) = controller();
            load(&mut c, single(BlockExercise::timed("plank", "Plank", 30)));
            assert_eq!(c.timers().exercise_remaining_seconds(), Some(30));

            assert_eq!(c.start_exercise_timer().unwrap_err(), SessionError::NotStarted);
            c.start().unwrap();
            assert_eq!(c.start_exercise_timer().unwrap(), 30);
            for _ in 0..30 {
                c.tick();
            }
            assert_eq!(count(&drain(&mut rx), "exercise_timer_finished"), 1);

            let index = c.complete_timed_set().unwrap();
            let set = &c.current_tracker().unwrap().sets()[index];
            assert_eq!(set.duration_completed, Some(30));
            assert!(set.is_completed);
            assert!(c.current_tracker().unwrap().is_complete());
            assert_eq!(c.timers().exercise_remaining_seconds(), Some(30));
        }

        #[test]
        fn test_timer_needs_target_duration() {
            let (mut c, _rx) = controller();
            load(&mut c, three_exercise_day());
            c.start().unwrap();
            assert!(matches!(
                c.start_exercise_timer(),
                Err(SessionError::NoTargetDuration(_))
            ));
            assert!(c.complete_timed_set().is_err());
        }

        #[test]
        fn test_timed_set_needs_a_running_clock() {
            let (mut c, _rx) = controller();
            load(&mut c, single(BlockExercise::timed("plank", "Plank", 60)));

            assert_eq!(c.complete_timed_set().unwrap_err(), SessionError::NotStarted);
            c.start().unwrap();
            assert_eq!(
                c.complete_timed_set().unwrap_err(),
                SessionError::TimerNotRun("plank".to_string())
            );
            c.start_exercise_timer().unwrap();
            assert!(matches!(c.complete_timed_set(), Err(SessionError::TimerNotRun(_))));
            assert!(c.current_tracker().unwrap().sets().is_empty());

            c.tick();
            let index = c.complete_timed_set().unwrap();
            assert_eq!(c.current_tracker().unwrap().sets()[index].duration_completed, Some(1));
        }

        #[test]
        fn test_exercise_timer_pause_and_resume() {
            let (mut c, _rx) = controller();
            load(&mut c, single(BlockExercise::timed("plank", "Plank", 30)));
            assert_eq!(c.pause_exercise_timer().unwrap_err(), SessionError::NotStarted);

            c.start().unwrap();
            c.start_exercise_timer().unwrap();
            c.tick();
            c.pause_exercise_timer().unwrap();
            c.tick();
            c.tick();
            assert_eq!(c.timers().exercise_remaining_seconds(), Some(29));
            assert!(!c.timers().snapshot().exercise_running);

            c.resume_exercise_timer().unwrap();
            c.tick();
            assert_eq!(c.timers().exercise_remaining_seconds(), Some(28));
            assert!(c.timers().snapshot().exercise_running);
        }

        #[test]
        fn test_advance_resets_exercise_timers() {
            let plan = day().with_block(
                Block::new("b", "Block", BlockMode::Traditional, 0)
                    .with_exercise(BlockExercise::timed("plank", "Plank", 30))
                    .with_exercise(BlockExercise::sets_reps("squat", "Squat", 3, 5)),
            );
            let (mut c, _rx) = controller();
            load(&mut c, plan);
            c.start().unwrap();
            c.start_exercise_timer().unwrap();
            c.add_set().unwrap();

            c.complete_current_exercise().unwrap();
            assert_eq!(c.timers().exercise_remaining_seconds(), None);
            assert!(!c.timers().is_resting());
        }
    }

    // ------------------------------------------------------------------------
    // Circuit Tests
    // ------------------------------------------------------------------------

    mod circuit_tests {
        use super::*;

        #[test]
        fn test_per_exercise_actions_are_rejected() {
            let (mut c, _rx) = controller();
            load(&mut c, amrap_day());

            assert!(matches!(
                c.complete_current_exercise(),
                Err(SessionError::CircuitBlock(_))
            ));
            assert!(matches!(c.skip_current_exercise(), Err(SessionError::CircuitBlock(_))));
            assert!(matches!(c.add_set(), Err(SessionError::CircuitBlock(_))));
            assert!(c.skipped_exercise_ids().is_empty());
        }

        #[test]
        fn test_block_completion_on_traditional_block_is_rejected() {
            let (mut c, _rx) = controller();
            load(&mut c, three_exercise_day());
            assert!(matches!(
                c.complete_circuit_block(),
                Err(SessionError::NotCircuitBlock(_))
            ));
            assert!(c.log_circuit_entry(0, None, None).is_err());
        }

        #[test]
        fn test_time_capped_amrap() {
            let (mut c, mut rx) = controller();
            load(&mut c, amrap_day());
            c.start().unwrap();
            assert_eq!(c.start_exercise_timer().unwrap(), 600);

            c.log_circuit_entry(0, Some(12), None).unwrap();
            c.log_circuit_entry(1, None, Some(24.0)).unwrap();
            assert_eq!(c.next_circuit_round().unwrap(), 2);
            c.log_circuit_entry(0, None, None).unwrap();

            for _ in 0..650 {
                c.tick();
            }
            assert_eq!(count(&drain(&mut rx), "time_cap_reached"), 1);

            let outcome = c.complete_circuit_block().unwrap();
            assert_eq!(outcome.advance, Advance::Finished);

            let completion = outcome.circuit.unwrap();
            assert_eq!(completion.elapsed_seconds, 600);
            assert!(completion.time_cap_reached);
            assert_eq!(completion.rounds_completed, 1);
            assert_eq!(completion.exercises[0].sets.len(), 2);
            assert_eq!(completion.exercises[0].sets[0].reps, Some(12));
            assert_eq!(outcome.persist.unwrap().records.len(), 2);
            assert_eq!(c.completed_exercise_ids().len(), 2);
        }

        #[test]
        fn test_cap_counts_down_while_paused() {
            let (mut c, mut rx) = controller();
            load(&mut c, amrap_day());
            c.start().unwrap();
            c.start_exercise_timer().unwrap();
            c.log_circuit_entry(0, Some(10), None).unwrap();
            c.toggle_pause().unwrap();

            for _ in 0..600 {
                c.tick();
            }
            assert_eq!(count(&drain(&mut rx), "time_cap_reached"), 1);

            let completion = c.complete_circuit_block().unwrap().circuit.unwrap();
            assert!(completion.time_cap_reached);
            assert_eq!(completion.elapsed_seconds, 600);
        }

        #[test]
        fn test_timed_circuit_entry() {
            let plan = day().with_block(
                Block::new("emom", "EMOM", BlockMode::Emom, 0)
                    .with_exercise(BlockExercise::timed("plank", "Plank", 40))
                    .with_exercise(BlockExercise::sets_reps("swing", "Swing", 1, 15)),
            );
            let (mut c, _rx) = controller();
            load(&mut c, plan);

            assert_eq!(c.log_circuit_timed_entry(0, 35).unwrap(), 0);
            assert!(c.log_circuit_timed_entry(5, 35).is_err());

            let completion = c.complete_circuit_block().unwrap().circuit.unwrap();
            assert_eq!(completion.exercises[0].sets[0].duration_completed, Some(35));
        }

        #[test]
        fn test_timed_entry_on_traditional_block_is_rejected() {
            let (mut c, _rx) = controller();
            load(&mut c, three_exercise_day());
            assert!(matches!(
                c.log_circuit_timed_entry(0, 30),
                Err(SessionError::NotCircuitBlock(_))
            ));
        }

        #[test]
        fn test_circuit_advances_one_block() {
            let plan = amrap_day().with_block(
                Block::new("cool", "Cooldown", BlockMode::Cooldown, 1)
                    .with_exercise(BlockExercise::timed("walk", "Walk", 120)),
            );
            let (mut c, _rx) = controller();
            load(&mut c, plan);

            let outcome = c.complete_circuit_block().unwrap();
            assert_eq!(
                outcome.advance,
                Advance::Moved {
                    block_index: 1,
                    exercise_index: 0
                }
            );
            assert!(outcome.circuit.unwrap().is_partial());
            assert!(c.circuit().is_none());
        }
    }

    // ------------------------------------------------------------------------
    // Sync Tests
    // ------------------------------------------------------------------------

    mod sync_tests {
        use super::*;

        #[test]
        fn test_failed_sync_stays_pending() {
            let (mut c, mut rx) = controller();
            load(&mut c, three_exercise_day());
            let batch = c.complete_current_exercise().unwrap().persist.unwrap();

            let error = ApiError::Network("offline".to_string());
            assert!(c.record_sync(batch.epoch, "e1", Err(error)));
            assert_eq!(c.pending_sync().len(), 1);
            assert_eq!(count(&drain(&mut rx), "sync_failed"), 1);

            let retry = c.pending_batch().unwrap();
            assert_eq!(retry.records[0].exercise_id, "e1");
            assert!(c.record_sync(retry.epoch, "e1", Ok(())));
            assert!(c.pending_sync().is_empty());
            assert!(c.pending_batch().is_none());
        }

        #[test]
        fn test_late_result_after_reset_is_dropped() {
            let (mut c, mut rx) = controller();
            load(&mut c, three_exercise_day());
            let batch = c.complete_current_exercise().unwrap().persist.unwrap();

            c.reset();
            drain(&mut rx);

            let error = ApiError::Network("offline".to_string());
            assert!(!c.record_sync(batch.epoch, "e1", Err(error)));
            assert!(drain(&mut rx).is_empty());
            assert_eq!(c.state(), &SessionState::Idle);

            // The unsaved completion survives the reset and can be sent again
            let retry = c.pending_batch().unwrap();
            assert_eq!(retry.records[0].exercise_id, "e1");
            assert_ne!(retry.epoch, batch.epoch);
            assert!(c.record_sync(retry.epoch, "e1", Ok(())));
            assert!(c.pending_sync().is_empty());
        }

        #[test]
        fn test_reload_keeps_pending_completions() {
            let (mut c, _rx) = controller();
            load(&mut c, three_exercise_day());
            c.complete_current_exercise().unwrap();
            c.skip_current_exercise().unwrap();

            load(&mut c, three_exercise_day());
            assert_eq!(c.pending_sync().len(), 2);
            assert_eq!(c.current_exercise().unwrap().id, "e3");
            assert!(c.completed_exercise_ids().contains("e1"));
            assert!(c.skipped_exercise_ids().contains("e2"));
        }

        #[test]
        fn test_reset_keeps_unsaved_completions() {
            let (mut c, _rx) = controller();
            load(&mut c, three_exercise_day());
            c.complete_current_exercise().unwrap();

            c.reset();
            assert_eq!(c.pending_sync().len(), 1);

            load(&mut c, three_exercise_day());
            assert_eq!(c.current_exercise().unwrap().id, "e2");
        }
    }
}
