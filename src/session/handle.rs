//! Async handle that connects the session controller to the backend.

use std::sync::{Arc, Mutex as StdMutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

use super::{
    Advance, LoadOutcome, PersistBatch, SessionController, SessionError, SessionEvent,
    SessionSnapshot, SessionState,
};
use crate::api::{ApiError, WorkoutApi};
use crate::circuit::CircuitCompletion;
use crate::jobs::{JobError, JobLauncher};
use crate::types::SessionConfig;

fn lock<T>(mutex: &StdMutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A workout session bound to a backend.
///
/// The controller lock is never held across a network call. Responses are
/// matched against the controller's epoch when they arrive, so a response
/// that lands after [`reset`](Self::reset) is dropped.
pub struct WorkoutSession {
    controller: Arc<Mutex<SessionController>>,
    api: Arc<dyn WorkoutApi>,
    tick_interval: Duration,
    ticker: StdMutex<Option<JoinHandle<()>>>,
}

impl WorkoutSession {
    /// Creates an idle session. Fails if the configuration is out of range.
    pub fn new(
        api: Arc<dyn WorkoutApi>,
        config: SessionConfig,
        event_tx: mpsc::UnboundedSender<SessionEvent>,
    ) -> Result<Self, SessionError> {
        config.validate().map_err(SessionError::InvalidConfig)?;
        let tick_interval = config.tick_interval();
        Ok(Self {
            controller: Arc::new(Mutex::new(SessionController::new(config, event_tx))),
            api,
            tick_interval,
            ticker: StdMutex::new(None),
        })
    }

    /// Returns the shared controller.
    pub fn controller(&self) -> Arc<Mutex<SessionController>> {
        Arc::clone(&self.controller)
    }

    /// Runs a closure against the controller.
    pub async fn with_controller<R>(&self, f: impl FnOnce(&mut SessionController) -> R) -> R {
        let mut controller = self.controller.lock().await;
        f(&mut controller)
    }

    /// Fetches today's workout and positions the session on it.
    pub async fn load(&self) -> Result<LoadOutcome, SessionError> {
        let token = self.controller.lock().await.begin_load();
        let result = self.api.fetch_active_workout().await;
        self.controller.lock().await.apply_load(token, result)
    }

    /// Starts the workout and its ticker.
    pub async fn start(&self) -> Result<bool, SessionError> {
        let started = self.controller.lock().await.start()?;
        self.spawn_ticker();
        Ok(started)
    }

    pub async fn toggle_pause(&self) -> Result<bool, SessionError> {
        self.controller.lock().await.toggle_pause()
    }

    /// Completes the current exercise and saves it.
    ///
    /// The session has already moved on when a save error is returned; the
    /// record stays queued for [`retry_sync`](Self::retry_sync).
    pub async fn complete_current_exercise(&self) -> Result<Advance, SessionError> {
        let outcome = self.controller.lock().await.complete_current_exercise()?;
        if let Some(batch) = outcome.persist {
            self.persist(batch).await?;
        }
        Ok(outcome.advance)
    }

    /// Skips the current exercise and saves the skip.
    pub async fn skip_current_exercise(&self) -> Result<Advance, SessionError> {
        let outcome = self.controller.lock().await.skip_current_exercise()?;
        if let Some(batch) = outcome.persist {
            self.persist(batch).await?;
        }
        Ok(outcome.advance)
    }

    /// Completes the current circuit block and saves every exercise in it.
    ///
    /// Returns `None` if the workout was already completed.
    pub async fn complete_circuit_block(&self) -> Result<Option<CircuitCompletion>, SessionError> {
        let outcome = self.controller.lock().await.complete_circuit_block()?;
        if let Some(batch) = outcome.persist {
            self.persist(batch).await?;
        }
        Ok(outcome.circuit)
    }

    /// Sends every completion that has not been saved yet.
    ///
    /// Returns how many records were sent.
    pub async fn retry_sync(&self) -> Result<usize, SessionError> {
        let batch = self.controller.lock().await.pending_batch();
        let Some(batch) = batch else {
            return Ok(0);
        };
        let count = batch.records.len();
        tracing::info!(count, "retrying pending completions");
        self.persist(batch).await?;
        Ok(count)
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        self.controller.lock().await.snapshot()
    }

    /// Tears the session down and stops the ticker.
    pub async fn reset(&self) {
        self.stop_ticker();
        self.controller.lock().await.reset();
    }

    /// Starts regenerating the loaded plan day through the launcher.
    pub async fn regenerate_day(&self, launcher: &JobLauncher, feedback: &str) -> Result<String, JobError> {
        let plan_day_id = self
            .controller
            .lock()
            .await
            .plan_day_id()
            .map(str::to_string)
            .ok_or(JobError::NoActivePlanDay)?;
        launcher.regenerate_day(&plan_day_id, feedback).await
    }

    /// Returns true while the ticker task is running.
    pub fn is_ticking(&self) -> bool {
        lock(&self.ticker)
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Stops the ticker task.
    pub fn stop_ticker(&self) {
        if let Some(handle) = lock(&self.ticker).take() {
            handle.abort();
            tracing::debug!("session ticker stopped");
        }
    }

    fn spawn_ticker(&self) {
        let mut ticker = lock(&self.ticker);
        if ticker.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return;
        }

        let weak = Arc::downgrade(&self.controller);
        let period = self.tick_interval;
        *ticker = Some(tokio::spawn(async move {
            let mut interval = interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // The first tick completes immediately
            interval.tick().await;

            loop {
                interval.tick().await;
                let Some(shared) = weak.upgrade() else {
                    break;
                };
                let mut controller = shared.lock().await;
                if *controller.state() == SessionState::Completed {
                    tracing::debug!("workout completed, ticker exiting");
                    break;
                }
                controller.tick();
            }
        }));
    }

    async fn persist(&self, batch: PersistBatch) -> Result<(), SessionError> {
        let PersistBatch { epoch, records } = batch;
        let mut failed = Vec::new();
        let mut first_error: Option<ApiError> = None;

        for record in records {
            let result = self
                .api
                .persist_exercise_completion(&record.exercise_id, &record.sets, record.status)
                .await;

            let applied = self
                .controller
                .lock()
                .await
                .record_sync(epoch, &record.exercise_id, result.clone());
            if !applied {
                continue;
            }
            if let Err(e) = result {
                failed.push(record.exercise_id);
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(source) => Err(SessionError::PersistFailed {
                exercise_ids: failed,
                source,
            }),
            None => Ok(()),
        }
    }
}

impl Drop for WorkoutSession {
    fn drop(&mut self) {
        self.stop_ticker();
    }
}
