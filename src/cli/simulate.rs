//! Offline session run used by the `simulate` command.

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tokio::sync::mpsc;

use super::SimulateArgs;
use crate::api::{InMemoryWorkoutApi, PersistedCompletion};
use crate::circuit::CircuitCompletion;
use crate::jobs::{JobLauncher, JobTracker};
use crate::notification::MockNotificationScheduler;
use crate::session::{LoadOutcome, SessionController, SessionError, SessionState, WorkoutSession};
use crate::types::{
    BackgroundJob, JobStatus, JobStatusReport, JobTrackerConfig, PlanDay, SessionConfig,
};

const SIMULATED_USER: &str = "simulated-user";

/// What a simulated run produced.
#[derive(Debug, Clone, Default)]
pub struct SimulationReport {
    pub plan_day_id: String,
    pub final_state: String,
    pub elapsed_seconds: u32,
    /// Completions the backend received, in order
    pub persisted: Vec<PersistedCompletion>,
    pub circuits: Vec<CircuitCompletion>,
    pub skipped: usize,
    /// Completions that could not be saved
    pub unsynced: usize,
    /// Regeneration job started after the workout, if requested
    pub regeneration: Option<BackgroundJob>,
}

/// The next step the simulated user takes.
enum Step {
    Done,
    Circuit { exercises: usize },
    Skip,
    Sets { count: u32, timed: bool },
}

/// Runs the plan day through a full session.
///
/// Every exercise is done to its target unless its id is in `--skip`.
/// Timed sets run their countdown to zero; circuit blocks log one round.
pub async fn run_simulation(plan: PlanDay, args: &SimulateArgs) -> Result<SimulationReport> {
    let api = Arc::new(InMemoryWorkoutApi::with_plan(plan));
    api.set_fail_persist(args.fail_persist);

    let (event_tx, _event_rx) = mpsc::unbounded_channel();
    let session = WorkoutSession::new(
        api.clone(),
        SessionConfig::default().with_auto_start_rest(false),
        event_tx,
    )?;

    match session.load().await? {
        LoadOutcome::NoActiveWorkout => bail!("the plan has no active workout"),
        LoadOutcome::AlreadyCompleted => tracing::info!("every exercise is already completed"),
        LoadOutcome::Ready | LoadOutcome::Stale => {}
    }

    let mut report = SimulationReport::default();
    // Time is driven by hand, so the ticker task is never started
    if session.with_controller(|c| c.state().is_ready()).await {
        session.with_controller(SessionController::start).await?;
    }

    loop {
        let step = session.with_controller(|c| next_step(c, &args.skip)).await;
        let result = match step {
            Step::Done => break,
            Step::Skip => session.skip_current_exercise().await.map(|_| ()),
            Step::Sets { count, timed } => {
                session
                    .with_controller(|c| log_sets(c, count, timed))
                    .await
                    .context("failed to log sets")?;
                session.complete_current_exercise().await.map(|_| ())
            }
            Step::Circuit { exercises } => {
                session
                    .with_controller(|c| log_round(c, exercises))
                    .await
                    .context("failed to log circuit round")?;
                session.complete_circuit_block().await.map(|completion| {
                    report.circuits.extend(completion);
                })
            }
        };

        match result {
            Ok(()) => {}
            Err(e) if e.is_sync_error() => tracing::warn!(error = %e, "continuing without saving"),
            Err(e) => return Err(e.into()),
        }
    }

    let snapshot = session.snapshot().await;
    report.plan_day_id = snapshot.plan_day_id.unwrap_or_default();
    report.final_state = snapshot.state.to_string();
    report.elapsed_seconds = snapshot.timers.workout_elapsed_seconds;
    report.skipped = snapshot.skipped_exercises;
    report.unsynced = snapshot.pending_sync;
    report.persisted = api.persisted();

    if let Some(feedback) = &args.regenerate {
        report.regeneration = Some(regenerate(&session, api, feedback).await?);
    }
    Ok(report)
}

fn next_step(controller: &SessionController, skip: &[String]) -> Step {
    if *controller.state() == SessionState::Completed {
        return Step::Done;
    }
    let (Some(block), Some(exercise)) = (controller.current_block(), controller.current_exercise()) else {
        return Step::Done;
    };

    if block.is_circuit() {
        Step::Circuit {
            exercises: block.exercises.len(),
        }
    } else if skip.iter().any(|id| *id == exercise.id) {
        Step::Skip
    } else {
        Step::Sets {
            count: exercise.required_sets(),
            timed: exercise.target_duration_seconds.is_some(),
        }
    }
}

fn log_sets(controller: &mut SessionController, count: u32, timed: bool) -> Result<(), SessionError> {
    for _ in 0..count {
        if timed {
            let seconds = controller.start_exercise_timer()?;
            for _ in 0..seconds {
                controller.tick();
            }
            controller.complete_timed_set()?;
        } else {
            controller.add_set()?;
        }
    }
    Ok(())
}

fn log_round(controller: &mut SessionController, exercises: usize) -> Result<(), SessionError> {
    if let Ok(seconds) = controller.start_exercise_timer() {
        // One round takes half the cap
        for _ in 0..seconds / 2 {
            controller.tick();
        }
    }
    for index in 0..exercises {
        controller.log_circuit_entry(index, None, None)?;
    }
    Ok(())
}

async fn regenerate(
    session: &WorkoutSession,
    api: Arc<InMemoryWorkoutApi>,
    feedback: &str,
) -> Result<BackgroundJob> {
    let (job_tx, _job_rx) = mpsc::unbounded_channel();
    let tracker = Arc::new(JobTracker::new(
        api.clone(),
        Arc::new(MockNotificationScheduler::new()),
        JobTrackerConfig::new(SIMULATED_USER),
        job_tx,
    )?);
    let launcher = JobLauncher::new(api.clone(), Arc::clone(&tracker));

    let job_id = session.regenerate_day(&launcher, feedback).await?;
    api.script_job(
        &job_id,
        vec![
            JobStatusReport::new(&job_id, JobStatus::Processing, 50),
            JobStatusReport::new(&job_id, JobStatus::Complete, 100),
        ],
    );

    tracker.poll_once().await;
    tracker
        .job(&job_id)
        .with_context(|| format!("job {} is no longer tracked", job_id))
}
