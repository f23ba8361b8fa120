//! Events emitted by the session controller.

use crate::circuit::CircuitCompletion;
use crate::timer::TimerSnapshot;

/// Something the UI layer may want to react to.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// A plan day was loaded and the session is positioned on it.
    Loaded {
        plan_day_id: String,
        block_count: usize,
        exercise_count: usize,
    },
    /// The backend has no workout for today.
    NoActiveWorkout,
    /// Loading failed.
    LoadFailed { message: String },
    /// The workout timer started.
    Started,
    /// The workout timer was paused.
    Paused,
    /// The workout timer was resumed.
    Resumed,
    /// One tick of the timer service.
    Tick { timers: TimerSnapshot },
    /// The rest countdown reached zero.
    RestComplete {
        block_index: usize,
        exercise_index: usize,
    },
    /// The exercise countdown reached zero.
    ExerciseTimerFinished {
        block_index: usize,
        exercise_index: usize,
    },
    /// The time cap of a circuit block ran out.
    TimeCapReached { block_id: String },
    /// An exercise was completed.
    ExerciseCompleted {
        exercise_id: String,
        sets_logged: usize,
        target_met: bool,
    },
    /// An exercise was skipped.
    ExerciseSkipped { exercise_id: String },
    /// A circuit block was completed.
    CircuitBlockCompleted { completion: CircuitCompletion },
    /// The last exercise of the day was completed or skipped.
    WorkoutCompleted {
        completed: usize,
        skipped: usize,
        elapsed_seconds: u32,
    },
    /// A completion could not be saved and stays queued.
    SyncFailed { exercise_id: String, message: String },
    /// The session was torn down.
    Reset,
}

impl SessionEvent {
    /// Returns the event name used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            SessionEvent::Loaded { .. } => "loaded",
            SessionEvent::NoActiveWorkout => "no_active_workout",
            SessionEvent::LoadFailed { .. } => "load_failed",
            SessionEvent::Started => "started",
            SessionEvent::Paused => "paused",
            SessionEvent::Resumed => "resumed",
            SessionEvent::Tick { .. } => "tick",
            SessionEvent::RestComplete { .. } => "rest_complete",
            SessionEvent::ExerciseTimerFinished { .. } => "exercise_timer_finished",
            SessionEvent::TimeCapReached { .. } => "time_cap_reached",
            SessionEvent::ExerciseCompleted { .. } => "exercise_completed",
            SessionEvent::ExerciseSkipped { .. } => "exercise_skipped",
            SessionEvent::CircuitBlockCompleted { .. } => "circuit_block_completed",
            SessionEvent::WorkoutCompleted { .. } => "workout_completed",
            SessionEvent::SyncFailed { .. } => "sync_failed",
            SessionEvent::Reset => "reset",
        }
    }
}
