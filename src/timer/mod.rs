//! Timer service for a workout session.
//!
//! Three timers advance on one shared tick:
//! - workout elapsed time (counts up, pausable)
//! - rest countdown (stops itself at zero)
//! - exercise countdown (target duration of the current exercise)
//!
//! The service only keeps time. It reports what happened on each tick and
//! leaves every decision to the session controller.

use serde::{Deserialize, Serialize};

// ============================================================================
// Countdown
// ============================================================================

/// A countdown that stops when it reaches zero.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Countdown {
    duration_seconds: u32,
    remaining_seconds: u32,
    running: bool,
}

impl Countdown {
    /// Arms the countdown and starts it.
    ///
    /// A zero duration leaves the countdown stopped, so it never fires.
    pub fn start(&mut self, seconds: u32) {
        self.duration_seconds = seconds;
        self.remaining_seconds = seconds;
        self.running = seconds > 0;
    }

    /// Arms the countdown without starting it.
    pub fn arm(&mut self, seconds: u32) {
        self.duration_seconds = seconds;
        self.remaining_seconds = seconds;
        self.running = false;
    }

    /// Resumes an armed countdown that still has time left.
    pub fn resume(&mut self) {
        self.running = self.remaining_seconds > 0;
    }

    /// Stops the countdown, keeping the remaining time.
    pub fn cancel(&mut self) {
        self.running = false;
    }

    /// Stops the countdown and clears it.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Decrements by one second.
    ///
    /// Returns true only on the tick that reaches zero.
    pub fn tick(&mut self) -> bool {
        if !self.running {
            return false;
        }
        self.remaining_seconds = self.remaining_seconds.saturating_sub(1);
        if self.remaining_seconds == 0 {
            self.running = false;
            return true;
        }
        false
    }

    pub fn remaining_seconds(&self) -> u32 {
        self.remaining_seconds
    }

    pub fn duration_seconds(&self) -> u32 {
        self.duration_seconds
    }

    /// Seconds counted down so far.
    pub fn elapsed_seconds(&self) -> u32 {
        self.duration_seconds - self.remaining_seconds
    }

    pub fn is_running(&self) -> bool {
        self.running
    }
}

// ============================================================================
// TickOutcome / TimerSnapshot
// ============================================================================

/// What happened during one tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickOutcome {
    /// The rest countdown reached zero on this tick
    pub rest_completed: bool,
    /// The exercise countdown reached zero on this tick
    pub exercise_finished: bool,
}

/// Current timer values for display.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerSnapshot {
    /// Seconds since the workout started, excluding pauses
    pub workout_elapsed_seconds: u32,
    /// Seconds of rest left (0 when not resting)
    pub rest_remaining_seconds: u32,
    /// Seconds left on the exercise countdown, if armed
    pub exercise_remaining_seconds: Option<u32>,
    /// Whether the exercise countdown is counting down
    pub exercise_running: bool,
    /// Whether the workout timer is paused
    pub paused: bool,
}

// ============================================================================
// TimerService
// ============================================================================

/// Owns the workout, rest and exercise timers.
#[derive(Debug, Clone, Default)]
pub struct TimerService {
    workout_elapsed_seconds: u32,
    workout_running: bool,
    paused: bool,
    rest: Countdown,
    exercise: Countdown,
    exercise_armed: bool,
}

impl TimerService {
    /// Creates a service with every timer stopped.
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts the workout elapsed timer.
    pub fn start_workout(&mut self) {
        self.workout_running = true;
        self.paused = false;
    }

    /// Stops the workout elapsed timer, keeping its value.
    pub fn stop_workout(&mut self) {
        self.workout_running = false;
        self.paused = false;
    }

    /// Toggles the pause state of the workout timer.
    ///
    /// Rest and exercise countdowns are not affected. Returns the new
    /// paused state; toggling a stopped workout does nothing.
    pub fn toggle_pause(&mut self) -> bool {
        if self.workout_running {
            self.paused = !self.paused;
        }
        self.paused
    }

    /// Starts the rest countdown.
    pub fn start_rest(&mut self, seconds: u32) {
        self.rest.start(seconds);
    }

    /// Stops the rest countdown.
    pub fn cancel_rest(&mut self) {
        self.rest.cancel();
    }

    /// Clears the rest countdown.
    pub fn reset_rest(&mut self) {
        self.rest.reset();
    }

    /// Arms the exercise countdown without starting it.
    pub fn arm_exercise(&mut self, seconds: u32) {
        self.exercise.arm(seconds);
        self.exercise_armed = true;
    }

    /// Starts (or restarts from full) the exercise countdown.
    pub fn start_exercise(&mut self, seconds: u32) {
        self.exercise.start(seconds);
        self.exercise_armed = true;
    }

    /// Resumes the armed exercise countdown.
    pub fn resume_exercise(&mut self) {
        self.exercise.resume();
    }

    /// Stops the exercise countdown, keeping the remaining time.
    pub fn cancel_exercise(&mut self) {
        self.exercise.cancel();
    }

    /// Clears the exercise countdown.
    pub fn reset_exercise(&mut self) {
        self.exercise.reset();
        self.exercise_armed = false;
    }

    /// Stops and clears every timer.
    pub fn reset_all(&mut self) {
        *self = Self::default();
    }

    /// Advances every running timer by one second.
    pub fn tick(&mut self) -> TickOutcome {
        if self.workout_running && !self.paused {
            self.workout_elapsed_seconds = self.workout_elapsed_seconds.saturating_add(1);
        }

        TickOutcome {
            rest_completed: self.rest.tick(),
            exercise_finished: self.exercise.tick(),
        }
    }

    pub fn workout_elapsed_seconds(&self) -> u32 {
        self.workout_elapsed_seconds
    }

    pub fn rest_remaining_seconds(&self) -> u32 {
        if self.rest.is_running() {
            self.rest.remaining_seconds()
        } else {
            0
        }
    }

    pub fn exercise_remaining_seconds(&self) -> Option<u32> {
        self.exercise_armed.then(|| self.exercise.remaining_seconds())
    }

    /// Seconds the exercise countdown has run since it was armed.
    pub fn exercise_elapsed_seconds(&self) -> u32 {
        self.exercise.elapsed_seconds()
    }

    pub fn is_resting(&self) -> bool {
        self.rest.is_running()
    }

    pub fn is_exercise_running(&self) -> bool {
        self.exercise.is_running()
    }

    pub fn is_workout_running(&self) -> bool {
        self.workout_running
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Returns the current values for display.
    pub fn snapshot(&self) -> TimerSnapshot {
        TimerSnapshot {
            workout_elapsed_seconds: self.workout_elapsed_seconds,
            rest_remaining_seconds: self.rest_remaining_seconds(),
            exercise_remaining_seconds: self.exercise_remaining_seconds(),
            exercise_running: self.is_exercise_running(),
            paused: self.paused,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
