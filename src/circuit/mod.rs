//! Block-level recording for circuit-style blocks.
//!
//! AMRAP, EMOM, for-time, circuit and tabata blocks are logged as one timed
//! unit. The [`CircuitEngine`] records what each exercise achieved during
//! the window and produces a single [`CircuitCompletion`] for the block.
//! It never runs a clock of its own; the caller passes in the session's
//! workout elapsed time.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::tracker::{SetField, SetTracker, TrackerError};
use crate::types::{Block, BlockMode, CompletionStatus, ExerciseCompletion};

/// Errors returned while logging a circuit entry.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CircuitError {
    /// The block has no exercise at this index.
    #[error("exercise {index} is not part of this block ({len} exercises)")]
    ExerciseIndexOutOfRange {
        /// Requested index
        index: usize,
        /// Number of exercises in the block
        len: usize,
    },

    /// The underlying set edit was rejected.
    #[error(transparent)]
    Tracker(#[from] TrackerError),
}

/// Aggregated completion record for a circuit block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CircuitCompletion {
    /// Block id
    pub block_id: String,
    /// Block mode
    pub mode: BlockMode,
    /// Seconds used, never more than the time cap
    pub elapsed_seconds: u32,
    /// Time cap of the block
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_cap_seconds: Option<u32>,
    /// Whether the cap ran out before the block was completed
    pub time_cap_reached: bool,
    /// Rounds in which every exercise was logged
    pub rounds_completed: u32,
    /// Planned rounds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_rounds: Option<u32>,
    /// Per-exercise records, all with status `completed`
    pub exercises: Vec<ExerciseCompletion>,
}

impl CircuitCompletion {
    /// Returns true if some planned work was not done.
    ///
    /// Partial blocks are still complete blocks.
    pub fn is_partial(&self) -> bool {
        let rounds_short = self
            .target_rounds
            .map(|target| self.rounds_completed < target)
            .unwrap_or(false);
        rounds_short || self.exercises.iter().any(|e| e.sets.is_empty())
    }
}

/// Recorder for one circuit block.
#[derive(Debug, Clone, PartialEq)]
pub struct CircuitEngine {
    block_id: String,
    mode: BlockMode,
    time_cap_seconds: Option<u32>,
    target_rounds: Option<u32>,
    started_at_seconds: u32,
    current_round: u32,
    cap_reached: bool,
    trackers: Vec<SetTracker>,
}

impl CircuitEngine {
    /// Opens the recording window for a block.
    ///
    /// `started_at_seconds` is the workout elapsed time when the block began.
    pub fn new(block: &Block, started_at_seconds: u32) -> Self {
        Self {
            block_id: block.id.clone(),
            mode: block.mode,
            time_cap_seconds: block.time_cap_seconds,
            target_rounds: block.rounds,
            started_at_seconds,
            current_round: 1,
            cap_reached: false,
            trackers: block.exercises.iter().map(SetTracker::new).collect(),
        }
    }

    /// Logs one effort for an exercise in the current round.
    ///
    /// Values left as `None` keep the pre-filled defaults. Timed exercises
    /// are recorded as having done their full target duration.
    pub fn log_entry(
        &mut self,
        exercise_index: usize,
        reps: Option<u32>,
        weight: Option<f64>,
    ) -> Result<usize, CircuitError> {
        let tracker = self.tracker_mut(exercise_index)?;
        let index = tracker.add_set();

        let applied = Self::apply_values(tracker, index, reps, weight);
        if let Err(e) = applied {
            tracker.remove_set(index)?;
            return Err(e);
        }
        if tracker.logging_type().is_duration_based() {
            let seconds = tracker.target_duration_seconds().unwrap_or(0);
            tracker.record_duration(index, seconds)?;
        }
        Ok(index)
    }

    /// Logs a timed effort with the measured duration.
    pub fn log_timed_entry(&mut self, exercise_index: usize, seconds: u32) -> Result<usize, CircuitError> {
        let tracker = self.tracker_mut(exercise_index)?;
        let index = tracker.add_set();
        tracker.record_duration(index, seconds)?;
        Ok(index)
    }

    /// Removes a logged entry.
    pub fn remove_entry(&mut self, exercise_index: usize, set_index: usize) -> Result<(), CircuitError> {
        self.tracker_mut(exercise_index)?.remove_set(set_index)?;
        Ok(())
    }

    /// Moves every exercise to the next round.
    pub fn next_round(&mut self) -> u32 {
        for tracker in &mut self.trackers {
            tracker.next_round();
        }
        self.current_round += 1;
        tracing::debug!(block_id = %self.block_id, round = self.current_round, "circuit round started");
        self.current_round
    }

    /// Rounds in which every exercise has at least one entry.
    pub fn rounds_completed(&self) -> u32 {
        if self.trackers.is_empty() {
            return 0;
        }
        (1..=self.current_round)
            .filter(|round| {
                self.trackers
                    .iter()
                    .all(|t| t.sets().iter().any(|s| s.round == *round))
            })
            .count() as u32
    }

    /// Seconds used so far, clamped to the time cap.
    pub fn elapsed_seconds(&self, workout_elapsed_seconds: u32) -> u32 {
        let elapsed = workout_elapsed_seconds.saturating_sub(self.started_at_seconds);
        match self.time_cap_seconds {
            Some(cap) => elapsed.min(cap),
            None => elapsed,
        }
    }

    /// Closes the window and builds the block's completion record.
    pub fn finish(&self, workout_elapsed_seconds: u32) -> CircuitCompletion {
        let raw_elapsed = workout_elapsed_seconds.saturating_sub(self.started_at_seconds);
        let time_cap_reached = match self.time_cap_seconds {
            Some(cap) => self.cap_reached || raw_elapsed >= cap,
            None => false,
        };

        let completion = CircuitCompletion {
            block_id: self.block_id.clone(),
            mode: self.mode,
            elapsed_seconds: match self.time_cap_seconds {
                Some(cap) if time_cap_reached => cap,
                _ => self.elapsed_seconds(workout_elapsed_seconds),
            },
            time_cap_seconds: self.time_cap_seconds,
            time_cap_reached,
            rounds_completed: self.rounds_completed(),
            target_rounds: self.target_rounds,
            exercises: self
                .trackers
                .iter()
                .map(|t| ExerciseCompletion {
                    exercise_id: t.exercise_id().to_string(),
                    block_id: self.block_id.clone(),
                    status: CompletionStatus::Completed,
                    sets: t.sets().to_vec(),
                })
                .collect(),
        };

        tracing::info!(
            block_id = %completion.block_id,
            mode = completion.mode.as_str(),
            elapsed = completion.elapsed_seconds,
            rounds = completion.rounds_completed,
            partial = completion.is_partial(),
            "circuit block finished"
        );
        completion
    }

    /// Returns true if anything has been logged.
    pub fn has_entries(&self) -> bool {
        self.trackers.iter().any(|t| !t.sets().is_empty())
    }

    /// Moves the start of the window, as long as nothing was logged yet.
    pub fn reopen(&mut self, started_at_seconds: u32) -> bool {
        if self.has_entries() {
            return false;
        }
        self.started_at_seconds = started_at_seconds;
        true
    }

    pub fn block_id(&self) -> &str {
        &self.block_id
    }

    pub fn current_round(&self) -> u32 {
        self.current_round
    }

    /// Records that the cap countdown ran out.
    ///
    /// The countdown keeps running while the workout clock is paused, so the
    /// block counts as capped even if less workout time has passed.
    pub fn mark_time_cap_reached(&mut self) {
        self.cap_reached = true;
    }

    /// Set tracker of one exercise.
    pub fn tracker(&self, exercise_index: usize) -> Option<&SetTracker> {
        self.trackers.get(exercise_index)
    }

    fn tracker_mut(&mut self, exercise_index: usize) -> Result<&mut SetTracker, CircuitError> {
        let len = self.trackers.len();
        self.trackers
            .get_mut(exercise_index)
            .ok_or(CircuitError::ExerciseIndexOutOfRange {
                index: exercise_index,
                len,
            })
    }

    fn apply_values(
        tracker: &mut SetTracker,
        index: usize,
        reps: Option<u32>,
        weight: Option<f64>,
    ) -> Result<(), CircuitError> {
        if let Some(reps) = reps {
            tracker.update_set(index, SetField::Reps(Some(reps)))?;
        }
        if let Some(weight) = weight {
            tracker.update_set(index, SetField::Weight(Some(weight)))?;
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
