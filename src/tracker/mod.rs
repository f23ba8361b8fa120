//! Per-exercise set tracking.
//!
//! A [`SetTracker`] owns the set records of one exercise. It keeps set
//! numbers contiguous within each round, pre-fills new sets from the last
//! logged set, and derives completion from the exercise targets.

mod error;

pub use error::TrackerError;

use crate::types::{BlockExercise, LoggingType, SetRecord};

/// A user edit to one field of a logged set.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SetField {
    /// Weight used (`None` clears it)
    Weight(Option<f64>),
    /// Reps performed (`None` clears it)
    Reps(Option<u32>),
}

impl SetField {
    fn name(&self) -> &'static str {
        match self {
            SetField::Weight(_) => "weight",
            SetField::Reps(_) => "reps",
        }
    }
}

/// Mutable set log for one exercise.
#[derive(Debug, Clone, PartialEq)]
pub struct SetTracker {
    exercise_id: String,
    logging_type: LoggingType,
    required_sets: u32,
    target_reps: Option<u32>,
    target_weight: Option<f64>,
    target_duration_seconds: Option<u32>,
    current_round: u32,
    sets: Vec<SetRecord>,
}

impl SetTracker {
    /// Creates an empty tracker for the given exercise.
    pub fn new(exercise: &BlockExercise) -> Self {
        Self {
            exercise_id: exercise.id.clone(),
            logging_type: exercise.logging_type(),
            required_sets: exercise.required_sets(),
            target_reps: exercise.target_reps,
            target_weight: exercise.target_weight,
            target_duration_seconds: exercise.target_duration_seconds,
            current_round: 1,
            sets: Vec::new(),
        }
    }

    /// Logs a new set in the current round and returns its index.
    ///
    /// The first set starts from the exercise targets; later sets copy the
    /// weight and reps of the set logged just before.
    pub fn add_set(&mut self) -> usize {
        let (weight, reps) = match self.sets.last() {
            Some(prev) => (prev.weight, prev.reps),
            None => (self.target_weight, self.default_reps()),
        };
        let set_number = self.sets_in_round(self.current_round) + 1;

        self.sets.push(SetRecord {
            round: self.current_round,
            set_number,
            weight,
            reps,
            duration_completed: None,
            is_completed: false,
        });
        tracing::debug!(
            exercise_id = %self.exercise_id,
            round = self.current_round,
            set_number,
            "set added"
        );
        self.sets.len() - 1
    }

    /// Applies a user edit to one set.
    pub fn update_set(&mut self, index: usize, field: SetField) -> Result<(), TrackerError> {
        let logging_type = self.logging_type;
        let len = self.sets.len();
        let set = self
            .sets
            .get_mut(index)
            .ok_or(TrackerError::SetIndexOutOfRange { index, len })?;

        match field {
            SetField::Weight(weight) => {
                if let Some(w) = weight {
                    if !w.is_finite() || w < 0.0 {
                        return Err(TrackerError::InvalidValue(format!("weight {}", w)));
                    }
                }
                set.weight = weight;
            }
            SetField::Reps(reps) => {
                if !logging_type.accepts_reps() {
                    return Err(TrackerError::FieldNotEditable {
                        field: field.name(),
                        logging_type,
                    });
                }
                set.reps = reps;
            }
        }
        Ok(())
    }

    /// Removes a set and renumbers the remaining sets of its round.
    pub fn remove_set(&mut self, index: usize) -> Result<SetRecord, TrackerError> {
        if index >= self.sets.len() {
            return Err(TrackerError::SetIndexOutOfRange {
                index,
                len: self.sets.len(),
            });
        }
        let removed = self.sets.remove(index);
        self.renumber();
        Ok(removed)
    }

    /// Restores a set's values to the exercise targets.
    pub fn reset_set_to_target(&mut self, index: usize) -> Result<(), TrackerError> {
        let reps = self.default_reps();
        let weight = self.target_weight;
        let len = self.sets.len();
        let set = self
            .sets
            .get_mut(index)
            .ok_or(TrackerError::SetIndexOutOfRange { index, len })?;

        set.weight = weight;
        set.reps = reps;
        set.duration_completed = None;
        set.is_completed = false;
        Ok(())
    }

    /// Starts a new round. Round numbers never go back.
    pub fn next_round(&mut self) -> u32 {
        self.current_round += 1;
        self.current_round
    }

    /// Records the time a timed set took and marks it completed.
    ///
    /// Only the timer completion path calls this; users cannot type a
    /// duration.
    pub(crate) fn record_duration(&mut self, index: usize, seconds: u32) -> Result<(), TrackerError> {
        let len = self.sets.len();
        let set = self
            .sets
            .get_mut(index)
            .ok_or(TrackerError::SetIndexOutOfRange { index, len })?;
        set.duration_completed = Some(seconds);
        set.is_completed = true;
        Ok(())
    }

    /// Number of sets that count towards completion.
    pub fn completed_set_count(&self) -> usize {
        if self.logging_type.is_duration_based() {
            self.sets.iter().filter(|s| s.is_completed).count()
        } else {
            self.sets.len()
        }
    }

    /// Returns true once the target set count has been reached.
    pub fn is_complete(&self) -> bool {
        self.completed_set_count() >= self.required_sets as usize
    }

    pub fn sets(&self) -> &[SetRecord] {
        &self.sets
    }

    pub fn exercise_id(&self) -> &str {
        &self.exercise_id
    }

    pub fn logging_type(&self) -> LoggingType {
        self.logging_type
    }

    pub fn current_round(&self) -> u32 {
        self.current_round
    }

    pub fn required_sets(&self) -> u32 {
        self.required_sets
    }

    pub fn target_duration_seconds(&self) -> Option<u32> {
        self.target_duration_seconds
    }

    fn default_reps(&self) -> Option<u32> {
        if self.logging_type.accepts_reps() {
            self.target_reps
        } else {
            None
        }
    }

    fn sets_in_round(&self, round: u32) -> u32 {
        self.sets.iter().filter(|s| s.round == round).count() as u32
    }

    fn renumber(&mut self) {
        let mut round = 0;
        let mut number = 0;
        for set in &mut self.sets {
            if set.round != round {
                round = set.round;
                number = 0;
            }
            number += 1;
            set.set_number = number;
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
