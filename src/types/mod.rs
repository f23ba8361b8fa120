//! Core data types for the workout session.
//!
//! This module defines the data structures used for:
//! - Plan days, blocks and block exercises as delivered by the backend
//! - Logged set records and exercise completion payloads
//! - Background job wire types (see [`job`])
//! - Session and job tracker configuration (see [`config`])

pub mod config;
pub mod job;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub use config::{JobTrackerConfig, SessionConfig};
pub use job::{BackgroundJob, JobStartResponse, JobStatus, JobStatusReport, JobType};

// ============================================================================
// BlockMode
// ============================================================================

/// Execution mode shared by every exercise in a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockMode {
    /// Classic sets and reps, one exercise at a time
    Traditional,
    /// As many rounds as possible within the time cap
    Amrap,
    /// Every minute on the minute
    Emom,
    /// Fixed work completed as fast as possible
    ForTime,
    /// Generic circuit of exercises performed back to back
    Circuit,
    /// Tabata intervals
    Tabata,
    /// Warm-up block
    Warmup,
    /// Cool-down block
    Cooldown,
    /// Paired exercises alternated set by set
    Superset,
    /// Mobility or yoga flow
    Flow,
}

impl BlockMode {
    /// Returns the string representation of the mode.
    pub fn as_str(&self) -> &'static str {
        match self {
            BlockMode::Traditional => "traditional",
            BlockMode::Amrap => "amrap",
            BlockMode::Emom => "emom",
            BlockMode::ForTime => "for_time",
            BlockMode::Circuit => "circuit",
            BlockMode::Tabata => "tabata",
            BlockMode::Warmup => "warmup",
            BlockMode::Cooldown => "cooldown",
            BlockMode::Superset => "superset",
            BlockMode::Flow => "flow",
        }
    }

    /// Returns true if the block is logged as one timed unit.
    pub fn is_circuit(&self) -> bool {
        matches!(
            self,
            BlockMode::Amrap
                | BlockMode::Emom
                | BlockMode::ForTime
                | BlockMode::Circuit
                | BlockMode::Tabata
        )
    }
}

impl Default for BlockMode {
    fn default() -> Self {
        BlockMode::Traditional
    }
}

// ============================================================================
// LoggingType
// ============================================================================

/// How an exercise is logged, derived from which targets are populated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoggingType {
    /// Weight and reps per set
    SetsReps,
    /// A single timed effort
    DurationOnly,
    /// Several timed sets
    SetsDuration,
    /// Both reps and a duration target
    Hybrid,
}

impl LoggingType {
    /// Returns the string representation of the logging type.
    pub fn as_str(&self) -> &'static str {
        match self {
            LoggingType::SetsReps => "sets_reps",
            LoggingType::DurationOnly => "duration_only",
            LoggingType::SetsDuration => "sets_duration",
            LoggingType::Hybrid => "hybrid",
        }
    }

    /// Returns true if sets are completed through the exercise timer.
    pub fn is_duration_based(&self) -> bool {
        !matches!(self, LoggingType::SetsReps)
    }

    /// Returns true if reps may be entered directly by the user.
    pub fn accepts_reps(&self) -> bool {
        matches!(self, LoggingType::SetsReps | LoggingType::Hybrid)
    }
}

// ============================================================================
// Exercise / BlockExercise
// ============================================================================

/// Reference to an exercise in the exercise library.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Exercise {
    /// Library id
    pub id: String,
    /// Display name
    pub name: String,
    /// Primary muscle group (if known)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub muscle_group: Option<String>,
}

/// An exercise placed in a block, with block-specific targets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockExercise {
    /// Id of this placement (used when persisting completion)
    pub id: String,
    /// The referenced exercise
    pub exercise: Exercise,
    /// Target number of sets
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_sets: Option<u32>,
    /// Target reps per set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_reps: Option<u32>,
    /// Target weight per set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_weight: Option<f64>,
    /// Target duration per set in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_duration_seconds: Option<u32>,
    /// Rest between sets in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rest_seconds: Option<u32>,
    /// Whether the backend already recorded this exercise as done
    #[serde(default)]
    pub completed: bool,
}

impl BlockExercise {
    /// Creates a sets-and-reps exercise.
    pub fn sets_reps(id: impl Into<String>, name: impl Into<String>, sets: u32, reps: u32) -> Self {
        let id = id.into();
        Self {
            exercise: Exercise {
                id: format!("ex-{}", id),
                name: name.into(),
                muscle_group: None,
            },
            id,
            target_sets: Some(sets),
            target_reps: Some(reps),
            target_weight: None,
            target_duration_seconds: None,
            rest_seconds: None,
            completed: false,
        }
    }

    /// Creates a timed exercise.
    pub fn timed(id: impl Into<String>, name: impl Into<String>, seconds: u32) -> Self {
        let id = id.into();
        Self {
            exercise: Exercise {
                id: format!("ex-{}", id),
                name: name.into(),
                muscle_group: None,
            },
            id,
            target_sets: None,
            target_reps: None,
            target_weight: None,
            target_duration_seconds: Some(seconds),
            rest_seconds: None,
            completed: false,
        }
    }

    /// Sets the target weight.
    pub fn with_weight(mut self, weight: f64) -> Self {
        self.target_weight = Some(weight);
        self
    }

    /// Sets the target number of sets.
    pub fn with_sets(mut self, sets: u32) -> Self {
        self.target_sets = Some(sets);
        self
    }

    /// Sets the rest time in seconds.
    pub fn with_rest(mut self, seconds: u32) -> Self {
        self.rest_seconds = Some(seconds);
        self
    }

    /// Derives the logging type from the populated targets.
    ///
    /// Reps and a duration together make a hybrid; a duration with a set
    /// count above one is logged as timed sets; any other duration is a
    /// single timed effort. Everything else is sets and reps.
    pub fn logging_type(&self) -> LoggingType {
        let has_reps = self.target_reps.is_some();
        let has_duration = self.target_duration_seconds.is_some();
        let multi_set = self.target_sets.map(|s| s > 1).unwrap_or(false);

        match (has_reps, has_duration) {
            (true, true) => LoggingType::Hybrid,
            (false, true) if multi_set => LoggingType::SetsDuration,
            (false, true) => LoggingType::DurationOnly,
            _ => LoggingType::SetsReps,
        }
    }

    /// Number of sets required for completion (at least one).
    pub fn required_sets(&self) -> u32 {
        self.target_sets.unwrap_or(1).max(1)
    }

    /// Display name of the referenced exercise.
    pub fn name(&self) -> &str {
        &self.exercise.name
    }
}

// ============================================================================
// Block / PlanDay
// ============================================================================

/// A named group of exercises sharing an execution mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    /// Block id
    pub id: String,
    /// Display name
    pub name: String,
    /// Execution mode
    #[serde(default)]
    pub mode: BlockMode,
    /// Position within the plan day
    #[serde(default)]
    pub order: i32,
    /// Number of rounds (circuit modes)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rounds: Option<u32>,
    /// Time cap in seconds (circuit modes)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_cap_seconds: Option<u32>,
    /// Exercises in execution order
    #[serde(default)]
    pub exercises: Vec<BlockExercise>,
}

impl Block {
    /// Creates an empty block.
    pub fn new(id: impl Into<String>, name: impl Into<String>, mode: BlockMode, order: i32) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            mode,
            order,
            rounds: None,
            time_cap_seconds: None,
            exercises: Vec::new(),
        }
    }

    /// Adds an exercise to the block.
    pub fn with_exercise(mut self, exercise: BlockExercise) -> Self {
        self.exercises.push(exercise);
        self
    }

    /// Sets the time cap in seconds.
    pub fn with_time_cap(mut self, seconds: u32) -> Self {
        self.time_cap_seconds = Some(seconds);
        self
    }

    /// Sets the number of rounds.
    pub fn with_rounds(mut self, rounds: u32) -> Self {
        self.rounds = Some(rounds);
        self
    }

    /// Returns true if the block is completed as a single timed unit.
    pub fn is_circuit(&self) -> bool {
        self.mode.is_circuit()
    }
}

/// One calendar day's assigned workout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanDay {
    /// Plan day id
    pub id: String,
    /// Calendar date
    pub date: NaiveDate,
    /// Coach instructions for the day
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
    /// Whether the whole day has been completed
    #[serde(default)]
    pub is_completed: bool,
    /// Blocks (not necessarily sorted)
    #[serde(default)]
    pub blocks: Vec<Block>,
}

impl PlanDay {
    /// Creates an empty plan day.
    pub fn new(id: impl Into<String>, date: NaiveDate) -> Self {
        Self {
            id: id.into(),
            date,
            instructions: None,
            is_completed: false,
            blocks: Vec::new(),
        }
    }

    /// Adds a block.
    pub fn with_block(mut self, block: Block) -> Self {
        self.blocks.push(block);
        self
    }

    /// Sorts blocks by `order`, keeping source order for ties.
    pub fn into_execution_order(mut self) -> Self {
        // sort_by_key is stable
        self.blocks.sort_by_key(|b| b.order);
        self
    }

    /// Total number of exercises across all blocks.
    pub fn exercise_count(&self) -> usize {
        self.blocks.iter().map(|b| b.exercises.len()).sum()
    }
}

// ============================================================================
// SetRecord
// ============================================================================

/// One logged attempt at an exercise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetRecord {
    /// Round this set belongs to (1-based, never renumbered)
    pub round: u32,
    /// Set number within the round (1-based, contiguous)
    pub set_number: u32,
    /// Weight used
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
    /// Reps performed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reps: Option<u32>,
    /// Seconds completed (duration exercises)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_completed: Option<u32>,
    /// Whether the timed set was completed (duration exercises)
    #[serde(default)]
    pub is_completed: bool,
}

// ============================================================================
// Completion payloads
// ============================================================================

/// Status persisted for an exercise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionStatus {
    /// The exercise was performed (possibly below target)
    Completed,
    /// The exercise was skipped
    Skipped,
}

impl CompletionStatus {
    /// Returns the string representation of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            CompletionStatus::Completed => "completed",
            CompletionStatus::Skipped => "skipped",
        }
    }
}

/// Payload sent to the backend when an exercise is finished.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExerciseCompletion {
    /// Block exercise id
    pub exercise_id: String,
    /// Block the exercise belongs to
    pub block_id: String,
    /// Completed or skipped
    pub status: CompletionStatus,
    /// Logged sets (empty when skipped)
    pub sets: Vec<SetRecord>,
}

// ============================================================================
// Tests
// ============================================================================
