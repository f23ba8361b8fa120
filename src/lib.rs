//! Workout Session Library
//!
//! This library provides the core of a guided workout session.
//! It includes:
//! - Timer service for workout, rest and exercise countdowns
//! - Set tracking per exercise and block-level circuit recording
//! - Session controller that walks a plan day block by block
//! - Background job tracker for plan generation
//! - Backend and local notification interfaces, with in-memory implementations
//! - CLI command parsing and display utilities

pub mod api;
pub mod circuit;
pub mod cli;
pub mod jobs;
pub mod notification;
pub mod session;
pub mod timer;
pub mod tracker;
pub mod types;

// Re-export commonly used types for convenience
pub use types::{
    BackgroundJob, Block, BlockExercise, BlockMode, CompletionStatus, ExerciseCompletion,
    JobStatus, JobTrackerConfig, JobType, LoggingType, PlanDay, SessionConfig, SetRecord,
};

pub use api::{ApiError, InMemoryWorkoutApi, WorkoutApi};
pub use circuit::{CircuitCompletion, CircuitEngine, CircuitError};
pub use jobs::{JobError, JobEvent, JobLauncher, JobTracker};
pub use notification::{
    LocalNotification, MockNotificationScheduler, NotificationError, NotificationScheduler,
};
pub use session::{
    Advance, LoadOutcome, SessionController, SessionError, SessionEvent, SessionSnapshot,
    SessionState, WorkoutSession,
};
pub use timer::{TimerService, TimerSnapshot};
pub use tracker::{SetField, SetTracker, TrackerError};
