//! Command definitions for the workout session CLI.
//!
//! Uses clap derive macro for argument parsing.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

// ============================================================================
// CLI Structure
// ============================================================================

/// Workout session CLI
#[derive(Parser, Debug)]
#[command(
    name = "workout-session",
    version,
    about = "Walk a workout plan day through the session engine",
    long_about = "Inspect a plan day exported as JSON, or run it through the session \
                  controller against an in-memory backend to see what would be saved.",
    propagate_version = true
)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Enable verbose output for debugging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

// ============================================================================
// Subcommands
// ============================================================================

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Show the blocks and exercises of a plan day in execution order
    Inspect {
        /// Plan day JSON file
        #[arg(value_name = "PLAN")]
        plan: PathBuf,
    },

    /// Run a plan day through a full session
    Simulate(SimulateArgs),

    /// Generate shell completion scripts
    Completions {
        /// Shell type for completion script
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

// ============================================================================
// Simulate Command Arguments
// ============================================================================

/// Arguments for the simulate command
#[derive(Args, Debug, Clone, Default)]
pub struct SimulateArgs {
    /// Plan day JSON file
    #[arg(value_name = "PLAN")]
    pub plan: PathBuf,

    /// Skip the exercise with this id (repeatable)
    #[arg(short, long = "skip", value_name = "EXERCISE_ID")]
    pub skip: Vec<String>,

    /// Make every save fail, leaving completions queued
    #[arg(long)]
    pub fail_persist: bool,

    /// Request a regeneration of the day afterwards with this feedback
    #[arg(short, long, value_parser = validate_feedback)]
    pub regenerate: Option<String>,
}

// ============================================================================
// Validation Functions
// ============================================================================

/// Validates regeneration feedback.
///
/// - Must not be blank
/// - Must not exceed 500 characters
fn validate_feedback(s: &str) -> Result<String, String> {
    if s.trim().is_empty() {
        return Err("feedback cannot be empty".to_string());
    }
    if s.chars().count() > 500 {
        return Err("feedback must be 500 characters or fewer".to_string());
    }
    Ok(s.to_string())
}

// ============================================================================
// Tests
// ============================================================================
