//! Display utilities for the workout session CLI.
//!
//! This module provides formatted output for:
//! - Plan day overviews
//! - Simulation summaries
//! - Error messages

use super::SimulationReport;
use crate::types::{BlockExercise, LoggingType, PlanDay};

// ============================================================================
// Display
// ============================================================================

/// Display utilities for CLI output.
pub struct Display;

impl Display {
    /// Shows the blocks and exercises of a plan day.
    pub fn show_plan(plan: &PlanDay) {
        println!("Plan day {} ({})", plan.id, plan.date);
        println!("─────────────────────────────");
        if let Some(instructions) = &plan.instructions {
            println!("{}", instructions);
        }

        for block in &plan.blocks {
            println!();
            println!("{}", Self::block_heading(&block.name, block.mode.as_str(), block.time_cap_seconds));
            if block.exercises.is_empty() {
                println!("  (no exercises)");
            }
            for exercise in &block.exercises {
                let done = if exercise.completed { "x" } else { " " };
                println!("  [{}] {}", done, Self::describe_exercise(exercise));
            }
        }
        println!();
        println!("{} exercises in {} blocks", plan.exercise_count(), plan.blocks.len());
    }

    /// Shows the result of a simulated session.
    pub fn show_simulation(report: &SimulationReport) {
        println!("Simulated plan day {}", report.plan_day_id);
        println!("─────────────────────────────");
        println!("State: {}", report.final_state);
        let (minutes, seconds) = Self::format_time(report.elapsed_seconds);
        println!("Workout time: {}:{:02}", minutes, seconds);

        for record in &report.persisted {
            println!(
                "  {} {} ({} sets)",
                record.status.as_str(),
                record.exercise_id,
                record.sets.len()
            );
        }
        for circuit in &report.circuits {
            let partial = if circuit.is_partial() { ", partial" } else { "" };
            println!(
                "  circuit {}: {} rounds in {}s{}",
                circuit.block_id, circuit.rounds_completed, circuit.elapsed_seconds, partial
            );
        }

        println!("Skipped: {}", report.skipped);
        if report.unsynced > 0 {
            println!("! {} completions could not be saved", report.unsynced);
        }
        if let Some(job) = &report.regeneration {
            println!(
                "Regeneration job {}: {} ({}%)",
                job.id,
                job.status.as_str(),
                job.progress
            );
        }
    }

    /// Shows an error message.
    pub fn show_error(message: &str) {
        eprintln!("error: {}", message);
    }

    fn block_heading(name: &str, mode: &str, time_cap_seconds: Option<u32>) -> String {
        match time_cap_seconds {
            Some(cap) => {
                let (minutes, seconds) = Self::format_time(cap);
                format!("{} [{}, cap {}:{:02}]", name, mode, minutes, seconds)
            }
            None => format!("{} [{}]", name, mode),
        }
    }

    fn describe_exercise(exercise: &BlockExercise) -> String {
        let sets = exercise.required_sets();
        let target = match exercise.logging_type() {
            LoggingType::SetsReps => format!("{} x {}", sets, exercise.target_reps.unwrap_or(0)),
            LoggingType::DurationOnly => {
                format!("{}s", exercise.target_duration_seconds.unwrap_or(0))
            }
            LoggingType::SetsDuration => {
                format!("{} x {}s", sets, exercise.target_duration_seconds.unwrap_or(0))
            }
            LoggingType::Hybrid => format!(
                "{} x {} / {}s",
                sets,
                exercise.target_reps.unwrap_or(0),
                exercise.target_duration_seconds.unwrap_or(0)
            ),
        };
        match exercise.target_weight {
            Some(weight) => format!("{} {} @ {}", exercise.name(), target, weight),
            None => format!("{} {}", exercise.name(), target),
        }
    }

    /// Formats seconds as (minutes, seconds).
    fn format_time(total_seconds: u32) -> (u32, u32) {
        let minutes = total_seconds / 60;
        let seconds = total_seconds % 60;
        (minutes, seconds)
    }
}

// ============================================================================
// Tests
// ============================================================================
