//! CLI module for the workout session tool.
//!
//! This module provides the command-line interface:
//! - `commands`: Command definitions using clap derive
//! - `simulate`: Offline session runs against the in-memory backend
//! - `display`: Output formatting and display logic

pub mod commands;
pub mod display;
pub mod simulate;

pub use commands::{Cli, Commands, SimulateArgs};
pub use display::Display;
pub use simulate::{run_simulation, SimulationReport};
