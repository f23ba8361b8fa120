//! Workout Session CLI
//!
//! Runs plan days through the session engine from the terminal:
//! - `inspect` prints a plan day in execution order
//! - `simulate` walks it through a full session against an in-memory backend

use std::path::Path;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};

use workout_session::cli::{run_simulation, Cli, Commands, Display};
use workout_session::PlanDay;

/// Main entry point
#[tokio::main(flavor = "current_thread")]
async fn main() {
    // Parse command line arguments
    let cli = Cli::parse();

    // Initialize logging
    init_tracing(cli.verbose);

    // Execute command
    if let Err(e) = execute(cli).await {
        Display::show_error(&format!("{:#}", e));
        std::process::exit(1);
    }
}

/// Initializes the tracing subscriber for logging.
fn init_tracing(verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();
}

/// Executes the CLI command.
async fn execute(cli: Cli) -> Result<()> {
    match cli.command {
        Some(Commands::Inspect { plan }) => {
            let plan = read_plan(&plan)?.into_execution_order();
            Display::show_plan(&plan);
        }
        Some(Commands::Simulate(args)) => {
            let plan = read_plan(&args.plan)?;
            let report = run_simulation(plan, &args).await?;
            Display::show_simulation(&report);
        }
        Some(Commands::Completions { shell }) => {
            generate_completions(shell);
        }
        None => {
            // No command provided, show help
            Cli::command().print_help()?;
        }
    }

    Ok(())
}

/// Reads a plan day from a JSON file.
fn read_plan(path: &Path) -> Result<PlanDay> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("invalid plan day in {}", path.display()))
}

/// Generates shell completion scripts.
fn generate_completions(shell: clap_complete::Shell) {
    use clap_complete::generate;
    use std::io;

    let mut cmd = Cli::command();
    let bin_name = cmd.get_name().to_string();
    generate(shell, &mut cmd, bin_name, &mut io::stdout());
}

// ============================================================================
// Tests
// ============================================================================
