//! Demonstration: run a slow logging task 20 times across 5 slots.
//!
//! Each item sleeps `2000 + index * 100` ms and then logs its iteration
//! number. Usage:
//!
//! ```text
//! run-concurrently [TOTAL_RUNS] [CONCURRENCY]
//! ```
//!
//! Set `RUST_LOG=debug` to watch slots being refilled.

use std::process::ExitCode;
use std::time::Duration;

use bounded_runner::{BoundedRunner, ItemError, RunConfig, RunSpec, RunnerError};
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Run a slow logging task across a fixed number of slots.
#[derive(Parser, Debug)]
#[command(name = "run-concurrently")]
#[command(version, about, long_about = None)]
struct Args {
    /// Number of items to run
    #[arg(default_value_t = 20, allow_negative_numbers = true)]
    total_runs: i64,

    /// Maximum number of items in flight at once
    #[arg(default_value_t = 5, allow_negative_numbers = true)]
    concurrency: i64,
}

impl Args {
    fn run_config(&self) -> Result<RunConfig, RunnerError> {
        RunConfig::from_signed(self.total_runs, self.concurrency)
    }
}

async fn iteration(index: usize) -> Result<(), ItemError> {
    tokio::time::sleep(Duration::from_millis(2000 + index as u64 * 100)).await;
    tracing::info!("Iteration #{}", index);
    Ok(())
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(env_filter)
        .init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    init_tracing();

    let args = Args::parse();
    let config = match args.run_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::from(2);
        }
    };

    let spec = RunSpec::with_config(config, iteration);
    match BoundedRunner::new().run(spec).await {
        Ok(result) => {
            println!(
                "Completed {} of {} runs ({} failed, peak concurrency {})",
                result.completed_count,
                result.total_runs,
                result.failure_count(),
                result.peak_active
            );
            if result.has_failures() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            }
        }
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
