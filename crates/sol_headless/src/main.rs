//! Headless Sol RTS match runner.
//!
//! Runs seeded matches without graphics and prints checkpoint checksums
//! as JSON, for CI determinism checks and replay verification.
//!
//! # Usage
//!
//! ```bash
//! # Run a scripted skirmish and print the report
//! cargo run -p sol_headless -- run --seed 7 --ticks 1800 --skirmish
//!
//! # Record the same match to a replay file
//! cargo run -p sol_headless -- record --seed 7 --ticks 1800 --skirmish -o match.replay
//!
//! # Re-verify a replay's checkpoints
//! cargo run -p sol_headless -- verify match.replay
//! ```
//!
//! Reports go to stdout as a single JSON line; logs go to stderr.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod runner;

use runner::{record_to_file, run_match, verify_file, RunConfig};

#[derive(Parser)]
#[command(name = "sol_headless")]
#[command(about = "Headless Sol RTS match runner for CI and desync verification")]
#[command(version)]
struct Cli {
    /// Enable verbose logging to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Args)]
struct MatchArgs {
    /// World seed
    #[arg(short, long, default_value = "0")]
    seed: u64,

    /// Ticks to simulate
    #[arg(short, long, default_value = "1800")]
    ticks: u64,

    /// Fixed per-tick delta in seconds
    #[arg(long, default_value = "0.033333335")]
    tick_delta: f32,

    /// RON tuning override file
    #[arg(long)]
    tuning: Option<PathBuf>,

    /// Rally the starting armies at each other
    #[arg(long)]
    skirmish: bool,
}

impl MatchArgs {
    fn into_run_config(self) -> RunConfig {
        RunConfig {
            seed: self.seed,
            ticks: self.ticks,
            tick_delta: self.tick_delta,
            tuning: self.tuning,
            skirmish: self.skirmish,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Run a scripted match and print its checkpoint report
    Run {
        #[command(flatten)]
        args: MatchArgs,
    },

    /// Run a scripted match and save it as a replay file
    Record {
        #[command(flatten)]
        args: MatchArgs,

        /// Replay output path
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Verify every checkpoint of a recorded replay
    Verify {
        /// Replay file to verify
        replay: PathBuf,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Run { args } => run_match(&args.into_run_config()),
        Commands::Record { args, output } => {
            let report = record_to_file(&args.into_run_config(), &output);
            if report.is_ok() {
                tracing::info!(path = %output.display(), "replay saved");
            }
            report
        }
        Commands::Verify { replay } => verify_file(&replay),
    };

    match result {
        Ok(report) => {
            tracing::info!(
                final_tick = report.final_tick,
                final_checksum = report.final_checksum,
                "match finished"
            );
            match serde_json::to_string(&report) {
                Ok(line) => {
                    println!("{line}");
                    ExitCode::SUCCESS
                }
                Err(e) => {
                    tracing::error!(error = %e, "failed to encode report");
                    ExitCode::FAILURE
                }
            }
        }
        Err(e) => {
            tracing::error!(error = %e, "match failed");
            ExitCode::FAILURE
        }
    }
}
