//! tide — drive synthetic workloads through an elastic pool.
//!
//! ```text
//! tide run --preset fixed --size 4 --jobs 200 --job-ms 25 --priorities 3
//! tide run --config demos/burst.toml --blocking
//! tide presets
//! ```

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(
    name = "tide",
    about = "Tidepool — elastic priority task pool",
    version,
    propagate_version = true,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a synthetic workload through a pool and print its statistics.
    ///
    /// The pool comes from --config, or --preset (cached, fixed, single),
    /// or the cached preset when neither is given.
    Run {
        /// Pool config file with a [pool] table
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Preset name: cached, fixed or single
        #[arg(short, long, conflicts_with = "config")]
        preset: Option<String>,
        /// Worker count for the fixed preset
        #[arg(short, long)]
        size: Option<usize>,
        /// Number of jobs to submit
        #[arg(short, long, default_value = "100")]
        jobs: usize,
        /// How long each job sleeps, in milliseconds
        #[arg(long, default_value = "20")]
        job_ms: u64,
        /// Spread jobs round-robin over this many priority levels
        #[arg(long, default_value = "1")]
        priorities: u32,
        /// Run jobs as blocking closures instead of async sleeps
        #[arg(long)]
        blocking: bool,
        /// Progress report interval, in milliseconds
        #[arg(long, default_value = "250")]
        report_ms: u64,
    },
    /// Print the built-in presets as TOML
    Presets {
        /// Worker count shown for the fixed preset
        #[arg(short, long, default_value = "4")]
        size: usize,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,tide=debug")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            preset,
            size,
            jobs,
            job_ms,
            priorities,
            blocking,
            report_ms,
        } => {
            let args = commands::run::RunArgs {
                config,
                preset,
                size,
                jobs,
                job_ms,
                priorities,
                blocking,
                report_ms,
            };
            commands::run::run(args).await
        }
        Commands::Presets { size } => commands::presets::print(size),
    }
}
