//! scinsim CLI
//!
//! Replays recorded transport output through the hit aggregator and the
//! selective event loop.
#![allow(
    clippy::uninlined_format_args,
    clippy::cast_possible_truncation,
    clippy::too_many_lines
)]

mod replay;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use clap::{Args, Parser, Subcommand};
use log::{info, warn};
use scinsim_core::RunSummary;
use scinsim_sim::{
    AggregatorConfig, EventLoop, LoopConfig, ParallelEventLoop, ProgressConfig, RetentionConfig,
    RetentionPolicy,
};
use serde::Deserialize;
use thiserror::Error;

use replay::{
    count_hits, load_recording, write_events, CollectingSink, RecordedEvent, ReplayEngine,
};

/// Result type for CLI operations.
type Result<T> = std::result::Result<T, CliError>;

/// CLI error types.
#[derive(Error, Debug)]
enum CliError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Core error: {0}")]
    Core(#[from] scinsim_core::Error),

    #[error("no recorded event satisfies the {0} retention policy")]
    NoAcceptableEvents(RetentionPolicy),
}

/// Retention flags, mirroring the run configuration.
#[derive(Args, Debug, Clone)]
#[allow(clippy::struct_excessive_bools)]
struct RetentionArgs {
    /// Discard and regenerate events in which a particle escaped the world
    #[arg(long)]
    kill_escaping: bool,

    /// Keep only events with a registered multiplicity signature
    #[arg(long)]
    save_selected: bool,

    /// Signature for --save-selected: two gammas
    #[arg(long = "save-2g")]
    save_2g: bool,

    /// Signature for --save-selected: three gammas
    #[arg(long = "save-3g")]
    save_3g: bool,
}

impl From<&RetentionArgs> for RetentionConfig {
    fn from(args: &RetentionArgs) -> Self {
        RetentionConfig::default()
            .with_kill_escaping(args.kill_escaping)
            .with_save_selected(args.save_selected)
            .with_save_2g(args.save_2g)
            .with_save_3g(args.save_3g)
    }
}

/// Scintillator hit aggregation and selective event loop.
#[derive(Parser)]
#[command(name = "scinsim")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a recording and write the hits of accepted events
    Replay {
        /// Recorded events (JSON)
        input: PathBuf,

        /// Output file path (JSON)
        #[arg(short, long)]
        output: PathBuf,

        /// Run configuration file (JSON); replaces the flags below
        #[arg(long)]
        config: Option<PathBuf>,

        /// Number of events to accept (defaults to the recording length)
        #[arg(short = 'n', long)]
        events: Option<u64>,

        /// Number of worker threads
        #[arg(short, long, default_value = "1")]
        workers: usize,

        /// Number of scintillators
        #[arg(long, default_value = "192")]
        elements: usize,

        /// Hit merge window (nanoseconds)
        #[arg(long, default_value = "5.0")]
        window_ns: f64,

        /// Report processed events every 10^N events
        #[arg(long, default_value = "3")]
        print_power: u32,

        /// Do not report processed events
        #[arg(long)]
        no_statistics: bool,

        /// Report completed percentage (debug level)
        #[arg(long)]
        progress: bool,

        #[command(flatten)]
        retention: RetentionArgs,
    },

    /// Validate retention flags and show the resolved policy
    CheckConfig {
        #[command(flatten)]
        retention: RetentionArgs,
    },

    /// Show information about a recording
    Info {
        /// Recorded events (JSON)
        input: PathBuf,
    },
}

/// Run configuration file.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RunFile {
    aggregator: AggregatorConfig,
    event_loop: LoopConfig,
}

fn read_run_file(path: &Path) -> Result<RunFile> {
    let text = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}

fn ensure_acceptable(events: &[RecordedEvent], policy: RetentionPolicy) -> Result<()> {
    if events.iter().any(|event| policy.accepts(&event.outcome)) {
        Ok(())
    } else {
        Err(CliError::NoAcceptableEvents(policy))
    }
}

fn print_summary(summary: &RunSummary, elapsed_secs: f64) {
    println!("Processed {} events in {:.2}s", summary.accepted, elapsed_secs);
    println!("Attempted: {}", summary.attempted);
    println!("Rejected: {}", summary.rejected());
    println!("Acceptance: {:.3}", summary.acceptance_ratio());
    if summary.aborted_early {
        println!("Run aborted before {} events", summary.requested);
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    match cli.command {
        Commands::Replay {
            input,
            output,
            config,
            events,
            workers,
            elements,
            window_ns,
            print_power,
            no_statistics,
            progress,
            retention,
        } => {
            let (aggregator, loop_config) = if let Some(path) = config {
                info!("Reading configuration: {}", path.display());
                let file = read_run_file(&path)?;
                (file.aggregator, file.event_loop)
            } else {
                let aggregator = AggregatorConfig::default()
                    .with_element_count(elements)
                    .with_time_merge_window(window_ns);
                let loop_config = LoopConfig::default()
                    .with_retention(RetentionConfig::from(&retention))
                    .with_progress(
                        ProgressConfig::default()
                            .with_power(print_power)
                            .with_print_statistics(!no_statistics)
                            .with_show_progress(progress),
                    );
                (aggregator, loop_config)
            };

            let recording = Arc::new(load_recording(&input)?);
            let target = events.unwrap_or(recording.len() as u64);
            info!(
                "Loaded {} recorded events from {}",
                recording.len(),
                input.display()
            );

            let start = Instant::now();
            let stored = if workers <= 1 {
                let mut event_loop = EventLoop::new(&loop_config, aggregator)?;
                ensure_acceptable(&recording, event_loop.policy())?;

                let mut engine = ReplayEngine::new(Arc::clone(&recording), 0);
                let mut sink = CollectingSink::default();
                let summary = event_loop.run(&mut engine, &mut sink, target)?;
                print_summary(&summary, start.elapsed().as_secs_f64());
                sink.events
            } else {
                let parallel = ParallelEventLoop::new(&loop_config, aggregator, workers)?;
                ensure_acceptable(&recording, parallel.policy())?;

                let outcome = parallel.run(
                    target,
                    |worker| {
                        Ok((
                            ReplayEngine::new(Arc::clone(&recording), worker),
                            CollectingSink::default(),
                        ))
                    },
                    |summary| {
                        print_summary(summary, start.elapsed().as_secs_f64());
                        Ok(())
                    },
                )?;
                outcome
                    .sinks
                    .into_iter()
                    .flat_map(|sink| sink.events)
                    .collect()
            };

            let (hits, primary_hits) = count_hits(&stored);
            println!("Hits: {} ({} from primaries)", hits, primary_hits);
            let written = write_events(&output, stored)?;
            info!("Wrote {} events to {}", written, output.display());
        }

        Commands::CheckConfig { retention } => {
            let policy = RetentionConfig::from(&retention).resolve()?;
            println!("Retention policy: {}", policy);
            if policy.may_retry() {
                warn!("rejected events are regenerated without limit");
            }
        }

        Commands::Info { input } => {
            let recording = load_recording(&input)?;
            let steps: usize = recording.iter().map(|event| event.steps.len()).sum();
            let aborted = recording.iter().filter(|e| e.outcome.aborted).count();
            let two = recording.iter().filter(|e| e.outcome.registered_2g).count();
            let three = recording.iter().filter(|e| e.outcome.registered_3g).count();

            println!("File: {}", input.display());
            println!("Recorded events: {}", recording.len());
            println!("Steps: {}", steps);
            println!("Aborted: {}", aborted);
            println!("2g registered: {}", two);
            println!("3g registered: {}", three);
        }
    }

    Ok(())
}
