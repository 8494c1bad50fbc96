//! punar-io - replays recorded timeseries sensor data over TCP and UDP.
//!
//! Records come from CSV, JSON or CRLX files and are emitted onto the
//! network as if produced live: timestamps rewritten to the current wall
//! clock, pacing driven by a per-stream interval, one thread per stream.

mod cli;

use clap::Parser;
use punar_io::config::{StreamConfig, load_config};
use punar_io::error::Result;
use punar_io::playback::{PlaybackReport, PlaybackSupervisor, StreamOutcome};
use std::sync::atomic::Ordering;

fn main() {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = cli::Cli::parse();
    match run(cli) {
        Ok(report) => {
            print_summary(&report);
            if !report.all_completed() {
                std::process::exit(1);
            }
        }
        Err(e) => {
            log::error!("{}", e);
            std::process::exit(1);
        }
    }
}

fn run(cli: cli::Cli) -> Result<PlaybackReport> {
    let streams: Vec<StreamConfig> = match cli.command {
        cli::Command::Stream(args) => vec![args.into_stream_config()?],
        cli::Command::Config(args) => {
            log::info!("Using config: {}", args.config.display());
            load_config(&args.config)?
        }
    };

    log::info!(
        "punar-io v{} starting {} stream(s)...",
        env!("CARGO_PKG_VERSION"),
        streams.len()
    );

    let mut supervisor = PlaybackSupervisor::new();

    // First Ctrl-C asks the players to wind down, a second one gives up
    let cancel = supervisor.cancel_flag();
    ctrlc::set_handler(move || {
        if cancel.swap(true, Ordering::Relaxed) {
            log::warn!("Second shutdown signal, exiting immediately");
            std::process::exit(130);
        }
        log::info!("Received shutdown signal");
    })
    .map_err(|e| punar_io::Error::Other(format!("Error setting Ctrl-C handler: {}", e)))?;

    supervisor.start(streams);
    Ok(supervisor.wait())
}

fn print_summary(report: &PlaybackReport) {
    println!("Playback finished:");
    for stream in &report.streams {
        let status = match &stream.outcome {
            StreamOutcome::Completed { records_sent } => {
                format!("completed, {} records", records_sent)
            }
            StreamOutcome::Cancelled { records_sent } => {
                format!("cancelled, {} records", records_sent)
            }
            StreamOutcome::Failed { records_sent, error } => {
                format!("failed after {} records: {}", records_sent, error)
            }
            StreamOutcome::Stalled => "forcibly terminated".to_string(),
        };
        println!("  {}: {}", stream.name, status);
    }
    println!("Total records sent: {}", report.total_records());
}
