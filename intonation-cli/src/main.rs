//! # intonation-cli
//!
//! Drives a live intonation session from the default microphone and prints
//! every processed frame as one JSON line on stdout. Logs go to stderr, so
//! the output can be piped straight into a plotting tool.

mod reference;

use std::io::Write;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use cpal::traits::StreamTrait;
use intonation_core::audio::start_audio_capture;
use intonation_core::worker::LiveWorker;
use intonation_core::Session;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Live pitch tracking aligned to a reference recording.
#[derive(Parser, Debug)]
#[command(name = "intonation-cli")]
#[command(about = "Live pitch tracking aligned to a reference recording")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Capture from the default input device and print live pitch points
    Live {
        /// Engine configuration JSON (defaults when omitted)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Reference syllable list JSON
        #[arg(long)]
        reference: Option<PathBuf>,

        /// Reference pitch curve JSON, used for cents deviation
        #[arg(long)]
        curve: Option<PathBuf>,

        /// Stop after this many seconds (runs until killed otherwise)
        #[arg(long)]
        seconds: Option<f64>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    match args.command {
        Command::Live { config, reference, curve, seconds } => {
            run_live(config, reference, curve, seconds)
        }
    }
}

fn run_live(
    config: Option<PathBuf>,
    reference: Option<PathBuf>,
    curve: Option<PathBuf>,
    seconds: Option<f64>,
) -> Result<()> {
    let config = reference::load_config(config.as_deref())?;
    let mut session = Session::new(config.clone()).context("failed to create session")?;

    if let Some(path) = reference.as_deref() {
        let syllables = reference::load_syllables(path)?;
        info!(syllables = syllables.len(), "loaded reference syllables");
        session.set_reference(syllables);
    }
    if let Some(path) = curve.as_deref() {
        let curve = reference::load_curve(path)?;
        info!(points = curve.points().len(), "loaded reference curve");
        session.set_reference_curve(Some(curve));
    }

    let worker = LiveWorker::spawn(session);
    let results = worker.result_slot();
    let (stream, sample_rate) = start_audio_capture(&config, worker.frame_slot())?;
    info!(sample_rate, "capture started");

    let deadline = match seconds {
        Some(secs) if secs.is_finite() && secs > 0.0 => Some(Instant::now() + Duration::from_secs_f64(secs)),
        Some(secs) => {
            warn!(secs, "ignoring non-positive duration");
            None
        }
        None => None,
    };

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    while deadline.is_none_or(|d| Instant::now() < d) {
        if let Some(point) = results.take_timeout(Duration::from_millis(50)) {
            let line = serde_json::to_string(&point).context("failed to encode pitch point")?;
            if writeln!(out, "{}", line).is_err() {
                // Downstream closed the pipe.
                break;
            }
        }
    }

    if let Err(e) = stream.pause() {
        warn!("failed to pause input stream: {}", e);
    }
    drop(stream);

    let dropped = worker.dropped_frames();
    match worker.stop() {
        Some((_, summary)) => {
            info!(dropped_frames = dropped, "take finished");
            let line = serde_json::to_string(&summary).context("failed to encode summary")?;
            writeln!(out, "{}", line).ok();
        }
        None => warn!("worker did not return a session"),
    }
    Ok(())
}
