//! Command-line front end for the motion pipeline.
//!
//! Two modes:
//! - `stream` runs the continuous pipeline against CSV recordings or the
//!   built-in synthetic source, printing one prediction block per classified
//!   window.
//! - `classify` scores the first full window of a recording once and exits.
//!
//! # Usage
//!
//! ```bash
//! motion-daq stream --synthetic -n 20
//! motion-daq stream --csv wave.csv --csv idle.csv
//! motion-daq classify updown.csv
//! ```

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use tracing::error;
use tracing_subscriber::EnvFilter;

use motion_daq::{
    slot_pair, spawn_sampler, Classifier, HeuristicClassifier, Inference, InferenceReport,
    Pipeline, PipelineConfig, PipelineError, Recording, ReplaySource, SampleSource,
    SampleTimer, SyntheticSource, WindowBuffer,
};

#[derive(Parser)]
#[command(name = "motion-daq")]
#[command(about = "Continuous IMU acquisition and gesture inference", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the continuous pipeline until the source exhausts or a bound hits
    Stream {
        /// CSV recording to replay; repeat to concatenate in order
        #[arg(long = "csv", value_name = "FILE")]
        csv: Vec<PathBuf>,

        /// Use the built-in synthetic gesture source instead of recordings
        #[arg(long, conflicts_with = "csv")]
        synthetic: bool,

        /// Seed for the synthetic source
        #[arg(long, default_value = "42")]
        seed: u64,

        /// Replay recordings in a loop instead of stopping at the end
        #[arg(long = "loop")]
        looped: bool,

        /// Override the sampling interval in milliseconds
        #[arg(long)]
        interval_ms: Option<u64>,

        /// Stop after this many inferences
        #[arg(short = 'n', long)]
        max_inferences: Option<u64>,

        /// Print serialized reports, one JSON object per line
        #[arg(long)]
        json: bool,
    },

    /// Classify the first full window of a recording once
    Classify {
        /// CSV recording to classify
        csv: PathBuf,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Stream {
            csv,
            synthetic,
            seed,
            looped,
            interval_ms,
            max_inferences,
            json,
        } => stream(&csv, synthetic, seed, looped, interval_ms, max_inferences, json),
        Commands::Classify { csv, json } => classify(&csv, json),
    }
}

fn stream(
    csv: &[PathBuf],
    synthetic: bool,
    seed: u64,
    looped: bool,
    interval_ms: Option<u64>,
    max_inferences: Option<u64>,
    json: bool,
) -> Result<()> {
    let config = PipelineConfig::default();

    // Source init comes first: a bad recording aborts here, before any
    // thread exists.
    let (source, rate): (Box<dyn SampleSource>, f64) = if !csv.is_empty() {
        let recording = Recording::load_all(csv)?;
        let rate = recording.sample_rate_hz();
        println!(
            "Replaying {} readings at {:.1} Hz from {} file(s)",
            recording.len(),
            rate,
            csv.len()
        );
        (Box::new(ReplaySource::new(recording).looped(looped)), rate)
    } else if synthetic {
        let rate = config.sample_rate_hz;
        println!("Generating synthetic gestures at {:.1} Hz (seed {})", rate, seed);
        (Box::new(SyntheticSource::new(rate, seed)), rate)
    } else {
        return Err(PipelineError::SourceUnavailable {
            message: "no recording given; pass --csv or --synthetic".to_string(),
        }
        .into());
    };

    let interval = match interval_ms {
        Some(ms) => Duration::from_millis(ms),
        None => Duration::from_secs_f64(1.0 / rate),
    };

    let (writer, reader) = slot_pair(config.slice_len());
    let classifier = HeuristicClassifier::new(&config)?;
    let mut pipeline = Pipeline::new(&config, reader, Box::new(classifier))?;

    let timer = SampleTimer::new();
    let handle = spawn_sampler(&timer, interval, source, writer)?;

    let stop = AtomicBool::new(false);
    let mut printed = 0u64;
    pipeline.run(&stop, |report| {
        if json {
            print_json(&report);
        } else {
            print_inference(&report.inference);
        }
        printed += 1;
        let max_reached = max_inferences.is_some_and(|max| printed >= max);
        if max_reached || handle.is_exhausted() {
            stop.store(true, Ordering::SeqCst);
        }
    })?;
    timer.stop();

    let stats = pipeline.stats();
    println!();
    println!(
        "Stream finished: {} slice(s), {} inference(s), {} overrun(s), {} classifier error(s)",
        stats.slices_ingested, stats.inferences, stats.overruns, stats.classifier_errors
    );
    Ok(())
}

fn classify(csv: &Path, json: bool) -> Result<()> {
    let config = PipelineConfig::default();
    let recording = Recording::load(csv)?;
    if recording.len() < config.readings_per_window {
        bail!(
            "Recording has {} readings, a full window needs {}",
            recording.len(),
            config.readings_per_window
        );
    }
    println!(
        "Loaded {} readings at {:.1} Hz from {}",
        recording.len(),
        recording.sample_rate_hz(),
        csv.display()
    );

    // Feed the first full window through the same ingest path the
    // continuous pipeline uses.
    let mut window = WindowBuffer::new(&config);
    let mut slot = vec![0.0; config.slice_len()];
    let mut readings = recording.iter();
    for _ in 0..config.slices_per_window {
        for (chunk, reading) in slot.chunks_mut(config.channels()).zip(&mut readings) {
            chunk.copy_from_slice(reading);
        }
        window.ingest(&slot);
    }

    let mut classifier = HeuristicClassifier::new(&config)?;
    let inference = classifier.classify(&window.signal())?;

    if json {
        println!("{}", serde_json::to_string(&inference)?);
    } else {
        print_inference(&inference);
    }
    Ok(())
}

/// Per-window prediction block, one line per label plus the best answer.
fn print_inference(inference: &Inference) {
    let timing = inference.timing;
    println!(
        "Timing: DSP {} ms, inference {} ms, anomaly {} ms",
        timing.dsp_ms, timing.classification_ms, timing.anomaly_ms
    );
    println!("Predictions:");
    for score in &inference.scores {
        println!("  {}: {:.5}", score.label, score.value);
    }
    if let Some(top) = inference.top() {
        println!("ANS: {}, {:.6}", top.label, top.value);
    }
}

fn print_json(report: &InferenceReport) {
    match serde_json::to_string(report) {
        Ok(line) => println!("{}", line),
        Err(err) => error!(error = %err, "Failed to serialize report"),
    }
}
