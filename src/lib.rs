//! Continuous motion acquisition and gesture inference pipeline.
//!
//! This crate turns a fixed-rate IMU feed into a continuously sliding
//! inference window. A timer-driven sampler records interleaved accel/gyro
//! readings into a double-buffered slot pair; a consumer loop claims each
//! published slice, normalizes it into a circular window buffer, and invokes
//! a classifier that reads the window through a pull interface hiding the
//! circular layout. The producer side never blocks and never allocates, so
//! a slow classifier costs counted overruns rather than sampling jitter.
//!
//! # Architecture
//!
//! ## Acquisition
//! - [`SampleTimer`] - drift-free fixed-rate callback driver
//! - [`SampleSource`] - accel/gyro reading contract
//! - [`SyntheticSource`] / [`ReplaySource`] - built-in sources (generated
//!   waveform, CSV recordings)
//! - [`slot_pair`] - lock-free double-buffer handoff between the sampling
//!   callback ([`SlotWriter`]) and the consumer ([`SlotReader`])
//!
//! ## Windowing
//! - [`WindowBuffer`] - normalized circular window, sliding one slice per
//!   ingest
//! - [`SignalSource`] - oldest-first window access for classifiers
//!
//! ## Inference
//! - [`Classifier`] - synchronous window scorer
//! - [`HeuristicClassifier`] - built-in activity-based gesture scorer
//! - [`Pipeline`] - claim/ingest/classify consumer loop with overrun
//!   reporting and lifetime [`PipelineStats`]
//!
//! # Examples
//!
//! ```no_run
//! use std::sync::atomic::AtomicBool;
//!
//! use motion_daq::{
//!     slot_pair, spawn_sampler, HeuristicClassifier, Pipeline, PipelineConfig,
//!     SampleTimer, SyntheticSource,
//! };
//!
//! # fn example() -> motion_daq::Result<()> {
//! let config = PipelineConfig::default();
//! let (writer, reader) = slot_pair(config.slice_len());
//!
//! let classifier = HeuristicClassifier::new(&config)?;
//! let mut pipeline = Pipeline::new(&config, reader, Box::new(classifier))?;
//!
//! let source = SyntheticSource::new(config.sample_rate_hz, 42);
//! let timer = SampleTimer::new();
//! spawn_sampler(&timer, config.sample_interval(), source, writer)?;
//!
//! let stop = AtomicBool::new(false);
//! pipeline.run(&stop, |report| {
//!     if let Some(top) = report.inference.top() {
//!         println!("ANS: {}, {:.5}", top.label, top.value);
//!     }
//! })?;
//!
//! timer.stop();
//! # Ok(())
//! # }
//! ```

pub mod acquisition;
pub mod classifier;
pub mod config;
pub mod error;
pub mod model;
pub mod pipeline;
pub mod replay;
pub mod source;
pub mod timer;
pub mod window;

pub use acquisition::{slot_pair, ClaimedSlot, SlotReader, SlotWriter};
pub use classifier::{
    Classifier, HeuristicClassifier, Inference, InferenceTiming, LabelScore, SignalSource,
};
pub use config::{ChannelNorm, PipelineConfig, PipelineConfigBuilder};
pub use error::{PipelineError, Result};
pub use pipeline::{
    spawn_sampler, InferenceReport, Pipeline, PipelineState, PipelineStats, SamplerHandle,
    StepOutcome,
};
pub use replay::{Recording, ReplaySource};
pub use source::{SampleSource, SyntheticSource};
pub use timer::SampleTimer;
pub use window::{WindowBuffer, WindowSignal};
