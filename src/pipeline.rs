//! Consumer-side orchestration: slot claim, window maintenance, inference.
//!
//! [`spawn_sampler`] wires a [`SampleSource`] and a [`SlotWriter`] into a
//! [`SampleTimer`] callback; [`Pipeline`] drives the other end, turning each
//! published slot into one window update and one classifier invocation.
//!
//! The loop is deliberately single-threaded: the classifier is synchronous
//! and blocking, and the slot pair absorbs (or, past its capacity, counts)
//! whatever the classifier's latency costs in missed handoffs.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::acquisition::{SlotReader, SlotWriter};
use crate::classifier::{Classifier, Inference};
use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::source::SampleSource;
use crate::timer::SampleTimer;
use crate::window::WindowBuffer;

/// Claim timeout used by [`Pipeline::run`] between stop-flag checks.
const RUN_POLL_TIMEOUT: Duration = Duration::from_millis(20);

/// Where the consumer loop currently is in its cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    /// Between cycles; nothing claimed.
    Idle,
    /// Blocked waiting for a published slot.
    WaitingForData,
    /// Copying a claimed slot into the window.
    Ingesting,
    /// Inside the classifier.
    Invoking,
}

/// What one [`Pipeline::step`] call produced.
#[derive(Debug)]
pub enum StepOutcome {
    /// A slice was ingested and the window classified.
    Inference(InferenceReport),
    /// A slice was ingested but the classifier failed; already logged.
    Skipped,
    /// No slot became ready within the timeout.
    TimedOut,
    /// The sampler disconnected and every pending slice has been drained.
    Stopped,
}

/// One classified window, with cycle diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferenceReport {
    /// Total slices ingested when this inference ran (1-based).
    pub slice: u64,
    /// Slices lost to overrun since the previous cycle.
    pub missed: u64,
    /// The classification itself.
    pub inference: Inference,
}

/// Counters accumulated over a pipeline's lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineStats {
    /// Slices claimed and ingested into the window.
    pub slices_ingested: u64,
    /// Successful classifier invocations.
    pub inferences: u64,
    /// Slices lost because the consumer fell behind.
    pub overruns: u64,
    /// Classifier invocations that returned an error.
    pub classifier_errors: u64,
}

/// Observer handle for a sampler started with [`spawn_sampler`].
pub struct SamplerHandle {
    exhausted: Arc<AtomicBool>,
}

impl SamplerHandle {
    /// Whether the source has reported running out of fresh data.
    pub fn is_exhausted(&self) -> bool {
        self.exhausted.load(Ordering::Relaxed)
    }
}

/// Start sampling `source` into `writer` at `interval`.
///
/// The timer callback reads one accel and one gyro triple per firing and
/// records them into the slot pair; it never blocks on the consumer. The
/// source must already be initialized: starting the timer is the last step,
/// so a source that fails to construct aborts before any concurrency
/// exists. Returns [`PipelineError::AlreadyRunning`] if `timer` is running.
pub fn spawn_sampler<S>(
    timer: &SampleTimer,
    interval: Duration,
    mut source: S,
    mut writer: SlotWriter,
) -> Result<SamplerHandle>
where
    S: SampleSource + 'static,
{
    let exhausted = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&exhausted);

    timer.start(interval, move || {
        let accel = source.read_accel();
        let gyro = source.read_gyro();
        writer.record(&accel);
        writer.record(&gyro);
        if source.is_exhausted() {
            flag.store(true, Ordering::Relaxed);
        }
    })?;

    Ok(SamplerHandle { exhausted })
}

/// The consumer loop: claims slots, maintains the sliding window, and
/// invokes the classifier once per slice.
pub struct Pipeline {
    window: WindowBuffer,
    reader: SlotReader,
    classifier: Box<dyn Classifier>,
    state: PipelineState,
    stats: PipelineStats,
}

impl Pipeline {
    /// Build a pipeline over `reader`, checking it matches the window
    /// geometry in `config`.
    pub fn new(
        config: &PipelineConfig,
        reader: SlotReader,
        classifier: Box<dyn Classifier>,
    ) -> Result<Self> {
        config.validate()?;
        if reader.slot_len() != config.slice_len() {
            return Err(PipelineError::InvalidConfig {
                message: format!(
                    "Slot length {} does not match configured slice length {}",
                    reader.slot_len(),
                    config.slice_len()
                ),
            });
        }

        Ok(Self {
            window: WindowBuffer::new(config),
            reader,
            classifier,
            state: PipelineState::Idle,
            stats: PipelineStats::default(),
        })
    }

    /// Current loop state.
    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// Lifetime counters.
    pub fn stats(&self) -> PipelineStats {
        self.stats
    }

    /// Run one consumer cycle: claim a slot (waiting up to `timeout`),
    /// slide the window, classify.
    ///
    /// Overruns accumulated since the previous cycle are reported exactly
    /// once, before any new data is touched. A classifier failure is logged
    /// and yields [`StepOutcome::Skipped`]; the window keeps sliding.
    pub fn step(&mut self, timeout: Duration) -> Result<StepOutcome> {
        let missed = self.reader.take_overruns();
        if missed > 0 {
            self.stats.overruns += missed;
            warn!("{}", PipelineError::BufferOverrun { missed });
        } else if self.reader.has_ready() {
            // Behind, but nothing lost yet: the next slice was published
            // while the previous cycle was still in the classifier.
            debug!("Slice already waiting at cycle start");
        }

        self.state = PipelineState::WaitingForData;
        let Some(slot) = self.reader.wait_claim(timeout) else {
            self.state = PipelineState::Idle;
            return Ok(if self.reader.is_disconnected() {
                StepOutcome::Stopped
            } else {
                StepOutcome::TimedOut
            });
        };

        self.state = PipelineState::Ingesting;
        self.window.ingest(slot.values());
        drop(slot);
        self.stats.slices_ingested += 1;

        self.state = PipelineState::Invoking;
        let outcome = match self.classifier.classify(&self.window.signal()) {
            Ok(inference) => {
                self.stats.inferences += 1;
                StepOutcome::Inference(InferenceReport {
                    slice: self.stats.slices_ingested,
                    missed,
                    inference,
                })
            }
            Err(err) if err.is_classifier() => {
                self.stats.classifier_errors += 1;
                warn!(error = %err, "Classifier failed, window skipped");
                StepOutcome::Skipped
            }
            Err(err) => {
                self.state = PipelineState::Idle;
                return Err(err);
            }
        };

        self.state = PipelineState::Idle;
        Ok(outcome)
    }

    /// Loop [`step`](Self::step) until `stop` is set or the sampler
    /// disconnects, feeding each inference to `sink`.
    pub fn run(
        &mut self,
        stop: &AtomicBool,
        mut sink: impl FnMut(InferenceReport),
    ) -> Result<()> {
        info!(
            window_len = self.window.window_len(),
            slice_len = self.window.slice_len(),
            "Pipeline running"
        );

        while !stop.load(Ordering::SeqCst) {
            match self.step(RUN_POLL_TIMEOUT)? {
                StepOutcome::Inference(report) => sink(report),
                StepOutcome::Skipped | StepOutcome::TimedOut => {}
                StepOutcome::Stopped => {
                    debug!("Sampler disconnected, pipeline draining finished");
                    break;
                }
            }
        }

        info!(
            slices = self.stats.slices_ingested,
            inferences = self.stats.inferences,
            overruns = self.stats.overruns,
            classifier_errors = self.stats.classifier_errors,
            "Pipeline stopped"
        );
        Ok(())
    }
}
