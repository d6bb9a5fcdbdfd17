//! Window classification.
//!
//! [`SignalSource`] is the pull interface a classifier reads windows
//! through; it decouples inference from how the window is stored (the ring
//! in [`crate::window`] serves wrapped windows through it without copying
//! them out first). [`HeuristicClassifier`] is the built-in gesture scorer:
//! it recognises the four wand gestures from per-channel activity, which is
//! enough to drive and test the full pipeline without a neural network
//! runtime behind it.

use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::model::{LABELS, NUM_CHANNELS, NUM_CLASSES};

/// Mean absolute normalized gyro activity below which a window is idle.
const IDLE_GYRO_THRESHOLD: f32 = 0.15;

/// Random access to a fixed-length block of interleaved samples.
///
/// Offsets are logical: 0 is the oldest value in the window regardless of
/// where it sits physically. Implementations must serve any in-range
/// `(offset, length)` pair, so classifiers are free to read the window in
/// chunks.
pub trait SignalSource {
    /// Total number of values the source can serve.
    fn total_len(&self) -> usize;

    /// Copy `out.len()` values starting at logical `offset` into `out`.
    fn fetch(&self, offset: usize, out: &mut [f32]) -> Result<()>;
}

/// Score for one label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelScore {
    /// Label name.
    pub label: String,
    /// Confidence in `[0, 1]`.
    pub value: f32,
}

/// Wall-clock cost of one classification, split by stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InferenceTiming {
    /// Feature extraction, in milliseconds.
    pub dsp_ms: u64,
    /// Scoring, in milliseconds.
    pub classification_ms: u64,
    /// Anomaly scoring, in milliseconds (zero when not computed).
    pub anomaly_ms: u64,
}

/// Result of classifying one window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Inference {
    /// One score per label, in model label order.
    pub scores: Vec<LabelScore>,
    /// Stage timings for this invocation.
    pub timing: InferenceTiming,
}

impl Inference {
    /// The highest-scoring label, if any scores were produced.
    pub fn top(&self) -> Option<&LabelScore> {
        self.scores
            .iter()
            .max_by(|a, b| a.value.total_cmp(&b.value))
    }
}

/// Turns one window of samples into label scores.
pub trait Classifier: Send {
    /// Classify the window behind `signal`.
    fn classify(&mut self, signal: &dyn SignalSource) -> Result<Inference>;
}

/// Activity-based gesture scorer.
///
/// Computes the mean absolute value of every channel, reading the window in
/// slice-sized chunks the way an embedded feature extractor would. A quiet
/// gyro means `idle`; otherwise the dominant gyro axis picks the gesture:
/// x is `snake`, y is `updown`, z is `wave`.
pub struct HeuristicClassifier {
    channels: usize,
    slice_len: usize,
    window_len: usize,
    chunk: Vec<f32>,
}

impl HeuristicClassifier {
    /// Build a classifier for the window geometry in `config`.
    pub fn new(config: &PipelineConfig) -> Result<Self> {
        if config.channels() != NUM_CHANNELS {
            return Err(PipelineError::InvalidConfig {
                message: format!(
                    "Gesture classifier expects {} channels, config has {}",
                    NUM_CHANNELS,
                    config.channels()
                ),
            });
        }
        Ok(Self {
            channels: config.channels(),
            slice_len: config.slice_len(),
            window_len: config.window_len(),
            chunk: vec![0.0; config.slice_len()],
        })
    }

    /// Mean absolute value per channel over the whole window.
    fn channel_activity(&mut self, signal: &dyn SignalSource) -> Result<[f32; NUM_CHANNELS]> {
        let mut sums = [0.0f32; NUM_CHANNELS];
        let mut offset = 0;
        while offset < self.window_len {
            let len = self.slice_len.min(self.window_len - offset);
            let chunk = &mut self.chunk[..len];
            signal
                .fetch(offset, chunk)
                .map_err(|err| PipelineError::Classifier {
                    status: -5,
                    message: format!("window fetch failed: {}", err),
                })?;
            for (i, value) in chunk.iter().enumerate() {
                sums[(offset + i) % self.channels] += value.abs();
            }
            offset += len;
        }

        let readings = (self.window_len / self.channels) as f32;
        for sum in &mut sums {
            *sum /= readings;
        }
        Ok(sums)
    }
}

impl Classifier for HeuristicClassifier {
    fn classify(&mut self, signal: &dyn SignalSource) -> Result<Inference> {
        if signal.total_len() != self.window_len {
            return Err(PipelineError::Classifier {
                status: -1,
                message: format!(
                    "Signal length {} does not match impulse window {}",
                    signal.total_len(),
                    self.window_len
                ),
            });
        }

        let dsp_start = Instant::now();
        let activity = self.channel_activity(signal)?;
        let dsp_ms = dsp_start.elapsed().as_millis() as u64;

        let score_start = Instant::now();
        let gyro = &activity[3..6];
        let gyro_activity = gyro.iter().sum::<f32>() / gyro.len() as f32;

        let values: [f32; NUM_CLASSES] = if gyro_activity < IDLE_GYRO_THRESHOLD {
            [0.91, 0.03, 0.03, 0.03]
        } else {
            let dominant = gyro
                .iter()
                .enumerate()
                .max_by(|a, b| a.1.total_cmp(b.1))
                .map(|(axis, _)| axis)
                .unwrap_or(0);
            match dominant {
                0 => [0.04, 0.88, 0.05, 0.03],
                1 => [0.03, 0.05, 0.89, 0.03],
                _ => [0.02, 0.04, 0.05, 0.89],
            }
        };
        let classification_ms = score_start.elapsed().as_millis() as u64;

        let scores = LABELS
            .iter()
            .zip(values)
            .map(|(label, value)| LabelScore {
                label: (*label).to_string(),
                value,
            })
            .collect();

        Ok(Inference {
            scores,
            timing: InferenceTiming {
                dsp_ms,
                classification_ms,
                anomaly_ms: 0,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PipelineConfigBuilder;
    use crate::window::WindowBuffer;

    /// Flat in-memory signal for driving the classifier directly.
    struct VecSignal(Vec<f32>);

    impl SignalSource for VecSignal {
        fn total_len(&self) -> usize {
            self.0.len()
        }

        fn fetch(&self, offset: usize, out: &mut [f32]) -> Result<()> {
            let end = offset + out.len();
            if end > self.0.len() {
                return Err(PipelineError::InvalidFetch {
                    offset,
                    length: out.len(),
                    total: self.0.len(),
                });
            }
            out.copy_from_slice(&self.0[offset..end]);
            Ok(())
        }
    }

    fn config() -> PipelineConfig {
        PipelineConfigBuilder::default()
            .channels(NUM_CHANNELS)
            .readings_per_window(8)
            .slices_per_window(4)
            .build()
            .expect("config")
    }

    /// Readings with one channel pinned to an alternating amplitude.
    fn window_with_active_channel(config: &PipelineConfig, channel: usize, amp: f32) -> Vec<f32> {
        let mut values = vec![0.0; config.window_len()];
        for (reading, chunk) in values.chunks_mut(NUM_CHANNELS).enumerate() {
            let sign = if reading % 2 == 0 { 1.0 } else { -1.0 };
            chunk[channel] = sign * amp;
        }
        values
    }

    #[test]
    fn test_quiet_window_scores_idle() {
        let config = config();
        let mut classifier = HeuristicClassifier::new(&config).expect("classifier");

        let signal = VecSignal(vec![0.0; config.window_len()]);
        let inference = classifier.classify(&signal).expect("classify");

        let top = inference.top().expect("top");
        assert_eq!(top.label, "idle");
        let sum: f32 = inference.scores.iter().map(|s| s.value).sum();
        assert!((sum - 1.0).abs() < 1e-6);
        assert_eq!(inference.scores.len(), NUM_CLASSES);
    }

    #[test]
    fn test_dominant_gyro_axis_selects_gesture() {
        let config = config();
        let mut classifier = HeuristicClassifier::new(&config).expect("classifier");

        for (channel, expected) in [(3, "snake"), (4, "updown"), (5, "wave")] {
            let signal = VecSignal(window_with_active_channel(&config, channel, 1.0));
            let inference = classifier.classify(&signal).expect("classify");
            assert_eq!(inference.top().expect("top").label, expected);
        }
    }

    #[test]
    fn test_classifies_wrapped_window() {
        let config = config();
        let mut classifier = HeuristicClassifier::new(&config).expect("classifier");
        let mut buffer = WindowBuffer::new(&config);

        // Five ingests on a four-slice window leave the origin mid-ring.
        let mut slot = vec![0.0; config.slice_len()];
        for ingest in 0..5 {
            for (reading, chunk) in slot.chunks_mut(NUM_CHANNELS).enumerate() {
                let sign = if reading % 2 == 0 { 2.0 } else { -2.0 };
                chunk.fill(0.0);
                chunk[4] = sign + ingest as f32 * 0.01;
            }
            buffer.ingest(&slot);
        }

        let inference = classifier.classify(&buffer.signal()).expect("classify");
        assert_eq!(inference.top().expect("top").label, "updown");
    }

    #[test]
    fn test_shape_mismatch_rejected() {
        let config = config();
        let mut classifier = HeuristicClassifier::new(&config).expect("classifier");

        let signal = VecSignal(vec![0.0; config.window_len() - 1]);
        let err = classifier.classify(&signal).unwrap_err();
        assert!(err.is_classifier());
        assert!(err.to_string().contains("-1"));
    }

    #[test]
    fn test_wrong_channel_count_rejected() {
        let config = PipelineConfigBuilder::default()
            .channels(2)
            .readings_per_window(8)
            .slices_per_window(4)
            .build()
            .expect("config");
        assert!(HeuristicClassifier::new(&config).is_err());
    }
}
