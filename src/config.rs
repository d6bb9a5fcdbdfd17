//! Pipeline configuration.
//!
//! [`PipelineConfig`] carries the model geometry and per-channel normalization
//! into the acquisition and windowing stages. The default configuration is the
//! trained model's geometry from [`crate::model`]; tests construct smaller
//! geometries through the same builder.

use crate::error::{PipelineError, Result};
use crate::model;
use std::time::Duration;

/// Per-channel normalization: `(raw * unit - mean) / scale`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelNorm {
    /// Unit conversion factor applied to the raw reading.
    pub unit: f32,
    /// Mean subtracted after unit conversion.
    pub mean: f32,
    /// Standard deviation divided out last; must be positive.
    pub scale: f32,
}

impl ChannelNorm {
    /// Create a normalization entry.
    pub fn new(unit: f32, mean: f32, scale: f32) -> Self {
        Self { unit, mean, scale }
    }

    /// Pass-through normalization (unit 1, mean 0, scale 1).
    pub fn identity() -> Self {
        Self {
            unit: 1.0,
            mean: 0.0,
            scale: 1.0,
        }
    }

    /// Apply the normalization to one raw value.
    #[inline]
    pub fn apply(&self, raw: f32) -> f32 {
        (raw * self.unit - self.mean) / self.scale
    }
}

/// Configuration for the acquisition and inference pipeline.
///
/// The channel count is the length of the normalization table; every reading
/// carries one value per channel, interleaved channel-major.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Per-channel normalization, one entry per channel.
    pub normalization: Vec<ChannelNorm>,
    /// Readings in one full window.
    pub readings_per_window: usize,
    /// Slices per window; one inference per completed slice.
    pub slices_per_window: usize,
    /// Sampling rate in Hz.
    pub sample_rate_hz: f64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let normalization = (0..model::NUM_CHANNELS)
            .map(|ch| {
                ChannelNorm::new(
                    model::CHANNEL_UNITS[ch],
                    model::CHANNEL_MEANS[ch],
                    model::CHANNEL_STD_DEVS[ch],
                )
            })
            .collect();
        Self {
            normalization,
            readings_per_window: model::READINGS_PER_WINDOW,
            slices_per_window: model::SLICES_PER_WINDOW,
            sample_rate_hz: f64::from(model::SAMPLE_RATE_HZ),
        }
    }
}

impl PipelineConfig {
    /// Create a new builder for pipeline configuration.
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder::default()
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.normalization.is_empty() {
            return Err(PipelineError::InvalidConfig {
                message: "At least one channel is required".to_string(),
            });
        }

        if self.readings_per_window == 0 {
            return Err(PipelineError::InvalidConfig {
                message: "Window must hold at least one reading".to_string(),
            });
        }

        if self.slices_per_window == 0 {
            return Err(PipelineError::InvalidConfig {
                message: "Window must have at least one slice".to_string(),
            });
        }

        if self.readings_per_window % self.slices_per_window != 0 {
            return Err(PipelineError::InvalidConfig {
                message: format!(
                    "Window of {} readings does not divide into {} slices",
                    self.readings_per_window, self.slices_per_window
                ),
            });
        }

        if self.sample_rate_hz <= 0.0 {
            return Err(PipelineError::InvalidConfig {
                message: format!("Invalid sample rate: {}", self.sample_rate_hz),
            });
        }

        if let Some(ch) = self.normalization.iter().position(|n| n.scale <= 0.0) {
            return Err(PipelineError::InvalidConfig {
                message: format!("Channel {} has non-positive scale", ch),
            });
        }

        Ok(())
    }

    /// Number of channels per reading.
    pub fn channels(&self) -> usize {
        self.normalization.len()
    }

    /// Readings captured per slice.
    pub fn readings_per_slice(&self) -> usize {
        self.readings_per_window / self.slices_per_window
    }

    /// Values per slice (one acquisition slot).
    pub fn slice_len(&self) -> usize {
        self.channels() * self.readings_per_slice()
    }

    /// Values per full window.
    pub fn window_len(&self) -> usize {
        self.channels() * self.readings_per_window
    }

    /// Interval between consecutive readings.
    pub fn sample_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.sample_rate_hz)
    }
}

/// Builder for [`PipelineConfig`].
#[derive(Debug, Default)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    /// Set the channel count with pass-through normalization.
    pub fn channels(mut self, channels: usize) -> Self {
        self.config.normalization = vec![ChannelNorm::identity(); channels];
        self
    }

    /// Set the full per-channel normalization table.
    pub fn normalization(mut self, table: Vec<ChannelNorm>) -> Self {
        self.config.normalization = table;
        self
    }

    /// Set the readings per window.
    pub fn readings_per_window(mut self, readings: usize) -> Self {
        self.config.readings_per_window = readings;
        self
    }

    /// Set the slices per window.
    pub fn slices_per_window(mut self, slices: usize) -> Self {
        self.config.slices_per_window = slices;
        self
    }

    /// Set the sampling rate in Hz.
    pub fn sample_rate_hz(mut self, rate: f64) -> Self {
        self.config.sample_rate_hz = rate;
        self
    }

    /// Build the configuration.
    pub fn build(self) -> Result<PipelineConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
