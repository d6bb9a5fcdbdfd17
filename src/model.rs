//! Build-time parameters of the trained motion model.
//!
//! These constants describe the geometry and preprocessing the model was
//! trained with. They are fixed at build time and are not runtime-negotiable:
//! changing any of them requires retraining. The pipeline carries them through
//! [`PipelineConfig`](crate::config::PipelineConfig) so tests can exercise
//! smaller geometries, but the shipped binary always runs these values.

use std::time::Duration;

/// Sampling frequency the model was trained at, in Hz.
pub const SAMPLE_RATE_HZ: u32 = 100;

/// Interval between consecutive readings (10 ms at 100 Hz).
pub const SAMPLE_INTERVAL: Duration = Duration::from_micros(1_000_000 / SAMPLE_RATE_HZ as u64);

/// Values per reading: 3 accelerometer axes followed by 3 gyroscope axes.
pub const NUM_CHANNELS: usize = 6;

/// Readings in one full model window (1 s of data).
pub const READINGS_PER_WINDOW: usize = 100;

/// Slices per window; one inference runs per completed slice.
pub const SLICES_PER_WINDOW: usize = 4;

/// Readings captured per slice.
pub const READINGS_PER_SLICE: usize = READINGS_PER_WINDOW / SLICES_PER_WINDOW;

/// Values per slice; each acquisition slot holds exactly one slice.
pub const SLICE_LEN: usize = NUM_CHANNELS * READINGS_PER_SLICE;

/// Values in one full window, as seen by the classifier.
pub const WINDOW_LEN: usize = NUM_CHANNELS * READINGS_PER_WINDOW;

/// Standard gravity, converts accelerometer readings from g to m/s².
pub const GRAVITY_MS2: f32 = 9.80665;

/// Per-channel unit conversion applied before standardization.
///
/// Accelerometer channels arrive in g and the model was trained on m/s²;
/// gyroscope channels pass through unchanged.
pub const CHANNEL_UNITS: [f32; NUM_CHANNELS] =
    [GRAVITY_MS2, GRAVITY_MS2, GRAVITY_MS2, 1.0, 1.0, 1.0];

/// Per-channel means from dataset curation, in converted units.
pub const CHANNEL_MEANS: [f32; NUM_CHANNELS] =
    [0.4869, -0.6364, 8.329, -0.1513, 4.631, -9.8836];

/// Per-channel standard deviations from dataset curation.
pub const CHANNEL_STD_DEVS: [f32; NUM_CHANNELS] =
    [3.062, 7.2209, 6.9951, 61.3324, 104.1638, 108.3149];

/// Gesture labels, in model output order.
pub const LABELS: [&str; 4] = ["idle", "snake", "updown", "wave"];

/// Number of gesture classes.
pub const NUM_CLASSES: usize = LABELS.len();
