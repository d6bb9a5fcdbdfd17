//! Recorded test vectors and their replay as a sample source.
//!
//! Recordings are CSV files with a header naming at least the columns
//! `timestamp, accX, accY, accZ, gyrX, gyrY, gyrZ` (extra columns are
//! ignored, order is free). Timestamps are in milliseconds; the sample rate
//! is derived from the first two rows rather than trusted per-row, matching
//! the capture harness the recordings come from.

use std::path::Path;

use tracing::{debug, warn};

use crate::error::{PipelineError, Result};
use crate::source::SampleSource;

/// Required columns, in reading order: accel xyz then gyro xyz.
const COLUMNS: [&str; 7] = [
    "timestamp", "accX", "accY", "accZ", "gyrX", "gyrY", "gyrZ",
];

/// An owned sequence of readings with a derived sample rate.
#[derive(Debug, Clone)]
pub struct Recording {
    /// One entry per reading: accX, accY, accZ, gyrX, gyrY, gyrZ.
    readings: Vec<[f32; 6]>,
    sample_rate_hz: f64,
}

impl Recording {
    /// Load a single CSV recording.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let (readings, sample_rate_hz) = parse_file(path)?;
        debug!(
            path = %path.display(),
            readings = readings.len(),
            sample_rate_hz,
            "Loaded recording"
        );
        Ok(Self {
            readings,
            sample_rate_hz,
        })
    }

    /// Load several recordings and concatenate them in argument order.
    ///
    /// The sample rate comes from the first file; files whose derived rate
    /// disagrees are still appended, with a warning.
    pub fn load_all<P: AsRef<Path>>(paths: &[P]) -> Result<Self> {
        let first = paths.first().ok_or_else(|| PipelineError::InvalidConfig {
            message: "At least one recording file is required".to_string(),
        })?;

        let mut recording = Self::load(first)?;
        for path in &paths[1..] {
            let path = path.as_ref();
            let (mut readings, rate) = parse_file(path)?;
            if (rate - recording.sample_rate_hz).abs() > recording.sample_rate_hz * 0.01 {
                warn!(
                    path = %path.display(),
                    file_rate = rate,
                    expected_rate = recording.sample_rate_hz,
                    "Recording sample rate differs from first file"
                );
            }
            recording.readings.append(&mut readings);
        }
        Ok(recording)
    }

    /// Build a recording directly from readings.
    pub fn from_readings(readings: Vec<[f32; 6]>, sample_rate_hz: f64) -> Result<Self> {
        if readings.is_empty() {
            return Err(PipelineError::InvalidConfig {
                message: "Recording must contain at least one reading".to_string(),
            });
        }
        if sample_rate_hz <= 0.0 {
            return Err(PipelineError::InvalidConfig {
                message: format!("Invalid sample rate: {}", sample_rate_hz),
            });
        }
        Ok(Self {
            readings,
            sample_rate_hz,
        })
    }

    /// Number of readings.
    pub fn len(&self) -> usize {
        self.readings.len()
    }

    /// Whether the recording is empty (never after a successful load).
    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }

    /// Reading at `index`, if in range.
    pub fn reading(&self, index: usize) -> Option<&[f32; 6]> {
        self.readings.get(index)
    }

    /// Sample rate derived from the first two timestamps, in Hz.
    pub fn sample_rate_hz(&self) -> f64 {
        self.sample_rate_hz
    }

    /// Iterate over readings in capture order.
    pub fn iter(&self) -> std::slice::Iter<'_, [f32; 6]> {
        self.readings.iter()
    }
}

fn parse_file(path: &Path) -> Result<(Vec<[f32; 6]>, f64)> {
    let display = path.display().to_string();
    let invalid = |message: String| PipelineError::InvalidRecording {
        path: display.clone(),
        message,
    };

    let mut reader = csv::Reader::from_path(path)?;

    // Map required column names onto this file's header positions.
    let headers = reader.headers()?.clone();
    let mut indices = [0usize; COLUMNS.len()];
    for (slot, name) in indices.iter_mut().zip(COLUMNS) {
        *slot = headers
            .iter()
            .position(|h| h.trim() == name)
            .ok_or_else(|| invalid(format!("missing column '{}'", name)))?;
    }

    let mut readings = Vec::new();
    let mut first_timestamps = Vec::with_capacity(2);

    for (row, record) in reader.records().enumerate() {
        let record = record?;
        let field = |col: usize| -> Result<f32> {
            let raw = record
                .get(indices[col])
                .ok_or_else(|| invalid(format!("row {}: too few columns", row + 1)))?;
            raw.trim().parse::<f32>().map_err(|_| {
                invalid(format!(
                    "row {}: bad value '{}' for column '{}'",
                    row + 1,
                    raw,
                    COLUMNS[col]
                ))
            })
        };

        if first_timestamps.len() < 2 {
            first_timestamps.push(f64::from(field(0)?));
        }
        readings.push([
            field(1)?,
            field(2)?,
            field(3)?,
            field(4)?,
            field(5)?,
            field(6)?,
        ]);
    }

    if readings.len() < 2 {
        return Err(invalid(
            "needs at least two readings to derive the sample rate".to_string(),
        ));
    }

    let interval_ms = first_timestamps[1] - first_timestamps[0];
    if interval_ms <= 0.0 {
        return Err(invalid(format!(
            "non-increasing timestamps ({} then {})",
            first_timestamps[0], first_timestamps[1]
        )));
    }

    Ok((readings, 1000.0 / interval_ms))
}

/// Replays a [`Recording`] through the [`SampleSource`] contract.
///
/// Reads past the end repeat the final reading;
/// [`SampleSource::is_exhausted`] reports when that starts. A looped source
/// wraps around instead and never exhausts.
pub struct ReplaySource {
    recording: Recording,
    position: usize,
    looped: bool,
}

impl ReplaySource {
    /// Create a one-pass replay of `recording`.
    pub fn new(recording: Recording) -> Self {
        Self {
            recording,
            position: 0,
            looped: false,
        }
    }

    /// Wrap around at the end instead of holding the last reading.
    pub fn looped(mut self, looped: bool) -> Self {
        self.looped = looped;
        self
    }

    /// Next reading index to serve; saturates at the recording length
    /// once exhausted.
    pub fn position(&self) -> usize {
        self.position
    }

    /// Sample rate of the underlying recording, in Hz.
    pub fn sample_rate_hz(&self) -> f64 {
        self.recording.sample_rate_hz()
    }

    fn current(&self) -> &[f32; 6] {
        let last = self.recording.len() - 1;
        &self.recording.readings[self.position.min(last)]
    }
}

impl SampleSource for ReplaySource {
    fn read_accel(&mut self) -> [f32; 3] {
        let r = self.current();
        [r[0], r[1], r[2]]
    }

    fn read_gyro(&mut self) -> [f32; 3] {
        let r = *self.current();
        self.position += 1;
        if self.position >= self.recording.len() {
            self.position = if self.looped { 0 } else { self.recording.len() };
        }
        [r[3], r[4], r[5]]
    }

    fn is_exhausted(&self) -> bool {
        !self.looped && self.position >= self.recording.len()
    }
}
