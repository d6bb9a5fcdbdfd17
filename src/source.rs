//! Motion sample sources.
//!
//! [`SampleSource`] is the contract the sampling callback reads through. The
//! callback runs on the timer thread at the sampling rate, so reads must be
//! synchronous, non-blocking, and non-failing; anything that can fail (file
//! access, device init) belongs in a source's constructor, before the timer
//! starts.
//!
//! [`SyntheticSource`] generates a gesture-like waveform for demo runs and
//! tests: one-second gyro/accel bursts alternating with one-second rests,
//! with seeded jitter so runs are reproducible.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::f32::consts::TAU;

/// Supplier of raw motion readings.
///
/// One reading is a [`read_accel`](Self::read_accel) call followed by a
/// [`read_gyro`](Self::read_gyro) call. Accelerometer values are in g,
/// gyroscope values in deg/s.
pub trait SampleSource: Send {
    /// Read the three accelerometer axes, in g.
    fn read_accel(&mut self) -> [f32; 3];

    /// Read the three gyroscope axes, in deg/s.
    fn read_gyro(&mut self) -> [f32; 3];

    /// Whether the source has run out of fresh data.
    ///
    /// Finite sources keep serving their last reading after this turns
    /// true, so the sampling cadence is never disturbed. Unbounded sources
    /// never exhaust.
    fn is_exhausted(&self) -> bool {
        false
    }
}

impl<S: SampleSource + ?Sized> SampleSource for Box<S> {
    fn read_accel(&mut self) -> [f32; 3] {
        (**self).read_accel()
    }

    fn read_gyro(&mut self) -> [f32; 3] {
        (**self).read_gyro()
    }

    fn is_exhausted(&self) -> bool {
        (**self).is_exhausted()
    }
}

/// Deterministic gesture-shaped waveform generator.
///
/// Alternates one second of motion (sinusoidal gyro burst, rocking
/// accelerometer) with one second at rest (gravity on the z axis only).
pub struct SyntheticSource {
    /// Readings emitted so far; advanced by `read_gyro`.
    reading: u64,
    sample_rate_hz: f64,
    rng: StdRng,
}

impl SyntheticSource {
    /// Create a generator for the given sampling rate.
    pub fn new(sample_rate_hz: f64, seed: u64) -> Self {
        Self {
            reading: 0,
            sample_rate_hz,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Elapsed waveform time in seconds.
    fn t(&self) -> f32 {
        (self.reading as f64 / self.sample_rate_hz) as f32
    }

    /// 1.0 during gesture seconds, 0.0 during rest seconds.
    fn envelope(&self) -> f32 {
        if (self.t() as u64) % 2 == 0 {
            1.0
        } else {
            0.0
        }
    }
}

impl SampleSource for SyntheticSource {
    fn read_accel(&mut self) -> [f32; 3] {
        let t = self.t();
        let active = self.envelope();
        let mut noise = |scale: f32| self.rng.gen_range(-scale..scale);

        [
            active * 0.6 * (TAU * 1.5 * t).sin() + noise(0.02),
            active * 0.3 * (TAU * 3.0 * t).cos() + noise(0.02),
            1.0 + active * 0.2 * (TAU * 1.5 * t).sin() + noise(0.02), // gravity baseline
        ]
    }

    fn read_gyro(&mut self) -> [f32; 3] {
        let t = self.t();
        let active = self.envelope();
        let mut noise = |scale: f32| self.rng.gen_range(-scale..scale);

        let reading = [
            active * 90.0 * (TAU * 1.5 * t).cos() + noise(1.0),
            active * 45.0 * (TAU * 3.0 * t).sin() + noise(1.0),
            active * 30.0 * (TAU * 1.5 * t).sin() + noise(1.0),
        ];
        self.reading += 1;
        reading
    }
}
