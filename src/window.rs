//! Sliding-window assembly over claimed slices.
//!
//! [`WindowBuffer`] keeps the most recent full model window as a flat ring of
//! `slices_per_window` slice-sized segments. Each claimed slot is normalized
//! and written over the oldest slice; the classifier then sees the window
//! through [`WindowSignal`], which maps logical offsets (0 = oldest value)
//! onto the physical ring.
//!
//! The buffer starts zeroed, so the first `S - 1` windows are zero-padded at
//! their oldest end rather than delaying inference.

use crate::classifier::SignalSource;
use crate::config::{ChannelNorm, PipelineConfig};
use crate::error::{PipelineError, Result};

/// Ring-buffer window assembler.
#[derive(Debug)]
pub struct WindowBuffer {
    /// Flat window values, `channels * readings_per_window` long.
    values: Box<[f32]>,
    norms: Box<[ChannelNorm]>,
    channels: usize,
    slice_len: usize,
    slices: usize,
    /// Next slice to overwrite; also the logical origin of the window.
    cursor: usize,
}

impl WindowBuffer {
    /// Create a zeroed window for the given configuration.
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            values: vec![0.0; config.window_len()].into_boxed_slice(),
            norms: config.normalization.clone().into_boxed_slice(),
            channels: config.channels(),
            slice_len: config.slice_len(),
            slices: config.slices_per_window,
            cursor: 0,
        }
    }

    /// Normalize one slice of raw values and overwrite the oldest slice.
    ///
    /// `slot` is interleaved channel-major and must be exactly one slice
    /// long. The cursor advances modulo the slice count, so after
    /// `slices_per_window` ingests it returns to its starting position.
    pub fn ingest(&mut self, slot: &[f32]) {
        assert_eq!(slot.len(), self.slice_len, "slot length mismatch");

        let base = self.cursor * self.slice_len;
        for (i, &raw) in slot.iter().enumerate() {
            let ch = i % self.channels;
            self.values[base + i] = self.norms[ch].apply(raw);
        }
        self.cursor = (self.cursor + 1) % self.slices;
    }

    /// Classifier-facing view of the current window.
    pub fn signal(&self) -> WindowSignal<'_> {
        WindowSignal {
            values: &self.values,
            origin: self.cursor * self.slice_len,
        }
    }

    /// Current slice cursor, in `[0, slices_per_window)`.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Values per slice.
    pub fn slice_len(&self) -> usize {
        self.slice_len
    }

    /// Values per full window.
    pub fn window_len(&self) -> usize {
        self.values.len()
    }
}

/// Read-only window view with logical addressing.
///
/// Offset 0 is the oldest value in the window; the newest slice ends at
/// `total_len() - 1`. Fetches wrap within the logical window only and are
/// served in at most two contiguous copies.
#[derive(Debug, Clone, Copy)]
pub struct WindowSignal<'a> {
    values: &'a [f32],
    /// Physical index of logical offset 0.
    origin: usize,
}

impl SignalSource for WindowSignal<'_> {
    fn total_len(&self) -> usize {
        self.values.len()
    }

    fn fetch(&self, offset: usize, out: &mut [f32]) -> Result<()> {
        let total = self.values.len();
        match offset.checked_add(out.len()) {
            Some(end) if end <= total => {}
            _ => {
                return Err(PipelineError::InvalidFetch {
                    offset,
                    length: out.len(),
                    total,
                })
            }
        }

        let phys = (self.origin + offset) % total;
        let first = out.len().min(total - phys);
        out[..first].copy_from_slice(&self.values[phys..phys + first]);
        if first < out.len() {
            let rest = out.len() - first;
            out[first..].copy_from_slice(&self.values[..rest]);
        }
        Ok(())
    }
}
