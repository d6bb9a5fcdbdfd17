//! Error types for acquisition and inference operations.
//!
//! This module provides a single error type covering every failure mode in
//! the pipeline: sampler lifecycle, buffer handoff, signal access, recording
//! replay, and classifier invocation.

use thiserror::Error;

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Errors that can occur while acquiring or classifying motion data.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Start was requested on a component that is already running
    #[error("{component} is already running")]
    AlreadyRunning {
        /// Component that rejected the second start.
        component: String,
    },

    /// One or more slices were overwritten before the consumer claimed them
    #[error("Buffer overrun: {missed} slice(s) lost before claim (consumer too slow)")]
    BufferOverrun {
        /// Number of slices lost since the last successful claim.
        missed: u64,
    },

    /// The sample source could not be opened or read
    #[error("Sample source unavailable: {message}")]
    SourceUnavailable {
        /// Human-readable cause.
        message: String,
    },

    /// The classifier rejected or failed an invocation
    #[error("Classifier error (status {status}): {message}")]
    Classifier {
        /// Backend status code (non-zero).
        status: i32,
        /// Human-readable cause.
        message: String,
    },

    /// A signal fetch addressed values outside the window
    #[error("Invalid fetch: offset {offset} + length {length} exceeds window of {total} values")]
    InvalidFetch {
        /// Requested start offset, in values.
        offset: usize,
        /// Requested length, in values.
        length: usize,
        /// Total window length, in values.
        total: usize,
    },

    /// A recording file was malformed or empty
    #[error("Invalid recording '{path}': {message}")]
    InvalidRecording {
        /// Path of the offending file.
        path: String,
        /// Human-readable cause.
        message: String,
    },

    /// Invalid configuration or parameter
    #[error("Invalid configuration: {message}")]
    InvalidConfig {
        /// Human-readable cause.
        message: String,
    },

    /// CSV parse error while loading a recording
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// I/O error from the operating system
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    /// Check if this is an overrun report.
    pub fn is_overrun(&self) -> bool {
        matches!(self, Self::BufferOverrun { .. })
    }

    /// Check if this is a classifier failure.
    pub fn is_classifier(&self) -> bool {
        matches!(self, Self::Classifier { .. })
    }

    /// Check if this is a lifecycle double-start.
    pub fn is_already_running(&self) -> bool {
        matches!(self, Self::AlreadyRunning { .. })
    }
}
