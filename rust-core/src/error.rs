//! Error types shared by the spectrum pipeline and the worker

use std::io;
use thiserror::Error;

/// Failures raised while computing a spectrogram
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SpectrogramError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("FFT size must be a power of two (got {0})")]
    InvalidFftSize(usize),

    #[error("Buffer length mismatch (expected {expected}, got {actual})")]
    LengthMismatch { expected: usize, actual: usize },
}

impl SpectrogramError {
    pub(crate) fn invalid_input(msg: impl Into<String>) -> Self {
        SpectrogramError::InvalidInput(msg.into())
    }
}

/// Per-job failure inside the worker, sent back as an error response
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error(transparent)]
    Spectrogram(#[from] SpectrogramError),

    #[error("Unknown worker message type: {0}")]
    UnsupportedJobType(String),
}

/// Reason a submitted job did not produce a result
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JobError {
    /// The worker answered this job with an error response
    #[error("{0}")]
    Failed(String),

    #[error("background execution failure")]
    BackgroundContextFailure,

    #[error("worker terminated")]
    Terminated,
}

/// Failures creating a [`crate::worker::Dispatcher`]
#[derive(Error, Debug)]
pub enum DispatcherError {
    #[error("Failed to spawn background thread: {0}")]
    Spawn(#[from] io::Error),
}
