//! Spectrogram Worker - background spectrogram generation
//!
//! Turns PCM audio into display-scaled time-frequency magnitudes on a
//! dedicated worker thread, with asynchronous job correlation for callers.

pub mod error;
pub mod spectrum;
pub mod worker;

pub use error::{DispatcherError, EngineError, JobError, SpectrogramError};
pub use spectrum::{AudioInput, Metadata, SpectrogramOptions, SpectrogramResult, WindowType};
pub use worker::{Dispatcher, DispatcherConfig, JobHandle};
