//! Background spectrogram worker and its foreground dispatcher

pub mod dispatcher;
pub mod engine;
pub mod protocol;

pub use dispatcher::{Dispatcher, DispatcherConfig, JobHandle, JobResult};
pub use protocol::{AudioData, JobId, JobType, Request, Response};
