//! Spectral analysis: windowing, FFT and spectrogram assembly

pub mod fft;
pub mod windowing;
pub mod spectrogram;

pub use fft::{transform, FftEngine};
pub use windowing::{generate_window, WindowType};
pub use spectrogram::{
    assemble, generate_spectrogram, AudioInput, Metadata, ProgressEvent, ProgressKind,
    ProgressSink, Spectrogram, SpectrogramOptions, SpectrogramResult, Spectrum,
};
