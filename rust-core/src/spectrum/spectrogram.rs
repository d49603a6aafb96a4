//! Spectrogram assembly
//!
//! Splits a signal into overlapping frames, windows and transforms each
//! one, and rescales bin magnitudes for display.

use super::fft::{self, FftEngine};
use super::windowing::{generate_window, WindowType};
use crate::error::SpectrogramError;
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;

/// Progress is reported on every frame index divisible by this
pub const PROGRESS_INTERVAL: usize = 100;

/// Magnitudes below this are clamped before taking the logarithm
const MAGNITUDE_FLOOR: f64 = 1e-10;

/// Spectrogram configuration
///
/// Every field falls back to its default when missing from a request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SpectrogramOptions {
    /// FFT size (number of samples per frame, must be a power of 2)
    pub fft_size: usize,

    /// Samples between the starts of consecutive frames
    ///
    /// May exceed `fft_size`; the samples between frames are then skipped.
    pub hop_size: usize,

    /// Window applied to each frame
    pub window_function: WindowType,

    /// Sample rate in Hz
    pub sample_rate: f64,
}

impl Default for SpectrogramOptions {
    fn default() -> Self {
        Self {
            fft_size: 2048,
            hop_size: 512,
            window_function: WindowType::Hann,
            sample_rate: 44100.0,
        }
    }
}

/// PCM input, one or two channels
#[derive(Debug, Clone, PartialEq)]
pub enum AudioInput {
    Mono(Vec<f32>),
    Stereo(Vec<f32>, Vec<f32>),
}

impl AudioInput {
    /// Collapse to a single channel, averaging stereo pairs
    pub fn downmix(&self) -> Result<Cow<'_, [f32]>, SpectrogramError> {
        let samples = match self {
            AudioInput::Mono(samples) => Cow::Borrowed(samples.as_slice()),
            AudioInput::Stereo(left, right) => {
                if left.len() != right.len() {
                    return Err(SpectrogramError::invalid_input(format!(
                        "Stereo channels differ in length ({} vs {})",
                        left.len(),
                        right.len()
                    )));
                }
                Cow::Owned(
                    left.iter()
                        .zip(right)
                        .map(|(&l, &r)| ((l as f64 + r as f64) / 2.0) as f32)
                        .collect(),
                )
            }
        };

        if samples.is_empty() {
            return Err(SpectrogramError::invalid_input("No audio data provided"));
        }

        Ok(samples)
    }
}

/// Progress report emitted while frames are being processed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressEvent {
    #[serde(rename = "type")]
    pub kind: ProgressKind,
    pub current: usize,
    pub total: usize,
    pub percentage: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressKind {
    Spectrogram,
}

/// Receiver for [`ProgressEvent`]s during assembly
pub trait ProgressSink {
    fn on_progress(&mut self, event: ProgressEvent);
}

impl<F: FnMut(ProgressEvent)> ProgressSink for F {
    fn on_progress(&mut self, event: ProgressEvent) {
        self(event)
    }
}

/// Display-scaled magnitudes of one frame, `fft_size / 2` bins
pub type Spectrum = Vec<f32>;

/// Spectra in time order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Spectrogram {
    frames: Vec<Spectrum>,
}

impl Spectrogram {
    pub fn frames(&self) -> &[Spectrum] {
        &self.frames
    }

    pub fn num_frames(&self) -> usize {
        self.frames.len()
    }

    /// Bins per frame (0 when there are no frames)
    pub fn num_bins(&self) -> usize {
        self.frames.first().map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Dense frames x bins matrix
    pub fn to_array2(&self) -> Array2<f32> {
        Array2::from_shape_fn((self.num_frames(), self.num_bins()), |(f, b)| {
            self.frames[f][b]
        })
    }

    pub fn into_frames(self) -> Vec<Spectrum> {
        self.frames
    }
}

impl From<Vec<Spectrum>> for Spectrogram {
    fn from(frames: Vec<Spectrum>) -> Self {
        Self { frames }
    }
}

/// Description of a computed spectrogram
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    pub fft_size: usize,
    pub hop_size: usize,
    pub sample_rate: f64,
    pub num_frames: usize,
    pub freq_bins: usize,
    /// Input length in seconds
    pub duration: f64,
    pub nyquist_freq: f64,
}

impl Metadata {
    /// Centre frequency of `bin` in Hz
    pub fn bin_frequency(&self, bin: usize) -> f64 {
        bin as f64 * self.sample_rate / self.fft_size as f64
    }

    /// Start time of `frame` in seconds
    pub fn frame_time(&self, frame: usize) -> f64 {
        frame as f64 * self.hop_size as f64 / self.sample_rate
    }
}

/// Spectrogram together with its metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpectrogramResult {
    pub spectrogram_data: Spectrogram,
    pub metadata: Metadata,
}

/// Number of full frames that fit in `sample_count` samples
pub fn frame_count(sample_count: usize, fft_size: usize, hop_size: usize) -> usize {
    if sample_count < fft_size || hop_size == 0 {
        0
    } else {
        (sample_count - fft_size) / hop_size + 1
    }
}

/// Map a linear magnitude to the display scale `log10(m) / 4 + 1`
pub fn display_scale(magnitude: f64) -> f32 {
    (magnitude.max(MAGNITUDE_FLOOR).log10() / 4.0 + 1.0) as f32
}

fn validate_options(options: &SpectrogramOptions) -> Result<(), SpectrogramError> {
    fft::validate_size(options.fft_size)?;

    if options.hop_size == 0 {
        return Err(SpectrogramError::invalid_input("Hop size must be positive"));
    }
    if !options.sample_rate.is_finite() || options.sample_rate <= 0.0 {
        return Err(SpectrogramError::invalid_input(format!(
            "Sample rate must be positive (got {})",
            options.sample_rate
        )));
    }

    Ok(())
}

/// Compute the spectrogram of `audio`
///
/// Progress is reported to `progress` on frames 0, 100, 200, ...
/// Input shorter than one frame yields an empty spectrogram.
pub fn assemble(
    audio: &AudioInput,
    options: &SpectrogramOptions,
    progress: &mut impl ProgressSink,
) -> Result<SpectrogramResult, SpectrogramError> {
    let samples = audio.downmix()?;
    validate_options(options)?;

    let SpectrogramOptions {
        fft_size,
        hop_size,
        window_function,
        sample_rate,
    } = *options;

    let num_frames = frame_count(samples.len(), fft_size, hop_size);
    let metadata = |spectrogram: &Spectrogram| Metadata {
        fft_size,
        hop_size,
        sample_rate,
        num_frames: spectrogram.num_frames(),
        freq_bins: spectrogram.num_bins(),
        duration: samples.len() as f64 / sample_rate,
        nyquist_freq: sample_rate / 2.0,
    };

    // No window or FFT buffers are sized from `fft_size` unless a frame fits
    if num_frames == 0 {
        let spectrogram = Spectrogram::default();
        return Ok(SpectrogramResult {
            metadata: metadata(&spectrogram),
            spectrogram_data: spectrogram,
        });
    }

    let window = generate_window(window_function, fft_size);
    let mut engine = FftEngine::new(fft_size)?;

    let mut frames = Vec::with_capacity(num_frames);
    for frame_index in 0..num_frames {
        let start = frame_index * hop_size;
        let frame = &samples[start..start + fft_size];

        let spectrum: Spectrum = engine
            .compute_magnitude(frame, &window)?
            .into_iter()
            .map(display_scale)
            .collect();
        frames.push(spectrum);

        if frame_index % PROGRESS_INTERVAL == 0 {
            progress.on_progress(ProgressEvent {
                kind: ProgressKind::Spectrogram,
                current: frame_index,
                total: num_frames,
                percentage: (100.0 * frame_index as f64 / num_frames as f64).round() as u32,
            });
        }
    }

    let spectrogram = Spectrogram::from(frames);
    Ok(SpectrogramResult {
        metadata: metadata(&spectrogram),
        spectrogram_data: spectrogram,
    })
}

/// [`assemble`] without progress reporting
pub fn generate_spectrogram(
    audio: &AudioInput,
    options: &SpectrogramOptions,
) -> Result<SpectrogramResult, SpectrogramError> {
    assemble(audio, options, &mut |_: ProgressEvent| {})
}
