//! Window functions applied to analysis frames before the FFT
//!
//! Tapering each frame reduces spectral leakage between neighbouring bins

use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::f64::consts::PI;
use std::fmt;
use std::str::FromStr;

/// Window function types
///
/// Parsed from the wire names `"hann"`, `"hamming"` and `"blackman"`.
/// Any other name selects [`WindowType::Rectangular`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum WindowType {
    /// Hann window: w[n] = 0.5 - 0.5*cos(2πn/(M-1))
    #[default]
    Hann,

    /// Hamming window: w[n] = 0.54 - 0.46*cos(2πn/(M-1))
    Hamming,

    /// Blackman window: w[n] = 0.42 - 0.5*cos(2πn/(M-1)) + 0.08*cos(4πn/(M-1))
    Blackman,

    /// Rectangular window (no windowing)
    Rectangular,
}

impl WindowType {
    /// Canonical wire name
    pub fn name(&self) -> &'static str {
        match self {
            WindowType::Hann => "hann",
            WindowType::Hamming => "hamming",
            WindowType::Blackman => "blackman",
            WindowType::Rectangular => "rectangular",
        }
    }
}

impl From<&str> for WindowType {
    fn from(s: &str) -> Self {
        match s {
            "hann" => WindowType::Hann,
            "hamming" => WindowType::Hamming,
            "blackman" => WindowType::Blackman,
            _ => WindowType::Rectangular,
        }
    }
}

impl FromStr for WindowType {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(WindowType::from(s))
    }
}

impl From<String> for WindowType {
    fn from(s: String) -> Self {
        WindowType::from(s.as_str())
    }
}

impl From<WindowType> for String {
    fn from(window_type: WindowType) -> Self {
        window_type.name().to_string()
    }
}

impl fmt::Display for WindowType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Generate window coefficients
///
/// # Arguments
/// * `window_type` - Type of window function
/// * `length` - Number of samples (M)
///
/// # Returns
/// Vector of window coefficients w[n] for n = 0..M-1.
/// A single-sample window is always `[1.0]`.
pub fn generate_window(window_type: WindowType, length: usize) -> Vec<f64> {
    if length <= 1 {
        return vec![1.0; length];
    }

    let m = length as f64;
    let mut window = Vec::with_capacity(length);

    match window_type {
        WindowType::Hann => {
            for n in 0..length {
                let angle = 2.0 * PI * n as f64 / (m - 1.0);
                window.push(0.5 - 0.5 * angle.cos());
            }
        }

        WindowType::Hamming => {
            for n in 0..length {
                let angle = 2.0 * PI * n as f64 / (m - 1.0);
                window.push(0.54 - 0.46 * angle.cos());
            }
        }

        WindowType::Blackman => {
            for n in 0..length {
                let angle = 2.0 * PI * n as f64 / (m - 1.0);
                window.push(0.42 - 0.5 * angle.cos() + 0.08 * (2.0 * angle).cos());
            }
        }

        WindowType::Rectangular => {
            window.resize(length, 1.0);
        }
    }

    window
}

/// Multiply `frame` by `window` into `out`
///
/// Samples are widened to f64 for the product and narrowed back on store.
/// All three slices must have the same length.
pub fn apply_window_into(frame: &[f32], window: &[f64], out: &mut [f32]) {
    debug_assert_eq!(frame.len(), window.len());
    debug_assert_eq!(frame.len(), out.len());

    for ((o, &s), &w) in out.iter_mut().zip(frame).zip(window) {
        *o = (s as f64 * w) as f32;
    }
}
