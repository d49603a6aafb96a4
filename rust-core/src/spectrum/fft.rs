//! In-place radix-2 FFT
//!
//! Cooley-Tukey decimation-in-time over split real/imaginary buffers.
//! Samples are stored as f32; butterflies are evaluated in f64.

use crate::error::SpectrogramError;
use num_complex::Complex;
use std::f64::consts::PI;

/// Check that `n` is a usable transform length and return log2(n)
pub fn validate_size(n: usize) -> Result<u32, SpectrogramError> {
    if n.is_power_of_two() {
        Ok(n.trailing_zeros())
    } else {
        Err(SpectrogramError::InvalidFftSize(n))
    }
}

/// Forward DFT of `real + i*imag`, computed in place
///
/// Produces the full N-point spectrum. Both buffers must have the same
/// power-of-two length; anything else is rejected before touching the data.
pub fn transform(real: &mut [f32], imag: &mut [f32]) -> Result<(), SpectrogramError> {
    let n = real.len();
    if imag.len() != n {
        return Err(SpectrogramError::LengthMismatch {
            expected: n,
            actual: imag.len(),
        });
    }

    let bits = validate_size(n)?;
    if n == 1 {
        return Ok(());
    }

    bit_reverse_permute(real, imag, bits);

    let mut stride = 2;
    while stride <= n {
        let half = stride / 2;
        let angle = -2.0 * PI / stride as f64;
        let rotation = Complex::new(angle.cos(), angle.sin());

        for start in (0..n).step_by(stride) {
            let mut twiddle = Complex::new(1.0, 0.0);

            for k in 0..half {
                let even_idx = start + k;
                let odd_idx = even_idx + half;

                let even = Complex::new(real[even_idx] as f64, imag[even_idx] as f64);
                let odd = Complex::new(real[odd_idx] as f64, imag[odd_idx] as f64);
                let t = odd * twiddle;

                let sum = even + t;
                let diff = even - t;
                real[even_idx] = sum.re as f32;
                imag[even_idx] = sum.im as f32;
                real[odd_idx] = diff.re as f32;
                imag[odd_idx] = diff.im as f32;

                twiddle = twiddle * rotation;
            }
        }

        stride <<= 1;
    }

    Ok(())
}

/// Swap every index with its `bits`-wide bit reversal (once per pair)
fn bit_reverse_permute(real: &mut [f32], imag: &mut [f32], bits: u32) {
    let shift = usize::BITS - bits;
    for i in 0..real.len() {
        let reversed = i.reverse_bits() >> shift;
        if reversed > i {
            real.swap(i, reversed);
            imag.swap(i, reversed);
        }
    }
}

/// FFT engine with reusable frame buffers
pub struct FftEngine {
    /// FFT size (number of samples)
    fft_size: usize,

    real: Vec<f32>,
    imag: Vec<f32>,
}

impl FftEngine {
    /// Create new FFT engine
    ///
    /// # Arguments
    /// * `fft_size` - FFT size, must be a power of two
    pub fn new(fft_size: usize) -> Result<Self, SpectrogramError> {
        validate_size(fft_size)?;

        Ok(Self {
            fft_size,
            real: vec![0.0; fft_size],
            imag: vec![0.0; fft_size],
        })
    }

    /// Window `frame`, transform it and return |X[k]| for k = 0..fft_size/2
    ///
    /// `frame` and `window` must both be exactly `fft_size` long.
    pub fn compute_magnitude(
        &mut self,
        frame: &[f32],
        window: &[f64],
    ) -> Result<Vec<f64>, SpectrogramError> {
        for len in [frame.len(), window.len()] {
            if len != self.fft_size {
                return Err(SpectrogramError::LengthMismatch {
                    expected: self.fft_size,
                    actual: len,
                });
            }
        }

        super::windowing::apply_window_into(frame, window, &mut self.real);
        self.imag.fill(0.0);

        transform(&mut self.real, &mut self.imag)?;

        Ok(self.real[..self.num_bins()]
            .iter()
            .zip(&self.imag)
            .map(|(&re, &im)| {
                let (re, im) = (re as f64, im as f64);
                (re * re + im * im).sqrt()
            })
            .collect())
    }

    /// Get FFT size
    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    /// Number of non-negative frequency bins kept per frame (fft_size/2)
    pub fn num_bins(&self) -> usize {
        self.fft_size / 2
    }
}
