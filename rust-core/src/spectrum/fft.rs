//! Radix-2 FFT engine for fixed-size real frames
//!
//! Windowed forward transform to magnitude/phase, and the matching inverse.

use num_complex::Complex;
use std::f64::consts::PI;

use super::windowing::{generate_window, WindowType};
use crate::error::{DenoiseError, Result};

/// Magnitude/phase view of one analysed frame
#[derive(Debug, Clone, PartialEq)]
pub struct Spectrum {
    /// |X[k]| for k = 0..fft_size/2
    pub magnitude: Vec<f64>,

    /// arg X[k] for k = 0..fft_size/2
    pub phase: Vec<f64>,

    /// Real-valued X[fft_size/2], kept so the inverse is lossless
    pub nyquist: f64,
}

/// FFT engine for real-valued frames
///
/// All tables are built once at construction; transforms only allocate
/// their scratch buffer, so the engine can be shared behind `&self`.
#[derive(Debug, Clone)]
pub struct FftEngine {
    /// FFT size (number of samples)
    fft_size: usize,

    /// cos(2πk/N) for k = 0..N/2
    cos_table: Vec<f64>,

    /// sin(2πk/N) for k = 0..N/2
    sin_table: Vec<f64>,

    /// Bit-reversed index for every position
    bit_reverse: Vec<usize>,

    /// Hann analysis window
    window: Vec<f64>,
}

impl FftEngine {
    /// Create new FFT engine
    ///
    /// # Arguments
    /// * `fft_size` - FFT size, must be a power of two (>= 2)
    pub fn new(fft_size: usize) -> Result<Self> {
        if fft_size < 2 || !fft_size.is_power_of_two() {
            return Err(DenoiseError::Configuration(format!(
                "Frame size must be a power of two, got {}",
                fft_size
            )));
        }

        let half = fft_size / 2;
        let (cos_table, sin_table) = (0..half)
            .map(|k| {
                let angle = 2.0 * PI * k as f64 / fft_size as f64;
                (angle.cos(), angle.sin())
            })
            .unzip();

        let bits = fft_size.trailing_zeros();
        let bit_reverse = (0..fft_size)
            .map(|i| i.reverse_bits() >> (usize::BITS - bits))
            .collect();

        Ok(Self {
            fft_size,
            cos_table,
            sin_table,
            bit_reverse,
            window: generate_window(WindowType::Hann, fft_size),
        })
    }

    /// Window the frame and compute its magnitude/phase spectrum
    ///
    /// # Arguments
    /// * `frame` - Input frame (zero-padded if shorter than fft_size)
    pub fn forward(&self, frame: &[f64]) -> Spectrum {
        let mut buffer: Vec<Complex<f64>> = (0..self.fft_size)
            .map(|n| {
                let sample = frame.get(n).copied().unwrap_or(0.0);
                Complex::new(sample * self.window[n], 0.0)
            })
            .collect();

        self.transform(&mut buffer, false);

        let half = self.num_bins();
        Spectrum {
            magnitude: buffer[..half].iter().map(|c| c.norm()).collect(),
            phase: buffer[..half].iter().map(|c| c.arg()).collect(),
            nyquist: buffer[half].re,
        }
    }

    /// Inverse transform back to the windowed time-domain frame
    ///
    /// Bins missing from a short spectrum are treated as zero.
    pub fn inverse_windowed(&self, spectrum: &Spectrum) -> Vec<f64> {
        let half = self.num_bins();
        let mut buffer = vec![Complex::new(0.0, 0.0); self.fft_size];

        for (k, (&mag, &phase)) in spectrum
            .magnitude
            .iter()
            .zip(spectrum.phase.iter())
            .take(half)
            .enumerate()
        {
            if k == 0 {
                // DC is real for a real signal
                buffer[0] = Complex::new(mag * phase.cos(), 0.0);
            } else {
                let bin = Complex::from_polar(mag, phase);
                buffer[k] = bin;
                buffer[self.fft_size - k] = bin.conj();
            }
        }
        buffer[half] = Complex::new(spectrum.nyquist, 0.0);

        self.transform(&mut buffer, true);

        let scale = 1.0 / self.fft_size as f64;
        buffer.iter().map(|c| c.re * scale).collect()
    }

    /// Inverse transform with the analysis window divided out
    pub fn inverse(&self, spectrum: &Spectrum) -> Vec<f64> {
        let mut frame = self.inverse_windowed(spectrum);
        for (sample, &w) in frame.iter_mut().zip(self.window.iter()) {
            *sample /= w;
        }
        frame
    }

    /// In-place iterative radix-2 Cooley-Tukey
    fn transform(&self, buffer: &mut [Complex<f64>], inverse: bool) {
        let n = self.fft_size;

        for i in 0..n {
            let j = self.bit_reverse[i];
            if j > i {
                buffer.swap(i, j);
            }
        }

        let mut len = 2;
        while len <= n {
            let half = len / 2;
            let stride = n / len;

            for start in (0..n).step_by(len) {
                for k in 0..half {
                    let idx = k * stride;
                    let twiddle = if inverse {
                        Complex::new(self.cos_table[idx], self.sin_table[idx])
                    } else {
                        Complex::new(self.cos_table[idx], -self.sin_table[idx])
                    };

                    let even = buffer[start + k];
                    let odd = buffer[start + k + half] * twiddle;
                    buffer[start + k] = even + odd;
                    buffer[start + k + half] = even - odd;
                }
            }

            len <<= 1;
        }
    }

    /// Get FFT size
    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    /// Number of analysed bins (fft_size/2)
    pub fn num_bins(&self) -> usize {
        self.fft_size / 2
    }

    /// Analysis window coefficients
    pub fn window(&self) -> &[f64] {
        &self.window
    }

    /// Centre frequency of a bin in Hz
    pub fn bin_to_frequency(&self, bin: usize, sample_rate: f64) -> f64 {
        bin as f64 * sample_rate / self.fft_size as f64
    }

    /// Bin centre frequencies in Hz
    pub fn frequency_axis(&self, sample_rate: f64) -> Vec<f64> {
        (0..self.num_bins())
            .map(|bin| self.bin_to_frequency(bin, sample_rate))
            .collect()
    }
}
