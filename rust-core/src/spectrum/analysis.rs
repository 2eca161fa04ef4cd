//! High-level spectrum analyzer
//!
//! Real FFT with windowing and amplitude correction, used to inspect
//! finished signals in fixed analysis windows.

use num_complex::Complex;
use realfft::{RealFftPlanner, RealToComplex};
use std::sync::Arc;

use super::windowing::{generate_window, window_correction_factor, WindowType};
use crate::error::Result;

/// Spectrum analyzer configuration
#[derive(Debug, Clone)]
pub struct AnalyzerConfig {
    /// FFT size (number of samples)
    pub fft_size: usize,

    /// Window type for spectral analysis
    pub window_type: WindowType,

    /// Scale magnitudes so a full-scale sine reads as its amplitude
    pub normalize: bool,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            fft_size: 1024,
            window_type: WindowType::Hann,
            normalize: true,
        }
    }
}

/// Magnitude spectrum analyzer
pub struct SpectrumAnalyzer {
    config: AnalyzerConfig,

    /// Real FFT processor
    r2c: Arc<dyn RealToComplex<f64>>,

    window: Vec<f64>,

    /// Applied to every magnitude
    scale: f64,

    /// Reusable input buffer
    input_buffer: Vec<f64>,

    /// Reusable output buffer (complex spectrum)
    output_buffer: Vec<Complex<f64>>,
}

impl SpectrumAnalyzer {
    /// Create new spectrum analyzer
    pub fn new(config: AnalyzerConfig) -> Self {
        let mut planner = RealFftPlanner::<f64>::new();
        let r2c = planner.plan_fft_forward(config.fft_size);

        let window = generate_window(config.window_type, config.fft_size);
        let scale = if config.normalize {
            // Window gain correction, then 2/N for single-sided amplitude
            window_correction_factor(&window) * 2.0 / config.fft_size as f64
        } else {
            1.0
        };

        let input_buffer = r2c.make_input_vec();
        let output_buffer = r2c.make_output_vec();

        Self {
            config,
            r2c,
            window,
            scale,
            input_buffer,
            output_buffer,
        }
    }

    /// Analyze signal and return magnitude spectrum
    ///
    /// # Arguments
    /// * `signal` - Input signal (windowed, zero-padded if shorter than fft_size)
    ///
    /// # Returns
    /// Magnitude spectrum |X[k]| for k = 0..=fft_size/2
    pub fn analyze(&mut self, signal: &[f64]) -> Result<Vec<f64>> {
        let copy_len = signal.len().min(self.config.fft_size);
        for (i, slot) in self.input_buffer.iter_mut().enumerate() {
            *slot = if i < copy_len {
                signal[i] * self.window[i]
            } else {
                0.0
            };
        }

        self.r2c
            .process(&mut self.input_buffer, &mut self.output_buffer)?;

        Ok(self
            .output_buffer
            .iter()
            .map(|c| c.norm() * self.scale)
            .collect())
    }

    /// Get current configuration
    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    /// Get number of frequency bins (fft_size/2 + 1 for real FFT)
    pub fn num_bins(&self) -> usize {
        self.config.fft_size / 2 + 1
    }
}
