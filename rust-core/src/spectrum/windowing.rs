//! Windowing functions for spectral analysis
//!
//! Applies windows to time-domain frames before the FFT to reduce spectral leakage

use std::f64::consts::PI;

/// Window function types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowType {
    /// Hann window sampled at half-sample offsets:
    /// w[n] = 0.5 - 0.5*cos(2π(n+½)/M) = sin²(π(n+½)/M)
    ///
    /// Strictly positive, and copies shifted by M/2 sum to exactly 1.
    Hann,

    /// Rectangular window (no windowing)
    Rectangular,
}

/// Generate window coefficients
///
/// # Arguments
/// * `window_type` - Type of window function
/// * `length` - Number of samples (M)
///
/// # Returns
/// Vector of window coefficients w[n] for n = 0..M-1
pub fn generate_window(window_type: WindowType, length: usize) -> Vec<f64> {
    let m = length as f64;

    match window_type {
        WindowType::Hann => (0..length)
            .map(|n| {
                let angle = 2.0 * PI * (n as f64 + 0.5) / m;
                0.5 - 0.5 * angle.cos()
            })
            .collect(),

        WindowType::Rectangular => vec![1.0; length],
    }
}

/// Apply window to signal
pub fn apply_window(signal: &[f64], window: &[f64]) -> Vec<f64> {
    signal
        .iter()
        .zip(window.iter())
        .map(|(&s, &w)| s * w)
        .collect()
}

/// Calculate window correction factor
///
/// When applying windows, the signal amplitude is reduced. This factor
/// can be used to correct the FFT magnitude.
pub fn window_correction_factor(window: &[f64]) -> f64 {
    let sum: f64 = window.iter().sum();
    if sum > 0.0 {
        window.len() as f64 / sum
    } else {
        1.0
    }
}
