//! Post-hoc quality metrics comparing the original and processed signals
//!
//! The SNR figures are relative to the noise profile's floor, not to a clean
//! reference, so they rank settings against each other rather than measure
//! absolute quality.

use serde::{Deserialize, Serialize};

use super::profile::NoiseProfile;
use crate::error::Result;
use crate::spectrum::{AnalyzerConfig, SpectralFrame, SpectrumAnalyzer, WindowType};

/// Window length for flatness and artifact analysis
pub const ANALYSIS_WINDOW: usize = 1024;

/// Window length for onset detection
pub const ONSET_WINDOW: usize = 512;

/// Energy ratio between consecutive onset windows marking an onset
pub const ONSET_RATIO: f64 = 2.0;

/// Maximum distance between matching onsets (seconds)
pub const ONSET_TOLERANCE_SECS: f64 = 0.010;

/// Mean spectral change that maps to an artifact level of 1
pub const ARTIFACT_SCALE: f64 = 0.1;

const POWER_EPSILON: f64 = 1e-20;

/// Comparative quality figures
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QualityMetrics {
    /// Processed SNR minus original SNR (dB)
    pub snr_improvement: f64,

    /// Geometric/arithmetic mean ratio of the processed spectrum
    pub spectral_flatness: f64,

    /// Zero-lag normalised correlation, [0, 1]
    pub harmonic_preservation: f64,

    /// Share of original onsets still present, [0, 1]
    pub transient_preservation: f64,
}

impl Default for QualityMetrics {
    fn default() -> Self {
        Self {
            snr_improvement: 0.0,
            spectral_flatness: 0.0,
            harmonic_preservation: 1.0,
            transient_preservation: 1.0,
        }
    }
}

/// Metrics plus the artifact estimate
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct QualityReport {
    pub metrics: QualityMetrics,

    /// Frame-to-frame spectral instability of the output, [0, 1]
    pub artifact_level: f64,
}

/// Computes quality figures for one processing run
pub struct QualityAssessor {
    sample_rate: f64,
    analyzer: SpectrumAnalyzer,
}

impl QualityAssessor {
    pub fn new(sample_rate: f64) -> Self {
        let analyzer = SpectrumAnalyzer::new(AnalyzerConfig {
            fft_size: ANALYSIS_WINDOW,
            window_type: WindowType::Hann,
            normalize: true,
        });

        Self {
            sample_rate,
            analyzer,
        }
    }

    /// Full assessment
    pub fn assess(
        &mut self,
        original: &[f64],
        processed: &[f64],
        original_frames: &[SpectralFrame],
        processed_frames: &[SpectralFrame],
        profile: &NoiseProfile,
    ) -> Result<QualityReport> {
        let snr_improvement =
            Self::snr_improvement(original_frames, processed_frames, profile.noise_floor);
        let processed_spectra = self.window_spectra(processed)?;

        Ok(QualityReport {
            metrics: QualityMetrics {
                snr_improvement,
                spectral_flatness: mean_flatness(&processed_spectra),
                harmonic_preservation: Self::harmonic_preservation(original, processed),
                transient_preservation: self.transient_preservation(original, processed),
            },
            artifact_level: spectral_change(&processed_spectra),
        })
    }

    /// Frame-domain SNR only; time-domain metrics report neutral values
    pub fn assess_frames_only(
        original_frames: &[SpectralFrame],
        processed_frames: &[SpectralFrame],
        profile: &NoiseProfile,
    ) -> QualityReport {
        QualityReport {
            metrics: QualityMetrics {
                snr_improvement: Self::snr_improvement(
                    original_frames,
                    processed_frames,
                    profile.noise_floor,
                ),
                ..QualityMetrics::default()
            },
            artifact_level: 0.0,
        }
    }

    /// SNR of a frame set against a scalar noise floor
    ///
    /// Power above the floor counts as signal, power at or below it as noise.
    pub fn frame_snr(frames: &[SpectralFrame], noise_floor: f64) -> f64 {
        let floor = noise_floor.max(0.0);
        let (signal, noise) = frames
            .iter()
            .flat_map(|frame| frame.magnitude.iter())
            .fold((0.0, 0.0), |(signal, noise), &m| {
                let above = (m - floor).max(0.0);
                let below = m.min(floor);
                (signal + above * above, noise + below * below)
            });

        10.0 * ((signal + POWER_EPSILON) / (noise + POWER_EPSILON)).log10()
    }

    pub fn snr_improvement(
        original_frames: &[SpectralFrame],
        processed_frames: &[SpectralFrame],
        noise_floor: f64,
    ) -> f64 {
        Self::frame_snr(processed_frames, noise_floor) - Self::frame_snr(original_frames, noise_floor)
    }

    /// Spectral flatness averaged over non-overlapping analysis windows
    pub fn spectral_flatness(&mut self, signal: &[f64]) -> Result<f64> {
        let spectra = self.window_spectra(signal)?;
        Ok(mean_flatness(&spectra))
    }

    /// Normalised zero-lag cross-correlation, clamped to [0, 1]
    pub fn harmonic_preservation(original: &[f64], processed: &[f64]) -> f64 {
        let (mut cross, mut orig_power, mut proc_power) = (0.0, 0.0, 0.0);
        for (&a, &b) in original.iter().zip(processed.iter()) {
            cross += a * b;
            orig_power += a * a;
            proc_power += b * b;
        }

        if orig_power <= POWER_EPSILON && proc_power <= POWER_EPSILON {
            return 1.0;
        }
        let denominator = (orig_power * proc_power).sqrt();
        if denominator <= POWER_EPSILON {
            return 0.0;
        }

        (cross / denominator).clamp(0.0, 1.0)
    }

    /// Share of original onsets with a processed onset within 10 ms
    pub fn transient_preservation(&self, original: &[f64], processed: &[f64]) -> f64 {
        let original_onsets = detect_onsets(original);
        if original_onsets.is_empty() {
            return 1.0;
        }

        let processed_onsets = detect_onsets(processed);
        let tolerance = (ONSET_TOLERANCE_SECS * self.sample_rate).round() as usize;

        let preserved = original_onsets
            .iter()
            .filter(|&&onset| {
                processed_onsets
                    .iter()
                    .any(|&candidate| candidate.abs_diff(onset) <= tolerance)
            })
            .count();

        preserved as f64 / original_onsets.len() as f64
    }

    /// Spectral instability between consecutive analysis windows, [0, 1]
    pub fn artifact_level(&mut self, signal: &[f64]) -> Result<f64> {
        let spectra = self.window_spectra(signal)?;
        Ok(spectral_change(&spectra))
    }

    fn window_spectra(&mut self, signal: &[f64]) -> Result<Vec<Vec<f64>>> {
        signal
            .chunks_exact(ANALYSIS_WINDOW)
            .map(|window| self.analyzer.analyze(window))
            .collect()
    }
}

fn flatness(magnitude: &[f64]) -> f64 {
    if magnitude.is_empty() {
        return 0.0;
    }
    let n = magnitude.len() as f64;

    let log_sum: f64 = magnitude.iter().map(|&m| (m + 1e-10).ln()).sum();
    let geometric_mean = (log_sum / n).exp();
    let arithmetic_mean = magnitude.iter().sum::<f64>() / n;

    if arithmetic_mean > 1e-10 {
        (geometric_mean / arithmetic_mean).min(1.0)
    } else {
        0.0
    }
}

fn mean_flatness(spectra: &[Vec<f64>]) -> f64 {
    if spectra.is_empty() {
        return 0.0;
    }
    spectra.iter().map(|s| flatness(s)).sum::<f64>() / spectra.len() as f64
}

fn spectral_change(spectra: &[Vec<f64>]) -> f64 {
    if spectra.len() < 2 {
        return 0.0;
    }

    let total: f64 = spectra
        .windows(2)
        .map(|pair| {
            let bins = pair[0].len().max(1) as f64;
            pair[0]
                .iter()
                .zip(pair[1].iter())
                .map(|(a, b)| (a - b).abs())
                .sum::<f64>()
                / bins
        })
        .sum();

    let mean = total / (spectra.len() - 1) as f64;
    (mean / ARTIFACT_SCALE).clamp(0.0, 1.0)
}

/// Sample positions where window energy jumps by the onset ratio
///
/// Windows of 512 samples at 50% overlap.
pub fn detect_onsets(signal: &[f64]) -> Vec<usize> {
    let hop = ONSET_WINDOW / 2;
    if signal.len() < ONSET_WINDOW {
        return Vec::new();
    }

    let energies: Vec<f64> = (0..=(signal.len() - ONSET_WINDOW) / hop)
        .map(|i| {
            signal[i * hop..i * hop + ONSET_WINDOW]
                .iter()
                .map(|s| s * s)
                .sum()
        })
        .collect();

    energies
        .windows(2)
        .enumerate()
        .filter(|(_, pair)| pair[1] > 1e-10 && pair[1] > ONSET_RATIO * pair[0])
        .map(|(i, _)| (i + 1) * hop)
        .collect()
}
