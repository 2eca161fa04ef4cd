//! Spectral denoising strategies
//!
//! Every strategy maps frames to frames with the same count, bin count and
//! phase; only magnitudes change. `process` dispatches on the configured
//! [`Algorithm`].

use super::config::{Algorithm, NoiseReductionConfig, ThresholdMode};
use super::profile::NoiseProfile;
use crate::error::Result;
use crate::spectrum::SpectralFrame;

/// Over-subtraction factor for spectral subtraction
pub const OVER_SUBTRACTION: f64 = 2.0;

/// Spectral floor for spectral subtraction, as a fraction of the input bin
pub const SPECTRAL_FLOOR: f64 = 0.01;

/// Decision-directed smoothing of the prior SNR
pub const WIENER_SMOOTHING: f64 = 0.98;

/// Minimum Wiener gain
pub const WIENER_GAIN_FLOOR: f64 = 0.1;

/// Minimum adaptive-filter output, as a fraction of the input bin
pub const ADAPTIVE_FLOOR: f64 = 0.1;

/// MAD multiplier for the wavelet threshold
pub const THRESHOLD_MAD_SCALE: f64 = 3.0;

/// Minimum thresholding output, as a fraction of the input bin
pub const THRESHOLD_FLOOR: f64 = 0.05;

/// Guards divisions by a silent noise bin
const NOISE_EPSILON: f64 = 1e-12;

/// Run the configured algorithm over all frames
pub fn process(
    frames: &[SpectralFrame],
    profile: &NoiseProfile,
    config: &NoiseReductionConfig,
) -> Result<Vec<SpectralFrame>> {
    if let Some(frame) = frames.first() {
        profile.ensure_bins(frame.num_bins())?;
    }

    let strength = config.strength.clamp(0.0, 1.0);

    let processed = match config.algorithm {
        Algorithm::SpectralSubtraction => spectral_subtraction(frames, profile, strength),
        Algorithm::WienerFilter => {
            let mut state = WienerState::new(profile.num_bins());
            wiener_filter(frames, profile, strength, &mut state)
        }
        Algorithm::AdaptiveFilter => adaptive_filter(frames, profile, strength),
        Algorithm::WaveletThreshold => {
            wavelet_threshold(frames, profile, strength, config.threshold_mode)
        }
        Algorithm::Enhanced => {
            let mut state = WienerState::new(profile.num_bins());
            let filtered = wiener_filter(frames, profile, strength, &mut state);
            spectral_subtraction(&filtered, profile, strength * 0.5)
        }
    };

    Ok(processed)
}

/// `max(S - α·strength·N·W, β·S)`
pub fn spectral_subtraction(
    frames: &[SpectralFrame],
    profile: &NoiseProfile,
    strength: f64,
) -> Vec<SpectralFrame> {
    let scale = OVER_SUBTRACTION * strength;

    frames
        .iter()
        .map(|frame| {
            let magnitude = frame
                .magnitude
                .iter()
                .zip(profile.spectral_fingerprint.iter())
                .zip(profile.frequency_weights.iter())
                .map(|((&signal, &noise), &weight)| {
                    (signal - scale * noise * weight).max(SPECTRAL_FLOOR * signal)
                })
                .collect();
            frame.with_magnitude(magnitude)
        })
        .collect()
}

/// Per-bin decision-directed state for the Wiener filter
///
/// The prior SNR of each frame is rebuilt from the previous frame's output,
/// so that output is the only thing carried forward. One instance covers
/// exactly one pass over one signal.
#[derive(Debug, Clone)]
pub struct WienerState {
    /// Previous frame's output magnitude per bin
    pub previous_output: Vec<f64>,
}

impl WienerState {
    pub fn new(bins: usize) -> Self {
        Self {
            previous_output: vec![0.0; bins],
        }
    }
}

/// Wiener gain from a decision-directed prior SNR
pub fn wiener_filter(
    frames: &[SpectralFrame],
    profile: &NoiseProfile,
    strength: f64,
    state: &mut WienerState,
) -> Vec<SpectralFrame> {
    frames
        .iter()
        .map(|frame| {
            let mut magnitude = Vec::with_capacity(frame.num_bins());

            for (k, (&signal, &noise)) in frame
                .magnitude
                .iter()
                .zip(profile.spectral_fingerprint.iter())
                .enumerate()
            {
                let noise = noise.max(NOISE_EPSILON);
                let posterior = (signal / noise).powi(2);
                let previous = state.previous_output[k] / noise;

                let prior = WIENER_SMOOTHING * previous * previous
                    + (1.0 - WIENER_SMOOTHING) * (posterior - 1.0).max(0.0);
                let gain = prior / (1.0 + prior);

                let out = signal * (1.0 - strength * (1.0 - gain)).max(WIENER_GAIN_FLOOR);

                state.previous_output[k] = out;
                magnitude.push(out);
            }

            frame.with_magnitude(magnitude)
        })
        .collect()
}

/// Subtract the noise in proportion to how close the bin already is to it
pub fn adaptive_filter(
    frames: &[SpectralFrame],
    profile: &NoiseProfile,
    strength: f64,
) -> Vec<SpectralFrame> {
    frames
        .iter()
        .map(|frame| {
            let magnitude = frame
                .magnitude
                .iter()
                .zip(profile.spectral_fingerprint.iter())
                .map(|(&signal, &noise)| {
                    let error = signal - noise;
                    let filtered = signal - strength * noise / (1.0 + error.abs());
                    filtered.max(ADAPTIVE_FLOOR * signal)
                })
                .collect();
            frame.with_magnitude(magnitude)
        })
        .collect()
}

/// Median plus three MADs of the noise spectrum
pub fn noise_threshold(noise: &[f64]) -> f64 {
    let center = median(noise);
    let deviations: Vec<f64> = noise.iter().map(|&n| (n - center).abs()).collect();
    center + THRESHOLD_MAD_SCALE * median(&deviations)
}

/// Shrink or gate bins against a noise-derived threshold
pub fn wavelet_threshold(
    frames: &[SpectralFrame],
    profile: &NoiseProfile,
    strength: f64,
    mode: ThresholdMode,
) -> Vec<SpectralFrame> {
    let threshold = noise_threshold(&profile.spectral_fingerprint) * strength;

    frames
        .iter()
        .map(|frame| {
            let magnitude = frame
                .magnitude
                .iter()
                .map(|&signal| {
                    let shrunk = match mode {
                        ThresholdMode::Soft => (signal - threshold).max(0.0),
                        ThresholdMode::Hard => {
                            if signal > threshold {
                                signal
                            } else {
                                0.0
                            }
                        }
                    };
                    shrunk.max(THRESHOLD_FLOOR * signal)
                })
                .collect();
            frame.with_magnitude(magnitude)
        })
        .collect()
}

fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::denoise::profile::NoiseProfileBuilder;
    use crate::spectrum::FramePipeline;
    use rand::rngs::SmallRng;
    use rand::{Rng, SeedableRng};

    const SAMPLE_RATE: f64 = 16000.0;
    const FRAME_SIZE: usize = 256;

    /// Noisy tone frames plus a profile learned from pure noise
    fn fixture() -> (Vec<SpectralFrame>, NoiseProfile) {
        let mut rng = SmallRng::seed_from_u64(11);
        let pipeline = FramePipeline::new(FRAME_SIZE, FRAME_SIZE / 2).unwrap();

        let noise: Vec<f64> = (0..4096).map(|_| rng.gen_range(-0.1..0.1)).collect();
        let noisy: Vec<f64> = (0..4096)
            .map(|n| {
                let t = n as f64 / SAMPLE_RATE;
                0.5 * (2.0 * std::f64::consts::PI * 750.0 * t).sin() + rng.gen_range(-0.1..0.1)
            })
            .collect();

        let noise_frames = pipeline.analyze(&noise, SAMPLE_RATE);
        let profile = NoiseProfileBuilder::new(SAMPLE_RATE, FRAME_SIZE)
            .build(&noise_frames, "white", false)
            .unwrap();

        (pipeline.analyze(&noisy, SAMPLE_RATE), profile)
    }

    fn config(algorithm: Algorithm, strength: f64) -> NoiseReductionConfig {
        NoiseReductionConfig {
            algorithm,
            strength,
            frame_size: FRAME_SIZE,
            hop_size: FRAME_SIZE / 2,
            ..Default::default()
        }
    }

    #[test]
    fn test_shape_and_phase_preserved() {
        let (frames, profile) = fixture();

        for algorithm in Algorithm::ALL {
            let out = process(&frames, &profile, &config(algorithm, 0.7)).unwrap();

            assert_eq!(out.len(), frames.len(), "{}", algorithm);
            for (a, b) in frames.iter().zip(out.iter()) {
                assert_eq!(a.num_bins(), b.num_bins());
                assert_eq!(a.phase, b.phase);
                assert_eq!(a.nyquist, b.nyquist);
                assert_eq!(a.offset, b.offset);
            }
        }
    }

    #[test]
    fn test_zero_strength_is_identity() {
        let (frames, profile) = fixture();

        for algorithm in Algorithm::ALL {
            let out = process(&frames, &profile, &config(algorithm, 0.0)).unwrap();
            for (a, b) in frames.iter().zip(out.iter()) {
                for (x, y) in a.magnitude.iter().zip(b.magnitude.iter()) {
                    assert!((x - y).abs() <= 1e-12 * x.max(1.0), "{}: {} vs {}", algorithm, x, y);
                }
            }
        }
    }

    #[test]
    fn test_strength_monotonic() {
        let (frames, profile) = fixture();

        for algorithm in [Algorithm::SpectralSubtraction, Algorithm::WienerFilter] {
            let mut previous = frames.clone();
            for step in 0..=10 {
                let strength = step as f64 / 10.0;
                let out = process(&frames, &profile, &config(algorithm, strength)).unwrap();

                for ((orig, prev), cur) in frames.iter().zip(previous.iter()).zip(out.iter()) {
                    for k in 0..orig.num_bins() {
                        assert!(cur.magnitude[k] <= orig.magnitude[k] + 1e-12);
                        assert!(cur.magnitude[k] <= prev.magnitude[k] + 1e-12);
                    }
                }
                previous = out;
            }
        }
    }

    #[test]
    fn test_floor_invariants() {
        let (frames, profile) = fixture();

        let subtracted = spectral_subtraction(&frames, &profile, 1.0);
        let soft = wavelet_threshold(&frames, &profile, 1.0, ThresholdMode::Soft);
        let hard = wavelet_threshold(&frames, &profile, 1.0, ThresholdMode::Hard);

        for (i, orig) in frames.iter().enumerate() {
            for k in 0..orig.num_bins() {
                let m = orig.magnitude[k];
                assert!(subtracted[i].magnitude[k] >= SPECTRAL_FLOOR * m - 1e-15);
                assert!(soft[i].magnitude[k] >= THRESHOLD_FLOOR * m - 1e-15);
                assert!(hard[i].magnitude[k] >= THRESHOLD_FLOOR * m - 1e-15);
            }
        }
    }

    #[test]
    fn test_spectral_subtraction_formula() {
        let (frames, profile) = fixture();
        let out = spectral_subtraction(&frames[..1], &profile, 0.5);

        let k = 40;
        let expected = (frames[0].magnitude[k]
            - 2.0 * 0.5 * profile.spectral_fingerprint[k] * profile.frequency_weights[k])
            .max(0.01 * frames[0].magnitude[k]);
        assert!((out[0].magnitude[k] - expected).abs() < 1e-12);
    }

    #[test]
    fn test_noise_threshold() {
        let noise = vec![1.0, 1.0, 1.0, 1.0];
        // median 1, MAD 0
        assert_eq!(noise_threshold(&noise), 1.0);
        assert!((noise_threshold(&[1.0, 2.0, 3.0, 10.0]) - (2.5 + 3.0 * 1.0)).abs() < 1e-12);
    }

    #[test]
    fn test_wiener_state_is_per_call() {
        let (frames, profile) = fixture();
        let cfg = config(Algorithm::WienerFilter, 0.9);

        let first = process(&frames, &profile, &cfg).unwrap();
        let second = process(&frames, &profile, &cfg).unwrap();
        assert_eq!(first, second);

        let mut state = WienerState::new(profile.num_bins());
        let explicit = wiener_filter(&frames, &profile, 0.9, &mut state);
        assert_eq!(explicit, first);
        assert_eq!(state.previous_output, explicit.last().unwrap().magnitude);

        // A state carried over from another pass changes the result
        let carried = wiener_filter(&frames, &profile, 0.9, &mut state);
        assert_ne!(carried[0], first[0]);
    }

    #[test]
    fn test_enhanced_is_wiener_then_subtraction() {
        let (frames, profile) = fixture();

        let enhanced = process(&frames, &profile, &config(Algorithm::Enhanced, 0.6)).unwrap();

        let mut state = WienerState::new(profile.num_bins());
        let wiener = wiener_filter(&frames, &profile, 0.6, &mut state);
        let manual = spectral_subtraction(&wiener, &profile, 0.3);

        assert_eq!(enhanced, manual);
    }

    #[test]
    fn test_reduces_noise_bins() {
        let (frames, profile) = fixture();
        let input_energy: f64 = frames.iter().map(|f| f.energy()).sum();

        for algorithm in Algorithm::ALL {
            let out = process(&frames, &profile, &config(algorithm, 1.0)).unwrap();
            let energy: f64 = out.iter().map(|f| f.energy()).sum();
            assert!(energy < input_energy, "{} did not reduce energy", algorithm);
        }
    }

    #[test]
    fn test_bin_mismatch_rejected() {
        let (frames, _) = fixture();
        let pipeline = FramePipeline::new(512, 256).unwrap();
        let other = pipeline.analyze(&vec![0.01; 2048], SAMPLE_RATE);
        let profile = NoiseProfileBuilder::new(SAMPLE_RATE, 512)
            .build(&other, "wide", false)
            .unwrap();

        let err = process(&frames, &profile, &config(Algorithm::WienerFilter, 0.5)).unwrap_err();
        assert!(err.is_validation());
    }
}
