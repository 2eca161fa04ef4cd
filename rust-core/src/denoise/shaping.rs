//! Gain shaping applied between the algorithm pass and synthesis
//!
//! Each pass only moves a bin between its processed and original magnitude,
//! so algorithm floors and the strength-0 identity are kept.

use super::profile::{AdaptiveParams, NoiseProfile};
use crate::spectrum::SpectralFrame;

/// Energy jump between consecutive frames treated as an onset
pub const ONSET_ENERGY_RATIO: f64 = 2.0;

/// Frames quieter than this never count as onsets
const ENERGY_EPSILON: f64 = 1e-12;

/// Blend each processed frame toward its original
///
/// `mix` of 1 keeps the processed frame, 0 restores the original.
fn blend(original: &SpectralFrame, processed: &SpectralFrame, mix: f64) -> SpectralFrame {
    if mix >= 1.0 {
        return processed.clone();
    }
    let mix = mix.max(0.0);
    let magnitude = original
        .magnitude
        .iter()
        .zip(processed.magnitude.iter())
        .map(|(&orig, &out)| orig + mix * (out - orig))
        .collect();
    processed.with_magnitude(magnitude)
}

/// First-order smoothing of the per-bin gain across frames
pub fn smooth_gains(
    original: &[SpectralFrame],
    processed: &[SpectralFrame],
    smoothing_factor: f64,
) -> Vec<SpectralFrame> {
    let smoothing = smoothing_factor.clamp(0.0, 1.0);
    if smoothing == 0.0 {
        return processed.to_vec();
    }

    let bins = processed.first().map_or(0, |f| f.num_bins());
    let mut smoothed_gain: Option<Vec<f64>> = None;

    original
        .iter()
        .zip(processed.iter())
        .map(|(orig, out)| {
            let gains: Vec<f64> = orig
                .magnitude
                .iter()
                .zip(out.magnitude.iter())
                .map(|(&o, &p)| if o > 0.0 { (p / o).clamp(0.0, 1.0) } else { 1.0 })
                .collect();

            let state = smoothed_gain.get_or_insert_with(|| gains.clone());
            for k in 0..bins.min(gains.len()) {
                state[k] = smoothing * state[k] + (1.0 - smoothing) * gains[k];
            }

            // Never above the original, never below what the algorithm produced
            let magnitude = orig
                .magnitude
                .iter()
                .zip(out.magnitude.iter())
                .zip(state.iter())
                .map(|((&o, &p), &g)| (o * g).max(p).min(o.max(p)))
                .collect();
            out.with_magnitude(magnitude)
        })
        .collect()
}

/// Back off the reduction on frames that carry more than noise
pub fn adapt_to_frame_level(
    original: &[SpectralFrame],
    processed: &[SpectralFrame],
    profile: &NoiseProfile,
    params: &AdaptiveParams,
) -> Vec<SpectralFrame> {
    let noise_energy: f64 = profile.spectral_fingerprint.iter().map(|n| n * n).sum();
    let threshold = 1.0 + 4.0 * params.sensitivity.max(0.0);
    let aggressiveness = params.aggressiveness.clamp(0.0, 1.0);

    original
        .iter()
        .zip(processed.iter())
        .map(|(orig, out)| {
            let ratio = if noise_energy > ENERGY_EPSILON {
                orig.energy() / noise_energy
            } else {
                f64::INFINITY
            };

            let mix = if ratio <= threshold {
                1.0
            } else {
                aggressiveness + (1.0 - aggressiveness) * threshold / ratio
            };
            blend(orig, out, mix)
        })
        .collect()
}

/// Indices of frames whose energy jumps past the onset ratio
pub fn onset_frames(frames: &[SpectralFrame]) -> Vec<usize> {
    let energies: Vec<f64> = frames.iter().map(|f| f.energy()).collect();
    energies
        .windows(2)
        .enumerate()
        .filter(|(_, pair)| {
            pair[1] > ENERGY_EPSILON && pair[1] > ONSET_ENERGY_RATIO * pair[0]
        })
        .map(|(i, _)| i + 1)
        .collect()
}

/// Keep `preservation_level` of the original on onset frames
pub fn preserve_transients(
    original: &[SpectralFrame],
    processed: &[SpectralFrame],
    preservation_level: f64,
) -> Vec<SpectralFrame> {
    let mut shaped = processed.to_vec();
    let mix = 1.0 - preservation_level.clamp(0.0, 1.0);

    for index in onset_frames(original) {
        if let (Some(orig), Some(out)) = (original.get(index), processed.get(index)) {
            shaped[index] = blend(orig, out, mix);
        }
    }

    shaped
}
