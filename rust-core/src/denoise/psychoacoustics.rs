//! Frequency-scale helpers used while building noise profiles

/// Upper edge of the low perceptual band (Hz)
pub const LOW_BAND_EDGE_HZ: f64 = 1000.0;

/// Upper edge of the presence band (Hz)
pub const PRESENCE_BAND_EDGE_HZ: f64 = 4000.0;

/// Convert frequency to Bark scale (Traunmüller)
pub fn hz_to_bark(freq: f64) -> f64 {
    let f = freq / 1000.0;
    26.81 * f / (1.0 + 1.96 * f) - 0.53
}

/// Convert Bark to frequency (inverse Traunmüller)
pub fn bark_to_hz(bark: f64) -> f64 {
    let z = bark + 0.53;
    1000.0 * z / (26.81 - z * 1.96)
}

/// Perceptual multiplier applied to the noise estimate at a bin centre
///
/// Presence-range noise (1-4 kHz) is weighted up, lows are weighted down.
pub fn perceptual_weight(freq: f64) -> f64 {
    if freq < LOW_BAND_EDGE_HZ {
        0.8
    } else if freq <= PRESENCE_BAND_EDGE_HZ {
        1.2
    } else {
        1.0
    }
}

/// Magnitude-weighted centroid of a spectrum on the Bark scale
///
/// Returns 0 for an all-zero spectrum.
pub fn spectral_centroid_bark(magnitude: &[f64], frequencies: &[f64]) -> f64 {
    let total: f64 = magnitude.iter().sum();
    if total <= 0.0 {
        return 0.0;
    }

    let weighted: f64 = magnitude
        .iter()
        .zip(frequencies.iter())
        .map(|(&m, &f)| m * hz_to_bark(f))
        .sum();

    weighted / total
}
