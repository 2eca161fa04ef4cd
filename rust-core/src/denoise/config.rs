//! Noise reduction configuration and factory presets

use serde::{Deserialize, Serialize};

use crate::error::{DenoiseError, Result};

/// Frame sizes the engine is tuned for
pub const RECOMMENDED_FRAME_SIZES: [usize; 4] = [512, 1024, 2048, 4096];

/// Denoising algorithm selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Algorithm {
    #[default]
    SpectralSubtraction,
    WienerFilter,
    AdaptiveFilter,
    WaveletThreshold,
    /// Wiener filter followed by half-strength spectral subtraction
    Enhanced,
}

impl Algorithm {
    pub const ALL: [Algorithm; 5] = [
        Algorithm::SpectralSubtraction,
        Algorithm::WienerFilter,
        Algorithm::AdaptiveFilter,
        Algorithm::WaveletThreshold,
        Algorithm::Enhanced,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Algorithm::SpectralSubtraction => "spectral_subtraction",
            Algorithm::WienerFilter => "wiener_filter",
            Algorithm::AdaptiveFilter => "adaptive_filter",
            Algorithm::WaveletThreshold => "wavelet_denoising",
            Algorithm::Enhanced => "enhanced",
        }
    }

    /// Strict lookup by name
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|algorithm| algorithm.name().eq_ignore_ascii_case(name.trim()))
    }

    /// Lookup by name; anything unrecognised selects spectral subtraction
    pub fn from_name(name: &str) -> Self {
        Self::parse(name).unwrap_or_else(|| {
            log::warn!(
                "Unknown noise reduction algorithm '{}', using spectral_subtraction",
                name
            );
            Algorithm::SpectralSubtraction
        })
    }
}

impl From<String> for Algorithm {
    fn from(name: String) -> Self {
        Algorithm::from_name(&name)
    }
}

impl From<Algorithm> for String {
    fn from(algorithm: Algorithm) -> Self {
        algorithm.name().to_string()
    }
}

impl std::fmt::Display for Algorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Shrinkage rule for wavelet-style thresholding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdMode {
    /// Shrink magnitudes toward zero by the threshold
    #[default]
    Soft,
    /// Gate magnitudes at the threshold
    Hard,
}

/// Full processing configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NoiseReductionConfig {
    pub algorithm: Algorithm,

    /// Reduction amount, clamped to [0, 1]
    pub strength: f64,

    /// Keep part of the original spectrum on onset frames
    pub preserve_transients: bool,

    /// Scale the reduction per frame by how noise-like the frame is
    pub adaptive_mode: bool,

    /// Skip the time-domain quality metrics
    pub real_time_mode: bool,

    /// Frame length in samples, must be a power of two
    pub frame_size: usize,

    /// Step between frames in samples
    pub hop_size: usize,

    /// Temporal smoothing of per-bin gains, clamped to [0, 1]
    pub smoothing_factor: f64,

    /// Length of noise reference used by `learn_profile` (seconds)
    pub noise_learning_duration: f64,

    pub threshold_mode: ThresholdMode,
}

impl Default for NoiseReductionConfig {
    fn default() -> Self {
        Self {
            algorithm: Algorithm::SpectralSubtraction,
            strength: 0.5,
            preserve_transients: true,
            adaptive_mode: false,
            real_time_mode: false,
            frame_size: 2048,
            hop_size: 512,
            smoothing_factor: 0.3,
            noise_learning_duration: 1.0,
            threshold_mode: ThresholdMode::Soft,
        }
    }
}

impl NoiseReductionConfig {
    /// Copy with out-of-range values clamped
    pub fn sanitized(&self) -> Self {
        let mut config = self.clone();

        let strength = clamp_unit(self.strength);
        if strength != self.strength {
            log::warn!("Strength {} clamped to {}", self.strength, strength);
        }
        config.strength = strength;

        let smoothing = clamp_unit(self.smoothing_factor);
        if smoothing != self.smoothing_factor {
            log::warn!(
                "Smoothing factor {} clamped to {}",
                self.smoothing_factor,
                smoothing
            );
        }
        config.smoothing_factor = smoothing;

        if !self.noise_learning_duration.is_finite() || self.noise_learning_duration < 0.0 {
            config.noise_learning_duration = 0.0;
        }

        config
    }

    /// Reject structurally invalid frame settings
    pub fn validate(&self) -> Result<()> {
        if self.frame_size < 2 || !self.frame_size.is_power_of_two() {
            return Err(DenoiseError::Configuration(format!(
                "Frame size must be a power of two, got {}",
                self.frame_size
            )));
        }
        if self.hop_size == 0 {
            return Err(DenoiseError::Configuration(
                "Hop size must be greater than zero".to_string(),
            ));
        }
        if !RECOMMENDED_FRAME_SIZES.contains(&self.frame_size) {
            log::debug!(
                "Frame size {} is outside the recommended set {:?}",
                self.frame_size,
                RECOMMENDED_FRAME_SIZES
            );
        }
        Ok(())
    }

    /// Configuration for a factory preset
    pub fn from_preset(preset: Preset) -> Self {
        let base = Self::default();
        match preset {
            Preset::Gentle => Self {
                algorithm: Algorithm::WienerFilter,
                strength: 0.3,
                smoothing_factor: 0.5,
                ..base
            },
            Preset::Balanced => base,
            Preset::Aggressive => Self {
                algorithm: Algorithm::Enhanced,
                strength: 0.9,
                preserve_transients: false,
                smoothing_factor: 0.2,
                ..base
            },
            Preset::Speech => Self {
                algorithm: Algorithm::WienerFilter,
                strength: 0.6,
                adaptive_mode: true,
                frame_size: 1024,
                hop_size: 256,
                ..base
            },
            Preset::Music => Self {
                algorithm: Algorithm::WaveletThreshold,
                strength: 0.4,
                frame_size: 4096,
                hop_size: 1024,
                smoothing_factor: 0.6,
                ..base
            },
        }
    }
}

fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// Factory presets for common material
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Preset {
    Gentle,
    Balanced,
    Aggressive,
    Speech,
    Music,
}

impl Preset {
    pub const ALL: [Preset; 5] = [
        Preset::Gentle,
        Preset::Balanced,
        Preset::Aggressive,
        Preset::Speech,
        Preset::Music,
    ];

    /// Case-insensitive lookup by name
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|preset| preset.name().eq_ignore_ascii_case(name.trim()))
    }

    pub fn name(&self) -> &'static str {
        match self {
            Preset::Gentle => "Gentle",
            Preset::Balanced => "Balanced",
            Preset::Aggressive => "Aggressive",
            Preset::Speech => "Speech",
            Preset::Music => "Music",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Preset::Gentle => "Light Wiener filtering that leaves the material almost untouched",
            Preset::Balanced => "Moderate spectral subtraction for general recordings",
            Preset::Aggressive => "Combined Wiener and subtraction for heavy broadband noise",
            Preset::Speech => "Short frames with level-adaptive reduction for dialogue",
            Preset::Music => "Long frames and soft thresholding to protect harmonics",
        }
    }
}
