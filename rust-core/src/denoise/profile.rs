//! Learned noise profiles and the caller-owned profile registry

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use super::psychoacoustics::{perceptual_weight, spectral_centroid_bark};
use crate::error::{DenoiseError, Result};
use crate::spectrum::SpectralFrame;

/// Percentile of the fingerprint taken as the scalar noise floor
const NOISE_FLOOR_PERCENTILE: f64 = 0.1;

/// Tuning knobs used by adaptive processing
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AdaptiveParams {
    /// How far above the noise level a frame may sit and still count as noise
    pub sensitivity: f64,

    /// Minimum share of the reduction kept on signal-dominated frames
    pub aggressiveness: f64,

    /// Share of the original kept on transient frames
    pub preservation_level: f64,
}

impl Default for AdaptiveParams {
    fn default() -> Self {
        Self {
            sensitivity: 0.5,
            aggressiveness: 0.7,
            preservation_level: 0.8,
        }
    }
}

/// Statistical fingerprint of the noise to suppress
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoiseProfile {
    pub id: String,
    pub name: String,
    pub description: String,

    /// Per-bin mean magnitude
    pub spectral_fingerprint: Vec<f64>,

    /// Robust low estimate of the fingerprint
    pub noise_floor: f64,

    /// Per-bin perceptual multiplier
    pub frequency_weights: Vec<f64>,

    pub adaptive_params: AdaptiveParams,
    pub created_at: DateTime<Utc>,

    /// Learned from the signal being cleaned rather than a noise reference
    pub learning: bool,

    pub sample_rate: f64,
    pub frame_size: usize,
}

impl NoiseProfile {
    pub fn num_bins(&self) -> usize {
        self.spectral_fingerprint.len()
    }

    /// Fail unless the profile matches frames with `bins` bins
    pub fn ensure_bins(&self, bins: usize) -> Result<()> {
        if self.num_bins() != bins || self.frequency_weights.len() != bins {
            return Err(DenoiseError::Validation(format!(
                "Noise profile '{}' has {} bins but the audio frames have {}",
                self.name,
                self.num_bins(),
                bins
            )));
        }
        Ok(())
    }
}

/// Builds profiles from noise-only frames
#[derive(Debug, Clone)]
pub struct NoiseProfileBuilder {
    sample_rate: f64,
    frame_size: usize,
    adaptive_params: AdaptiveParams,
}

impl NoiseProfileBuilder {
    pub fn new(sample_rate: f64, frame_size: usize) -> Self {
        Self {
            sample_rate,
            frame_size,
            adaptive_params: AdaptiveParams::default(),
        }
    }

    pub fn with_adaptive_params(mut self, params: AdaptiveParams) -> Self {
        self.adaptive_params = params;
        self
    }

    /// Average the frames into a profile
    ///
    /// # Arguments
    /// * `frames` - Frames assumed to contain only noise
    /// * `name` - Display name
    /// * `learning` - Whether the frames come from the signal being cleaned
    pub fn build(
        &self,
        frames: &[SpectralFrame],
        name: impl Into<String>,
        learning: bool,
    ) -> Result<NoiseProfile> {
        let first = frames
            .first()
            .ok_or_else(|| DenoiseError::Validation("No noise frames provided".to_string()))?;

        let bins = self.frame_size / 2;
        if let Some(bad) = frames.iter().find(|frame| frame.num_bins() != bins) {
            return Err(DenoiseError::Validation(format!(
                "Noise frame has {} bins, expected {}",
                bad.num_bins(),
                bins
            )));
        }

        let mut fingerprint = vec![0.0; bins];
        for frame in frames {
            for (acc, &mag) in fingerprint.iter_mut().zip(frame.magnitude.iter()) {
                *acc += mag;
            }
        }
        let count = frames.len() as f64;
        fingerprint.iter_mut().for_each(|acc| *acc /= count);

        let frequency_weights: Vec<f64> = first
            .frequencies
            .iter()
            .map(|&freq| perceptual_weight(freq))
            .collect();

        let noise_floor = percentile(&fingerprint, NOISE_FLOOR_PERCENTILE);

        let duration = frames.len() as f64 * self.frame_size as f64 / self.sample_rate;
        let description = format!(
            "Learned from {} frames (~{:.2}s), centred at {:.1} Bark",
            frames.len(),
            duration,
            spectral_centroid_bark(&fingerprint, &first.frequencies)
        );

        log::debug!(
            "Built noise profile from {} frames, floor {:.6}",
            frames.len(),
            noise_floor
        );

        Ok(NoiseProfile {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            description,
            spectral_fingerprint: fingerprint,
            noise_floor,
            frequency_weights,
            adaptive_params: self.adaptive_params,
            created_at: Utc::now(),
            learning,
            sample_rate: self.sample_rate,
            frame_size: self.frame_size,
        })
    }
}

/// Value at `fraction` of the sorted data (nearest-rank, rounding down)
fn percentile(values: &[f64], fraction: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let index = ((sorted.len() as f64 * fraction) as usize).min(sorted.len() - 1);
    sorted[index]
}

/// Caller-owned store of noise profiles keyed by id
///
/// Not synchronised; wrap in a lock when writers and readers share it.
#[derive(Debug, Clone, Default)]
pub struct ProfileRegistry {
    profiles: HashMap<String, NoiseProfile>,
}

impl ProfileRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a profile under its id, returning any profile it replaced
    pub fn insert(&mut self, profile: NoiseProfile) -> Option<NoiseProfile> {
        self.profiles.insert(profile.id.clone(), profile)
    }

    pub fn get(&self, id: &str) -> Option<&NoiseProfile> {
        self.profiles.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.profiles.contains_key(id)
    }

    /// All profiles, oldest first
    pub fn list(&self) -> Vec<&NoiseProfile> {
        let mut profiles: Vec<&NoiseProfile> = self.profiles.values().collect();
        profiles.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        profiles
    }

    pub fn remove(&mut self, id: &str) -> Option<NoiseProfile> {
        self.profiles.remove(id)
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}
