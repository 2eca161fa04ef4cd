//! Noise reduction engine
//!
//! Runs one buffer through analysis, profile lookup or learning, the
//! configured algorithm, synthesis and quality assessment.

use std::time::Instant;

use super::algorithms;
use super::config::NoiseReductionConfig;
use super::profile::{NoiseProfile, NoiseProfileBuilder, ProfileRegistry};
use super::quality::{QualityAssessor, QualityMetrics, QualityReport};
use super::shaping;
use crate::error::{DenoiseError, Result};
use crate::spectrum::{FramePipeline, SpectralFrame};

/// Share of the analysed frames used to self-learn a profile
pub const NOISE_LEARNING_FRACTION: f64 = 0.1;

/// Progress checkpoints reported by `process_audio`
pub mod progress {
    pub const ANALYSIS: u8 = 10;
    pub const PROFILE: u8 = 20;
    pub const ALGORITHM: u8 = 40;
    pub const SYNTHESIS: u8 = 80;
    pub const METRICS: u8 = 90;
    pub const DONE: u8 = 100;
}

/// Decoded PCM handed to the engine
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    /// One or more channels of samples in [-1, 1]
    pub channels: Vec<Vec<f32>>,
    pub sample_rate: f64,
}

impl AudioBuffer {
    pub fn new(channels: Vec<Vec<f32>>, sample_rate: f64) -> Self {
        Self {
            channels,
            sample_rate,
        }
    }

    pub fn mono(samples: Vec<f32>, sample_rate: f64) -> Self {
        Self::new(vec![samples], sample_rate)
    }

    /// Length of the first channel
    pub fn len(&self) -> usize {
        self.channels.first().map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Per-sample mean over the channels, first channel's length
    pub fn mixdown(&self) -> Vec<f64> {
        (0..self.len())
            .map(|i| {
                let (sum, count) = self
                    .channels
                    .iter()
                    .filter_map(|channel| channel.get(i))
                    .fold((0.0, 0usize), |(sum, count), &s| (sum + s as f64, count + 1));
                sum / count as f64
            })
            .collect()
    }

    fn validate(&self) -> Result<()> {
        if self.channels.is_empty() {
            return Err(DenoiseError::Validation(
                "Audio buffer has no channels".to_string(),
            ));
        }
        if !(self.sample_rate.is_finite() && self.sample_rate > 0.0) {
            return Err(DenoiseError::Validation(format!(
                "Invalid sample rate {}",
                self.sample_rate
            )));
        }
        Ok(())
    }
}

/// Outcome of one `process_audio` call
#[derive(Debug, Clone, PartialEq)]
pub struct NoiseReductionResult {
    /// Processed single channel
    pub audio: Vec<f32>,

    /// Power removed (dB)
    pub reduction_applied: f64,

    /// [0, 1]
    pub artifact_level: f64,

    pub processing_time_ms: f64,
    pub quality_metrics: QualityMetrics,

    /// Profile that drove the reduction
    pub noise_profile: Option<NoiseProfile>,
}

/// Spectral noise reduction engine
///
/// Holds no per-call state, so one engine can serve any number of calls.
#[derive(Debug, Clone)]
pub struct NoiseReductionEngine {
    config: NoiseReductionConfig,
    pipeline: FramePipeline,
}

impl NoiseReductionEngine {
    /// Create an engine; fails on a structurally invalid frame setup
    pub fn new(config: NoiseReductionConfig) -> Result<Self> {
        let config = config.sanitized();
        config.validate()?;
        let pipeline = FramePipeline::new(config.frame_size, config.hop_size)?;

        log::debug!(
            "Noise reduction engine: {} at strength {:.2}, frame {} hop {}",
            config.algorithm,
            config.strength,
            config.frame_size,
            pipeline.hop_size()
        );

        Ok(Self { config, pipeline })
    }

    pub fn config(&self) -> &NoiseReductionConfig {
        &self.config
    }

    /// Process without progress reporting
    pub fn process(
        &self,
        audio: &AudioBuffer,
        registry: &ProfileRegistry,
        profile_id: Option<&str>,
    ) -> Result<NoiseReductionResult> {
        self.process_audio(audio, registry, profile_id, |_| {})
    }

    /// Denoise a buffer
    ///
    /// # Arguments
    /// * `audio` - Input PCM; multiple channels are mixed to one
    /// * `registry` - Profiles available for lookup
    /// * `profile_id` - Profile to use; when absent one is learned from the
    ///   leading 10% of the audio
    /// * `on_progress` - Called with each completed checkpoint percentage
    ///
    /// Any failure is returned as [`DenoiseError::Processing`].
    pub fn process_audio<F>(
        &self,
        audio: &AudioBuffer,
        registry: &ProfileRegistry,
        profile_id: Option<&str>,
        mut on_progress: F,
    ) -> Result<NoiseReductionResult>
    where
        F: FnMut(u8),
    {
        self.run(audio, registry, profile_id, &mut on_progress)
            .map_err(|err| {
                log::error!("Noise reduction failed: {}", err);
                DenoiseError::processing(err)
            })
    }

    fn run(
        &self,
        audio: &AudioBuffer,
        registry: &ProfileRegistry,
        profile_id: Option<&str>,
        on_progress: &mut dyn FnMut(u8),
    ) -> Result<NoiseReductionResult> {
        let started = Instant::now();
        audio.validate()?;

        let mono = audio.mixdown();
        let frames = self.pipeline.analyze(&mono, audio.sample_rate);
        log::debug!("Analysed {} samples into {} frames", mono.len(), frames.len());
        on_progress(progress::ANALYSIS);

        let profile = match profile_id {
            Some(id) => registry.get(id).cloned().ok_or_else(|| {
                DenoiseError::Validation(format!("Noise profile '{}' not found", id))
            })?,
            None => self.learn_from_signal(&frames, audio.sample_rate)?,
        };
        profile.ensure_bins(self.pipeline.engine().num_bins())?;
        on_progress(progress::PROFILE);

        let processed = algorithms::process(&frames, &profile, &self.config)?;
        let processed = self.shape(&frames, processed, &profile);
        on_progress(progress::ALGORITHM);

        let output = self.pipeline.synthesize(&processed, mono.len());
        on_progress(progress::SYNTHESIS);

        let report = if self.config.real_time_mode {
            QualityAssessor::assess_frames_only(&frames, &processed, &profile)
        } else {
            QualityAssessor::new(audio.sample_rate).assess(
                &mono,
                &output,
                &frames,
                &processed,
                &profile,
            )?
        };
        on_progress(progress::METRICS);

        let result = self.finish(&mono, output, report, profile, started);
        on_progress(progress::DONE);

        Ok(result)
    }

    /// Profile from the leading frames of the signal being cleaned
    fn learn_from_signal(&self, frames: &[SpectralFrame], sample_rate: f64) -> Result<NoiseProfile> {
        let count = if frames.is_empty() {
            0
        } else {
            ((frames.len() as f64 * NOISE_LEARNING_FRACTION) as usize).max(1)
        };

        NoiseProfileBuilder::new(sample_rate, self.pipeline.frame_size()).build(
            &frames[..count],
            "Auto-learned profile",
            true,
        )
    }

    fn shape(
        &self,
        original: &[SpectralFrame],
        processed: Vec<SpectralFrame>,
        profile: &NoiseProfile,
    ) -> Vec<SpectralFrame> {
        let mut shaped = shaping::smooth_gains(original, &processed, self.config.smoothing_factor);

        if self.config.adaptive_mode {
            shaped = shaping::adapt_to_frame_level(
                original,
                &shaped,
                profile,
                &profile.adaptive_params,
            );
        }
        if self.config.preserve_transients {
            shaped = shaping::preserve_transients(
                original,
                &shaped,
                profile.adaptive_params.preservation_level,
            );
        }

        shaped
    }

    fn finish(
        &self,
        original: &[f64],
        output: Vec<f64>,
        report: QualityReport,
        profile: NoiseProfile,
        started: Instant,
    ) -> NoiseReductionResult {
        let reduction_applied = 10.0
            * ((mean_power(original) + 1e-20) / (mean_power(&output) + 1e-20)).log10();
        let processing_time_ms = started.elapsed().as_secs_f64() * 1000.0;

        log::info!(
            "{} removed {:.2} dB in {:.1} ms (SNR {:+.2} dB, artifacts {:.2})",
            self.config.algorithm,
            reduction_applied,
            processing_time_ms,
            report.metrics.snr_improvement,
            report.artifact_level
        );

        NoiseReductionResult {
            audio: output.iter().map(|&s| s as f32).collect(),
            reduction_applied,
            artifact_level: report.artifact_level,
            processing_time_ms,
            quality_metrics: report.metrics,
            noise_profile: Some(profile),
        }
    }

    /// Build a profile from a dedicated noise-only recording
    ///
    /// Uses the first `noise_learning_duration` seconds, or all of it when the
    /// duration is zero or longer than the recording.
    pub fn learn_profile(&self, noise: &AudioBuffer, name: &str) -> Result<NoiseProfile> {
        noise.validate()?;

        let mut mono = noise.mixdown();
        let limit = (self.config.noise_learning_duration * noise.sample_rate) as usize;
        if limit > 0 && limit < mono.len() {
            mono.truncate(limit.max(self.pipeline.frame_size()));
        }

        let frames = self.pipeline.analyze(&mono, noise.sample_rate);
        NoiseProfileBuilder::new(noise.sample_rate, self.pipeline.frame_size())
            .build(&frames, name, false)
    }
}

fn mean_power(signal: &[f64]) -> f64 {
    if signal.is_empty() {
        return 0.0;
    }
    signal.iter().map(|s| s * s).sum::<f64>() / signal.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::denoise::config::Algorithm;
    use rand::rngs::SmallRng;
    use rand::{Rng, SeedableRng};
    use std::error::Error as _;
    use std::f64::consts::PI;

    const SAMPLE_RATE: f64 = 48000.0;

    /// 2 s of 440 Hz at -6 dBFS after 200 ms of silence, plus white noise
    fn noisy_tone(seed: u64) -> AudioBuffer {
        let mut rng = SmallRng::seed_from_u64(seed);
        let silence = (0.2 * SAMPLE_RATE) as usize;
        let total = (2.0 * SAMPLE_RATE) as usize;

        let samples = (0..total)
            .map(|n| {
                let tone = if n >= silence {
                    0.5 * (2.0 * PI * 440.0 * n as f64 / SAMPLE_RATE).sin()
                } else {
                    0.0
                };
                (tone + rng.gen_range(-0.05..0.05)) as f32
            })
            .collect();

        AudioBuffer::mono(samples, SAMPLE_RATE)
    }

    fn config(algorithm: Algorithm, strength: f64) -> NoiseReductionConfig {
        NoiseReductionConfig {
            algorithm,
            strength,
            frame_size: 1024,
            hop_size: 512,
            ..Default::default()
        }
    }

    #[test]
    fn test_spectral_subtraction_improves_snr() {
        let engine = NoiseReductionEngine::new(config(Algorithm::SpectralSubtraction, 0.8)).unwrap();
        let audio = noisy_tone(1);

        let result = engine.process(&audio, &ProfileRegistry::new(), None).unwrap();

        assert_eq!(result.audio.len(), audio.len());
        assert!(
            result.quality_metrics.snr_improvement > 0.0,
            "snr improvement {}",
            result.quality_metrics.snr_improvement
        );
        assert!(result.reduction_applied > 0.0);
        assert!((0.0..=1.0).contains(&result.artifact_level));
        assert!(result.quality_metrics.harmonic_preservation > 0.5);

        let profile = result.noise_profile.unwrap();
        assert!(profile.learning);
        assert_eq!(profile.num_bins(), 512);
    }

    #[test]
    fn test_profile_from_leading_silence() {
        let engine = NoiseReductionEngine::new(NoiseReductionConfig {
            noise_learning_duration: 0.2,
            ..config(Algorithm::SpectralSubtraction, 0.8)
        })
        .unwrap();
        let audio = noisy_tone(13);

        let profile = engine.learn_profile(&audio, "lead-in").unwrap();
        let mut registry = ProfileRegistry::new();
        let id = profile.id.clone();
        registry.insert(profile);

        let result = engine.process(&audio, &registry, Some(&id)).unwrap();
        assert!(result.quality_metrics.snr_improvement > 0.0);
    }

    #[test]
    fn test_every_algorithm_runs() {
        let audio = noisy_tone(2);
        let registry = ProfileRegistry::new();

        for algorithm in Algorithm::ALL {
            let engine = NoiseReductionEngine::new(config(algorithm, 0.7)).unwrap();
            let result = engine.process(&audio, &registry, None).unwrap();

            assert_eq!(result.audio.len(), audio.len(), "{}", algorithm);
            assert!(result.audio.iter().all(|s| s.is_finite()), "{}", algorithm);
            assert!(result.quality_metrics.snr_improvement >= 0.0, "{}", algorithm);
        }
    }

    #[test]
    fn test_non_power_of_two_frame_rejected() {
        let err = NoiseReductionEngine::new(NoiseReductionConfig {
            frame_size: 700,
            ..Default::default()
        })
        .unwrap_err();

        assert!(err.is_configuration());
    }

    #[test]
    fn test_unknown_algorithm_matches_spectral_subtraction() {
        let audio = noisy_tone(3);
        let registry = ProfileRegistry::new();

        let fallback = NoiseReductionEngine::new(config(Algorithm::from_name("quantum_denoise"), 0.6))
            .unwrap()
            .process(&audio, &registry, None)
            .unwrap();
        let explicit = NoiseReductionEngine::new(config(Algorithm::SpectralSubtraction, 0.6))
            .unwrap()
            .process(&audio, &registry, None)
            .unwrap();

        assert_eq!(fallback.audio, explicit.audio);
    }

    #[test]
    fn test_wiener_independent_of_call_order() {
        let first = noisy_tone(4);
        let second = noisy_tone(5);
        let registry = ProfileRegistry::new();

        let a = NoiseReductionEngine::new(config(Algorithm::WienerFilter, 0.8)).unwrap();
        let b = NoiseReductionEngine::new(config(Algorithm::WienerFilter, 0.8)).unwrap();

        let a_first = a.process(&first, &registry, None).unwrap();
        let a_second = a.process(&second, &registry, None).unwrap();

        let b_second = b.process(&second, &registry, None).unwrap();
        let b_first = b.process(&first, &registry, None).unwrap();

        assert_eq!(a_first.audio, b_first.audio);
        assert_eq!(a_second.audio, b_second.audio);
    }

    #[test]
    fn test_progress_checkpoints() {
        let engine = NoiseReductionEngine::new(config(Algorithm::AdaptiveFilter, 0.5)).unwrap();
        let mut seen = Vec::new();

        engine
            .process_audio(&noisy_tone(6), &ProfileRegistry::new(), None, |p| seen.push(p))
            .unwrap();

        assert_eq!(seen, vec![10, 20, 40, 80, 90, 100]);
    }

    #[test]
    fn test_short_audio_fails_with_wrapped_error() {
        let engine = NoiseReductionEngine::new(config(Algorithm::SpectralSubtraction, 0.5)).unwrap();
        let audio = AudioBuffer::mono(vec![0.1; 100], SAMPLE_RATE);
        let mut seen = Vec::new();

        let err = engine
            .process_audio(&audio, &ProfileRegistry::new(), None, |p| seen.push(p))
            .unwrap_err();

        assert!(err.is_processing());
        assert!(err.to_string().contains("No noise frames provided"));
        assert!(err.source().is_some());
        assert_eq!(seen, vec![10]);
    }

    #[test]
    fn test_unknown_profile_id() {
        let engine = NoiseReductionEngine::new(config(Algorithm::WienerFilter, 0.5)).unwrap();

        let err = engine
            .process(&noisy_tone(7), &ProfileRegistry::new(), Some("missing"))
            .unwrap_err();

        assert!(err.is_processing());
        assert!(err.to_string().contains("missing"));
    }

    #[test]
    fn test_mismatched_profile_rejected() {
        let small = NoiseReductionEngine::new(NoiseReductionConfig {
            frame_size: 512,
            hop_size: 256,
            ..Default::default()
        })
        .unwrap();
        let noise = AudioBuffer::mono(vec![0.01; 8192], SAMPLE_RATE);
        let profile = small.learn_profile(&noise, "small").unwrap();

        let mut registry = ProfileRegistry::new();
        let id = profile.id.clone();
        registry.insert(profile);

        let engine = NoiseReductionEngine::new(config(Algorithm::SpectralSubtraction, 0.5)).unwrap();
        let err = engine.process(&noisy_tone(8), &registry, Some(&id)).unwrap_err();

        match err {
            DenoiseError::Processing { source, .. } => assert!(source.is_validation()),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_registry_profile_from_reference() {
        let engine = NoiseReductionEngine::new(NoiseReductionConfig {
            noise_learning_duration: 0.2,
            ..config(Algorithm::SpectralSubtraction, 0.8)
        })
        .unwrap();

        let mut rng = SmallRng::seed_from_u64(9);
        let reference: Vec<f32> = (0..48000).map(|_| rng.gen_range(-0.05..0.05)).collect();
        let profile = engine
            .learn_profile(&AudioBuffer::mono(reference, SAMPLE_RATE), "room tone")
            .unwrap();
        assert!(!profile.learning);
        assert_eq!(profile.name, "room tone");

        let mut registry = ProfileRegistry::new();
        let id = profile.id.clone();
        registry.insert(profile);

        let result = engine.process(&noisy_tone(10), &registry, Some(&id)).unwrap();
        assert_eq!(result.noise_profile.map(|p| p.id), Some(id));
        assert!(result.quality_metrics.snr_improvement > 0.0);
    }

    #[test]
    fn test_zero_strength_passes_audio_through() {
        let engine = NoiseReductionEngine::new(NoiseReductionConfig {
            adaptive_mode: true,
            ..config(Algorithm::Enhanced, 0.0)
        })
        .unwrap();
        let audio = noisy_tone(11);

        let result = engine.process(&audio, &ProfileRegistry::new(), None).unwrap();

        let frame_size = 1024;
        for pos in frame_size..audio.len() - 2 * frame_size {
            let diff = (result.audio[pos] - audio.channels[0][pos]).abs();
            assert!(diff < 1e-5, "sample {} differs by {}", pos, diff);
        }
        assert!(result.quality_metrics.snr_improvement.abs() < 1e-9);
    }

    #[test]
    fn test_stereo_is_mixed_down() {
        let left = vec![0.5f32; 10];
        let right = vec![-0.1f32; 8];
        let audio = AudioBuffer::new(vec![left, right], SAMPLE_RATE);

        let mono = audio.mixdown();
        assert_eq!(mono.len(), 10);
        assert!((mono[0] - 0.2).abs() < 1e-7);
        assert!((mono[9] - 0.5).abs() < 1e-7);
    }

    #[test]
    fn test_multichannel_processes_mixdown() {
        let engine = NoiseReductionEngine::new(config(Algorithm::WienerFilter, 0.7)).unwrap();
        let registry = ProfileRegistry::new();

        let left = noisy_tone(14).channels.remove(0);
        let right: Vec<f32> = left.iter().map(|s| s * 0.5).collect();
        let stereo = AudioBuffer::new(vec![left, right], SAMPLE_RATE);
        let mixed = AudioBuffer::mono(
            stereo.mixdown().into_iter().map(|s| s as f32).collect(),
            SAMPLE_RATE,
        );

        let from_stereo = engine.process(&stereo, &registry, None).unwrap();
        let from_mixed = engine.process(&mixed, &registry, None).unwrap();

        assert_eq!(from_stereo.audio.len(), stereo.len());
        for (a, b) in from_stereo.audio.iter().zip(from_mixed.audio.iter()) {
            assert!((a - b).abs() < 1e-5);
        }
    }

    #[test]
    fn test_real_time_mode_skips_time_domain_metrics() {
        let engine = NoiseReductionEngine::new(NoiseReductionConfig {
            real_time_mode: true,
            ..config(Algorithm::WienerFilter, 0.8)
        })
        .unwrap();

        let result = engine.process(&noisy_tone(12), &ProfileRegistry::new(), None).unwrap();

        assert_eq!(result.artifact_level, 0.0);
        assert_eq!(result.quality_metrics.harmonic_preservation, 1.0);
        assert!(result.quality_metrics.snr_improvement > 0.0);
    }

    #[test]
    fn test_invalid_audio_rejected() {
        let engine = NoiseReductionEngine::new(NoiseReductionConfig::default()).unwrap();
        let registry = ProfileRegistry::new();

        let no_channels = AudioBuffer::new(Vec::new(), SAMPLE_RATE);
        assert!(engine.process(&no_channels, &registry, None).unwrap_err().is_processing());

        let bad_rate = AudioBuffer::mono(vec![0.0; 8192], 0.0);
        assert!(engine.process(&bad_rate, &registry, None).is_err());
    }
}
