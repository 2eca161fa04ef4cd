//! Noise reduction: profiles, strategies, shaping and quality assessment

pub mod algorithms;
pub mod config;
pub mod engine;
pub mod profile;
pub mod psychoacoustics;
pub mod quality;
pub mod shaping;

pub use config::{Algorithm, NoiseReductionConfig, Preset, ThresholdMode};
pub use engine::{AudioBuffer, NoiseReductionEngine, NoiseReductionResult};
pub use profile::{AdaptiveParams, NoiseProfile, NoiseProfileBuilder, ProfileRegistry};
pub use quality::{QualityAssessor, QualityMetrics, QualityReport};
