//! Spectral Denoise - Noise Reduction DSP Core
//!
//! Frame-based spectral noise reduction with learned noise profiles, five
//! suppression strategies and post-hoc quality metrics. Python bindings are
//! available behind the `python` feature.

// Suppress PyO3 non-local impl warnings (harmless macro-generated code)
#![cfg_attr(feature = "python", allow(non_local_definitions))]

pub mod denoise;
pub mod error;
pub mod spectrum;

#[cfg(feature = "python")]
pub mod python_bindings;

pub use denoise::{
    Algorithm, AudioBuffer, NoiseProfile, NoiseReductionConfig, NoiseReductionEngine,
    NoiseReductionResult, Preset, ProfileRegistry,
};
pub use error::{DenoiseError, Result};
pub use spectrum::{FramePipeline, SpectralFrame, SpectrumAnalyzer};
