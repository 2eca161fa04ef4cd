//! Spectral analysis and resynthesis

pub mod fft;
pub mod windowing;
pub mod analysis;
pub mod frames;

pub use fft::{FftEngine, Spectrum};
pub use windowing::{generate_window, WindowType};
pub use analysis::{AnalyzerConfig, SpectrumAnalyzer};
pub use frames::{FramePipeline, SpectralFrame};
