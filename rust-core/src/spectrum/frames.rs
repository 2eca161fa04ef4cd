//! Overlapping frame analysis and overlap-add synthesis
//!
//! Frames are produced from a single channel at `hop_size` steps. A trailing
//! partial window is dropped rather than zero-padded, so up to
//! `hop_size - 1` samples past the last full frame are never analysed and
//! come back as silence after synthesis.

use std::sync::Arc;

use super::fft::{FftEngine, Spectrum};
use crate::error::{DenoiseError, Result};

/// One analysed frame
#[derive(Debug, Clone, PartialEq)]
pub struct SpectralFrame {
    /// Per-bin magnitude (fft_size/2 bins)
    pub magnitude: Vec<f64>,

    /// Per-bin phase in radians
    pub phase: Vec<f64>,

    /// Bin centre frequencies in Hz, shared by every frame of an analysis
    pub frequencies: Arc<[f64]>,

    /// Real-valued Nyquist coefficient
    pub nyquist: f64,

    /// First sample of the frame in the source channel
    pub offset: usize,

    /// Frame start time in seconds
    pub timestamp: f64,
}

impl SpectralFrame {
    pub fn num_bins(&self) -> usize {
        self.magnitude.len()
    }

    /// Sum of squared magnitudes
    pub fn energy(&self) -> f64 {
        self.magnitude.iter().map(|m| m * m).sum()
    }

    /// Same frame with its magnitudes replaced
    pub fn with_magnitude(&self, magnitude: Vec<f64>) -> Self {
        Self {
            magnitude,
            phase: self.phase.clone(),
            frequencies: Arc::clone(&self.frequencies),
            nyquist: self.nyquist,
            offset: self.offset,
            timestamp: self.timestamp,
        }
    }

    fn spectrum(&self) -> Spectrum {
        Spectrum {
            magnitude: self.magnitude.clone(),
            phase: self.phase.clone(),
            nyquist: self.nyquist,
        }
    }
}

/// Analysis/synthesis pipeline around one FFT engine
#[derive(Debug, Clone)]
pub struct FramePipeline {
    engine: FftEngine,
    hop_size: usize,
}

impl FramePipeline {
    /// Create a pipeline
    ///
    /// # Arguments
    /// * `frame_size` - Frame length, must be a power of two
    /// * `hop_size` - Step between frames; clamped to `frame_size`
    pub fn new(frame_size: usize, hop_size: usize) -> Result<Self> {
        let engine = FftEngine::new(frame_size)?;

        if hop_size == 0 {
            return Err(DenoiseError::Configuration(
                "Hop size must be greater than zero".to_string(),
            ));
        }

        let hop_size = if hop_size > frame_size {
            log::warn!(
                "Hop size {} exceeds frame size {}, clamping",
                hop_size,
                frame_size
            );
            frame_size
        } else {
            hop_size
        };

        if hop_size > frame_size / 2 {
            log::warn!(
                "Hop size {} leaves less than 50% overlap; modified spectra may be audible at frame seams",
                hop_size
            );
        }

        Ok(Self { engine, hop_size })
    }

    pub fn frame_size(&self) -> usize {
        self.engine.fft_size()
    }

    pub fn hop_size(&self) -> usize {
        self.hop_size
    }

    pub fn engine(&self) -> &FftEngine {
        &self.engine
    }

    /// Number of full frames that fit in `length` samples
    pub fn frame_count(&self, length: usize) -> usize {
        let frame_size = self.frame_size();
        if length < frame_size {
            0
        } else {
            (length - frame_size) / self.hop_size + 1
        }
    }

    /// Slice the channel into overlapping frames and transform each one
    pub fn analyze(&self, channel: &[f64], sample_rate: f64) -> Vec<SpectralFrame> {
        let frame_size = self.frame_size();
        let frequencies: Arc<[f64]> = self.engine.frequency_axis(sample_rate).into();

        (0..self.frame_count(channel.len()))
            .map(|index| {
                let offset = index * self.hop_size;
                let spectrum = self.engine.forward(&channel[offset..offset + frame_size]);

                SpectralFrame {
                    magnitude: spectrum.magnitude,
                    phase: spectrum.phase,
                    frequencies: Arc::clone(&frequencies),
                    nyquist: spectrum.nyquist,
                    offset,
                    timestamp: offset as f64 / sample_rate,
                }
            })
            .collect()
    }

    /// Rebuild a channel of `original_length` samples by overlap-add
    ///
    /// Each frame is summed in the windowed domain while the window itself is
    /// accumulated as per-sample coverage; dividing by the coverage cancels
    /// the window and overlap gain. Samples no frame reaches stay at zero.
    pub fn synthesize(&self, frames: &[SpectralFrame], original_length: usize) -> Vec<f64> {
        let mut output = vec![0.0; original_length];
        let mut coverage = vec![0.0; original_length];
        let window = self.engine.window();

        for frame in frames {
            if frame.offset >= original_length {
                continue;
            }

            let time = self.engine.inverse_windowed(&frame.spectrum());
            let end = (frame.offset + time.len()).min(original_length);

            for (i, pos) in (frame.offset..end).enumerate() {
                output[pos] += time[i];
                coverage[pos] += window[i];
            }
        }

        // The analysis window is never zero, so any covered sample has
        // positive coverage and unmodified frames come back exactly
        for (sample, &weight) in output.iter_mut().zip(coverage.iter()) {
            if weight > 0.0 {
                *sample /= weight;
            }
        }

        output
    }
}
