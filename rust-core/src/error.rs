//! Error types for the noise reduction core

use thiserror::Error;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, DenoiseError>;

#[derive(Error, Debug)]
pub enum DenoiseError {
    /// Structurally invalid settings, rejected before any processing starts
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Inputs that do not satisfy the engine's preconditions
    #[error("Validation error: {0}")]
    Validation(String),

    /// Transform failure reported by the real FFT backend
    #[error("FFT error: {0}")]
    Fft(#[from] realfft::FftError),

    /// Any failure raised while `process_audio` was running
    #[error("Noise reduction failed: {message}")]
    Processing {
        message: String,
        #[source]
        source: Box<DenoiseError>,
    },
}

impl DenoiseError {
    /// Wrap a stage failure into a `Processing` error carrying the root cause.
    ///
    /// Errors that are already wrapped are passed through unchanged.
    pub fn processing(cause: DenoiseError) -> Self {
        match cause {
            already @ DenoiseError::Processing { .. } => already,
            cause => DenoiseError::Processing {
                message: cause.to_string(),
                source: Box::new(cause),
            },
        }
    }

    pub fn is_configuration(&self) -> bool {
        matches!(self, DenoiseError::Configuration(_))
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, DenoiseError::Validation(_))
    }

    pub fn is_processing(&self) -> bool {
        matches!(self, DenoiseError::Processing { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_processing_wraps_root_cause() {
        let root = DenoiseError::Validation("No noise frames provided".into());
        let wrapped = DenoiseError::processing(root);

        assert!(wrapped.is_processing());
        assert!(wrapped.to_string().contains("No noise frames provided"));

        let source = wrapped.source().expect("wrapped error keeps its source");
        assert!(source.to_string().starts_with("Validation error"));
    }

    #[test]
    fn test_fft_failure_is_wrapped() {
        let err: DenoiseError = realfft::FftError::InputBuffer(1024, 10).into();
        assert!(!err.is_validation());

        let wrapped = DenoiseError::processing(err);
        assert!(wrapped.is_processing());
        assert!(wrapped.to_string().contains("FFT error"));
    }

    #[test]
    fn test_processing_is_not_double_wrapped() {
        let once = DenoiseError::processing(DenoiseError::Configuration("bad".into()));
        let twice = DenoiseError::processing(once);

        match twice {
            DenoiseError::Processing { source, .. } => assert!(source.is_configuration()),
            other => panic!("unexpected error: {other}"),
        }
    }
}
