//! Python bindings for the noise reduction engine

use numpy::{PyArray1, PyReadonlyArray1, PyReadonlyArray2};
use pyo3::exceptions::{PyRuntimeError, PyValueError};
use pyo3::prelude::*;
use pyo3::types::PyDict;

use crate::denoise::{
    Algorithm, AudioBuffer, NoiseProfile, NoiseReductionConfig, NoiseReductionEngine, Preset,
    ProfileRegistry,
};
use crate::error::DenoiseError;

fn to_py_err(err: DenoiseError) -> PyErr {
    match err {
        DenoiseError::Configuration(_) | DenoiseError::Validation(_) => {
            PyValueError::new_err(err.to_string())
        }
        DenoiseError::Fft(_) | DenoiseError::Processing { .. } => {
            PyRuntimeError::new_err(err.to_string())
        }
    }
}

/// Read a 1-D array, a 2-D (channels, samples) array or a list of 1-D
/// arrays into an audio buffer
fn audio_buffer(audio: &PyAny, sample_rate: f64) -> PyResult<AudioBuffer> {
    if let Ok(mono) = audio.extract::<PyReadonlyArray1<f32>>() {
        return Ok(AudioBuffer::mono(mono.as_slice()?.to_vec(), sample_rate));
    }

    if let Ok(planar) = audio.extract::<PyReadonlyArray2<f32>>() {
        let channels = planar
            .as_array()
            .outer_iter()
            .map(|channel| channel.to_vec())
            .collect();
        return Ok(AudioBuffer::new(channels, sample_rate));
    }

    let channels = audio
        .extract::<Vec<PyReadonlyArray1<f32>>>()
        .map_err(|_| {
            PyValueError::new_err(
                "audio must be a float32 array of shape (samples,) or (channels, samples), \
                 or a list of float32 arrays",
            )
        })?
        .iter()
        .map(|channel| channel.as_slice().map(<[f32]>::to_vec))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(AudioBuffer::new(channels, sample_rate))
}

fn profile_dict<'py>(py: Python<'py>, profile: &NoiseProfile) -> PyResult<&'py PyDict> {
    let dict = PyDict::new(py);
    dict.set_item("id", &profile.id)?;
    dict.set_item("name", &profile.name)?;
    dict.set_item("description", &profile.description)?;
    dict.set_item("noise_floor", profile.noise_floor)?;
    dict.set_item("learning", profile.learning)?;
    dict.set_item("sample_rate", profile.sample_rate)?;
    dict.set_item("frame_size", profile.frame_size)?;
    dict.set_item("created_at", profile.created_at.to_rfc3339())?;
    dict.set_item(
        "spectral_fingerprint",
        PyArray1::from_slice(py, &profile.spectral_fingerprint),
    )?;
    Ok(dict)
}

/// Noise reducer exposed to Python
///
/// Owns its profile registry; learned profiles stay available by id until
/// deleted.
#[pyclass(name = "NoiseReducer")]
pub struct PyNoiseReducer {
    engine: NoiseReductionEngine,
    registry: ProfileRegistry,
}

#[pymethods]
impl PyNoiseReducer {
    /// Create a new noise reducer
    ///
    /// Args:
    ///     algorithm: Algorithm name (unknown names use spectral_subtraction)
    ///     strength: Reduction amount in [0, 1]
    ///     frame_size: Frame length, must be a power of two
    ///     hop_size: Step between frames
    #[new]
    #[pyo3(signature = (
        algorithm="spectral_subtraction",
        strength=0.5,
        frame_size=2048,
        hop_size=512,
        preserve_transients=true,
        adaptive_mode=false,
        real_time_mode=false,
        smoothing_factor=0.3,
        noise_learning_duration=1.0,
    ))]
    #[allow(clippy::too_many_arguments)]
    fn new(
        algorithm: &str,
        strength: f64,
        frame_size: usize,
        hop_size: usize,
        preserve_transients: bool,
        adaptive_mode: bool,
        real_time_mode: bool,
        smoothing_factor: f64,
        noise_learning_duration: f64,
    ) -> PyResult<Self> {
        let config = NoiseReductionConfig {
            algorithm: Algorithm::from_name(algorithm),
            strength,
            frame_size,
            hop_size,
            preserve_transients,
            adaptive_mode,
            real_time_mode,
            smoothing_factor,
            noise_learning_duration,
            ..Default::default()
        };

        Ok(Self {
            engine: NoiseReductionEngine::new(config).map_err(to_py_err)?,
            registry: ProfileRegistry::new(),
        })
    }

    /// Create a reducer from a named preset
    #[staticmethod]
    fn from_preset(name: &str) -> PyResult<Self> {
        let preset = Preset::parse(name)
            .ok_or_else(|| PyValueError::new_err(format!("Unknown preset '{}'", name)))?;

        Ok(Self {
            engine: NoiseReductionEngine::new(NoiseReductionConfig::from_preset(preset))
                .map_err(to_py_err)?,
            registry: ProfileRegistry::new(),
        })
    }

    /// Denoise a signal; multiple channels are mixed down to one
    ///
    /// Args:
    ///     audio: float32 samples, shape (samples,) or (channels, samples),
    ///         or a list of per-channel arrays
    ///     sample_rate: Sample rate in Hz
    ///     profile_id: Learned profile to use, or None to self-learn
    ///     progress: Optional callable receiving percentages
    ///
    /// Returns:
    ///     Dict with the processed audio and quality figures
    #[pyo3(signature = (audio, sample_rate, profile_id=None, progress=None))]
    fn process<'py>(
        &self,
        py: Python<'py>,
        audio: &PyAny,
        sample_rate: f64,
        profile_id: Option<&str>,
        progress: Option<PyObject>,
    ) -> PyResult<&'py PyDict> {
        let buffer = audio_buffer(audio, sample_rate)?;

        let mut callback_error = None;
        let result = self
            .engine
            .process_audio(&buffer, &self.registry, profile_id, |percent| {
                if let Some(callback) = &progress {
                    if let Err(err) = callback.call1(py, (percent,)) {
                        callback_error.get_or_insert(err);
                    }
                }
            })
            .map_err(to_py_err)?;

        if let Some(err) = callback_error {
            return Err(err);
        }

        let metrics = PyDict::new(py);
        metrics.set_item("snr_improvement", result.quality_metrics.snr_improvement)?;
        metrics.set_item("spectral_flatness", result.quality_metrics.spectral_flatness)?;
        metrics.set_item(
            "harmonic_preservation",
            result.quality_metrics.harmonic_preservation,
        )?;
        metrics.set_item(
            "transient_preservation",
            result.quality_metrics.transient_preservation,
        )?;

        let dict = PyDict::new(py);
        dict.set_item("audio", PyArray1::from_vec(py, result.audio))?;
        dict.set_item("reduction_applied", result.reduction_applied)?;
        dict.set_item("artifact_level", result.artifact_level)?;
        dict.set_item("processing_time_ms", result.processing_time_ms)?;
        dict.set_item("quality_metrics", metrics)?;
        if let Some(profile) = &result.noise_profile {
            dict.set_item("noise_profile", profile_dict(py, profile)?)?;
        }
        Ok(dict)
    }

    /// Learn a profile from a noise-only recording
    ///
    /// Returns:
    ///     Id of the stored profile
    fn learn_profile(
        &mut self,
        noise: &PyAny,
        sample_rate: f64,
        name: &str,
    ) -> PyResult<String> {
        let buffer = audio_buffer(noise, sample_rate)?;
        let profile = self.engine.learn_profile(&buffer, name).map_err(to_py_err)?;
        let id = profile.id.clone();
        self.registry.insert(profile);
        Ok(id)
    }

    /// All stored profiles, oldest first
    fn list_profiles<'py>(&self, py: Python<'py>) -> PyResult<Vec<&'py PyDict>> {
        self.registry
            .list()
            .into_iter()
            .map(|profile| profile_dict(py, profile))
            .collect()
    }

    /// Remove a profile; returns whether it existed
    fn delete_profile(&mut self, profile_id: &str) -> bool {
        self.registry.remove(profile_id).is_some()
    }

    /// Name of the configured algorithm
    fn algorithm(&self) -> &'static str {
        self.engine.config().algorithm.name()
    }
}

/// Names of the available algorithms
#[pyfunction]
pub fn algorithms() -> Vec<&'static str> {
    Algorithm::ALL.iter().map(|a| a.name()).collect()
}

/// Preset names and descriptions
#[pyfunction]
pub fn presets() -> Vec<(&'static str, &'static str)> {
    Preset::ALL
        .iter()
        .map(|p| (p.name(), p.description()))
        .collect()
}
