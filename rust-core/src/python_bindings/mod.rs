//! PyO3 bindings for Python integration

use pyo3::prelude::*;

mod reducer_bindings;

/// Python module definition
#[pymodule]
fn spectral_denoise(_py: Python, m: &PyModule) -> PyResult<()> {
    m.add_class::<reducer_bindings::PyNoiseReducer>()?;
    m.add_function(wrap_pyfunction!(reducer_bindings::algorithms, m)?)?;
    m.add_function(wrap_pyfunction!(reducer_bindings::presets, m)?)?;

    Ok(())
}
