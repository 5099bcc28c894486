//! PyO3 bindings for Python integration

use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;

use crate::error::AnalysisError;

mod processor_bindings;

/// Map engine errors onto `ValueError`
pub(crate) fn to_py_err(error: AnalysisError) -> PyErr {
    PyValueError::new_err(error.to_string())
}

/// Degenerate outcomes become `None`, everything else raises
pub(crate) fn degenerate_to_none<T>(result: crate::Result<T>) -> PyResult<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(error) if error.is_degenerate() => {
            log::debug!("returning None for degenerate result: {}", error);
            Ok(None)
        }
        Err(error) => Err(to_py_err(error)),
    }
}

/// Python module definition
#[pymodule]
fn mirnov_analysis(_py: Python, m: &PyModule) -> PyResult<()> {
    m.add_class::<processor_bindings::PySignalProcessor>()?;
    Ok(())
}
