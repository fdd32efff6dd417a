//! pygch - cached access to a host runtime's garbage collector controls
//!
//! CPython's `gc` module has no C API. This crate resolves `gc` and its
//! members by name, caches the handles, and drops them when the interpreter
//! is torn down so they are re-resolved after the next initialization.

pub mod cache;
pub mod config;
pub mod errors;
pub mod host;
pub mod logging;
pub mod pause;

#[cfg(feature = "python")]
pub mod capi;
#[cfg(feature = "python")]
pub mod global;

// Re-export commonly used items
pub use cache::{BindingCache, CacheSnapshot, CacheStats, GcFlag, Member, Slot, SlotState, ALL_GENERATIONS};
pub use config::{FlagPolicy, GchConfig};
pub use errors::{ErrorKind, GchError, GchResult};
pub use host::{CallArgs, Host, HostError, SimHandle, SimHost};
pub use logging::{init_logging, LogConfig, LogFormat, LogOutput};
pub use pause::GcPause;

#[cfg(feature = "python")]
pub use host::PyHost;

#[cfg(feature = "python")]
use pyo3::prelude::*;

#[cfg(feature = "python")]
fn to_pyerr(py: Python<'_>, err: GchError) -> PyErr {
    // The interpreter's own exception is more precise than ours
    PyErr::take(py)
        .unwrap_or_else(|| PyErr::new::<pyo3::exceptions::PyRuntimeError, _>(err.to_string()))
}

#[cfg(feature = "python")]
#[pyfunction]
fn enable(py: Python<'_>) -> PyResult<()> {
    global::enable().map_err(|e| to_pyerr(py, e))
}

#[cfg(feature = "python")]
#[pyfunction]
fn disable(py: Python<'_>) -> PyResult<()> {
    global::disable().map_err(|e| to_pyerr(py, e))
}

#[cfg(feature = "python")]
#[pyfunction]
fn isenabled(py: Python<'_>) -> PyResult<bool> {
    global::isenabled().map_err(|e| to_pyerr(py, e))
}

#[cfg(feature = "python")]
#[pyfunction]
#[pyo3(signature = (generation = ALL_GENERATIONS))]
fn collect(py: Python<'_>, generation: isize) -> PyResult<usize> {
    global::collect(generation).map_err(|e| to_pyerr(py, e))
}

#[cfg(feature = "python")]
#[pyfunction]
fn get_flag(py: Python<'_>, name: String) -> PyResult<u64> {
    let flag = name.parse::<GcFlag>()
        .map_err(|e| PyErr::new::<pyo3::exceptions::PyValueError, _>(e))?;

    global::get_flag(flag).map_err(|e| to_pyerr(py, e))
}

#[cfg(feature = "python")]
#[pyfunction]
fn garbage(py: Python<'_>) -> PyResult<PyObject> {
    global::garbage().map_err(|e| to_pyerr(py, e))
}

#[cfg(feature = "python")]
#[pyfunction]
fn callbacks(py: Python<'_>) -> PyResult<PyObject> {
    global::callbacks().map_err(|e| to_pyerr(py, e))
}

#[cfg(feature = "python")]
#[pyfunction]
fn cache_state(py: Python<'_>) -> PyResult<String> {
    global::snapshot()
        .map(|snapshot| snapshot.to_json())
        .map_err(|e| to_pyerr(py, e))
}

#[cfg(feature = "python")]
#[pyfunction]
fn invalidate(py: Python<'_>) -> PyResult<()> {
    global::invalidate().map_err(|e| to_pyerr(py, e))
}

#[cfg(feature = "python")]
#[pymodule]
fn _gch(_py: Python, m: &PyModule) -> PyResult<()> {
    global::init();
    m.add("__version__", env!("CARGO_PKG_VERSION"))?;
    m.add("ALL_GENERATIONS", ALL_GENERATIONS)?;
    m.add_function(wrap_pyfunction!(enable, m)?)?;
    m.add_function(wrap_pyfunction!(disable, m)?)?;
    m.add_function(wrap_pyfunction!(isenabled, m)?)?;
    m.add_function(wrap_pyfunction!(collect, m)?)?;
    m.add_function(wrap_pyfunction!(get_flag, m)?)?;
    m.add_function(wrap_pyfunction!(garbage, m)?)?;
    m.add_function(wrap_pyfunction!(callbacks, m)?)?;
    m.add_function(wrap_pyfunction!(cache_state, m)?)?;
    m.add_function(wrap_pyfunction!(invalidate, m)?)?;
    Ok(())
}
