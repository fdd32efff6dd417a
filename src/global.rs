//! Process-wide binding cache for the embedded CPython interpreter
//!
//! Design: one `BindingCache<PyHost>` per process behind a mutex, so a
//! half-invalidated table (module cleared, member still cached) can never be
//! observed. The lock is only ever tried, never waited on: a caller that
//! finds it taken is re-entering from inside a host call (for example a
//! `gc.callbacks` hook) or racing another thread that holds the GIL, and
//! blocking would deadlock. Such callers get `ErrorKind::Busy` and a
//! `RuntimeError` on the interpreter's error indicator.

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use pyo3::exceptions::PyRuntimeError;
use pyo3::prelude::*;

use crate::cache::{BindingCache, CacheSnapshot, GcFlag};
use crate::config::GchConfig;
use crate::errors::{GchError, GchResult};
use crate::host::PyHost;
use crate::logging::{self, info, warn};

static GC_API: Lazy<Mutex<BindingCache<PyHost>>> = Lazy::new(|| {
    let config = GchConfig::from_env();
    logging::init_retained(config.logging.to_log_config().with_env_overrides());
    info!(module = %config.module, flag_policy = ?config.flag_policy, "gc binding table created");
    Mutex::new(BindingCache::with_config(PyHost, &config))
});

/// Run `f` against the process-wide cache
pub fn with_api<R>(f: impl FnOnce(&mut BindingCache<PyHost>) -> GchResult<R>) -> GchResult<R> {
    match GC_API.try_lock() {
        Some(mut api) => f(&mut api),
        None => {
            warn!("gc binding table re-entered while in use");
            if PyHost.is_initialized() {
                Python::with_gil(|py| {
                    PyRuntimeError::new_err("py_gch binding table is already in use").restore(py)
                });
            }
            Err(GchError::busy())
        }
    }
}

/// Load configuration and start logging; later calls do nothing
pub fn init() {
    Lazy::force(&GC_API);
}

/// True if the collector module handle is cached
pub fn gc_imported() -> bool {
    GC_API.try_lock().map_or(false, |api| api.module_imported())
}

pub fn ensure_gc_imported() -> GchResult<()> {
    with_api(|api| api.ensure_module_imported().map(|_| ()))
}

pub fn enable() -> GchResult<()> {
    with_api(|api| api.enable())
}

pub fn disable() -> GchResult<()> {
    with_api(|api| api.disable())
}

pub fn isenabled() -> GchResult<bool> {
    with_api(|api| api.isenabled())
}

/// Collect `generation`, or everything for `ALL_GENERATIONS`
pub fn collect(generation: isize) -> GchResult<usize> {
    with_api(|api| api.collect(generation))
}

/// Undecoded result of `gc.collect`
pub fn collect_raw(generation: isize) -> GchResult<PyObject> {
    with_api(|api| api.collect_raw(generation))
}

pub fn get_flag(flag: GcFlag) -> GchResult<u64> {
    with_api(|api| api.get_flag(flag))
}

/// New reference to `gc.garbage`
pub fn garbage() -> GchResult<PyObject> {
    with_api(|api| api.garbage().map(|handle| Python::with_gil(|py| handle.clone_ref(py))))
}

/// New reference to `gc.callbacks`
pub fn callbacks() -> GchResult<PyObject> {
    with_api(|api| api.callbacks().map(|handle| Python::with_gil(|py| handle.clone_ref(py))))
}

pub fn snapshot() -> GchResult<CacheSnapshot> {
    with_api(|api| Ok(api.snapshot()))
}

/// Drop every cached binding without touching the interpreter
pub fn invalidate() -> GchResult<()> {
    with_api(|api| {
        api.invalidate();
        Ok(())
    })
}

/// `Py_FinalizeEx` followed by cache invalidation
///
/// Embedders must route interpreter shutdown through here instead of calling
/// `Py_FinalizeEx` directly, or the cache will hand out dangling handles
/// after the next `Py_Initialize`.
///
/// # Safety
/// Same contract as `Py_FinalizeEx`: called from the thread holding the GIL,
/// with no Python objects borrowed on the Rust side.
pub unsafe fn finalize_ex() -> GchResult<()> {
    with_api(|api| api.guarded_teardown())
}
