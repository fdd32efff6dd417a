//! C API - collector controls for C/C++ extension code
//!
//! Design: CPython's `gc` module has no public C API, so these entry points
//! stand in for one. Conventions follow the Python C API:
//! 1. Failure is signaled by `-1`, `0` or `NULL` as documented per function
//! 2. The exception describing a failure is left set on the interpreter
//! 3. Returned `PyObject *` are borrowed unless stated otherwise
//!
//! All functions must be called with the GIL held, except `pygch_gc_imported`.

use std::ffi::CStr;
use std::os::raw::{c_char, c_int};
use std::ptr;

use pyo3::exceptions::PyValueError;
use pyo3::ffi::PyObject;
use pyo3::prelude::*;

use crate::cache::{GcFlag, Slot};
use crate::errors::ErrorKind;
use crate::global;
use crate::host::PyHost;
use crate::logging::trace;

#[inline]
fn status(result: crate::errors::GchResult<()>) -> c_int {
    match result {
        Ok(()) => 0,
        Err(_) => -1,
    }
}

/// Load configuration and start logging. Optional; safe to call repeatedly.
#[no_mangle]
pub extern "C" fn pygch_init() {
    global::init();
}

/// `1` if the `gc` module handle is cached, `0` otherwise. Never fails.
#[no_mangle]
pub extern "C" fn pygch_gc_imported() -> c_int {
    global::gc_imported() as c_int
}

/// Import `gc` unless already cached. `1` on success, `0` on failure.
#[no_mangle]
pub extern "C" fn pygch_gc_unique_import() -> c_int {
    global::ensure_gc_imported().is_ok() as c_int
}

/// Resolve attribute `name` of `gc` into `*dest`, importing `gc` first.
///
/// A non-NULL `*dest` is left alone and counts as success. Otherwise `*dest`
/// receives a new reference owned by the caller, which must not outlive the
/// interpreter. `1` on success, `0` on failure.
///
/// # Safety
/// `name` must be a valid NUL-terminated string and `dest` a valid pointer.
#[no_mangle]
pub unsafe extern "C" fn pygch_gc_member_unique_import(
    name: *const c_char,
    dest: *mut *mut PyObject,
) -> c_int {
    if name.is_null() || dest.is_null() {
        raise_value_error("member name and destination must not be NULL");
        return 0;
    }

    let name = CStr::from_ptr(name).to_string_lossy();
    let resolved = global::with_api(|api| {
        if !(*dest).is_null() {
            return api.ensure_module_imported().map(|_| ());
        }

        let mut slot = Slot::Unresolved;
        api.resolve_into(&name, &mut slot)?;
        if let Some(handle) = slot.take() {
            *dest = handle.into_ptr();
        }
        Ok(())
    });

    resolved.is_ok() as c_int
}

/// `gc.enable()`. `0` on success, `-1` on failure.
#[no_mangle]
pub extern "C" fn pygch_gc_enable() -> c_int {
    status(global::enable())
}

/// `gc.disable()`. `0` on success, `-1` on failure.
#[no_mangle]
pub extern "C" fn pygch_gc_disable() -> c_int {
    status(global::disable())
}

/// `gc.isenabled()`. `1` or `0`, `-1` on failure.
#[no_mangle]
pub extern "C" fn pygch_gc_isenabled() -> c_int {
    match global::isenabled() {
        Ok(enabled) => enabled as c_int,
        Err(_) => -1,
    }
}

/// `gc.collect(generation)`, or `gc.collect()` when `generation == -1`.
///
/// Returns a new reference to the host's result, `NULL` on failure. Any
/// exception pending on entry is cleared first.
#[no_mangle]
pub extern "C" fn pygch_gc_collect_gen(generation: isize) -> *mut PyObject {
    trace!(generation, "pygch_gc_collect_gen");
    match global::collect_raw(generation) {
        Ok(result) => result.into_ptr(),
        Err(_) => ptr::null_mut(),
    }
}

/// Like `pygch_gc_collect_gen`, decoded to the number of unreachable objects.
/// `-1` on failure.
#[no_mangle]
pub extern "C" fn pygch_gc_collect_count(generation: isize) -> isize {
    match global::collect(generation) {
        Ok(found) => found as isize,
        Err(_) => -1,
    }
}

/// Borrowed reference to `gc.garbage`, `NULL` on failure
#[no_mangle]
pub extern "C" fn pygch_gc_garbage() -> *mut PyObject {
    global::with_api(|api| api.garbage().map(|handle| handle.as_ptr()))
        .unwrap_or(ptr::null_mut())
}

/// Borrowed reference to `gc.callbacks`, `NULL` on failure
#[no_mangle]
pub extern "C" fn pygch_gc_callbacks() -> *mut PyObject {
    global::with_api(|api| api.callbacks().map(|handle| handle.as_ptr()))
        .unwrap_or(ptr::null_mut())
}

/// Read a debug flag such as `"DEBUG_LEAK"` into `*out`.
///
/// `0` on success, `-1` on failure. Unknown names raise `ValueError`.
///
/// # Safety
/// `name` must be a valid NUL-terminated string and `out` a valid pointer.
#[no_mangle]
pub unsafe extern "C" fn pygch_gc_get_flag(name: *const c_char, out: *mut u64) -> c_int {
    if name.is_null() || out.is_null() {
        raise_value_error("flag name and output pointer must not be NULL");
        return -1;
    }

    let name = CStr::from_ptr(name).to_string_lossy();
    let flag = match name.parse::<GcFlag>() {
        Ok(flag) => flag,
        Err(msg) => {
            raise_value_error(&msg);
            return -1;
        }
    };

    match global::get_flag(flag) {
        Ok(value) => {
            *out = value;
            0
        }
        Err(_) => -1,
    }
}

/// Forget every cached binding. Never fails unless the table is busy.
#[no_mangle]
pub extern "C" fn pygch_invalidate() -> c_int {
    status(global::invalidate())
}

/// Replacement for `Py_FinalizeEx` that also invalidates the cache.
///
/// Returns the interpreter's teardown status, or `-1` if the table is busy.
///
/// # Safety
/// Same contract as `Py_FinalizeEx`.
#[no_mangle]
pub unsafe extern "C" fn pygch_finalize_ex() -> c_int {
    match global::finalize_ex() {
        Ok(()) => 0,
        Err(err) => match err.kind {
            ErrorKind::Teardown { status } => status,
            _ => -1,
        },
    }
}

fn raise_value_error(message: &str) {
    if PyHost.is_initialized() {
        Python::with_gil(|py| PyValueError::new_err(message.to_string()).restore(py));
    }
}
