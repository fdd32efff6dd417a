//! CPython host via pyo3
//!
//! Errors raised by the interpreter are put back on its error indicator with
//! `PyErr::restore`, so native callers see them exactly where the C API
//! would leave them.

use std::os::raw::c_ulong;

use pyo3::exceptions::{PyRuntimeError, PyTypeError, PyValueError};
use pyo3::ffi;
use pyo3::prelude::*;
use pyo3::types::PyModule;

use super::{CallArgs, Host, HostError};

/// The running CPython interpreter
#[derive(Debug, Clone, Copy, Default)]
pub struct PyHost;

impl PyHost {
    pub fn is_initialized(&self) -> bool {
        unsafe { ffi::Py_IsInitialized() != 0 }
    }

    /// Run `f` with the GIL held, or fail if there is no interpreter
    fn with_runtime<R>(&self, f: impl FnOnce(Python<'_>) -> Option<R>) -> Option<R> {
        if !self.is_initialized() {
            return None;
        }
        Python::with_gil(f)
    }
}

/// Convert a pyo3 result into the C convention: value or restored error
fn settle<T>(py: Python<'_>, result: PyResult<T>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(err) => {
            err.restore(py);
            None
        }
    }
}

impl Host for PyHost {
    type Handle = PyObject;

    fn import_module(&self, name: &str) -> Option<PyObject> {
        self.with_runtime(|py| {
            let module = settle(py, PyModule::import(py, name))?;
            let module: &PyAny = module;
            Some(module.into_py(py))
        })
    }

    fn get_attr(&self, target: &PyObject, name: &str) -> Option<PyObject> {
        self.with_runtime(|py| settle(py, target.getattr(py, name)))
    }

    fn call(&self, callable: &PyObject, args: CallArgs) -> Option<PyObject> {
        self.with_runtime(|py| {
            let result = match args {
                CallArgs::Empty => callable.call0(py),
                CallArgs::Int(n) => callable.call1(py, (n,)),
            };
            settle(py, result)
        })
    }

    fn to_isize(&self, value: &PyObject) -> Option<isize> {
        self.with_runtime(|py| settle(py, value.extract::<isize>(py)))
    }

    fn to_bool(&self, value: &PyObject) -> Option<bool> {
        self.with_runtime(|py| settle(py, value.as_ref(py).is_true()))
    }

    fn to_flag_mask(&self, value: &PyObject) -> Option<u64> {
        self.with_runtime(|py| {
            let mask = unsafe { ffi::PyLong_AsUnsignedLongMask(value.as_ptr()) };
            // All ones is also a legitimate mask; only an error makes it a failure
            if mask == c_ulong::MAX && PyErr::occurred(py) {
                None
            } else {
                Some(mask as u64)
            }
        })
    }

    fn error_pending(&self) -> bool {
        self.with_runtime(|py| Some(PyErr::occurred(py))).unwrap_or(false)
    }

    fn last_error(&self) -> Option<HostError> {
        if !self.is_initialized() {
            return Some(HostError::new("RuntimeError", "Python interpreter is not initialized"));
        }

        Python::with_gil(|py| {
            let err = PyErr::take(py)?;
            // `PyType::name` goes through an interned string that does not
            // survive an interpreter restart
            let kind = err
                .get_type(py)
                .getattr("__name__")
                .and_then(|name| name.extract::<String>())
                .unwrap_or_else(|_| "Exception".to_string());
            let message = err.value(py).to_string();
            err.restore(py);
            Some(HostError::new(kind, message))
        })
    }

    fn clear_error(&self) {
        self.with_runtime(|_py| {
            unsafe { ffi::PyErr_Clear() };
            Some(())
        });
    }

    fn set_error(&self, kind: &str, message: &str) {
        self.with_runtime(|py| {
            let err = match kind {
                "TypeError" => PyTypeError::new_err(message.to_string()),
                "ValueError" => PyValueError::new_err(message.to_string()),
                _ => PyRuntimeError::new_err(message.to_string()),
            };
            err.restore(py);
            Some(())
        });
    }

    /// Finalize the interpreter
    ///
    /// The calling thread must hold the GIL and no pyo3 `GILPool` may be
    /// alive, exactly as for `Py_FinalizeEx`.
    fn finalize(&self) -> i32 {
        if !self.is_initialized() {
            return -1;
        }
        // Acquiring the GIL through pyo3 applies reference count changes it
        // deferred while the GIL was not tracked; after teardown they would
        // land on freed objects.
        Python::with_gil(|_py| ());
        unsafe { ffi::Py_FinalizeEx() }
    }

    /// Drop `handle` with the GIL held so the decrement is not deferred
    fn release(&self, handle: PyObject) {
        let mut handle = Some(handle);
        self.with_runtime(|_py| handle.take().map(drop));
        if let Some(handle) = handle {
            // No interpreter left to release into
            std::mem::forget(handle);
        }
    }

    /// The interpreter that owned `handle` is gone; decrementing it would
    /// touch freed memory, so the reference is leaked instead.
    fn abandon(&self, handle: PyObject) {
        std::mem::forget(handle);
    }
}
