//! Host runtime boundary
//!
//! Design: every foreign call into the host goes through the `Host` trait so
//! the binding cache can be driven by CPython or by the simulated runtime.
//!
//! Failure convention mirrors the host's C API: an operation returns `None`
//! and leaves a descriptive error on the host's ambient channel, readable
//! with `last_error` until it is cleared.

pub mod sim;

#[cfg(feature = "python")]
pub mod python;

use std::fmt;

pub use sim::{SimHandle, SimHost};

#[cfg(feature = "python")]
pub use python::PyHost;

/// Argument convention for a host call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallArgs {
    /// `f()`
    Empty,
    /// `f(n)`
    Int(isize),
}

/// Snapshot of the error currently set on the host's ambient channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostError {
    /// Exception type name, e.g. `ImportError`
    pub kind: String,
    pub message: String,
}

impl HostError {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for HostError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

/// Foreign-call surface of a garbage-collected host runtime
pub trait Host {
    /// Opaque reference to a host-owned object
    type Handle: Clone;

    /// Import a module by name
    fn import_module(&self, name: &str) -> Option<Self::Handle>;

    /// Read a named attribute off `target`
    fn get_attr(&self, target: &Self::Handle, name: &str) -> Option<Self::Handle>;

    /// Invoke `callable` with the given argument convention
    fn call(&self, callable: &Self::Handle, args: CallArgs) -> Option<Self::Handle>;

    fn to_isize(&self, value: &Self::Handle) -> Option<isize>;

    fn to_bool(&self, value: &Self::Handle) -> Option<bool>;

    /// Decode an integer with wrap-around masking (no sign or range errors)
    fn to_flag_mask(&self, value: &Self::Handle) -> Option<u64>;

    fn error_pending(&self) -> bool;

    /// Read the pending error without clearing it
    fn last_error(&self) -> Option<HostError>;

    fn clear_error(&self);

    /// Set an error on the ambient channel, replacing any pending one
    fn set_error(&self, kind: &str, message: &str);

    /// Run the host's teardown routine. Negative status means failure.
    fn finalize(&self) -> i32;

    /// Dispose of a temporary handle while its runtime is still alive
    fn release(&self, handle: Self::Handle) {
        drop(handle);
    }

    /// Dispose of a handle whose owning runtime may already be gone
    fn abandon(&self, handle: Self::Handle) {
        drop(handle);
    }
}
