//! Failure indicators returned by the binding cache
//!
//! A `GchError` only says which step failed. The descriptive message stays on
//! the host's ambient error channel and is read with `Host::last_error`.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The host module could not be imported
    ModuleUnavailable { module: String },
    /// The module has no attribute of this name
    MemberUnavailable { member: String },
    /// The resolved callable failed when invoked
    Invocation { member: String },
    /// The value returned by the host could not be decoded
    Conversion { member: String },
    /// The host teardown routine reported a negative status
    Teardown { status: i32 },
    /// The process-wide binding table is held by another caller
    Busy,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ModuleUnavailable { module } => {
                write!(f, "could not import module '{}'", module)
            }
            Self::MemberUnavailable { member } => {
                write!(f, "could not resolve member '{}'", member)
            }
            Self::Invocation { member } => {
                write!(f, "call to '{}' failed", member)
            }
            Self::Conversion { member } => {
                write!(f, "could not decode value returned by '{}'", member)
            }
            Self::Teardown { status } => {
                write!(f, "runtime teardown failed with status {}", status)
            }
            Self::Busy => write!(f, "binding table is already in use"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GchError {
    pub kind: ErrorKind,
}

impl GchError {
    pub fn new(kind: ErrorKind) -> Self {
        Self { kind }
    }

    pub fn module_unavailable(module: impl Into<String>) -> Self {
        Self::new(ErrorKind::ModuleUnavailable { module: module.into() })
    }

    pub fn member_unavailable(member: impl Into<String>) -> Self {
        Self::new(ErrorKind::MemberUnavailable { member: member.into() })
    }

    pub fn invocation(member: impl Into<String>) -> Self {
        Self::new(ErrorKind::Invocation { member: member.into() })
    }

    pub fn conversion(member: impl Into<String>) -> Self {
        Self::new(ErrorKind::Conversion { member: member.into() })
    }

    pub fn teardown(status: i32) -> Self {
        Self::new(ErrorKind::Teardown { status })
    }

    pub fn busy() -> Self {
        Self::new(ErrorKind::Busy)
    }

    /// True for failures to locate the module or one of its members
    pub fn is_resolution_failure(&self) -> bool {
        matches!(
            self.kind,
            ErrorKind::ModuleUnavailable { .. } | ErrorKind::MemberUnavailable { .. }
        )
    }
}

impl fmt::Display for GchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)
    }
}

impl std::error::Error for GchError {}

pub type GchResult<T> = Result<T, GchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let err = GchError::member_unavailable("isenabled");
        assert_eq!(err.to_string(), "could not resolve member 'isenabled'");

        let err = GchError::teardown(-1);
        assert_eq!(err.to_string(), "runtime teardown failed with status -1");
    }

    #[test]
    fn test_resolution_classification() {
        assert!(GchError::module_unavailable("gc").is_resolution_failure());
        assert!(GchError::member_unavailable("collect").is_resolution_failure());
        assert!(!GchError::invocation("collect").is_resolution_failure());
        assert!(!GchError::busy().is_resolution_failure());
    }
}
