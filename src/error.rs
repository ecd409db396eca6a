use std::path::PathBuf;

use thiserror::Error;

/// Classifies errors for callers that branch on the failure class
/// rather than on the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad argument or impossible state
    Internal,
    /// Allocation, file or directory failure
    Resource,
    /// Requested object, plugin or handle is absent
    NotFound,
    /// Lock file stayed in place for the whole wait period
    LockContention,
}

/// Vuurmuur error types
#[derive(Error, Debug)]
pub enum VrmrError {
    #[error("Internal Error: {0}")]
    Internal(String),

    #[error("IO error on '{}': {source}", .path.display())]
    IoAt {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Timeout waiting for lock on '{}' after {attempts} attempts", .path.display())]
    LockTimeout { path: PathBuf, attempts: u32 },

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Plugin not found: {0}")]
    PluginNotFound(String),

    #[error("Name too long: '{name}' (max {max})")]
    NameTooLong { name: String, max: usize },

    #[error("Invalid name: {0}")]
    InvalidName(String),

    #[error("Value of '{key}' exceeds {max} bytes")]
    ValueTooLong { key: String, max: usize },

    #[error("Backend state error: {0}")]
    BackendState(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Parse error: {0}")]
    Parse(String),
}

impl VrmrError {
    /// Attach a path to an I/O error.
    pub(crate) fn io_at(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        VrmrError::IoAt {
            path: path.into(),
            source,
        }
    }

    /// Failure class of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            VrmrError::IoAt { .. } => ErrorKind::Resource,
            VrmrError::NotFound(_) | VrmrError::PluginNotFound(_) => ErrorKind::NotFound,
            VrmrError::LockTimeout { .. } => ErrorKind::LockContention,
            VrmrError::Internal(_)
            | VrmrError::AlreadyExists(_)
            | VrmrError::NameTooLong { .. }
            | VrmrError::InvalidName(_)
            | VrmrError::ValueTooLong { .. }
            | VrmrError::BackendState(_)
            | VrmrError::Config(_)
            | VrmrError::Parse(_) => ErrorKind::Internal,
        }
    }
}

pub type Result<T> = std::result::Result<T, VrmrError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lock_timeout_is_lock_contention() {
        let err = VrmrError::LockTimeout {
            path: PathBuf::from("/tmp/rules.conf"),
            attempts: 60,
        };
        assert_eq!(err.kind(), ErrorKind::LockContention);
        let display = format!("{}", err);
        assert!(display.contains("rules.conf"), "got: {}", display);
        assert!(display.contains("60"), "got: {}", display);
    }

    #[test]
    fn test_io_errors_are_resource_errors() {
        let err = VrmrError::io_at(
            "/etc/vuurmuur/services/ssh",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert_eq!(err.kind(), ErrorKind::Resource);
        assert!(format!("{}", err).contains("/etc/vuurmuur/services/ssh"));
    }

    #[test]
    fn test_internal_error_display() {
        let err = VrmrError::Internal("list is empty".into());
        assert_eq!(err.kind(), ErrorKind::Internal);
        assert_eq!(format!("{}", err), "Internal Error: list is empty");
    }

    #[test]
    fn test_not_found_kinds() {
        assert_eq!(
            VrmrError::PluginNotFound("sql".into()).kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            VrmrError::NotFound("ssh".into()).kind(),
            ErrorKind::NotFound
        );
    }
}
