//! Error types for the storage backend core.
//!
//! Uses `thiserror` for the public error taxonomy, following the same
//! single-enum convention the teacher crate's error module uses.
//! `std::io::Error` converts in via a hand-written `From` impl that
//! dispatches on `ErrorKind` rather than a blanket `#[from]`, so an
//! underlying `NotFound` surfaces as `BackendError::NotFound` instead of
//! being wrapped opaquely in `BackendError::Io`.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for backend operations.
pub type BackendResult<T> = Result<T, BackendError>;

/// The kinds of precondition violation surfaced as `BackendError::InvalidOperation`.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidOperationKind {
    #[error("path escapes the backend root")]
    PathOutsideRoot,
    #[error("path is empty")]
    EmptyPath,
    #[error("operation not permitted on the backend root itself")]
    RootPathNotAllowed,
    #[error("cannot read a directory as a file")]
    CannotReadDirectory,
    #[error("cannot update a directory as a file")]
    CannotUpdateDirectory,
    #[error("cannot overwrite an existing file with a directory")]
    CannotOverwriteFileWithDirectory,
    #[error("cannot overwrite an existing directory with a file")]
    CannotOverwriteDirectoryWithFile,
    #[error("directory is not empty")]
    DirectoryNotEmpty,
    #[error("a parent component of the path is not a directory")]
    ParentNotDirectory,
}

/// Main error type for storage backend operations.
#[derive(Error, Debug)]
pub enum BackendError {
    /// Target path does not exist.
    #[error("not found: {0}")]
    NotFound(PathBuf),

    /// Target path already exists and the caller did not ask to overwrite it.
    #[error("already exists: {0}")]
    AlreadyExists(PathBuf),

    /// The caller violated an operation precondition.
    #[error("invalid operation on {path}: {kind}")]
    InvalidOperation {
        kind: InvalidOperationKind,
        path: PathBuf,
    },

    /// Synchronisation with the remote failed: unresolved conflicts, a dirty
    /// working tree before pull, or a VCS invocation failure.
    #[error("sync error: {0}")]
    SyncError(String),

    /// Lock acquisition failed for a reason other than timeout.
    #[error("lock error: {message}{}", path.as_ref().map(|p| format!(" ({})", p.display())).unwrap_or_default())]
    LockError {
        message: String,
        path: Option<PathBuf>,
    },

    /// Lock acquisition exceeded the caller's timeout.
    #[error("timed out waiting for lock")]
    LockTimeout,

    /// I/O error not otherwise classified.
    #[error("I/O error: {0}")]
    Io(std::io::Error),
}

/// Dispatches on `ErrorKind` per §1A: `NotFound` becomes
/// `BackendError::NotFound` (with no path — a plain `io::Error` carries
/// none); every other kind is wrapped as `BackendError::Io` unchanged.
impl From<std::io::Error> for BackendError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => BackendError::NotFound(PathBuf::new()),
            _ => BackendError::Io(err),
        }
    }
}

impl BackendError {
    pub fn invalid(kind: InvalidOperationKind, path: impl Into<PathBuf>) -> Self {
        BackendError::InvalidOperation {
            kind,
            path: path.into(),
        }
    }

    pub fn lock_error(message: impl Into<String>, path: Option<PathBuf>) -> Self {
        BackendError::LockError {
            message: message.into(),
            path,
        }
    }
}
