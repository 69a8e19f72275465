//! VFS error types.
//!
//! Every failure is a [`VfsError`] tagged with one [`ErrorKind`] from a
//! closed set. Backend failures are normalized once, at the adapter
//! boundary, through [`VfsError::wrap_io`].

use std::error::Error as StdError;
use std::fmt;
use std::io;

use strum::{AsRefStr, Display, EnumString};
use thiserror::Error;

/// Closed set of error kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, AsRefStr)]
pub enum ErrorKind {
    /// The path does not resolve to an entry.
    NotFound,
    /// Permission denied by the backend.
    NotAllowed,
    /// Expected a file but found a directory, or the reverse.
    TypeMismatch,
    /// The entry cannot be modified (read-only, destination exists, pending writer).
    NoModificationAllowed,
    /// The operation is not valid in the current state.
    InvalidState,
    /// Storage capacity exhausted.
    QuotaExceeded,
    /// The caller or user cancelled an interactive operation.
    Abort,
    /// The request would escape its sandbox or uses a forbidden name.
    Security,
    /// Content could not be decoded or encoded.
    Encoding,
    /// The feature is unavailable on this backend.
    NotSupported,
}

/// VFS error type.
#[derive(Debug, Error)]
pub struct VfsError {
    kind: ErrorKind,
    path: Option<String>,
    detail: String,
    #[source]
    source: Option<Box<dyn StdError + Send + Sync>>,
}

impl fmt::Display for VfsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        if let Some(path) = &self.path {
            write!(f, " ({path})")?;
        }
        if !self.detail.is_empty() {
            write!(f, ": {}", self.detail)?;
        }
        Ok(())
    }
}

impl VfsError {
    /// Create an error of the given kind with a detail message.
    pub fn new(kind: ErrorKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            path: None,
            detail: detail.into(),
            source: None,
        }
    }

    /// Attach the offending path.
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Attach an underlying cause.
    pub fn with_source(mut self, source: impl Into<Box<dyn StdError + Send + Sync>>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    pub fn detail(&self) -> &str {
        &self.detail
    }

    pub fn is_not_found(&self) -> bool {
        self.kind == ErrorKind::NotFound
    }

    /// True when a user declined an interactive operation.
    ///
    /// Callers treat this as a control path, not a failure.
    pub fn is_abort(&self) -> bool {
        self.kind == ErrorKind::Abort
    }

    /// Create a NotFound error.
    pub fn not_found(path: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, "no such entry").with_path(path)
    }

    /// Create a TypeMismatch error for a path that is not a file.
    pub fn not_a_file(path: impl Into<String>) -> Self {
        Self::new(ErrorKind::TypeMismatch, "expected a file, found a directory").with_path(path)
    }

    /// Create a TypeMismatch error for a path that is not a directory.
    pub fn not_a_directory(path: impl Into<String>) -> Self {
        Self::new(ErrorKind::TypeMismatch, "expected a directory, found a file").with_path(path)
    }

    /// Create a NoModificationAllowed error for an occupied destination.
    pub fn already_exists(path: impl Into<String>) -> Self {
        Self::new(ErrorKind::NoModificationAllowed, "destination already exists").with_path(path)
    }

    /// Create an InvalidState error for a non-recursive removal of a populated directory.
    pub fn directory_not_empty(path: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidState, "directory not empty").with_path(path)
    }

    /// Create a Security error for a forbidden name or path.
    pub fn invalid_name(name: impl Into<String>) -> Self {
        Self::new(ErrorKind::Security, "invalid entry name").with_path(name)
    }

    /// Create a NotSupported error.
    pub fn not_supported(what: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotSupported, what)
    }

    /// Create a NoModificationAllowed error for a read-only target.
    pub fn read_only(path: impl Into<String>) -> Self {
        Self::new(ErrorKind::NoModificationAllowed, "read-only").with_path(path)
    }

    /// Create an InvalidState error.
    pub fn invalid_state(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidState, detail)
    }

    /// Create a QuotaExceeded error.
    pub fn quota_exceeded(path: impl Into<String>, needed: u64, capacity: u64) -> Self {
        Self::new(
            ErrorKind::QuotaExceeded,
            format!("{needed} bytes needed, capacity is {capacity}"),
        )
        .with_path(path)
    }

    /// Create a QuotaExceeded error for a size that cannot be represented or allocated.
    pub fn too_large(path: impl Into<String>, size: impl fmt::Display) -> Self {
        Self::new(
            ErrorKind::QuotaExceeded,
            format!("file would grow to {size} bytes, beyond what can be held"),
        )
        .with_path(path)
    }

    /// Create an Encoding error.
    pub fn encoding(path: impl Into<String>, source: impl StdError + Send + Sync + 'static) -> Self {
        Self::new(ErrorKind::Encoding, "content is not valid UTF-8")
            .with_path(path)
            .with_source(source)
    }

    /// Create an Abort error.
    pub fn aborted(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::Abort, detail)
    }

    /// Normalize a backend I/O failure into the taxonomy.
    ///
    /// An `io::Error` that already carries a `VfsError` is unwrapped and
    /// returned as-is, so errors are wrapped exactly once.
    pub fn wrap_io(path: impl Into<String>, err: io::Error) -> Self {
        let kind = match err.kind() {
            io::ErrorKind::NotFound => ErrorKind::NotFound,
            io::ErrorKind::PermissionDenied => ErrorKind::NotAllowed,
            io::ErrorKind::NotADirectory | io::ErrorKind::IsADirectory => ErrorKind::TypeMismatch,
            io::ErrorKind::AlreadyExists | io::ErrorKind::ReadOnlyFilesystem => {
                ErrorKind::NoModificationAllowed
            }
            io::ErrorKind::DirectoryNotEmpty => ErrorKind::InvalidState,
            io::ErrorKind::StorageFull
            | io::ErrorKind::QuotaExceeded
            | io::ErrorKind::FileTooLarge => {
                ErrorKind::QuotaExceeded
            }
            io::ErrorKind::InvalidData => ErrorKind::Encoding,
            io::ErrorKind::Unsupported => ErrorKind::NotSupported,
            _ => ErrorKind::InvalidState,
        };

        if err.get_ref().is_some_and(|inner| inner.is::<VfsError>()) {
            if let Some(inner) = err.into_inner() {
                match inner.downcast::<VfsError>() {
                    Ok(vfs) => return *vfs,
                    Err(other) => {
                        return Self::new(kind, other.to_string()).with_path(path).with_source(other);
                    }
                }
            }
            return Self::new(kind, "unknown I/O failure").with_path(path);
        }

        Self::new(kind, err.to_string()).with_path(path).with_source(err)
    }
}

/// Convert VfsError to std::io::Error for compatibility.
///
/// The original error rides along as the inner error so that
/// [`VfsError::wrap_io`] can recover it unchanged.
impl From<VfsError> for io::Error {
    fn from(e: VfsError) -> Self {
        let kind = match e.kind {
            ErrorKind::NotFound => io::ErrorKind::NotFound,
            ErrorKind::NotAllowed | ErrorKind::Security => io::ErrorKind::PermissionDenied,
            ErrorKind::TypeMismatch => io::ErrorKind::InvalidInput,
            ErrorKind::NoModificationAllowed => io::ErrorKind::ReadOnlyFilesystem,
            ErrorKind::QuotaExceeded => io::ErrorKind::StorageFull,
            ErrorKind::Abort => io::ErrorKind::Interrupted,
            ErrorKind::Encoding => io::ErrorKind::InvalidData,
            ErrorKind::NotSupported => io::ErrorKind::Unsupported,
            ErrorKind::InvalidState => io::ErrorKind::Other,
        };
        io::Error::new(kind, e)
    }
}

/// VFS result type.
pub type VfsResult<T> = Result<T, VfsError>;
