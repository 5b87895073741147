//! Error types for sandbox-fs

use std::fmt;
use std::path::PathBuf;

/// Result type for local config and I/O operations
pub type Result<T> = std::result::Result<T, Error>;

/// Result type for adapter operations
pub type FsResult<T> = std::result::Result<T, FsError>;

/// Errors from local config loading and atomic file writes
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {format} config at {path}: {message}")]
    ConfigParse {
        path: PathBuf,
        format: String,
        message: String,
    },

    #[error("Failed to serialize {format} config for {path}: {message}")]
    ConfigSerialize {
        path: PathBuf,
        format: String,
        message: String,
    },

    #[error("Unsupported config format: {extension}")]
    UnsupportedFormat { extension: String },

    #[error("Lock acquisition failed for {path}")]
    LockFailed { path: PathBuf },
}

impl Error {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Unix error codes the adapter can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// Invalid argument
    Einval,
    /// No such file or directory
    Enoent,
    /// Operation not permitted
    Eperm,
    /// File exists
    Eexist,
    /// I/O error
    Eio,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Einval => "EINVAL",
            Self::Enoent => "ENOENT",
            Self::Eperm => "EPERM",
            Self::Eexist => "EEXIST",
            Self::Eio => "EIO",
        }
    }

    /// POSIX errno value.
    pub fn errno(&self) -> i32 {
        match self {
            Self::Einval => 22,
            Self::Enoent => 2,
            Self::Eperm => 1,
            Self::Eexist => 17,
            Self::Eio => 5,
        }
    }

    fn description(&self) -> &'static str {
        match self {
            Self::Einval => "invalid argument",
            Self::Enoent => "no such file or directory",
            Self::Eperm => "operation not permitted",
            Self::Eexist => "file already exists",
            Self::Eio => "i/o error",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A filesystem error shaped like a native one.
///
/// Version-control engines branch on `code`, `errno`, `syscall` and `path`
/// exactly as they would for a local filesystem, so every adapter failure
/// carries all four.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{code}: {message}, {syscall} '{path}'")]
pub struct FsError {
    pub code: ErrorCode,
    pub errno: i32,
    pub syscall: &'static str,
    pub path: String,
    pub message: String,
}

impl FsError {
    pub fn new(code: ErrorCode, syscall: &'static str, path: impl Into<String>) -> Self {
        Self {
            code,
            errno: code.errno(),
            syscall,
            path: path.into(),
            message: code.description().to_string(),
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    pub fn einval(syscall: &'static str, path: impl Into<String>) -> Self {
        Self::new(ErrorCode::Einval, syscall, path)
    }

    pub fn enoent(syscall: &'static str, path: impl Into<String>) -> Self {
        Self::new(ErrorCode::Enoent, syscall, path)
    }

    pub fn eperm(syscall: &'static str, path: impl Into<String>) -> Self {
        Self::new(ErrorCode::Eperm, syscall, path)
    }

    pub fn is_not_found(&self) -> bool {
        self.code == ErrorCode::Enoent
    }
}
