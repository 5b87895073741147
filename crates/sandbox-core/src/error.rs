//! Error types for sandbox-core

use std::path::PathBuf;

/// Result type for sandbox-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in sandbox-core operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A configuration layer parsed but did not fit the schema
    #[error("Invalid configuration in {path}: {message}")]
    InvalidConfig { path: PathBuf, message: String },

    /// Filesystem or config store error from sandbox-fs
    #[error(transparent)]
    Fs(#[from] sandbox_fs::Error),

    /// Clone error from sandbox-git
    #[error(transparent)]
    Git(#[from] sandbox_git::Error),

    /// Bus error from sandbox-preview
    #[error(transparent)]
    Preview(#[from] sandbox_preview::Error),

    /// Terminal error from sandbox-shell
    #[error(transparent)]
    Shell(#[from] sandbox_shell::Error),
}
