//! Error types for sandbox-git

use crate::CloneError;

/// Result type for sandbox-git operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in sandbox-git operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Invalid repository URL '{url}': expected <scheme>://<host>/...")]
    InvalidUrl { url: String },

    #[error(transparent)]
    Clone(#[from] CloneError),

    #[error("Filesystem error: {0}")]
    Fs(#[from] sandbox_fs::FsError),

    #[error("Credential store error: {0}")]
    Store(#[from] sandbox_fs::Error),

    #[error("Credential store path unavailable: {message}")]
    StorePath { message: String },
}

impl Error {
    /// The clone failure category, if this is a clone failure.
    pub fn clone_kind(&self) -> Option<crate::CloneErrorKind> {
        match self {
            Self::Clone(e) => Some(e.kind),
            _ => None,
        }
    }
}
