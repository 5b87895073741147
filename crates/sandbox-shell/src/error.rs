//! Error types for sandbox-shell

use crate::{ProcessError, TerminalId};

/// Result type for sandbox-shell operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in sandbox-shell operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Failed to create terminal process: {0}")]
    PtyCreate(#[source] ProcessError),

    #[error("Terminal {id} is not attached")]
    UnknownTerminal { id: TerminalId },
}
