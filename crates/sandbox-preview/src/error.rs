//! Error types for sandbox-preview

/// Result type for sandbox-preview operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in sandbox-preview operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Invalid preview id pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    #[error("Preview id pattern '{pattern}' has no capture group")]
    MissingCaptureGroup { pattern: String },

    #[error("Failed to encode bus message: {0}")]
    Encode(#[from] serde_json::Error),
}
