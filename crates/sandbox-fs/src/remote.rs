//! Remote sandbox file API consumed by the adapter

use async_trait::async_trait;

/// File content as exchanged with the sandbox.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileData {
    Bytes(Vec<u8>),
    Text(String),
}

impl FileData {
    /// Coerce an arbitrary value to its string form.
    pub fn coerce(value: impl std::fmt::Display) -> Self {
        Self::Text(value.to_string())
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Bytes(bytes) => bytes,
            Self::Text(text) => text.as_bytes(),
        }
    }

    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            Self::Bytes(bytes) => bytes,
            Self::Text(text) => text.into_bytes(),
        }
    }

    pub fn is_binary(&self) -> bool {
        matches!(self, Self::Bytes(_))
    }

    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<&str> for FileData {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for FileData {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<Vec<u8>> for FileData {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(value)
    }
}

impl From<&[u8]> for FileData {
    fn from(value: &[u8]) -> Self {
        Self::Bytes(value.to_vec())
    }
}

/// Format requested from a remote read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadFormat {
    Text,
    Bytes,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Dir,
}

/// A directory listing entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEntry {
    pub name: String,
    pub kind: EntryKind,
}

/// Metadata reported by the sandbox for a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemoteInfo {
    pub kind: EntryKind,
    pub size: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteErrorKind {
    AlreadyExists,
    NotFound,
    Other,
}

/// Error reported by the sandbox file API.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct RemoteError {
    pub kind: RemoteErrorKind,
    pub message: String,
}

impl RemoteError {
    pub fn new(kind: RemoteErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn not_found(path: &str) -> Self {
        Self::new(RemoteErrorKind::NotFound, format!("path not found: {path}"))
    }

    pub fn already_exists(path: &str) -> Self {
        Self::new(RemoteErrorKind::AlreadyExists, format!("path already exists: {path}"))
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self::new(RemoteErrorKind::Other, message)
    }
}

/// The file API a remote sandbox offers.
///
/// Directory creation is recursive; there is no notion of symlinks,
/// permissions or ownership.
#[async_trait]
pub trait SandboxFiles: Send + Sync {
    async fn read(&self, path: &str, format: ReadFormat) -> Result<FileData, RemoteError>;

    async fn write(&self, path: &str, data: FileData) -> Result<(), RemoteError>;

    async fn make_dir(&self, path: &str) -> Result<(), RemoteError>;

    async fn list(&self, path: &str) -> Result<Vec<RemoteEntry>, RemoteError>;

    async fn remove(&self, path: &str) -> Result<(), RemoteError>;

    async fn get_info(&self, path: &str) -> Result<RemoteInfo, RemoteError>;
}
