//! A sandbox file API backed by a local directory

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;

use crate::{EntryKind, FileData, ReadFormat, RemoteEntry, RemoteError, RemoteInfo, SandboxFiles};

/// Serves sandbox paths from a directory on the local disk.
///
/// Absolute sandbox paths are resolved relative to `root`; paths that try
/// to climb out of it with `..` are rejected.
#[derive(Debug, Clone)]
pub struct LocalSandboxFiles {
    root: PathBuf,
}

impl LocalSandboxFiles {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> Result<PathBuf, RemoteError> {
        let mut resolved = self.root.clone();
        for component in Path::new(path).components() {
            match component {
                Component::Normal(part) => resolved.push(part),
                Component::RootDir | Component::CurDir => {}
                Component::ParentDir | Component::Prefix(_) => {
                    return Err(RemoteError::other(format!("path escapes sandbox root: {path}")));
                }
            }
        }
        Ok(resolved)
    }
}

fn io_error(err: std::io::Error, path: &str) -> RemoteError {
    match err.kind() {
        std::io::ErrorKind::NotFound => RemoteError::not_found(path),
        std::io::ErrorKind::AlreadyExists => RemoteError::already_exists(path),
        _ => RemoteError::other(format!("{path}: {err}")),
    }
}

#[async_trait]
impl SandboxFiles for LocalSandboxFiles {
    async fn read(&self, path: &str, format: ReadFormat) -> Result<FileData, RemoteError> {
        let native = self.resolve(path)?;
        let bytes = tokio::fs::read(&native).await.map_err(|e| io_error(e, path))?;
        match format {
            ReadFormat::Bytes => Ok(FileData::Bytes(bytes)),
            ReadFormat::Text => Ok(FileData::Text(
                String::from_utf8_lossy(&bytes).into_owned(),
            )),
        }
    }

    async fn write(&self, path: &str, data: FileData) -> Result<(), RemoteError> {
        let native = self.resolve(path)?;
        if let Some(parent) = native.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| io_error(e, path))?;
        }
        tokio::fs::write(&native, data.as_bytes())
            .await
            .map_err(|e| io_error(e, path))
    }

    async fn make_dir(&self, path: &str) -> Result<(), RemoteError> {
        let native = self.resolve(path)?;
        if tokio::fs::metadata(&native).await.is_ok_and(|m| m.is_dir()) {
            return Err(RemoteError::already_exists(path));
        }
        tokio::fs::create_dir_all(&native)
            .await
            .map_err(|e| io_error(e, path))
    }

    async fn list(&self, path: &str) -> Result<Vec<RemoteEntry>, RemoteError> {
        let native = self.resolve(path)?;
        let mut reader = tokio::fs::read_dir(&native)
            .await
            .map_err(|e| io_error(e, path))?;

        let mut entries = Vec::new();
        while let Some(entry) = reader.next_entry().await.map_err(|e| io_error(e, path))? {
            let file_type = entry.file_type().await.map_err(|e| io_error(e, path))?;
            entries.push(RemoteEntry {
                name: entry.file_name().to_string_lossy().into_owned(),
                kind: if file_type.is_dir() {
                    EntryKind::Dir
                } else {
                    EntryKind::File
                },
            });
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    async fn remove(&self, path: &str) -> Result<(), RemoteError> {
        let native = self.resolve(path)?;
        let metadata = tokio::fs::metadata(&native)
            .await
            .map_err(|e| io_error(e, path))?;
        if metadata.is_dir() {
            tokio::fs::remove_dir_all(&native).await
        } else {
            tokio::fs::remove_file(&native).await
        }
        .map_err(|e| io_error(e, path))
    }

    async fn get_info(&self, path: &str) -> Result<RemoteInfo, RemoteError> {
        let native = self.resolve(path)?;
        let metadata = tokio::fs::metadata(&native)
            .await
            .map_err(|e| io_error(e, path))?;
        Ok(RemoteInfo {
            kind: if metadata.is_dir() {
                EntryKind::Dir
            } else {
                EntryKind::File
            },
            size: metadata.len(),
        })
    }
}
