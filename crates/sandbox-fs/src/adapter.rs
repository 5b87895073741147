//! POSIX filesystem surface backed by a remote sandbox

use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;

use crate::{
    DirEntry, EntryKind, ErrorCode, FileData, FsError, FsResult, NormalizedPath, ReadFormat,
    RecordedFile, RemoteError, RemoteErrorKind, SandboxFileRecord, SandboxFiles, Stat,
};

/// Size reported for the git index before the engine has written it.
pub const GIT_INDEX_PLACEHOLDER_SIZE: u64 = 12;

/// Encoding requested by a `read_file` caller.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ReadEncoding {
    /// No encoding given: read as text.
    #[default]
    Default,
    /// An explicit request for raw bytes (a `null` encoding).
    Binary,
    /// A named encoding such as `utf8` or `base64`.
    Named(String),
}

impl ReadEncoding {
    pub fn named(name: impl Into<String>) -> Self {
        Self::Named(name.into())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteOptions {
    /// Encoding tag kept alongside the recorded content.
    pub encoding: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReaddirOptions {
    pub with_file_types: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReaddirResult {
    Names(Vec<String>),
    Entries(Vec<DirEntry>),
}

impl ReaddirResult {
    pub fn names(&self) -> Vec<&str> {
        match self {
            Self::Names(names) => names.iter().map(String::as_str).collect(),
            Self::Entries(entries) => entries.iter().map(|e| e.name.as_str()).collect(),
        }
    }
}

/// The filesystem capability surface handed to a version-control engine.
#[async_trait]
pub trait PosixFs: Send + Sync {
    async fn read_file(&self, path: &str, encoding: ReadEncoding) -> FsResult<FileData>;

    async fn write_file(&self, path: &str, data: FileData, options: WriteOptions) -> FsResult<()>;

    async fn mkdir(&self, path: &str) -> FsResult<()>;

    async fn readdir(&self, path: &str, options: ReaddirOptions) -> FsResult<ReaddirResult>;

    async fn rm(&self, path: &str) -> FsResult<()>;

    async fn rmdir(&self, path: &str) -> FsResult<()>;

    async fn unlink(&self, path: &str) -> FsResult<()>;

    async fn stat(&self, path: &str) -> FsResult<Stat>;

    async fn lstat(&self, path: &str) -> FsResult<Stat>;

    async fn readlink(&self, path: &str) -> FsResult<String>;

    async fn symlink(&self, target: &str, path: &str) -> FsResult<()>;

    async fn chmod(&self, path: &str, mode: u32) -> FsResult<()>;
}

/// Adapter translating [`PosixFs`] calls into [`SandboxFiles`] calls.
///
/// Every write is mirrored into a [`SandboxFileRecord`] so the full tree
/// written during a clone can be handed back without re-reading the sandbox.
#[derive(Clone)]
pub struct SandboxFs {
    remote: Arc<dyn SandboxFiles>,
    record: SandboxFileRecord,
    workdir: NormalizedPath,
}

impl SandboxFs {
    pub fn new(remote: Arc<dyn SandboxFiles>, workdir: impl Into<NormalizedPath>) -> Self {
        Self {
            remote,
            record: SandboxFileRecord::new(),
            workdir: workdir.into(),
        }
    }

    pub fn record(&self) -> &SandboxFileRecord {
        &self.record
    }

    pub fn workdir(&self) -> &NormalizedPath {
        &self.workdir
    }

    pub fn remote(&self) -> &Arc<dyn SandboxFiles> {
        &self.remote
    }

    async fn ensure_parent(&self, path: &NormalizedPath) {
        let Some(parent) = path.parent() else {
            return;
        };
        match self.remote.make_dir(parent.as_str()).await {
            Ok(()) => {}
            Err(e) if e.kind == RemoteErrorKind::AlreadyExists => {}
            Err(e) => tracing::warn!(
                path = %parent,
                error = %e,
                "Failed to create parent directory before write"
            ),
        }
    }
}

/// Reject paths no filesystem would accept.
fn validate(path: &str, syscall: &'static str) -> FsResult<NormalizedPath> {
    if path.trim().is_empty() || path.contains('\0') {
        return Err(FsError::einval(syscall, path).with_message("path must be a non-empty string"));
    }
    Ok(NormalizedPath::new(path))
}

fn translate(err: RemoteError, syscall: &'static str, path: &NormalizedPath) -> FsError {
    let code = match err.kind {
        RemoteErrorKind::AlreadyExists => ErrorCode::Eexist,
        RemoteErrorKind::NotFound => ErrorCode::Enoent,
        RemoteErrorKind::Other => ErrorCode::Eio,
    };
    FsError::new(code, syscall, path.as_str())
}

#[async_trait]
impl PosixFs for SandboxFs {
    async fn read_file(&self, path: &str, encoding: ReadEncoding) -> FsResult<FileData> {
        let path = validate(path, "open")?;
        tracing::debug!(path = %path, ?encoding, "read_file");

        if path.is_binary_hint() || encoding == ReadEncoding::Binary {
            let data = self
                .remote
                .read(path.as_str(), ReadFormat::Bytes)
                .await
                .map_err(|_| FsError::enoent("open", path.as_str()))?;
            return Ok(FileData::Bytes(data.into_bytes()));
        }

        let as_text = match &encoding {
            ReadEncoding::Named(name) => name == "utf8" || name == "utf-8",
            _ => true,
        };
        let format = if as_text { ReadFormat::Text } else { ReadFormat::Bytes };

        let data = self
            .remote
            .read(path.as_str(), format)
            .await
            .map_err(|_| FsError::enoent("open", path.as_str()))?;

        Ok(match encoding {
            _ if as_text => match data {
                FileData::Text(text) => FileData::Text(text),
                FileData::Bytes(bytes) => FileData::Text(String::from_utf8_lossy(&bytes).into_owned()),
            },
            // Encode the raw bytes so binary content survives.
            ReadEncoding::Named(name) if name == "base64" => {
                FileData::Text(BASE64_STANDARD.encode(data.as_bytes()))
            }
            _ => FileData::Bytes(data.into_bytes()),
        })
    }

    async fn write_file(&self, path: &str, data: FileData, options: WriteOptions) -> FsResult<()> {
        let path = validate(path, "open")?;
        tracing::debug!(path = %path, bytes = data.len(), binary = data.is_binary(), "write_file");

        self.ensure_parent(&path).await;

        self.remote
            .write(path.as_str(), data.clone())
            .await
            .map_err(|e| FsError::new(ErrorCode::Eio, "write", path.as_str()).with_message(e.message))?;

        self.record.insert(
            path.as_str(),
            RecordedFile {
                data,
                encoding: options.encoding,
            },
        );
        Ok(())
    }

    async fn mkdir(&self, path: &str) -> FsResult<()> {
        let path = validate(path, "mkdir")?;
        self.remote
            .make_dir(path.as_str())
            .await
            .map_err(|e| translate(e, "mkdir", &path))
    }

    async fn readdir(&self, path: &str, options: ReaddirOptions) -> FsResult<ReaddirResult> {
        let path = validate(path, "scandir")?;
        let entries = self
            .remote
            .list(path.as_str())
            .await
            .map_err(|_| FsError::enoent("scandir", path.as_str()))?;

        Ok(if options.with_file_types {
            ReaddirResult::Entries(entries.into_iter().map(DirEntry::from).collect())
        } else {
            ReaddirResult::Names(entries.into_iter().map(|e| e.name).collect())
        })
    }

    async fn rm(&self, path: &str) -> FsResult<()> {
        // Directory removal is not forwarded to the sandbox.
        tracing::debug!(path, "rm ignored");
        Ok(())
    }

    async fn rmdir(&self, path: &str) -> FsResult<()> {
        tracing::debug!(path, "rmdir ignored");
        Ok(())
    }

    async fn unlink(&self, path: &str) -> FsResult<()> {
        let path = validate(path, "unlink")?;
        self.remote
            .remove(path.as_str())
            .await
            .map_err(|_| FsError::enoent("unlink", path.as_str()))
    }

    async fn stat(&self, path: &str) -> FsResult<Stat> {
        let path = validate(path, "stat")?;

        // The engine probes for its index before creating it.
        if path.is_git_index(&self.workdir) {
            return Ok(Stat::synthesize(EntryKind::File, GIT_INDEX_PLACEHOLDER_SIZE));
        }

        let info = self
            .remote
            .get_info(path.as_str())
            .await
            .map_err(|_| FsError::enoent("stat", path.as_str()))?;
        Ok(Stat::synthesize(info.kind, info.size))
    }

    async fn lstat(&self, path: &str) -> FsResult<Stat> {
        self.stat(path).await
    }

    async fn readlink(&self, path: &str) -> FsResult<String> {
        Err(FsError::einval("readlink", path).with_message("symbolic links are not supported"))
    }

    async fn symlink(&self, _target: &str, path: &str) -> FsResult<()> {
        Err(FsError::eperm("symlink", path).with_message("symbolic links are not supported"))
    }

    async fn chmod(&self, _path: &str, _mode: u32) -> FsResult<()> {
        Ok(())
    }
}
