//! An in-memory remote file API.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use sandbox_fs::{
    EntryKind, FileData, NormalizedPath, ReadFormat, RemoteEntry, RemoteError, RemoteInfo,
    SandboxFiles,
};

#[derive(Default)]
struct Tree {
    files: BTreeMap<String, FileData>,
    dirs: BTreeSet<String>,
}

/// Remote file API double holding files in memory.
///
/// Directory creation is recursive like the real API. Failures can be
/// injected per operation; injected failures are returned verbatim.
#[derive(Default)]
pub struct MockFiles {
    tree: Mutex<Tree>,
    read_error: Mutex<Option<RemoteError>>,
    write_error: Mutex<Option<RemoteError>>,
    make_dir_error: Mutex<Option<RemoteError>>,
    reads: AtomicUsize,
    writes: AtomicUsize,
    make_dirs: AtomicUsize,
}

impl MockFiles {
    pub fn new() -> Self {
        let mock = Self::default();
        mock.tree.lock().unwrap().dirs.insert("/".to_string());
        mock
    }

    /// Seed a file, creating its parent directories.
    pub fn insert(&self, path: &str, data: impl Into<FileData>) {
        let path = NormalizedPath::new(path);
        let mut tree = self.tree.lock().unwrap();
        if let Some(parent) = path.parent() {
            add_dirs(&mut tree, &parent);
        }
        tree.files.insert(path.as_str().to_string(), data.into());
    }

    pub fn file(&self, path: &str) -> Option<FileData> {
        self.tree.lock().unwrap().files.get(path).cloned()
    }

    pub fn has_dir(&self, path: &str) -> bool {
        self.tree.lock().unwrap().dirs.contains(path)
    }

    pub fn file_paths(&self) -> Vec<String> {
        self.tree.lock().unwrap().files.keys().cloned().collect()
    }

    pub fn fail_reads(&self, error: RemoteError) {
        *self.read_error.lock().unwrap() = Some(error);
    }

    pub fn fail_writes(&self, error: RemoteError) {
        *self.write_error.lock().unwrap() = Some(error);
    }

    pub fn fail_make_dir(&self, error: RemoteError) {
        *self.make_dir_error.lock().unwrap() = Some(error);
    }

    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn make_dir_count(&self) -> usize {
        self.make_dirs.load(Ordering::SeqCst)
    }
}

fn add_dirs(tree: &mut Tree, path: &NormalizedPath) {
    let mut current = Some(path.clone());
    while let Some(dir) = current {
        tree.dirs.insert(dir.as_str().to_string());
        current = dir.parent();
    }
}

fn is_child(parent: &str, candidate: &str) -> Option<String> {
    let candidate = NormalizedPath::new(candidate);
    let candidate_parent = candidate.parent()?;
    (candidate_parent.as_str() == parent)
        .then(|| candidate.file_name().map(str::to_string))
        .flatten()
}

#[async_trait]
impl SandboxFiles for MockFiles {
    async fn read(&self, path: &str, format: ReadFormat) -> Result<FileData, RemoteError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if let Some(e) = self.read_error.lock().unwrap().clone() {
            return Err(e);
        }
        let data = self
            .file(NormalizedPath::new(path).as_str())
            .ok_or_else(|| RemoteError::not_found(path))?;
        match format {
            ReadFormat::Bytes => Ok(FileData::Bytes(data.into_bytes())),
            ReadFormat::Text => Ok(FileData::Text(
                String::from_utf8_lossy(data.as_bytes()).into_owned(),
            )),
        }
    }

    async fn write(&self, path: &str, data: FileData) -> Result<(), RemoteError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        if let Some(e) = self.write_error.lock().unwrap().clone() {
            return Err(e);
        }
        self.insert(path, data);
        Ok(())
    }

    async fn make_dir(&self, path: &str) -> Result<(), RemoteError> {
        self.make_dirs.fetch_add(1, Ordering::SeqCst);
        if let Some(e) = self.make_dir_error.lock().unwrap().clone() {
            return Err(e);
        }
        let path = NormalizedPath::new(path);
        let mut tree = self.tree.lock().unwrap();
        if tree.dirs.contains(path.as_str()) {
            return Err(RemoteError::already_exists(path.as_str()));
        }
        add_dirs(&mut tree, &path);
        Ok(())
    }

    async fn list(&self, path: &str) -> Result<Vec<RemoteEntry>, RemoteError> {
        let path = NormalizedPath::new(path);
        let tree = self.tree.lock().unwrap();
        if !tree.dirs.contains(path.as_str()) {
            return Err(RemoteError::not_found(path.as_str()));
        }

        let dirs = tree.dirs.iter().filter_map(|d| {
            is_child(path.as_str(), d).map(|name| RemoteEntry {
                name,
                kind: EntryKind::Dir,
            })
        });
        let files = tree.files.keys().filter_map(|f| {
            is_child(path.as_str(), f).map(|name| RemoteEntry {
                name,
                kind: EntryKind::File,
            })
        });
        let mut entries: Vec<RemoteEntry> = dirs.chain(files).collect();
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    async fn remove(&self, path: &str) -> Result<(), RemoteError> {
        let path = NormalizedPath::new(path);
        let mut tree = self.tree.lock().unwrap();
        if tree.files.remove(path.as_str()).is_some() {
            return Ok(());
        }
        if tree.dirs.remove(path.as_str()) {
            let prefix = format!("{}/", path.as_str());
            tree.dirs.retain(|d| !d.starts_with(&prefix));
            tree.files.retain(|f, _| !f.starts_with(&prefix));
            return Ok(());
        }
        Err(RemoteError::not_found(path.as_str()))
    }

    async fn get_info(&self, path: &str) -> Result<RemoteInfo, RemoteError> {
        let path = NormalizedPath::new(path);
        let tree = self.tree.lock().unwrap();
        if let Some(data) = tree.files.get(path.as_str()) {
            return Ok(RemoteInfo {
                kind: EntryKind::File,
                size: data.len() as u64,
            });
        }
        if tree.dirs.contains(path.as_str()) {
            return Ok(RemoteInfo {
                kind: EntryKind::Dir,
                size: 0,
            });
        }
        Err(RemoteError::not_found(path.as_str()))
    }
}
