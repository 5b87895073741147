//! In-memory mirror of files written through the adapter

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use crate::FileData;

/// A file captured during a clone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedFile {
    pub data: FileData,
    pub encoding: Option<String>,
}

/// Every file written during the current clone, keyed by absolute path.
///
/// Cloning the record shares the underlying map, so the adapter and the
/// clone coordinator observe the same entries.
#[derive(Debug, Clone, Default)]
pub struct SandboxFileRecord {
    files: Arc<Mutex<BTreeMap<String, RecordedFile>>>,
}

impl SandboxFileRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, path: impl Into<String>, file: RecordedFile) {
        self.lock().insert(path.into(), file);
    }

    pub fn get(&self, path: &str) -> Option<RecordedFile> {
        self.lock().get(path).cloned()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Copy of the current contents.
    pub fn snapshot(&self) -> BTreeMap<String, RecordedFile> {
        self.lock().clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, RecordedFile>> {
        self.files.lock().unwrap_or_else(|e| e.into_inner())
    }
}
