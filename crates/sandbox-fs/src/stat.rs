//! POSIX-shaped metadata synthesized from sandbox info

use chrono::Utc;

use crate::{EntryKind, RemoteEntry};

/// Mode bits for a regular file (rw-r--r--).
pub const FILE_MODE: u32 = 0o100644;
/// Mode bits for a directory (rwxr-xr-x).
pub const DIR_MODE: u32 = 0o040755;

/// The sandbox does not track ownership; everything belongs to this id.
const OWNER_ID: u32 = 1000;

/// A stat record as a version-control engine expects it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stat {
    pub kind: EntryKind,
    pub mode: u32,
    pub size: u64,
    pub ino: u64,
    pub dev: u64,
    pub uid: u32,
    pub gid: u32,
    pub nlink: u32,
    pub mtime_ms: i64,
    pub ctime_ms: i64,
}

impl Stat {
    /// Fabricate a record; timestamps are the current time.
    pub fn synthesize(kind: EntryKind, size: u64) -> Self {
        let now = Utc::now().timestamp_millis();
        Self {
            kind,
            mode: match kind {
                EntryKind::File => FILE_MODE,
                EntryKind::Dir => DIR_MODE,
            },
            size,
            ino: 0,
            dev: 0,
            uid: OWNER_ID,
            gid: OWNER_ID,
            nlink: 1,
            mtime_ms: now,
            ctime_ms: now,
        }
    }

    pub fn is_file(&self) -> bool {
        self.kind == EntryKind::File
    }

    pub fn is_directory(&self) -> bool {
        self.kind == EntryKind::Dir
    }

    /// Always false: the sandbox has no symlinks.
    pub fn is_symbolic_link(&self) -> bool {
        false
    }
}

/// A typed directory entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub kind: EntryKind,
}

impl DirEntry {
    pub fn is_file(&self) -> bool {
        self.kind == EntryKind::File
    }

    pub fn is_directory(&self) -> bool {
        self.kind == EntryKind::Dir
    }

    pub fn is_symbolic_link(&self) -> bool {
        false
    }
}

impl From<RemoteEntry> for DirEntry {
    fn from(entry: RemoteEntry) -> Self {
        Self {
            name: entry.name,
            kind: entry.kind,
        }
    }
}
