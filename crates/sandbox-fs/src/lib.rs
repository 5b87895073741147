//! Filesystem adapter for remote sandboxes
//!
//! Presents a POSIX-shaped filesystem surface (errno-style errors, stat
//! records, typed directory entries) on top of a remote sandbox file API
//! that only knows how to read, write, list and remove paths.

pub mod adapter;
pub mod config;
pub mod error;
pub mod io;
pub mod local;
pub mod path;
pub mod record;
pub mod remote;
pub mod stat;

pub use adapter::{PosixFs, ReadEncoding, ReaddirOptions, ReaddirResult, SandboxFs, WriteOptions};
pub use config::ConfigStore;
pub use error::{Error, ErrorCode, FsError, FsResult, Result};
pub use local::LocalSandboxFiles;
pub use path::NormalizedPath;
pub use record::{RecordedFile, SandboxFileRecord};
pub use remote::{EntryKind, FileData, ReadFormat, RemoteEntry, RemoteError, RemoteErrorKind, RemoteInfo, SandboxFiles};
pub use stat::{DirEntry, Stat};
