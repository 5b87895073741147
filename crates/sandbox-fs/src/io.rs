//! Atomic local file writes with advisory locking

use std::fs::{self, OpenOptions};
use std::io::Write;

use fs2::FileExt;

use crate::{Error, NormalizedPath, Result};

/// Write content atomically to a local file.
///
/// Writes to a sibling temp file under an exclusive lock, then renames it
/// over the target so readers never observe a partial write.
pub fn write_atomic(path: &NormalizedPath, content: &[u8]) -> Result<()> {
    write_atomic_inner(path, content, false)
}

/// Like [`write_atomic`], but the file is readable by its owner only.
///
/// The permissions are set on the temp file before any content is written,
/// so the data is never visible to other users.
pub fn write_atomic_private(path: &NormalizedPath, content: &[u8]) -> Result<()> {
    write_atomic_inner(path, content, true)
}

fn write_atomic_inner(path: &NormalizedPath, content: &[u8], private: bool) -> Result<()> {
    let native_path = path.to_native();

    if let Some(parent) = native_path.parent() {
        fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
    }

    let temp_name = format!(
        ".{}.{}.tmp",
        native_path
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_default(),
        std::process::id()
    );
    let temp_path = native_path.with_file_name(&temp_name);

    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    if private {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    #[cfg(not(unix))]
    let _ = private;

    let mut temp_file = options.open(&temp_path).map_err(|e| Error::io(&temp_path, e))?;

    // `mode` only applies on creation; a stale temp file keeps its old bits.
    #[cfg(unix)]
    if private {
        use std::os::unix::fs::PermissionsExt;
        temp_file
            .set_permissions(fs::Permissions::from_mode(0o600))
            .map_err(|e| Error::io(&temp_path, e))?;
    }

    temp_file.lock_exclusive().map_err(|_| Error::LockFailed {
        path: native_path.clone(),
    })?;

    temp_file
        .write_all(content)
        .map_err(|e| Error::io(&temp_path, e))?;
    temp_file.sync_all().map_err(|e| Error::io(&temp_path, e))?;

    temp_file.unlock().map_err(|_| Error::LockFailed {
        path: native_path.clone(),
    })?;

    fs::rename(&temp_path, &native_path).map_err(|e| Error::io(&native_path, e))?;

    Ok(())
}

pub fn read_text(path: &NormalizedPath) -> Result<String> {
    let native_path = path.to_native();
    fs::read_to_string(&native_path).map_err(|e| Error::io(&native_path, e))
}

pub fn write_text(path: &NormalizedPath, content: &str) -> Result<()> {
    write_atomic(path, content.as_bytes())
}
