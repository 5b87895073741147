//! Normalized sandbox paths

use std::path::{Path, PathBuf};

/// Path fragments that mark git object storage, which is always binary.
const BINARY_MARKERS: [&str; 3] = [".pack", ".idx", "objects/"];

/// A path normalized to use forward slashes.
///
/// Sandbox paths are POSIX paths regardless of the host platform, so
/// backslashes are folded to forward slashes and repeated separators are
/// collapsed. Conversion to a native `PathBuf` only happens for the
/// local directory-backed sandbox and for config files.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NormalizedPath {
    inner: String,
}

impl NormalizedPath {
    pub fn new(path: impl AsRef<Path>) -> Self {
        let path_str = path.as_ref().to_string_lossy();
        Self {
            inner: collapse(&path_str.replace('\\', "/")),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.inner
    }

    pub fn to_native(&self) -> PathBuf {
        PathBuf::from(&self.inner)
    }

    pub fn is_absolute(&self) -> bool {
        self.inner.starts_with('/')
    }

    /// Join this path with a segment.
    pub fn join(&self, segment: &str) -> Self {
        let segment = segment.replace('\\', "/");
        if segment.is_empty() || segment == "." {
            return self.clone();
        }
        Self {
            inner: collapse(&format!("{}/{}", self.inner, segment)),
        }
    }

    /// Get the parent directory.
    pub fn parent(&self) -> Option<Self> {
        let trimmed = self.inner.trim_end_matches('/');
        match trimmed.rfind('/') {
            Some(idx) if idx > 0 => Some(Self {
                inner: trimmed[..idx].to_string(),
            }),
            Some(0) if trimmed.len() > 1 => Some(Self {
                inner: "/".to_string(),
            }),
            _ => None,
        }
    }

    pub fn file_name(&self) -> Option<&str> {
        let trimmed = self.inner.trim_end_matches('/');
        trimmed.rsplit('/').next().filter(|name| !name.is_empty())
    }

    pub fn extension(&self) -> Option<&str> {
        self.file_name().and_then(|name| {
            let idx = name.rfind('.')?;
            if idx == 0 { None } else { Some(&name[idx + 1..]) }
        })
    }

    /// Whether the path points into git object storage (packs, pack
    /// indexes, loose objects). Such files are read as raw bytes.
    pub fn is_binary_hint(&self) -> bool {
        BINARY_MARKERS.iter().any(|marker| self.inner.contains(marker))
    }

    /// Whether this is the git index file of the given working directory.
    pub fn is_git_index(&self, workdir: &NormalizedPath) -> bool {
        self == &workdir.join(".git/index")
    }
}

/// Collapse repeated separators and strip a trailing one (except for root).
fn collapse(path: &str) -> String {
    let absolute = path.starts_with('/');
    let joined = path
        .split('/')
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>()
        .join("/");
    if absolute { format!("/{joined}") } else { joined }
}

impl AsRef<Path> for NormalizedPath {
    fn as_ref(&self) -> &Path {
        Path::new(&self.inner)
    }
}

impl std::fmt::Display for NormalizedPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.inner)
    }
}

impl From<&str> for NormalizedPath {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for NormalizedPath {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<PathBuf> for NormalizedPath {
    fn from(p: PathBuf) -> Self {
        Self::new(p)
    }
}

impl From<&Path> for NormalizedPath {
    fn from(p: &Path) -> Self {
        Self::new(p)
    }
}
