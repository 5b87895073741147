//! Domain-scoped git credentials

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Mutex;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use sandbox_fs::{ConfigStore, NormalizedPath};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Username and password (or token) for a git host.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitCredentials {
    pub username: String,
    pub password: String,
}

impl GitCredentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for GitCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GitCredentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Extract the host segment of a repository URL: the text between the
/// second and third `/`.
pub fn domain_of(url: &str) -> Result<String> {
    let invalid = || Error::InvalidUrl {
        url: url.to_string(),
    };
    let mut parts = url.split('/');
    let scheme = parts.next().ok_or_else(invalid)?;
    let separator = parts.next().ok_or_else(invalid)?;
    let domain = parts.next().ok_or_else(invalid)?;

    if !scheme.ends_with(':') || scheme.len() < 2 || !separator.is_empty() || domain.is_empty() {
        return Err(invalid());
    }
    Ok(domain.to_string())
}

/// Store key for a domain.
pub fn credential_key(domain: &str) -> String {
    format!("git:{domain}")
}

/// `Authorization` header value for HTTP Basic auth.
pub fn basic_auth_header(credentials: &GitCredentials) -> String {
    let raw = format!("{}:{}", credentials.username, credentials.password);
    format!("Basic {}", BASE64_STANDARD.encode(raw))
}

/// A cookie-like key/value store for credentials.
pub trait CredentialStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<GitCredentials>>;

    fn set(&self, key: &str, credentials: &GitCredentials) -> Result<()>;

    fn remove(&self, key: &str) -> Result<()>;
}

/// Credentials held for the lifetime of the process.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    entries: Mutex<HashMap<String, GitCredentials>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn get(&self, key: &str) -> Result<Option<GitCredentials>> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, credentials: &GitCredentials) -> Result<()> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.insert(key.to_string(), credentials.clone());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.remove(key);
        Ok(())
    }
}

/// Credentials persisted as a JSON (or TOML/YAML) map on disk.
///
/// Every operation re-reads the file so several processes sharing it see
/// each other's writes. Writes go through an atomic rename and leave the
/// file readable by its owner only.
#[derive(Debug)]
pub struct FileCredentialStore {
    path: NormalizedPath,
    config: ConfigStore,
    guard: Mutex<()>,
}

impl FileCredentialStore {
    pub fn new(path: impl Into<NormalizedPath>) -> Self {
        Self {
            path: path.into(),
            config: ConfigStore::new(),
            guard: Mutex::new(()),
        }
    }

    /// `<config dir>/sandbox-bridge/credentials.json`
    pub fn default_location() -> Result<Self> {
        let dir = dirs::config_dir().ok_or_else(|| Error::StorePath {
            message: "no configuration directory on this platform".to_string(),
        })?;
        Ok(Self::new(dir.join("sandbox-bridge").join("credentials.json")))
    }

    pub fn path(&self) -> &NormalizedPath {
        &self.path
    }

    fn load(&self) -> Result<BTreeMap<String, GitCredentials>> {
        Ok(self.config.load_or_default(&self.path)?)
    }
}

impl CredentialStore for FileCredentialStore {
    fn get(&self, key: &str) -> Result<Option<GitCredentials>> {
        let _guard = self.guard.lock().unwrap_or_else(|e| e.into_inner());
        Ok(self.load()?.remove(key))
    }

    fn set(&self, key: &str, credentials: &GitCredentials) -> Result<()> {
        let _guard = self.guard.lock().unwrap_or_else(|e| e.into_inner());
        let mut entries = self.load()?;
        entries.insert(key.to_string(), credentials.clone());
        self.config.save_private(&self.path, &entries)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let _guard = self.guard.lock().unwrap_or_else(|e| e.into_inner());
        let mut entries = self.load()?;
        if entries.remove(key).is_some() {
            self.config.save_private(&self.path, &entries)?;
        }
        Ok(())
    }
}
