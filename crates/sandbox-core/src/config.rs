//! Bridge configuration and layered resolution

use std::path::PathBuf;

use sandbox_fs::{ConfigStore, NormalizedPath};
use sandbox_git::CloneConfig;
use sandbox_preview::PreviewConfig;
use sandbox_shell::TerminalConfig;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Everything a [`SandboxSession`](crate::SandboxSession) needs to start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Sandbox working directory: clone target and command cwd.
    pub workdir: String,
    pub clone: CloneConfig,
    pub preview: PreviewConfig,
    pub terminal: TerminalConfig,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            workdir: "/home/project".to_string(),
            clone: CloneConfig::default(),
            preview: PreviewConfig::default(),
            terminal: TerminalConfig::default(),
        }
    }
}

impl BridgeConfig {
    /// Load a single file (TOML, JSON or YAML). A missing file gives the
    /// defaults.
    pub fn load(path: &NormalizedPath) -> Result<Self> {
        Ok(ConfigStore::new().load_or_default(path)?)
    }

    pub fn save(&self, path: &NormalizedPath) -> Result<()> {
        Ok(ConfigStore::new().save(path, self)?)
    }
}

/// Resolves a [`BridgeConfig`] from layered TOML files.
///
/// Layers, later overriding earlier key by key:
/// 1. Global defaults (`<config_dir>/sandbox-bridge/config.toml`)
/// 2. Project config (`<root>/sandbox-bridge.toml`)
/// 3. Local overrides (`<root>/sandbox-bridge.local.toml`)
///
/// Missing layers are skipped.
pub struct ConfigResolver {
    root: NormalizedPath,
    global_config_dir_override: Option<PathBuf>,
}

impl ConfigResolver {
    pub fn new(root: NormalizedPath) -> Self {
        Self {
            root,
            global_config_dir_override: None,
        }
    }

    /// Use `global_config_dir` instead of the platform config directory.
    pub fn with_global_config_dir(root: NormalizedPath, global_config_dir: PathBuf) -> Self {
        Self {
            root,
            global_config_dir_override: Some(global_config_dir),
        }
    }

    fn global_config_dir(&self) -> Option<PathBuf> {
        if let Some(ref override_dir) = self.global_config_dir_override {
            return Some(override_dir.clone());
        }
        dirs::config_dir().map(|d| d.join("sandbox-bridge"))
    }

    fn layers(&self) -> Vec<NormalizedPath> {
        let mut layers = Vec::new();
        if let Some(global_dir) = self.global_config_dir() {
            layers.push(NormalizedPath::new(global_dir.join("config.toml")));
        }
        layers.push(self.root.join("sandbox-bridge.toml"));
        layers.push(self.root.join("sandbox-bridge.local.toml"));
        layers
    }

    pub fn resolve(&self) -> Result<BridgeConfig> {
        let store = ConfigStore::new();
        let mut merged = toml::Table::new();

        for (index, path) in self.layers().into_iter().enumerate() {
            if !path.to_native().is_file() {
                tracing::debug!(path = %path, layer = index + 1, "No config layer found, skipping");
                continue;
            }
            tracing::debug!(path = %path, layer = index + 1, "Loading config layer");
            let layer: toml::Table = store.load(&path)?;
            merge(&mut merged, layer);
        }

        toml::Value::Table(merged)
            .try_into()
            .map_err(|e: toml::de::Error| Error::InvalidConfig {
                path: self.root.to_native(),
                message: e.to_string(),
            })
    }

    pub fn root(&self) -> &NormalizedPath {
        &self.root
    }
}

/// Deep-merge `overlay` into `base`; tables merge, everything else replaces.
fn merge(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        match (base.get_mut(&key), value) {
            (Some(toml::Value::Table(existing)), toml::Value::Table(incoming)) => {
                merge(existing, incoming);
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}
