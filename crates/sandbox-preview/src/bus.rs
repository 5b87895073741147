//! The preview sync bus

use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock, Weak};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;

use crate::{
    BroadcastChannel, BroadcastHub, BusMessage, PreviewsStore, Result, Storage, Subscription,
    SyncedStorage,
};

/// Preview bus settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreviewConfig {
    /// Quiet period before a refresh fires; a newer request restarts it.
    pub refresh_delay_ms: u64,
    /// Gap between the `ready: false` and `ready: true` phases.
    pub frame_delay_ms: u64,
    pub preview_channel: String,
    pub storage_channel: String,
    /// Extracts the preview id from a URL in its first capture group.
    pub preview_id_pattern: String,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            refresh_delay_ms: 300,
            frame_delay_ms: 16,
            preview_channel: "preview-updates".to_string(),
            storage_channel: "storage-sync-channel".to_string(),
            preview_id_pattern: r"^https?://([^.]+)\.".to_string(),
        }
    }
}

/// Per-tab identifier, generated on first use unless supplied.
#[derive(Debug, Clone, Default)]
pub struct TabId(Arc<OnceLock<String>>);

impl TabId {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fixed(id: impl Into<String>) -> Self {
        let cell = OnceLock::new();
        let _ = cell.set(id.into());
        Self(Arc::new(cell))
    }

    pub fn get(&self) -> &str {
        self.0
            .get_or_init(|| uuid::Uuid::new_v4().simple().to_string())
    }
}

struct BusInner {
    config: PreviewConfig,
    tab_id: TabId,
    store: PreviewsStore,
    storage: SyncedStorage,
    channel: BroadcastChannel,
    last_seen: Mutex<HashMap<String, i64>>,
    timers: Mutex<HashMap<String, JoinHandle<()>>>,
    listeners: Mutex<Vec<JoinHandle<()>>>,
}

/// One tab's end of the preview bus.
///
/// Cloning is cheap; clones share state. Call [`dispose`](Self::dispose)
/// when the tab goes away.
#[derive(Clone)]
pub struct PreviewSyncBus {
    inner: Arc<BusInner>,
}

impl PreviewSyncBus {
    /// Join the bus on `hub` and start listening. Must run inside a tokio
    /// runtime.
    pub fn start(
        hub: &BroadcastHub,
        config: PreviewConfig,
        storage: Arc<dyn Storage>,
        tab_id: TabId,
    ) -> Result<Self> {
        let store = PreviewsStore::new(&config.preview_id_pattern)?;
        let channel = hub.open(&config.preview_channel);
        let storage = SyncedStorage::new(storage, hub.open(&config.storage_channel), tab_id.clone());

        let preview_rx = channel.subscribe();
        let storage_rx = storage.channel().subscribe();

        let inner = Arc::new(BusInner {
            config,
            tab_id,
            store,
            storage,
            channel,
            last_seen: Mutex::new(HashMap::new()),
            timers: Mutex::new(HashMap::new()),
            listeners: Mutex::new(Vec::new()),
        });

        let listeners = vec![
            tokio::spawn(listen_previews(Arc::downgrade(&inner), preview_rx)),
            tokio::spawn(listen_storage(Arc::downgrade(&inner), storage_rx)),
        ];
        *lock(&inner.listeners) = listeners;

        Ok(Self { inner })
    }

    pub fn tab_id(&self) -> &str {
        self.inner.tab_id.get()
    }

    pub fn store(&self) -> &PreviewsStore {
        &self.inner.store
    }

    /// The tab's storage. All writes must go through it.
    pub fn storage(&self) -> &SyncedStorage {
        &self.inner.storage
    }

    pub fn config(&self) -> &PreviewConfig {
        &self.inner.config
    }

    /// The newest timestamp accepted for a preview.
    pub fn last_seen(&self, preview_id: &str) -> Option<i64> {
        lock(&self.inner.last_seen).get(preview_id).copied()
    }

    /// Register an exposed port and tell sibling tabs about it.
    pub fn register_port(&self, port: u16, base_url: &str) -> Result<()> {
        self.inner.store.register_port(port, base_url);
        self.broadcast_update(base_url)?;
        Ok(())
    }

    pub fn broadcast_file_change(&self, preview_id: &str) -> Result<()> {
        let timestamp = self.inner.stamp(preview_id);
        self.inner.channel.post(&BusMessage::FileChange {
            preview_id: preview_id.to_string(),
            timestamp,
        })
    }

    pub fn broadcast_state_change(&self, preview_id: &str) -> Result<()> {
        let timestamp = self.inner.stamp(preview_id);
        self.inner.channel.post(&BusMessage::StateChange {
            preview_id: preview_id.to_string(),
            timestamp,
        })
    }

    /// Announce a file change for the preview at `url`. Returns `false`
    /// when the URL carries no preview id.
    pub fn broadcast_update(&self, url: &str) -> Result<bool> {
        let Some(preview_id) = self.inner.store.preview_id(url) else {
            tracing::debug!(url, "No preview id in URL; not broadcasting");
            return Ok(false);
        };
        self.broadcast_file_change(&preview_id)?;
        Ok(true)
    }

    /// Schedule a debounced two-phase refresh of one preview.
    pub fn refresh_preview(&self, preview_id: &str) {
        schedule_refresh(&self.inner, preview_id);
    }

    /// Stop listening and cancel pending refreshes. Idempotent.
    pub fn dispose(&self) {
        for listener in lock(&self.inner.listeners).drain(..) {
            listener.abort();
        }
        for (_, timer) in lock(&self.inner.timers).drain() {
            timer.abort();
        }
        tracing::debug!(tab_id = %self.inner.tab_id.get(), "Preview bus disposed");
    }
}

impl BusInner {
    fn stamp(&self, preview_id: &str) -> i64 {
        let timestamp = chrono::Utc::now().timestamp_millis();
        lock(&self.last_seen).insert(preview_id.to_string(), timestamp);
        timestamp
    }

    /// Accept a change only if it is newer than anything seen for the id.
    fn accept(&self, preview_id: &str, timestamp: i64) -> bool {
        let mut last_seen = lock(&self.last_seen);
        match last_seen.get(preview_id) {
            Some(&last) if timestamp <= last => false,
            _ => {
                last_seen.insert(preview_id.to_string(), timestamp);
                true
            }
        }
    }
}

fn schedule_refresh(inner: &Arc<BusInner>, preview_id: &str) {
    let refresh_delay = Duration::from_millis(inner.config.refresh_delay_ms);
    let frame_delay = Duration::from_millis(inner.config.frame_delay_ms);
    let weak = Arc::downgrade(inner);
    let id = preview_id.to_string();

    let mut timers = lock(&inner.timers);
    if let Some(pending) = timers.remove(preview_id) {
        pending.abort();
    }
    timers.retain(|_, timer| !timer.is_finished());
    timers.insert(
        preview_id.to_string(),
        tokio::spawn(async move {
            tokio::time::sleep(refresh_delay).await;
            let Some(inner) = weak.upgrade() else {
                return;
            };
            tracing::debug!(preview_id = %id, "Refreshing preview");
            inner.store.set_ready(&id, false);
            tokio::time::sleep(frame_delay).await;
            inner.store.set_ready(&id, true);
        }),
    );
}

async fn listen_previews(inner: Weak<BusInner>, mut rx: Subscription) {
    while let Some(message) = rx.recv().await {
        let Some(inner) = inner.upgrade() else {
            return;
        };
        match message {
            BusMessage::FileChange {
                preview_id,
                timestamp,
            }
            | BusMessage::StateChange {
                preview_id,
                timestamp,
            } => {
                if inner.accept(&preview_id, timestamp) {
                    schedule_refresh(&inner, &preview_id);
                } else {
                    tracing::debug!(preview_id = %preview_id, timestamp, "Ignoring stale preview change");
                }
            }
            BusMessage::StorageSync { .. } => {
                tracing::debug!("Ignoring storage sync on preview channel");
            }
        }
    }
}

async fn listen_storage(inner: Weak<BusInner>, mut rx: Subscription) {
    while let Some(message) = rx.recv().await {
        let Some(inner) = inner.upgrade() else {
            return;
        };
        let BusMessage::StorageSync { storage, source, .. } = message else {
            continue;
        };
        if source == inner.tab_id.get() {
            continue;
        }

        tracing::debug!(source = %source, keys = storage.len(), "Replaying storage from sibling tab");
        inner.storage.replay(&storage);
        for preview_id in inner.store.preview_ids() {
            schedule_refresh(&inner, &preview_id);
        }
        inner.store.reload_frames();
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tab_id_is_generated_once() {
        let tab = TabId::new();
        let first = tab.get().to_string();

        assert_eq!(first.len(), 32);
        assert!(first.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(tab.clone().get(), first);
    }

    #[test]
    fn fixed_tab_id_is_kept() {
        assert_eq!(TabId::fixed("tab-a").get(), "tab-a");
    }

    #[test]
    fn default_config_uses_known_channels() {
        let config = PreviewConfig::default();
        assert_eq!(config.preview_channel, "preview-updates");
        assert_eq!(config.storage_channel, "storage-sync-channel");
        assert_eq!(config.refresh_delay_ms, 300);
    }
}
