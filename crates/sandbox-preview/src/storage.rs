//! Key/value storage and its cross-tab synchronizing wrapper

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use crate::{BroadcastChannel, BusMessage, TabId};

/// A tab's persistent key/value storage.
pub trait Storage: Send + Sync {
    fn get_item(&self, key: &str) -> Option<String>;

    fn set_item(&self, key: &str, value: &str);

    fn remove_item(&self, key: &str);

    fn snapshot(&self) -> BTreeMap<String, String>;
}

#[derive(Debug, Default)]
pub struct MemoryStorage {
    items: Mutex<BTreeMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Storage for MemoryStorage {
    fn get_item(&self, key: &str) -> Option<String> {
        self.items
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(key)
            .cloned()
    }

    fn set_item(&self, key: &str, value: &str) {
        self.items
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key.to_string(), value.to_string());
    }

    fn remove_item(&self, key: &str) {
        self.items
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(key);
    }

    fn snapshot(&self) -> BTreeMap<String, String> {
        self.items.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

/// The only writer of a tab's storage.
///
/// Every `set_item` is followed by a broadcast of the whole table so
/// sibling tabs can replay it. Removals stay local.
pub struct SyncedStorage {
    inner: Arc<dyn Storage>,
    channel: BroadcastChannel,
    tab_id: TabId,
}

impl SyncedStorage {
    pub fn new(inner: Arc<dyn Storage>, channel: BroadcastChannel, tab_id: TabId) -> Self {
        Self {
            inner,
            channel,
            tab_id,
        }
    }

    /// Write a sibling tab's snapshot without broadcasting it again.
    pub(crate) fn replay(&self, items: &BTreeMap<String, String>) {
        for (key, value) in items {
            self.inner.set_item(key, value);
        }
    }

    pub(crate) fn channel(&self) -> &BroadcastChannel {
        &self.channel
    }
}

impl Storage for SyncedStorage {
    fn get_item(&self, key: &str) -> Option<String> {
        self.inner.get_item(key)
    }

    fn set_item(&self, key: &str, value: &str) {
        self.inner.set_item(key, value);

        let message = BusMessage::StorageSync {
            storage: self.inner.snapshot(),
            source: self.tab_id.get().to_string(),
            timestamp: chrono::Utc::now().timestamp_millis(),
        };
        if let Err(e) = self.channel.post(&message) {
            tracing::warn!(key, error = %e, "Failed to broadcast storage change");
        }
    }

    fn remove_item(&self, key: &str) {
        self.inner.remove_item(key);
    }

    fn snapshot(&self) -> BTreeMap<String, String> {
        self.inner.snapshot()
    }
}
