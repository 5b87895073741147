//! Registry of exposed sandbox ports

use std::collections::BTreeSet;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, watch};

use crate::{Error, Result};

const EVENT_CAPACITY: usize = 64;

/// One exposed sandbox port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewInfo {
    pub port: u16,
    pub ready: bool,
    pub base_url: String,
}

/// Signals for preview surfaces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreviewEvent {
    /// A preview's ready flag changed. `false` followed by `true` asks
    /// the surface to remount.
    ReadyChanged { preview_id: String, ready: bool },
    /// Every live preview frame should reload.
    FramesReloaded,
}

/// Append-only list of previews, observable through a watch channel.
pub struct PreviewsStore {
    previews: watch::Sender<Vec<PreviewInfo>>,
    events: broadcast::Sender<PreviewEvent>,
    pattern: Regex,
}

impl PreviewsStore {
    /// `pattern` must capture the preview id in its first group.
    pub fn new(pattern: &str) -> Result<Self> {
        let pattern = Regex::new(pattern)?;
        if pattern.captures_len() < 2 {
            return Err(Error::MissingCaptureGroup {
                pattern: pattern.as_str().to_string(),
            });
        }
        Ok(Self {
            previews: watch::channel(Vec::new()).0,
            events: broadcast::channel(EVENT_CAPACITY).0,
            pattern,
        })
    }

    /// The preview id embedded in a preview URL.
    pub fn preview_id(&self, url: &str) -> Option<String> {
        self.pattern
            .captures(url)
            .and_then(|captures| captures.get(1))
            .map(|id| id.as_str().to_string())
    }

    /// Record a port opening. Re-registering a port updates its URL and
    /// marks it ready. Returns `true` for a new port.
    pub fn register_port(&self, port: u16, base_url: &str) -> bool {
        let mut added = false;
        self.previews.send_modify(|previews| {
            match previews.iter_mut().find(|p| p.port == port) {
                Some(existing) => {
                    existing.base_url = base_url.to_string();
                    existing.ready = true;
                }
                None => {
                    previews.push(PreviewInfo {
                        port,
                        ready: true,
                        base_url: base_url.to_string(),
                    });
                    added = true;
                }
            }
        });
        tracing::debug!(port, base_url, added, "Registered preview port");
        added
    }

    pub fn previews(&self) -> Vec<PreviewInfo> {
        self.previews.borrow().clone()
    }

    /// Distinct ids of every registered preview that has one, sorted.
    pub fn preview_ids(&self) -> Vec<String> {
        let ids: BTreeSet<String> = self
            .previews
            .borrow()
            .iter()
            .filter_map(|p| self.preview_id(&p.base_url))
            .collect();
        ids.into_iter().collect()
    }

    pub fn watch(&self) -> watch::Receiver<Vec<PreviewInfo>> {
        self.previews.subscribe()
    }

    pub fn events(&self) -> broadcast::Receiver<PreviewEvent> {
        self.events.subscribe()
    }

    /// Set `ready` on every preview with this id and announce it.
    pub fn set_ready(&self, preview_id: &str, ready: bool) {
        self.previews.send_modify(|previews| {
            for preview in previews.iter_mut() {
                if self.preview_id(&preview.base_url).as_deref() == Some(preview_id) {
                    preview.ready = ready;
                }
            }
        });
        // No subscribers is not an error.
        let _ = self.events.send(PreviewEvent::ReadyChanged {
            preview_id: preview_id.to_string(),
            ready,
        });
    }

    pub fn reload_frames(&self) {
        let _ = self.events.send(PreviewEvent::FramesReloaded);
    }
}
