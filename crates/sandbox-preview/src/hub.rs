//! In-process named broadcast channels

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;

use crate::{BusMessage, Result};

const CHANNEL_CAPACITY: usize = 64;

/// A message on the wire, tagged with the endpoint that posted it.
#[derive(Debug, Clone)]
struct Envelope {
    sender: u64,
    payload: String,
}

/// Registry of named channels shared by every tab of a session.
///
/// Opening the same name twice yields two endpoints on one channel.
#[derive(Clone, Default)]
pub struct BroadcastHub {
    channels: Arc<Mutex<HashMap<String, broadcast::Sender<Envelope>>>>,
    endpoints: Arc<AtomicU64>,
}

impl BroadcastHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open(&self, name: &str) -> BroadcastChannel {
        let tx = self
            .channels
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .entry(name.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .clone();
        BroadcastChannel {
            name: name.to_string(),
            endpoint: self.endpoints.fetch_add(1, Ordering::Relaxed),
            tx,
        }
    }
}

/// One endpoint on a named channel. Never receives its own posts.
pub struct BroadcastChannel {
    name: String,
    endpoint: u64,
    tx: broadcast::Sender<Envelope>,
}

impl BroadcastChannel {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Post to every other endpoint. Posting with nobody listening is fine.
    pub fn post(&self, message: &BusMessage) -> Result<()> {
        let payload = serde_json::to_string(message)?;
        if self
            .tx
            .send(Envelope {
                sender: self.endpoint,
                payload,
            })
            .is_err()
        {
            tracing::debug!(channel = %self.name, "No listeners for broadcast");
        }
        Ok(())
    }

    pub fn subscribe(&self) -> Subscription {
        Subscription {
            name: self.name.clone(),
            endpoint: self.endpoint,
            rx: self.tx.subscribe(),
        }
    }
}

/// Receiving side of a [`BroadcastChannel`].
pub struct Subscription {
    name: String,
    endpoint: u64,
    rx: broadcast::Receiver<Envelope>,
}

impl Subscription {
    /// Next message from another endpoint; `None` once the channel closes.
    ///
    /// Messages that fail to parse are logged and skipped.
    pub async fn recv(&mut self) -> Option<BusMessage> {
        loop {
            match self.rx.recv().await {
                Ok(envelope) if envelope.sender == self.endpoint => continue,
                Ok(envelope) => match serde_json::from_str(&envelope.payload) {
                    Ok(message) => return Some(message),
                    Err(e) => {
                        tracing::warn!(channel = %self.name, error = %e, "Dropping malformed bus message");
                    }
                },
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(channel = %self.name, skipped, "Bus subscriber lagged");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn change(timestamp: i64) -> BusMessage {
        BusMessage::FileChange {
            preview_id: "p".to_string(),
            timestamp,
        }
    }

    #[tokio::test]
    async fn endpoints_do_not_hear_themselves() {
        let hub = BroadcastHub::new();
        let a = hub.open("preview-updates");
        let b = hub.open("preview-updates");
        let mut a_rx = a.subscribe();
        let mut b_rx = b.subscribe();

        a.post(&change(1)).unwrap();
        b.post(&change(2)).unwrap();

        assert_eq!(b_rx.recv().await, Some(change(1)));
        assert_eq!(a_rx.recv().await, Some(change(2)));
    }

    #[tokio::test]
    async fn channels_are_isolated_by_name() {
        let hub = BroadcastHub::new();
        let preview = hub.open("preview-updates");
        let storage = hub.open("storage-sync-channel");
        let other_preview = hub.open("preview-updates");
        let mut storage_rx = storage.subscribe();
        let mut preview_rx = other_preview.subscribe();

        preview.post(&change(1)).unwrap();

        assert_eq!(preview_rx.recv().await, Some(change(1)));
        assert!(storage_rx.rx.try_recv().is_err());
    }

    #[test]
    fn posting_without_listeners_succeeds() {
        let hub = BroadcastHub::new();
        hub.open("lonely").post(&change(1)).unwrap();
    }
}
