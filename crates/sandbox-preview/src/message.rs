//! Messages exchanged between tabs

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A message on one of the bus channels, tagged by `type`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum BusMessage {
    /// Files behind a preview changed.
    #[serde(rename_all = "camelCase")]
    FileChange { preview_id: String, timestamp: i64 },

    /// Application state behind a preview changed.
    #[serde(rename_all = "camelCase")]
    StateChange { preview_id: String, timestamp: i64 },

    /// Full snapshot of a tab's storage after a write.
    StorageSync {
        storage: BTreeMap<String, String>,
        source: String,
        timestamp: i64,
    },
}

impl BusMessage {
    pub fn timestamp(&self) -> i64 {
        match self {
            Self::FileChange { timestamp, .. }
            | Self::StateChange { timestamp, .. }
            | Self::StorageSync { timestamp, .. } => *timestamp,
        }
    }
}
