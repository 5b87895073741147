//! Preview sync bus
//!
//! Keeps preview surfaces and persisted key/value state consistent across
//! several tabs of one session. Tabs talk over named broadcast channels; a
//! file change in one tab triggers a debounced two-phase refresh in the
//! others, and every local storage write is replayed into sibling tabs.

pub mod bus;
pub mod error;
pub mod hub;
pub mod message;
pub mod previews;
pub mod storage;

pub use bus::{PreviewConfig, PreviewSyncBus, TabId};
pub use error::{Error, Result};
pub use hub::{BroadcastChannel, BroadcastHub, Subscription};
pub use message::BusMessage;
pub use previews::{PreviewEvent, PreviewInfo, PreviewsStore};
pub use storage::{MemoryStorage, Storage, SyncedStorage};
