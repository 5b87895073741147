//! Session context for the sandbox bridge
//!
//! Wires the four components together from one [`BridgeConfig`]:
//!
//! ```text
//!                 SandboxSession
//!                       |
//!     +-----------+-----+------+-------------+
//!     |           |            |             |
//! sandbox-fs  sandbox-git  sandbox-preview  sandbox-shell
//! ```
//!
//! Nothing here is global: a session is created when a sandbox comes up
//! and disposed when it goes away.

pub mod config;
pub mod error;
pub mod logging;
pub mod session;

pub use config::{BridgeConfig, ConfigResolver};
pub use error::{Error, Result};
pub use session::{Collaborators, SandboxHandles, SandboxSession};
