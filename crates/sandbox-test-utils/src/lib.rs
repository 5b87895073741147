//! Shared test doubles for the sandbox-bridge workspace.
//!
//! Dev-dependency only. Use these from `tests/` directories: a crate's own
//! unit tests would see a second copy of its types.
//!
//! # Modules
//!
//! - [`files`]: in-memory remote file API with failure injection
//! - [`git`]: local git repositories to clone from
//! - [`process`]: scripted PTY and command runners
//! - [`terminal`]: a terminal that records everything written to it

pub mod files;
pub mod git;
pub mod process;
pub mod terminal;

pub use files::MockFiles;
pub use process::{MockPty, RecordedRun, ScriptedCommands, ScriptedRun};
pub use terminal::RecordingTerminal;
