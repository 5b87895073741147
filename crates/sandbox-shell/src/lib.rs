//! Terminal bridge for remote sandboxes
//!
//! Joins an interactive pseudo-terminal (for live shell display) and a
//! one-shot command runner (for programmatic runs) behind one terminal
//! abstraction with a readiness gate and single-slot execution state.

pub mod api;
pub mod bridge;
pub mod error;
pub mod execution;
pub mod local;
pub mod utf8_accumulator;

pub use api::{
    CommandApi, CommandOutput, OutputFn, Pid, ProcessError, PtyApi, PtySize, RunOptions, Terminal,
    TerminalHandle,
};
pub use bridge::{ExecutionResult, ShellBridge, TerminalConfig, TerminalId};
pub use error::{Error, Result};
pub use execution::{AbortFn, ExecutionSlot, ExecutionSnapshot};
pub use local::LocalCommands;
pub use utf8_accumulator::Utf8Accumulator;
