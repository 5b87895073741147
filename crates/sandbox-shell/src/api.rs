//! Remote process API and terminal surface consumed by the bridge

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

/// Remote process id.
pub type Pid = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PtySize {
    pub cols: u16,
    pub rows: u16,
}

/// Failure reported by the remote process API.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct ProcessError {
    pub message: String,
}

impl ProcessError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Remote pseudo-terminal API.
#[async_trait]
pub trait PtyApi: Send + Sync {
    /// Start a shell; its output bytes are pushed into `output`.
    async fn create(
        &self,
        size: PtySize,
        output: mpsc::UnboundedSender<Vec<u8>>,
    ) -> Result<Pid, ProcessError>;

    async fn send_input(&self, pid: Pid, data: Vec<u8>) -> Result<(), ProcessError>;

    async fn resize(&self, pid: Pid, size: PtySize) -> Result<(), ProcessError>;

    async fn kill(&self, pid: Pid) -> Result<(), ProcessError>;
}

pub type OutputFn = Arc<dyn Fn(&str) + Send + Sync>;

/// Options for a one-shot command run.
#[derive(Clone, Default)]
pub struct RunOptions {
    pub cwd: String,
    /// Zero means no timeout.
    pub timeout_ms: u64,
    pub on_stdout: Option<OutputFn>,
    pub on_stderr: Option<OutputFn>,
}

impl fmt::Debug for RunOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunOptions")
            .field("cwd", &self.cwd)
            .field("timeout_ms", &self.timeout_ms)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

/// Remote one-shot command API.
#[async_trait]
pub trait CommandApi: Send + Sync {
    async fn run(&self, command: &str, options: RunOptions) -> Result<CommandOutput, ProcessError>;
}

/// A UI terminal the bridge writes to.
pub trait Terminal: Send + Sync {
    fn cols(&self) -> Option<u16>;

    fn rows(&self) -> Option<u16>;

    fn write(&self, data: &str);
}

/// A terminal plus the stream of keystrokes typed into it.
pub struct TerminalHandle {
    pub terminal: Arc<dyn Terminal>,
    pub input: mpsc::UnboundedReceiver<String>,
}

impl TerminalHandle {
    /// Wrap a terminal, returning the sender used to feed it keystrokes.
    pub fn new(terminal: Arc<dyn Terminal>) -> (Self, mpsc::UnboundedSender<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                terminal,
                input: rx,
            },
            tx,
        )
    }
}
