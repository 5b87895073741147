//! The shell bridge: interactive PTYs plus one-shot command execution

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::{
    AbortFn, CommandApi, Error, ExecutionSlot, ExecutionSnapshot, OutputFn, Pid, PtyApi, PtySize,
    Result, RunOptions, Terminal, TerminalHandle, Utf8Accumulator,
};

/// Terminal settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerminalConfig {
    /// Used when the UI terminal has not reported its width.
    pub default_cols: u16,
    pub default_rows: u16,
    /// Zero runs commands without a timeout.
    pub command_timeout_ms: u64,
}

impl Default for TerminalConfig {
    fn default() -> Self {
        Self {
            default_cols: 80,
            default_rows: 15,
            command_timeout_ms: 0,
        }
    }
}

/// Identifies a terminal attached to a bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TerminalId(u64);

impl fmt::Display for TerminalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Outcome of [`ShellBridge::execute_command`]. Failures are reported
/// through `exit_code`, never as an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionResult {
    pub output: String,
    pub exit_code: i32,
}

struct AttachedTerminal {
    terminal: Arc<dyn Terminal>,
    pid: Pid,
    tasks: [JoinHandle<()>; 2],
}

struct Inner {
    pty: Arc<dyn PtyApi>,
    commands: Arc<dyn CommandApi>,
    workdir: String,
    config: TerminalConfig,
    terminals: Mutex<BTreeMap<TerminalId, AttachedTerminal>>,
    primary: Mutex<Option<TerminalId>>,
    next_id: AtomicU64,
    ready: watch::Sender<bool>,
    execution: ExecutionSlot,
}

/// Joins remote PTYs and the remote command runner behind one terminal
/// abstraction.
///
/// Cloning is cheap; clones share the same terminals and execution slot.
#[derive(Clone)]
pub struct ShellBridge {
    inner: Arc<Inner>,
}

impl ShellBridge {
    pub fn new(
        pty: Arc<dyn PtyApi>,
        commands: Arc<dyn CommandApi>,
        workdir: impl Into<String>,
        config: TerminalConfig,
    ) -> Self {
        let (ready, _) = watch::channel(false);
        Self {
            inner: Arc::new(Inner {
                pty,
                commands,
                workdir: workdir.into(),
                config,
                terminals: Mutex::new(BTreeMap::new()),
                primary: Mutex::new(None),
                next_id: AtomicU64::new(1),
                ready,
                execution: ExecutionSlot::new(),
            }),
        }
    }

    /// Attach the primary terminal and open the readiness gate.
    ///
    /// Command echo and command output go to the primary terminal. The
    /// gate opens once; later calls only replace the primary terminal.
    pub async fn init(&self, handle: TerminalHandle) -> Result<TerminalId> {
        let id = self.attach_terminal(handle).await?;
        *lock(&self.inner.primary) = Some(id);

        let opened = self.inner.ready.send_if_modified(|ready| {
            if *ready {
                false
            } else {
                *ready = true;
                true
            }
        });
        if opened {
            tracing::info!(terminal = %id, "Shell bridge ready");
        }
        Ok(id)
    }

    /// Resolves once [`init`](Self::init) has completed.
    pub async fn ready(&self) {
        let mut rx = self.inner.ready.subscribe();
        // The sender lives in `inner`, which outlives this borrow.
        let _ = rx.wait_for(|ready| *ready).await;
    }

    pub fn is_ready(&self) -> bool {
        *self.inner.ready.borrow()
    }

    /// Start a PTY for `handle` and pump bytes both ways.
    pub async fn attach_terminal(&self, handle: TerminalHandle) -> Result<TerminalId> {
        let TerminalHandle { terminal, mut input } = handle;
        let size = PtySize {
            cols: terminal.cols().unwrap_or(self.inner.config.default_cols),
            rows: terminal.rows().unwrap_or(self.inner.config.default_rows),
        };

        let (output_tx, mut output_rx) = mpsc::unbounded_channel::<Vec<u8>>();
        let pid = self
            .inner
            .pty
            .create(size, output_tx)
            .await
            .map_err(Error::PtyCreate)?;

        let sink = terminal.clone();
        let output_task = tokio::spawn(async move {
            let mut decoder = Utf8Accumulator::new();
            while let Some(bytes) = output_rx.recv().await {
                let text = decoder.accumulate(&bytes);
                if !text.is_empty() {
                    sink.write(&text);
                }
            }
        });

        let pty = self.inner.pty.clone();
        let input_task = tokio::spawn(async move {
            while let Some(keys) = input.recv().await {
                if let Err(e) = pty.send_input(pid, keys.into_bytes()).await {
                    tracing::warn!(pid, error = %e, "Failed to send terminal input");
                }
            }
        });

        let id = TerminalId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        lock(&self.inner.terminals).insert(
            id,
            AttachedTerminal {
                terminal,
                pid,
                tasks: [output_task, input_task],
            },
        );
        tracing::debug!(terminal = %id, pid, cols = size.cols, rows = size.rows, "Attached terminal");
        Ok(id)
    }

    /// Forward a resize to every attached PTY. Failures are logged only.
    pub async fn resize(&self, cols: u16, rows: u16) {
        let pids: Vec<Pid> = lock(&self.inner.terminals)
            .values()
            .map(|attached| attached.pid)
            .collect();

        for pid in pids {
            if let Err(e) = self.inner.pty.resize(pid, PtySize { cols, rows }).await {
                tracing::warn!(pid, cols, rows, error = %e, "Failed to resize terminal");
            }
        }
    }

    /// Stop a terminal's PTY and forget it. A failed kill is logged only.
    pub async fn detach(&self, id: TerminalId) -> Result<()> {
        let attached = lock(&self.inner.terminals)
            .remove(&id)
            .ok_or(Error::UnknownTerminal { id })?;

        {
            let mut primary = lock(&self.inner.primary);
            if *primary == Some(id) {
                *primary = None;
            }
        }

        for task in &attached.tasks {
            task.abort();
        }
        if let Err(e) = self.inner.pty.kill(attached.pid).await {
            tracing::warn!(terminal = %id, pid = attached.pid, error = %e, "Failed to kill terminal process");
        }
        tracing::debug!(terminal = %id, "Detached terminal");
        Ok(())
    }

    pub fn terminal_count(&self) -> usize {
        lock(&self.inner.terminals).len()
    }

    /// Run `command` in the sandbox working directory.
    ///
    /// An execution still in flight is cancelled through its `abort`
    /// callback before this one starts. The command line is echoed to the
    /// primary terminal and its output streamed there as it arrives.
    pub async fn execute_command(
        &self,
        session_id: &str,
        command: &str,
        abort: Option<AbortFn>,
    ) -> ExecutionResult {
        let (generation, result_tx) = self.inner.execution.begin(session_id, abort);
        let terminal = self.primary_terminal();

        if let Some(terminal) = &terminal {
            terminal.write(&format!("$ {command}\r\n"));
        }
        let stream: Option<OutputFn> = terminal.map(|terminal| {
            let stream: OutputFn = Arc::new(move |chunk: &str| terminal.write(chunk));
            stream
        });

        let options = RunOptions {
            cwd: self.inner.workdir.clone(),
            timeout_ms: self.inner.config.command_timeout_ms,
            on_stdout: stream.clone(),
            on_stderr: stream,
        };

        tracing::debug!(session_id, command, "Executing command");
        let result = match self.inner.commands.run(command, options).await {
            Ok(output) => ExecutionResult {
                output: format!("{}{}", output.stdout, output.stderr),
                exit_code: output.exit_code,
            },
            Err(e) => {
                tracing::warn!(session_id, command, error = %e, "Command execution failed");
                ExecutionResult {
                    output: e.message,
                    exit_code: 1,
                }
            }
        };

        result_tx.send_replace(Some(result.clone()));
        self.inner.execution.settle(generation);
        result
    }

    pub fn execution_state(&self) -> Option<ExecutionSnapshot> {
        self.inner.execution.snapshot()
    }

    /// Wait for the current execution, if any, and return its result.
    pub async fn wait_for_execution(&self) -> Option<ExecutionResult> {
        self.inner.execution.wait_current().await
    }

    /// Detach every terminal.
    pub async fn shutdown(&self) {
        let ids: Vec<TerminalId> = lock(&self.inner.terminals).keys().copied().collect();
        for id in ids {
            // Already detached by a concurrent caller.
            let _ = self.detach(id).await;
        }
    }

    fn primary_terminal(&self) -> Option<Arc<dyn Terminal>> {
        let id = (*lock(&self.inner.primary))?;
        lock(&self.inner.terminals)
            .get(&id)
            .map(|attached| attached.terminal.clone())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}
