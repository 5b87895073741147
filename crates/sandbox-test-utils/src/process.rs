//! Scripted doubles for the remote process API.

use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use sandbox_shell::{CommandApi, CommandOutput, Pid, ProcessError, PtyApi, PtySize, RunOptions};
use tokio::sync::{Notify, mpsc};

/// PTY double that records every call and lets tests emit output.
#[derive(Default)]
pub struct MockPty {
    next_pid: AtomicU32,
    outputs: Mutex<BTreeMap<Pid, mpsc::UnboundedSender<Vec<u8>>>>,
    pub created: Mutex<Vec<PtySize>>,
    pub inputs: Mutex<Vec<(Pid, Vec<u8>)>>,
    pub resizes: Mutex<Vec<(Pid, PtySize)>>,
    pub kills: Mutex<Vec<Pid>>,
    fail_create: AtomicBool,
    fail_resize: AtomicBool,
    fail_kill: AtomicBool,
    input_seen: Notify,
}

impl MockPty {
    pub fn new() -> Self {
        Self {
            next_pid: AtomicU32::new(100),
            ..Self::default()
        }
    }

    /// Push bytes out of a PTY as if the shell printed them.
    pub fn emit(&self, pid: Pid, bytes: &[u8]) {
        if let Some(output) = self.outputs.lock().unwrap().get(&pid) {
            let _ = output.send(bytes.to_vec());
        }
    }

    pub fn fail_create(&self, fail: bool) {
        self.fail_create.store(fail, Ordering::SeqCst);
    }

    pub fn fail_resize(&self, fail: bool) {
        self.fail_resize.store(fail, Ordering::SeqCst);
    }

    pub fn fail_kill(&self, fail: bool) {
        self.fail_kill.store(fail, Ordering::SeqCst);
    }

    pub fn pids(&self) -> Vec<Pid> {
        self.outputs.lock().unwrap().keys().copied().collect()
    }

    /// Wait until at least `count` inputs have arrived.
    pub async fn wait_for_inputs(&self, count: usize) {
        loop {
            let seen = self.input_seen.notified();
            if self.inputs.lock().unwrap().len() >= count {
                return;
            }
            seen.await;
        }
    }
}

#[async_trait]
impl PtyApi for MockPty {
    async fn create(
        &self,
        size: PtySize,
        output: mpsc::UnboundedSender<Vec<u8>>,
    ) -> Result<Pid, ProcessError> {
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(ProcessError::new("pty unavailable"));
        }
        let pid = self.next_pid.fetch_add(1, Ordering::SeqCst);
        self.created.lock().unwrap().push(size);
        self.outputs.lock().unwrap().insert(pid, output);
        Ok(pid)
    }

    async fn send_input(&self, pid: Pid, data: Vec<u8>) -> Result<(), ProcessError> {
        self.inputs.lock().unwrap().push((pid, data));
        self.input_seen.notify_waiters();
        Ok(())
    }

    async fn resize(&self, pid: Pid, size: PtySize) -> Result<(), ProcessError> {
        self.resizes.lock().unwrap().push((pid, size));
        if self.fail_resize.load(Ordering::SeqCst) {
            return Err(ProcessError::new("resize rejected"));
        }
        Ok(())
    }

    async fn kill(&self, pid: Pid) -> Result<(), ProcessError> {
        self.kills.lock().unwrap().push(pid);
        self.outputs.lock().unwrap().remove(&pid);
        if self.fail_kill.load(Ordering::SeqCst) {
            return Err(ProcessError::new("process already gone"));
        }
        Ok(())
    }
}

/// One scripted response for [`ScriptedCommands`].
#[derive(Debug, Clone, Default)]
pub struct ScriptedRun {
    pub stdout: Vec<String>,
    pub stderr: Vec<String>,
    pub exit_code: i32,
    pub error: Option<String>,
    pub gate: Option<Arc<Notify>>,
}

impl ScriptedRun {
    pub fn ok(stdout: &str) -> Self {
        Self {
            stdout: vec![stdout.to_string()],
            ..Self::default()
        }
    }

    pub fn exit(exit_code: i32, stderr: &str) -> Self {
        Self {
            stderr: vec![stderr.to_string()],
            exit_code,
            ..Self::default()
        }
    }

    pub fn error(message: &str) -> Self {
        Self {
            error: Some(message.to_string()),
            ..Self::default()
        }
    }

    /// Hold the run until the returned handle is notified.
    pub fn gated(mut self) -> (Self, Arc<Notify>) {
        let gate = Arc::new(Notify::new());
        self.gate = Some(gate.clone());
        (self, gate)
    }
}

/// A command as the runner received it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRun {
    pub command: String,
    pub cwd: String,
    pub timeout_ms: u64,
}

/// Command runner double replaying queued [`ScriptedRun`]s in order.
///
/// With the queue empty a run succeeds with no output.
#[derive(Default)]
pub struct ScriptedCommands {
    script: Mutex<VecDeque<ScriptedRun>>,
    runs: Mutex<Vec<RecordedRun>>,
    started: Notify,
}

impl ScriptedCommands {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, run: ScriptedRun) {
        self.script.lock().unwrap().push_back(run);
    }

    pub fn runs(&self) -> Vec<RecordedRun> {
        self.runs.lock().unwrap().clone()
    }

    /// Wait until at least `count` runs have started.
    pub async fn wait_for_runs(&self, count: usize) {
        loop {
            let started = self.started.notified();
            if self.runs.lock().unwrap().len() >= count {
                return;
            }
            started.await;
        }
    }
}

#[async_trait]
impl CommandApi for ScriptedCommands {
    async fn run(&self, command: &str, options: RunOptions) -> Result<CommandOutput, ProcessError> {
        let scripted = self.script.lock().unwrap().pop_front().unwrap_or_default();
        self.runs.lock().unwrap().push(RecordedRun {
            command: command.to_string(),
            cwd: options.cwd.clone(),
            timeout_ms: options.timeout_ms,
        });
        self.started.notify_waiters();

        if let Some(gate) = &scripted.gate {
            gate.notified().await;
        }
        if let Some(message) = scripted.error {
            return Err(ProcessError::new(message));
        }

        for chunk in &scripted.stdout {
            if let Some(on_stdout) = &options.on_stdout {
                on_stdout(chunk);
            }
        }
        for chunk in &scripted.stderr {
            if let Some(on_stderr) = &options.on_stderr {
                on_stderr(chunk);
            }
        }
        Ok(CommandOutput {
            stdout: scripted.stdout.concat(),
            stderr: scripted.stderr.concat(),
            exit_code: scripted.exit_code,
        })
    }
}
