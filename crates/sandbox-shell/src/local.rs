//! A command runner backed by local processes

use std::path::{Component, Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;

use crate::{CommandApi, CommandOutput, OutputFn, ProcessError, RunOptions};

/// Runs commands with `sh -c`, mapping sandbox paths under `root`.
#[derive(Debug, Clone)]
pub struct LocalCommands {
    root: PathBuf,
}

impl LocalCommands {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, cwd: &str) -> Result<PathBuf, ProcessError> {
        let mut resolved = self.root.clone();
        for component in Path::new(cwd).components() {
            match component {
                Component::Normal(part) => resolved.push(part),
                Component::RootDir | Component::CurDir => {}
                Component::ParentDir | Component::Prefix(_) => {
                    return Err(ProcessError::new(format!("working directory escapes sandbox root: {cwd}")));
                }
            }
        }
        Ok(resolved)
    }
}

/// Read `reader` line by line, forwarding each line to `sink`.
async fn pump<R>(reader: R, sink: Option<OutputFn>) -> std::io::Result<String>
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut collected = String::new();
    let mut line = String::new();
    loop {
        line.clear();
        if reader.read_line(&mut line).await? == 0 {
            break;
        }
        if let Some(sink) = &sink {
            sink(&line);
        }
        collected.push_str(&line);
    }
    Ok(collected)
}

#[async_trait]
impl CommandApi for LocalCommands {
    async fn run(&self, command: &str, options: RunOptions) -> Result<CommandOutput, ProcessError> {
        let cwd = self.resolve(&options.cwd)?;
        tokio::fs::create_dir_all(&cwd)
            .await
            .map_err(|e| ProcessError::new(format!("failed to prepare {}: {e}", cwd.display())))?;

        let mut child = Command::new("sh")
            .arg("-c")
            .arg(command)
            .current_dir(&cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ProcessError::new(format!("failed to spawn command: {e}")))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ProcessError::new("stdout was not captured"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| ProcessError::new("stderr was not captured"))?;

        let run = async {
            let (stdout, stderr, status) = tokio::join!(
                pump(stdout, options.on_stdout.clone()),
                pump(stderr, options.on_stderr.clone()),
                child.wait()
            );
            let io = |e: std::io::Error| ProcessError::new(e.to_string());
            let status = status.map_err(io)?;
            Ok::<_, ProcessError>(CommandOutput {
                stdout: stdout.map_err(io)?,
                stderr: stderr.map_err(io)?,
                exit_code: status.code().unwrap_or(-1),
            })
        };

        if options.timeout_ms == 0 {
            return run.await;
        }
        match tokio::time::timeout(Duration::from_millis(options.timeout_ms), run).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(command, timeout_ms = options.timeout_ms, "Command timed out");
                Err(ProcessError::new(format!(
                    "command timed out after {}ms",
                    options.timeout_ms
                )))
            }
        }
    }
}
