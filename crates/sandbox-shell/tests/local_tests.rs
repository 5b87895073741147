//! LocalCommands running real shell processes

use std::sync::{Arc, Mutex};

use pretty_assertions::assert_eq;
use sandbox_shell::{CommandApi, LocalCommands, OutputFn, RunOptions};
use tempfile::TempDir;

fn collector() -> (Arc<Mutex<Vec<String>>>, OutputFn) {
    let lines = Arc::new(Mutex::new(Vec::new()));
    let sink = lines.clone();
    let callback: OutputFn = Arc::new(move |line: &str| sink.lock().unwrap().push(line.to_string()));
    (lines, callback)
}

#[tokio::test]
async fn runs_in_mapped_working_directory() {
    let temp = TempDir::new().unwrap();
    let commands = LocalCommands::new(temp.path());

    let output = commands
        .run(
            "echo hello > greeting.txt && cat greeting.txt",
            RunOptions {
                cwd: "/home/project".to_string(),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(output.stdout, "hello\n");
    assert_eq!(output.exit_code, 0);
    assert!(temp.path().join("home/project/greeting.txt").exists());
}

#[tokio::test]
async fn streams_both_outputs_and_reports_exit_code() {
    let temp = TempDir::new().unwrap();
    let commands = LocalCommands::new(temp.path());
    let (stdout_lines, on_stdout) = collector();
    let (stderr_lines, on_stderr) = collector();

    let output = commands
        .run(
            "echo one; echo two; echo oops >&2; exit 3",
            RunOptions {
                cwd: "/".to_string(),
                on_stdout: Some(on_stdout),
                on_stderr: Some(on_stderr),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(output.exit_code, 3);
    assert_eq!(*stdout_lines.lock().unwrap(), vec!["one\n", "two\n"]);
    assert_eq!(*stderr_lines.lock().unwrap(), vec!["oops\n"]);
    assert_eq!(output.stderr, "oops\n");
}

#[tokio::test]
async fn timeout_kills_long_running_command() {
    let temp = TempDir::new().unwrap();
    let commands = LocalCommands::new(temp.path());

    let err = commands
        .run(
            "sleep 5",
            RunOptions {
                cwd: "/".to_string(),
                timeout_ms: 100,
                ..Default::default()
            },
        )
        .await
        .unwrap_err();

    assert!(err.message.contains("timed out"));
}

#[tokio::test]
async fn escaping_working_directory_is_rejected() {
    let temp = TempDir::new().unwrap();
    let commands = LocalCommands::new(temp.path());

    let err = commands
        .run(
            "true",
            RunOptions {
                cwd: "/../etc".to_string(),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();

    assert!(err.message.contains("escapes"));
}
