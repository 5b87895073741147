//! ShellBridge behaviour against scripted PTY and command doubles

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use pretty_assertions::assert_eq;
use sandbox_shell::{
    AbortFn, Error, PtySize, ShellBridge, TerminalConfig, TerminalHandle,
};
use sandbox_test_utils::{MockPty, RecordingTerminal, ScriptedCommands, ScriptedRun};

const WORKDIR: &str = "/home/project";

struct Fixture {
    pty: Arc<MockPty>,
    commands: Arc<ScriptedCommands>,
    bridge: ShellBridge,
}

fn fixture() -> Fixture {
    let pty = Arc::new(MockPty::new());
    let commands = Arc::new(ScriptedCommands::new());
    let bridge = ShellBridge::new(
        pty.clone(),
        commands.clone(),
        WORKDIR,
        TerminalConfig::default(),
    );
    Fixture {
        pty,
        commands,
        bridge,
    }
}

fn counting_abort(counter: &Arc<AtomicUsize>) -> AbortFn {
    let counter = counter.clone();
    Box::new(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    })
}

#[tokio::test]
async fn init_uses_default_geometry_and_opens_gate() {
    let f = fixture();
    let terminal = Arc::new(RecordingTerminal::new());
    let (handle, _keys) = TerminalHandle::new(terminal);

    assert!(!f.bridge.is_ready());
    f.bridge.init(handle).await.unwrap();

    assert!(f.bridge.is_ready());
    f.bridge.ready().await;
    assert_eq!(
        *f.pty.created.lock().unwrap(),
        vec![PtySize { cols: 80, rows: 15 }]
    );
}

#[tokio::test]
async fn ready_waiters_resolve_after_init() {
    let f = fixture();
    let waiters: Vec<_> = (0..3)
        .map(|_| {
            let bridge = f.bridge.clone();
            tokio::spawn(async move { bridge.ready().await })
        })
        .collect();

    let (handle, _keys) = TerminalHandle::new(Arc::new(RecordingTerminal::with_size(120, 40)));
    f.bridge.init(handle).await.unwrap();

    for waiter in waiters {
        waiter.await.unwrap();
    }
    assert_eq!(
        *f.pty.created.lock().unwrap(),
        vec![PtySize { cols: 120, rows: 40 }]
    );
}

#[tokio::test]
async fn failed_pty_creation_keeps_gate_closed() {
    let f = fixture();
    f.pty.fail_create(true);

    let (handle, _keys) = TerminalHandle::new(Arc::new(RecordingTerminal::new()));
    let err = f.bridge.init(handle).await.unwrap_err();

    assert!(matches!(err, Error::PtyCreate(_)));
    assert!(!f.bridge.is_ready());
}

#[tokio::test]
async fn pty_output_is_decoded_into_terminal() {
    let f = fixture();
    let terminal = Arc::new(RecordingTerminal::new());
    let (handle, _keys) = TerminalHandle::new(terminal.clone());
    f.bridge.init(handle).await.unwrap();
    let pid = f.pty.pids()[0];

    let check = "✓ done".as_bytes();
    f.pty.emit(pid, &check[..2]);
    f.pty.emit(pid, &check[2..]);

    terminal.wait_for("✓ done").await;
    assert_eq!(terminal.output(), "✓ done");
}

#[tokio::test]
async fn keystrokes_are_forwarded_as_utf8() {
    let f = fixture();
    let (handle, keys) = TerminalHandle::new(Arc::new(RecordingTerminal::new()));
    f.bridge.init(handle).await.unwrap();
    let pid = f.pty.pids()[0];

    keys.send("ls é\r".to_string()).unwrap();
    f.pty.wait_for_inputs(1).await;

    assert_eq!(
        *f.pty.inputs.lock().unwrap(),
        vec![(pid, "ls é\r".as_bytes().to_vec())]
    );
}

#[tokio::test]
async fn resize_reaches_every_terminal_and_failures_are_swallowed() {
    let f = fixture();
    for _ in 0..2 {
        let (handle, _keys) = TerminalHandle::new(Arc::new(RecordingTerminal::new()));
        f.bridge.attach_terminal(handle).await.unwrap();
    }
    f.pty.fail_resize(true);

    f.bridge.resize(100, 30).await;

    let resizes = f.pty.resizes.lock().unwrap().clone();
    assert_eq!(resizes.len(), 2);
    assert!(resizes.iter().all(|(_, size)| *size == PtySize { cols: 100, rows: 30 }));
}

#[tokio::test]
async fn detach_kills_process_even_when_kill_fails() {
    let f = fixture();
    let (handle, _keys) = TerminalHandle::new(Arc::new(RecordingTerminal::new()));
    let id = f.bridge.attach_terminal(handle).await.unwrap();
    let pid = f.pty.pids()[0];
    f.pty.fail_kill(true);

    f.bridge.detach(id).await.unwrap();

    assert_eq!(*f.pty.kills.lock().unwrap(), vec![pid]);
    assert_eq!(f.bridge.terminal_count(), 0);
    assert!(matches!(
        f.bridge.detach(id).await,
        Err(Error::UnknownTerminal { .. })
    ));
}

#[tokio::test]
async fn execute_echoes_command_and_streams_output() {
    let f = fixture();
    let terminal = Arc::new(RecordingTerminal::new());
    let (handle, _keys) = TerminalHandle::new(terminal.clone());
    f.bridge.init(handle).await.unwrap();
    f.commands.push(ScriptedRun {
        stdout: vec!["built\n".to_string()],
        stderr: vec!["warning: unused\n".to_string()],
        exit_code: 0,
        ..Default::default()
    });

    let result = f.bridge.execute_command("s1", "cargo build", None).await;

    assert_eq!(result.output, "built\nwarning: unused\n");
    assert_eq!(result.exit_code, 0);
    assert_eq!(terminal.output(), "$ cargo build\r\nbuilt\nwarning: unused\n");

    let runs = f.commands.runs();
    assert_eq!(runs[0].cwd, WORKDIR);
    assert_eq!(runs[0].timeout_ms, 0);
}

#[tokio::test]
async fn non_zero_exit_is_returned_not_raised() {
    let f = fixture();
    f.commands.push(ScriptedRun::exit(2, "no such file\n"));

    let result = f.bridge.execute_command("s1", "cat missing", None).await;

    assert_eq!(result.exit_code, 2);
    assert_eq!(result.output, "no such file\n");
}

#[tokio::test]
async fn runner_error_becomes_exit_code_one() {
    let f = fixture();
    f.commands.push(ScriptedRun::error("sandbox disconnected"));

    let result = f.bridge.execute_command("s1", "ls", None).await;

    assert_eq!(result.output, "sandbox disconnected");
    assert_eq!(result.exit_code, 1);
    assert!(!f.bridge.execution_state().unwrap().active);
}

#[tokio::test]
async fn second_command_aborts_first_exactly_once() {
    let f = fixture();
    let (first_run, first_gate) = ScriptedRun::ok("first\n").gated();
    f.commands.push(first_run);
    f.commands.push(ScriptedRun::ok("second\n"));
    let aborted = Arc::new(AtomicUsize::new(0));

    let first = {
        let bridge = f.bridge.clone();
        let abort = counting_abort(&aborted);
        tokio::spawn(async move { bridge.execute_command("s1", "sleep 10", Some(abort)).await })
    };
    f.commands.wait_for_runs(1).await;
    assert!(f.bridge.execution_state().unwrap().active);

    let second = f.bridge.execute_command("s2", "echo second", None).await;
    assert_eq!(aborted.load(Ordering::SeqCst), 1);
    assert_eq!(second.output, "second\n");

    first_gate.notify_one();
    first.await.unwrap();

    assert_eq!(aborted.load(Ordering::SeqCst), 1);
    let state = f.bridge.execution_state().unwrap();
    assert_eq!(state.session_id, "s2");
    assert!(!state.active);
}

#[tokio::test]
async fn wait_for_execution_returns_latest_result() {
    let f = fixture();
    f.commands.push(ScriptedRun::ok("hi\n"));

    assert!(f.bridge.wait_for_execution().await.is_none());
    f.bridge.execute_command("s1", "echo hi", None).await;

    let result = f.bridge.wait_for_execution().await.unwrap();
    assert_eq!(result.output, "hi\n");
}

#[tokio::test]
async fn shutdown_detaches_everything() {
    let f = fixture();
    for _ in 0..3 {
        let (handle, _keys) = TerminalHandle::new(Arc::new(RecordingTerminal::new()));
        f.bridge.attach_terminal(handle).await.unwrap();
    }

    f.bridge.shutdown().await;

    assert_eq!(f.bridge.terminal_count(), 0);
    assert_eq!(f.pty.kills.lock().unwrap().len(), 3);
}
