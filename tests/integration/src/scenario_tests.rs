//! End-to-end scenarios over a directory-backed sandbox
//!
//! The sandbox is a temp directory served by `LocalSandboxFiles`, commands
//! run as local processes, and clones go through libgit2 from a fixture
//! repository.

use std::sync::Arc;
use std::time::Duration;

use assert_fs::TempDir;
use assert_fs::prelude::*;
use predicates::prelude::*;
use pretty_assertions::assert_eq;
use sandbox_core::{BridgeConfig, Collaborators, SandboxHandles, SandboxSession};
use sandbox_fs::{FileData, LocalSandboxFiles, PosixFs, ReadEncoding, ReaddirOptions};
use sandbox_git::{Git2Engine, MemoryCredentialStore, NoPrompt, TracingNotifier};
use sandbox_preview::{BroadcastHub, MemoryStorage, PreviewEvent, Storage, TabId};
use sandbox_shell::{LocalCommands, TerminalHandle};
use sandbox_test_utils::git::repo_with_commit;
use sandbox_test_utils::{MockPty, RecordingTerminal};

struct Scenario {
    sandbox_root: TempDir,
    origin: TempDir,
    session: SandboxSession,
}

fn start(hub: &BroadcastHub, tab: &str) -> Scenario {
    let sandbox_root = TempDir::new().unwrap();
    let origin = TempDir::new().unwrap();
    repo_with_commit(origin.path());

    let handles = SandboxHandles {
        files: Arc::new(LocalSandboxFiles::new(sandbox_root.path())),
        pty: Arc::new(MockPty::new()),
        commands: Arc::new(LocalCommands::new(sandbox_root.path())),
    };
    let collaborators = Collaborators {
        engine: Arc::new(Git2Engine::new()),
        credentials: Arc::new(MemoryCredentialStore::new()),
        prompt: Arc::new(NoPrompt),
        notifier: Arc::new(TracingNotifier),
        hub: hub.clone(),
        storage: Arc::new(MemoryStorage::new()),
        tab_id: TabId::fixed(tab),
    };
    let session = SandboxSession::start(BridgeConfig::default(), handles, collaborators).unwrap();

    Scenario {
        sandbox_root,
        origin,
        session,
    }
}

fn origin_url(origin: &TempDir) -> String {
    format!("file://localhost{}", origin.path().display())
}

#[tokio::test(flavor = "multi_thread")]
async fn cloned_tree_is_visible_to_adapter_disk_and_shell() {
    let hub = BroadcastHub::new();
    let scenario = start(&hub, "tab-a");

    let result = scenario
        .session
        .clone_repo(&origin_url(&scenario.origin))
        .await
        .unwrap();

    assert_eq!(result.workdir, "/home/project");
    assert!(result.files.contains_key("/home/project/README.md"));
    assert!(result.files.contains_key("/home/project/src/lib.rs"));

    scenario
        .sandbox_root
        .child("home/project/README.md")
        .assert(predicate::str::contains("# Fixture"));
    scenario
        .sandbox_root
        .child("home/project/.git/HEAD")
        .assert(predicate::path::exists());

    let fs = scenario.session.fs();
    let listing = fs
        .readdir("/home/project", ReaddirOptions::default())
        .await
        .unwrap();
    assert_eq!(listing.names(), vec![".git", "README.md", "assets", "src"]);

    let source = fs
        .read_file("/home/project/src/lib.rs", ReadEncoding::Default)
        .await
        .unwrap();
    assert!(matches!(source, FileData::Text(ref text) if text.contains("42")));

    let run = scenario
        .session
        .shell()
        .execute_command("s1", "cat README.md && ls src", None)
        .await;
    assert_eq!(run.exit_code, 0);
    assert_eq!(run.output, "# Fixture\nlib.rs\n");
}

#[tokio::test(flavor = "multi_thread")]
async fn command_output_reaches_terminal_and_failures_report_exit_codes() {
    let hub = BroadcastHub::new();
    let scenario = start(&hub, "tab-a");
    let terminal = Arc::new(RecordingTerminal::new());
    let (handle, _keys) = TerminalHandle::new(terminal.clone());
    scenario.session.shell().init(handle).await.unwrap();
    scenario.session.shell().ready().await;

    let ok = scenario
        .session
        .shell()
        .execute_command("s1", "echo built", None)
        .await;
    let failed = scenario
        .session
        .shell()
        .execute_command("s2", "echo broken >&2; exit 4", None)
        .await;

    assert_eq!(ok.output, "built\n");
    assert_eq!(failed.exit_code, 4);
    assert_eq!(failed.output, "broken\n");
    assert_eq!(
        terminal.output(),
        "$ echo built\r\nbuilt\n$ echo broken >&2; exit 4\r\nbroken\n"
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn unreachable_repository_is_reported_without_retry() {
    let hub = BroadcastHub::new();
    let scenario = start(&hub, "tab-a");
    let missing = format!("file://localhost{}/missing", scenario.origin.path().display());

    let err = scenario.session.clone_repo(&missing).await.unwrap_err();

    assert!(!err.to_string().is_empty());
    assert!(scenario.session.fs().record().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn two_tabs_keep_storage_and_previews_in_step() {
    let hub = BroadcastHub::new();
    let a = start(&hub, "tab-a");
    let b = start(&hub, "tab-b");
    b.session
        .bus()
        .store()
        .register_port(5173, "https://x1.preview.example.io");
    let mut events = b.session.bus().store().events();

    a.session
        .bus()
        .register_port(5173, "https://x1.preview.example.io")
        .unwrap();
    a.session.bus().storage().set_item("layout", "split");
    tokio::time::sleep(Duration::from_millis(500)).await;

    assert_eq!(
        b.session.bus().storage().get_item("layout").as_deref(),
        Some("split")
    );
    let mut seen = Vec::new();
    while let Ok(event) = events.try_recv() {
        seen.push(event);
    }
    assert!(seen.contains(&PreviewEvent::FramesReloaded));
    assert!(b.session.bus().store().previews()[0].ready);

    a.session.dispose().await;
    b.session.dispose().await;
}
