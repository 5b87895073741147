//! Behaviour of the POSIX adapter over a directory-backed sandbox

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use pretty_assertions::assert_eq;
use sandbox_fs::{
    EntryKind, ErrorCode, FileData, LocalSandboxFiles, PosixFs, ReadEncoding, ReadFormat,
    ReaddirOptions, ReaddirResult, RemoteEntry, RemoteError, RemoteInfo, SandboxFiles, SandboxFs,
    WriteOptions,
};
use tempfile::TempDir;

const WORKDIR: &str = "/home/project";

fn local_fs() -> (TempDir, SandboxFs) {
    let temp = TempDir::new().unwrap();
    let remote = Arc::new(LocalSandboxFiles::new(temp.path()));
    (temp, SandboxFs::new(remote, WORKDIR))
}

/// A sandbox whose every call fails, recording the directories it was
/// asked to create.
#[derive(Default)]
struct BrokenFiles {
    mkdir_calls: Mutex<Vec<String>>,
    mkdir_error: Option<RemoteError>,
    accept_writes: bool,
}

#[async_trait]
impl SandboxFiles for BrokenFiles {
    async fn read(&self, _path: &str, _format: ReadFormat) -> Result<FileData, RemoteError> {
        Err(RemoteError::other("sandbox unavailable"))
    }

    async fn write(&self, _path: &str, _data: FileData) -> Result<(), RemoteError> {
        if self.accept_writes {
            Ok(())
        } else {
            Err(RemoteError::other("sandbox unavailable"))
        }
    }

    async fn make_dir(&self, path: &str) -> Result<(), RemoteError> {
        self.mkdir_calls.lock().unwrap().push(path.to_string());
        match &self.mkdir_error {
            Some(e) => Err(e.clone()),
            None => Ok(()),
        }
    }

    async fn list(&self, _path: &str) -> Result<Vec<RemoteEntry>, RemoteError> {
        Err(RemoteError::other("sandbox unavailable"))
    }

    async fn remove(&self, _path: &str) -> Result<(), RemoteError> {
        Err(RemoteError::other("sandbox unavailable"))
    }

    async fn get_info(&self, _path: &str) -> Result<RemoteInfo, RemoteError> {
        Err(RemoteError::other("sandbox unavailable"))
    }
}

#[tokio::test]
async fn write_then_read_text_round_trips() {
    let (_temp, fs) = local_fs();

    fs.write_file("/home/project/src/main.rs", "fn main() {}".into(), WriteOptions::default())
        .await
        .unwrap();

    let data = fs
        .read_file("/home/project/src/main.rs", ReadEncoding::named("utf8"))
        .await
        .unwrap();
    assert_eq!(data, FileData::Text("fn main() {}".to_string()));
}

#[tokio::test]
async fn pack_files_are_read_as_bytes() {
    let (_temp, fs) = local_fs();
    let payload = vec![0x50, 0x41, 0x43, 0x4b, 0x00, 0xff];

    fs.write_file(
        "/home/project/.git/objects/pack/pack-abc.pack",
        payload.clone().into(),
        WriteOptions::default(),
    )
    .await
    .unwrap();

    let data = fs
        .read_file("/home/project/.git/objects/pack/pack-abc.pack", ReadEncoding::Default)
        .await
        .unwrap();
    assert_eq!(data, FileData::Bytes(payload));
}

#[tokio::test]
async fn explicit_binary_encoding_reads_bytes() {
    let (_temp, fs) = local_fs();
    fs.write_file("/home/project/README.md", "# hi".into(), WriteOptions::default())
        .await
        .unwrap();

    let data = fs
        .read_file("/home/project/README.md", ReadEncoding::Binary)
        .await
        .unwrap();
    assert_eq!(data, FileData::Bytes(b"# hi".to_vec()));
}

#[tokio::test]
async fn base64_and_unknown_encodings() {
    let (_temp, fs) = local_fs();
    fs.write_file("/home/project/a.txt", "hello".into(), WriteOptions::default())
        .await
        .unwrap();

    let b64 = fs
        .read_file("/home/project/a.txt", ReadEncoding::named("base64"))
        .await
        .unwrap();
    assert_eq!(b64, FileData::Text("aGVsbG8=".to_string()));

    let latin = fs
        .read_file("/home/project/a.txt", ReadEncoding::named("latin1"))
        .await
        .unwrap();
    assert_eq!(latin, FileData::Bytes(b"hello".to_vec()));
}

#[tokio::test]
async fn binary_content_reads_back_as_base64() {
    let (_temp, fs) = local_fs();
    fs.write_file(
        "/home/project/logo.png",
        vec![0xff, 0xd8, 0xff].into(),
        WriteOptions::default(),
    )
    .await
    .unwrap();

    let b64 = fs
        .read_file("/home/project/logo.png", ReadEncoding::named("base64"))
        .await
        .unwrap();
    assert_eq!(b64, FileData::Text("/9j/".to_string()));

    let raw = fs
        .read_file("/home/project/logo.png", ReadEncoding::named("latin1"))
        .await
        .unwrap();
    assert_eq!(raw, FileData::Bytes(vec![0xff, 0xd8, 0xff]));

    let text = fs
        .read_file("/home/project/logo.png", ReadEncoding::Default)
        .await
        .unwrap();
    assert_eq!(text, FileData::Text("\u{FFFD}\u{FFFD}\u{FFFD}".to_string()));
}

#[tokio::test]
async fn read_missing_file_is_enoent_with_path() {
    let (_temp, fs) = local_fs();

    let err = fs
        .read_file("/home/project/missing.txt", ReadEncoding::Default)
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::Enoent);
    assert_eq!(err.errno, 2);
    assert_eq!(err.syscall, "open");
    assert_eq!(err.path, "/home/project/missing.txt");
}

#[tokio::test]
async fn read_with_invalid_path_is_einval() {
    let (_temp, fs) = local_fs();

    let err = fs.read_file("", ReadEncoding::Default).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::Einval);

    let err = fs.read_file("/bad\0path", ReadEncoding::Default).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::Einval);
}

#[tokio::test]
async fn remote_read_failure_never_leaks_native_error() {
    let fs = SandboxFs::new(Arc::new(BrokenFiles::default()), WORKDIR);

    let err = fs.read_file("/home/project/x", ReadEncoding::Default).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::Enoent);
    assert!(!err.to_string().contains("sandbox unavailable"));
}

#[tokio::test]
async fn write_survives_failed_parent_mkdir() {
    let remote = Arc::new(BrokenFiles {
        mkdir_error: Some(RemoteError::other("quota exceeded")),
        accept_writes: true,
        ..Default::default()
    });
    let fs = SandboxFs::new(remote.clone(), WORKDIR);

    fs.write_file("/home/project/deep/file.txt", "x".into(), WriteOptions::default())
        .await
        .unwrap();

    assert_eq!(
        *remote.mkdir_calls.lock().unwrap(),
        vec!["/home/project/deep".to_string()]
    );
    assert!(fs.record().get("/home/project/deep/file.txt").is_some());
}

#[tokio::test]
async fn write_swallows_existing_parent() {
    let (_temp, fs) = local_fs();
    fs.mkdir("/home/project/src").await.unwrap();

    fs.write_file("/home/project/src/lib.rs", "".into(), WriteOptions::default())
        .await
        .unwrap();
}

#[tokio::test]
async fn failed_remote_write_is_eio_and_not_recorded() {
    let fs = SandboxFs::new(Arc::new(BrokenFiles::default()), WORKDIR);

    let err = fs
        .write_file("/home/project/a", "x".into(), WriteOptions::default())
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::Eio);
    assert!(fs.record().is_empty());
}

#[tokio::test]
async fn writes_are_recorded_with_encoding_tag() {
    let (_temp, fs) = local_fs();

    fs.write_file(
        "/home/project/notes.txt",
        FileData::coerce(42),
        WriteOptions {
            encoding: Some("utf8".to_string()),
        },
    )
    .await
    .unwrap();

    let recorded = fs.record().get("/home/project/notes.txt").unwrap();
    assert_eq!(recorded.data, FileData::Text("42".to_string()));
    assert_eq!(recorded.encoding.as_deref(), Some("utf8"));
}

#[tokio::test]
async fn mkdir_on_existing_directory_is_eexist() {
    let (_temp, fs) = local_fs();
    fs.mkdir("/home/project/a/b").await.unwrap();

    let err = fs.mkdir("/home/project/a/b").await.unwrap_err();
    assert_eq!(err.code, ErrorCode::Eexist);
    assert_eq!(err.syscall, "mkdir");
}

#[tokio::test]
async fn readdir_names_and_typed_entries() {
    let (_temp, fs) = local_fs();
    fs.write_file("/home/project/b.txt", "b".into(), WriteOptions::default())
        .await
        .unwrap();
    fs.mkdir("/home/project/a").await.unwrap();

    let names = fs
        .readdir("/home/project", ReaddirOptions::default())
        .await
        .unwrap();
    assert_eq!(
        names,
        ReaddirResult::Names(vec!["a".to_string(), "b.txt".to_string()])
    );

    let ReaddirResult::Entries(entries) = fs
        .readdir("/home/project", ReaddirOptions { with_file_types: true })
        .await
        .unwrap()
    else {
        panic!("expected typed entries");
    };
    assert!(entries[0].is_directory());
    assert!(entries[1].is_file());
    assert!(entries.iter().all(|e| !e.is_symbolic_link()));
}

#[tokio::test]
async fn readdir_missing_directory_is_enoent() {
    let (_temp, fs) = local_fs();
    let err = fs
        .readdir("/home/project/nope", ReaddirOptions::default())
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::Enoent);
    assert_eq!(err.syscall, "scandir");
}

#[tokio::test]
async fn stat_synthesizes_posix_modes() {
    let (_temp, fs) = local_fs();
    fs.write_file("/home/project/file.txt", "12345".into(), WriteOptions::default())
        .await
        .unwrap();

    let file = fs.stat("/home/project/file.txt").await.unwrap();
    assert!(file.is_file());
    assert_eq!(file.mode, 0o100644);
    assert_eq!(file.size, 5);

    let dir = fs.lstat("/home/project").await.unwrap();
    assert!(dir.is_directory());
    assert_eq!(dir.mode, 0o040755);
    assert!(!dir.is_symbolic_link());
}

#[tokio::test]
async fn git_index_stats_before_it_exists() {
    let (_temp, fs) = local_fs();

    let stat = fs.stat("/home/project/.git/index").await.unwrap();
    assert_eq!(stat.size, 12);
    assert!(stat.is_file());
    assert_eq!(stat.kind, EntryKind::File);
}

#[tokio::test]
async fn stat_missing_path_is_enoent() {
    let (_temp, fs) = local_fs();
    let err = fs.stat("/home/project/ghost").await.unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(err.path, "/home/project/ghost");
}

#[tokio::test]
async fn symlinks_are_unsupported() {
    let (_temp, fs) = local_fs();

    let err = fs.readlink("/home/project/link").await.unwrap_err();
    assert_eq!(err.code, ErrorCode::Einval);

    let err = fs.symlink("/target", "/home/project/link").await.unwrap_err();
    assert_eq!(err.code, ErrorCode::Eperm);
    assert_eq!(err.errno, 1);
}

#[tokio::test]
async fn chmod_always_succeeds() {
    let (_temp, fs) = local_fs();
    fs.chmod("/does/not/exist", 0o777).await.unwrap();
    fs.chmod("/home/project", 0).await.unwrap();
}

#[tokio::test]
async fn rm_and_rmdir_leave_files_in_place() {
    let (temp, fs) = local_fs();
    fs.write_file("/home/project/keep/me.txt", "x".into(), WriteOptions::default())
        .await
        .unwrap();

    fs.rm("/home/project/keep/me.txt").await.unwrap();
    fs.rmdir("/home/project/keep").await.unwrap();

    assert!(temp.path().join("home/project/keep/me.txt").exists());
}

#[tokio::test]
async fn unlink_deletes_remotely() {
    let (temp, fs) = local_fs();
    fs.write_file("/home/project/gone.txt", "x".into(), WriteOptions::default())
        .await
        .unwrap();

    fs.unlink("/home/project/gone.txt").await.unwrap();
    assert!(!temp.path().join("home/project/gone.txt").exists());

    let err = fs.unlink("/home/project/gone.txt").await.unwrap_err();
    assert_eq!(err.code, ErrorCode::Enoent);
}
