//! A [`VcsEngine`] built on libgit2
//!
//! libgit2 only writes to local disk, so the clone lands in a scratch
//! directory first and the resulting tree (working files and `.git`) is
//! then replayed into the sandbox through the POSIX adapter.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use git2::build::RepoBuilder;
use git2::{Cred, CredentialType, ErrorClass, ErrorCode, FetchOptions, ProxyOptions, RemoteCallbacks};
use sandbox_fs::{ErrorCode as FsErrorCode, FileData, NormalizedPath, PosixFs, WriteOptions};

use crate::{AuthCallbacks, AuthDecision, CloneError, CloneErrorKind, CloneRequest, GitCredentials, ProgressEvent, VcsEngine};

/// Clones with `git2` and mirrors the result into the sandbox.
#[derive(Debug, Default, Clone, Copy)]
pub struct Git2Engine;

impl Git2Engine {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl VcsEngine for Git2Engine {
    async fn clone_repo(
        &self,
        fs: Arc<dyn PosixFs>,
        request: CloneRequest,
        auth: Arc<dyn AuthCallbacks>,
    ) -> Result<(), CloneError> {
        let scratch = tempfile::TempDir::new().map_err(|e| {
            CloneError::new(CloneErrorKind::Other, format!("failed to create scratch directory: {e}"))
        })?;
        let target = scratch.path().join("repo");

        let blocking_request = request.clone();
        let blocking_target = target.clone();
        tokio::task::spawn_blocking(move || clone_blocking(&blocking_request, &blocking_target, auth))
            .await
            .map_err(|e| CloneError::new(CloneErrorKind::Other, format!("clone task failed: {e}")))??;

        replay(fs.as_ref(), &target, &NormalizedPath::new(&request.dir)).await
    }
}

/// Remote transports support shallow fetches; the local one does not.
fn is_network_url(url: &str) -> bool {
    ["http://", "https://", "ssh://", "git://"]
        .iter()
        .any(|scheme| url.starts_with(scheme))
}

fn clone_blocking(
    request: &CloneRequest,
    target: &Path,
    auth: Arc<dyn AuthCallbacks>,
) -> Result<(), CloneError> {
    let offered: Arc<Mutex<Option<GitCredentials>>> = Arc::new(Mutex::new(None));
    let aborted: Arc<Mutex<Option<CloneError>>> = Arc::new(Mutex::new(None));

    let mut callbacks = RemoteCallbacks::new();
    {
        let auth = auth.clone();
        let offered = offered.clone();
        let aborted = aborted.clone();
        let url = request.url.clone();
        let mut asked = false;
        callbacks.credentials(move |_url, _username, allowed| {
            // libgit2 calls back again after the server rejects what it got.
            if asked {
                let err = auth.on_auth_failure(&url);
                let message = err.message.clone();
                *aborted.lock().unwrap_or_else(|e| e.into_inner()) = Some(err);
                return Err(git2::Error::from_str(&message));
            }
            asked = true;

            if !allowed.contains(CredentialType::USER_PASS_PLAINTEXT) {
                return Err(git2::Error::from_str("only username/password authentication is supported"));
            }

            match auth.on_auth(&url) {
                AuthDecision::Credentials(credentials) => {
                    let cred = Cred::userpass_plaintext(&credentials.username, &credentials.password);
                    *offered.lock().unwrap_or_else(|e| e.into_inner()) = Some(credentials);
                    cred
                }
                AuthDecision::Cancel => {
                    let err = CloneError::new(CloneErrorKind::Other, "Authentication cancelled by user");
                    *aborted.lock().unwrap_or_else(|e| e.into_inner()) = Some(err);
                    Err(git2::Error::from_str("Authentication cancelled by user"))
                }
            }
        });
    }

    if let Some(progress) = request.on_progress.clone() {
        callbacks.transfer_progress(move |stats| {
            progress(ProgressEvent {
                phase: "Receiving objects".to_string(),
                loaded: stats.received_objects() as u64,
                total: Some(stats.total_objects() as u64),
            });
            true
        });
    }

    let header_lines: Vec<String> = request
        .headers
        .iter()
        .map(|(name, value)| format!("{name}: {value}"))
        .collect();
    let header_refs: Vec<&str> = header_lines.iter().map(String::as_str).collect();

    let mut fetch = FetchOptions::new();
    fetch.remote_callbacks(callbacks);
    fetch.custom_headers(&header_refs);
    if is_network_url(&request.url) {
        fetch.depth(request.depth as i32);
        if let Some(proxy_url) = &request.cors_proxy {
            let mut proxy = ProxyOptions::new();
            proxy.url(proxy_url);
            fetch.proxy_options(proxy);
        }
    }

    let mut builder = RepoBuilder::new();
    builder.fetch_options(fetch);

    tracing::debug!(url = %request.url, target = %target.display(), "git2 clone");
    match builder.clone(&request.url, target) {
        Ok(_) => {
            if let Some(credentials) = offered.lock().unwrap_or_else(|e| e.into_inner()).take() {
                auth.on_auth_success(&request.url, &credentials);
            }
            Ok(())
        }
        Err(e) => match aborted.lock().unwrap_or_else(|e| e.into_inner()).take() {
            Some(err) => Err(err),
            None => Err(map_git_error(&e)),
        },
    }
}

/// Attach a typed kind where libgit2 tells us enough, else fall back to
/// message classification.
fn map_git_error(err: &git2::Error) -> CloneError {
    let message = err.message().to_string();
    match (err.class(), err.code()) {
        (_, ErrorCode::Auth) => CloneError::new(CloneErrorKind::Unauthorized, message),
        (ErrorClass::Net, _) => CloneError::new(CloneErrorKind::Network, message),
        (_, ErrorCode::NotFound) => CloneError::new(CloneErrorKind::NotFound, message),
        _ => CloneError::from_message(message),
    }
}

/// Copy a local tree into the sandbox under `dest`.
async fn replay(fs: &dyn PosixFs, source: &Path, dest: &NormalizedPath) -> Result<(), CloneError> {
    ensure_dir(fs, dest).await?;

    let mut pending: Vec<(PathBuf, NormalizedPath)> = vec![(source.to_path_buf(), dest.clone())];
    while let Some((local_dir, remote_dir)) = pending.pop() {
        let mut entries = tokio::fs::read_dir(&local_dir).await.map_err(|e| replay_error(&local_dir, e))?;
        while let Some(entry) = entries.next_entry().await.map_err(|e| replay_error(&local_dir, e))? {
            let name = entry.file_name().to_string_lossy().into_owned();
            let local = entry.path();
            let remote = remote_dir.join(&name);
            let file_type = entry.file_type().await.map_err(|e| replay_error(&local, e))?;

            if file_type.is_dir() {
                ensure_dir(fs, &remote).await?;
                pending.push((local, remote));
            } else if file_type.is_file() {
                let bytes = tokio::fs::read(&local).await.map_err(|e| replay_error(&local, e))?;
                let data = if remote.is_binary_hint() {
                    FileData::Bytes(bytes)
                } else {
                    match String::from_utf8(bytes) {
                        Ok(text) => FileData::Text(text),
                        Err(e) => FileData::Bytes(e.into_bytes()),
                    }
                };
                fs.write_file(remote.as_str(), data, WriteOptions::default())
                    .await
                    .map_err(|e| CloneError::new(CloneErrorKind::Other, e.to_string()))?;
            }
        }
    }
    Ok(())
}

async fn ensure_dir(fs: &dyn PosixFs, path: &NormalizedPath) -> Result<(), CloneError> {
    match fs.mkdir(path.as_str()).await {
        Ok(()) => Ok(()),
        Err(e) if e.code == FsErrorCode::Eexist => Ok(()),
        Err(e) => Err(CloneError::new(CloneErrorKind::Other, e.to_string())),
    }
}

fn replay_error(path: &Path, err: std::io::Error) -> CloneError {
    CloneError::new(
        CloneErrorKind::Other,
        format!("failed to read cloned tree at {}: {err}", path.display()),
    )
}
