//! Version-control engine seam

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use sandbox_fs::PosixFs;

use crate::{CloneError, GitCredentials};

/// Progress reported by an engine while cloning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressEvent {
    pub phase: String,
    pub loaded: u64,
    pub total: Option<u64>,
}

pub type ProgressFn = Arc<dyn Fn(ProgressEvent) + Send + Sync>;

/// Parameters of a single clone attempt.
#[derive(Clone)]
pub struct CloneRequest {
    /// Target directory inside the sandbox.
    pub dir: String,
    pub url: String,
    pub depth: u32,
    pub single_branch: bool,
    /// Transport indirection for remote fetches.
    pub cors_proxy: Option<String>,
    /// Extra HTTP headers as `(name, value)` pairs.
    pub headers: Vec<(String, String)>,
    pub on_progress: Option<ProgressFn>,
}

impl fmt::Debug for CloneRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CloneRequest")
            .field("dir", &self.dir)
            .field("url", &self.url)
            .field("depth", &self.depth)
            .field("single_branch", &self.single_branch)
            .field("cors_proxy", &self.cors_proxy)
            .field(
                "headers",
                &self.headers.iter().map(|(name, _)| name).collect::<Vec<_>>(),
            )
            .finish_non_exhaustive()
    }
}

impl CloneRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Outcome of an authentication request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthDecision {
    Credentials(GitCredentials),
    Cancel,
}

/// Authentication hooks an engine calls during a clone.
///
/// These are synchronous: engines typically invoke them from inside a
/// blocking transport callback.
pub trait AuthCallbacks: Send + Sync {
    /// The remote asked for credentials.
    fn on_auth(&self, url: &str) -> AuthDecision;

    /// Offered credentials were rejected. The returned error aborts the
    /// clone and must not be retried.
    fn on_auth_failure(&self, url: &str) -> CloneError;

    /// Offered credentials were accepted.
    fn on_auth_success(&self, url: &str, credentials: &GitCredentials);
}

/// A version-control engine able to clone into a POSIX filesystem.
#[async_trait]
pub trait VcsEngine: Send + Sync {
    async fn clone_repo(
        &self,
        fs: Arc<dyn PosixFs>,
        request: CloneRequest,
        auth: Arc<dyn AuthCallbacks>,
    ) -> Result<(), CloneError>;
}
