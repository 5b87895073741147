//! Clone orchestration with credentials and retry

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use ::backoff::backoff::Backoff;
use sandbox_fs::{PosixFs, RecordedFile, SandboxFs};
use serde::{Deserialize, Serialize};

use crate::engine::ProgressFn;
use crate::{
    AuthCallbacks, AuthDecision, AuthPrompt, CloneError, CloneErrorKind, CloneRequest,
    CredentialStore, GitCredentials, LinearBackoff, Notifier, ProgressEvent, Result, VcsEngine,
    basic_auth_header, credential_key, domain_of,
};

/// Clone settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CloneConfig {
    pub cors_proxy: Option<String>,
    pub depth: u32,
    pub single_branch: bool,
    /// Total attempts for network failures, including the first.
    pub max_attempts: u32,
    /// Delay unit: retry `n` waits `n × retry_step_ms`.
    pub retry_step_ms: u64,
    pub user_agent: String,
}

impl Default for CloneConfig {
    fn default() -> Self {
        Self {
            cors_proxy: None,
            depth: 1,
            single_branch: true,
            max_attempts: 3,
            retry_step_ms: 1000,
            user_agent: "sandbox-bridge".to_string(),
        }
    }
}

/// A finished clone: where it landed and every file written on the way.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloneResult {
    pub workdir: String,
    pub files: BTreeMap<String, RecordedFile>,
}

/// Clones repositories into the sandbox through a [`VcsEngine`].
///
/// Clones on one coordinator must be serialized: each attempt clears and
/// refills the adapter's file record.
pub struct CloneCoordinator {
    fs: SandboxFs,
    engine: Arc<dyn VcsEngine>,
    credentials: Arc<dyn CredentialStore>,
    prompt: Arc<dyn AuthPrompt>,
    notifier: Arc<dyn Notifier>,
    config: CloneConfig,
}

impl CloneCoordinator {
    pub fn new(
        fs: SandboxFs,
        engine: Arc<dyn VcsEngine>,
        credentials: Arc<dyn CredentialStore>,
        prompt: Arc<dyn AuthPrompt>,
        notifier: Arc<dyn Notifier>,
        config: CloneConfig,
    ) -> Self {
        Self {
            fs,
            engine,
            credentials,
            prompt,
            notifier,
            config,
        }
    }

    pub fn fs(&self) -> &SandboxFs {
        &self.fs
    }

    /// Shallow-clone `url` into the sandbox working directory.
    ///
    /// Network failures are retried with linearly growing delays up to
    /// the configured attempt budget; every other failure is reported
    /// immediately. Success, each retry and each terminal failure are
    /// announced through the notifier.
    pub async fn clone(&self, url: &str) -> Result<CloneResult> {
        let domain = domain_of(url)?;
        let mut backoff = LinearBackoff::new(
            Duration::from_millis(self.config.retry_step_ms),
            self.config.max_attempts,
        );

        loop {
            let err = match self.attempt(url, &domain).await {
                Ok(result) => {
                    tracing::info!(url, files = result.files.len(), "Clone finished");
                    self.notifier.success(&format!("Repository cloned into {}", result.workdir));
                    return Ok(result);
                }
                Err(err) => err,
            };

            if err.is_retryable()
                && let Some(delay) = backoff.next_backoff()
            {
                let attempt = backoff.retries() + 1;
                tracing::info!(
                    url,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "Retrying clone after network error"
                );
                self.notifier.error(&format!(
                    "Network error, retrying clone (attempt {attempt}/{})...",
                    self.config.max_attempts
                ));
                tokio::time::sleep(delay).await;
                continue;
            }

            tracing::error!(url, kind = %err.kind, error = %err, "Clone failed");
            self.notifier.error(&failure_message(&err, &domain));
            return Err(err.into());
        }
    }

    async fn attempt(&self, url: &str, domain: &str) -> std::result::Result<CloneResult, CloneError> {
        self.fs.record().clear();

        let key = credential_key(domain);
        let saved = match self.credentials.get(&key) {
            Ok(saved) => saved,
            Err(e) => {
                tracing::warn!(domain, error = %e, "Failed to read saved credentials");
                None
            }
        };

        let mut headers = vec![("User-Agent".to_string(), self.config.user_agent.clone())];
        if let Some(credentials) = &saved {
            headers.push(("Authorization".to_string(), basic_auth_header(credentials)));
        }

        let progress_url = url.to_string();
        let on_progress: ProgressFn = Arc::new(move |event: ProgressEvent| {
            tracing::debug!(
                url = %progress_url,
                phase = %event.phase,
                loaded = event.loaded,
                total = ?event.total,
                "Clone progress"
            );
        });

        let request = CloneRequest {
            dir: self.fs.workdir().to_string(),
            url: url.to_string(),
            depth: self.config.depth,
            single_branch: self.config.single_branch,
            cors_proxy: self.config.cors_proxy.clone(),
            headers,
            on_progress: Some(on_progress),
        };

        let auth = Arc::new(CloneAuth {
            domain: domain.to_string(),
            key,
            saved,
            store: self.credentials.clone(),
            prompt: self.prompt.clone(),
        });

        let fs: Arc<dyn PosixFs> = Arc::new(self.fs.clone());
        self.engine.clone_repo(fs, request, auth).await?;

        Ok(CloneResult {
            workdir: self.fs.workdir().to_string(),
            files: self.fs.record().snapshot(),
        })
    }
}

/// The message shown to the user for a clone that will not be retried.
fn failure_message(err: &CloneError, domain: &str) -> String {
    match err.kind {
        CloneErrorKind::Authentication => format!(
            "Authentication failed for {domain}. Please check your credentials and try again."
        ),
        CloneErrorKind::Network => {
            "Network error while connecting to repository. Please check your internet connection."
                .to_string()
        }
        CloneErrorKind::NotFound => "Repository not found. Please check the URL and make sure the repository exists and you have access to it.".to_string(),
        CloneErrorKind::Unauthorized => {
            "Unauthorized access to repository. Please connect your account with proper permissions."
                .to_string()
        }
        CloneErrorKind::Other => format!("Failed to clone repository: {}", err.message),
    }
}

/// Authentication hooks for one clone attempt.
struct CloneAuth {
    domain: String,
    key: String,
    saved: Option<GitCredentials>,
    store: Arc<dyn CredentialStore>,
    prompt: Arc<dyn AuthPrompt>,
}

impl AuthCallbacks for CloneAuth {
    fn on_auth(&self, url: &str) -> AuthDecision {
        if let Some(saved) = &self.saved {
            return AuthDecision::Credentials(saved.clone());
        }
        match self.prompt.prompt(url) {
            Some(credentials) => AuthDecision::Credentials(credentials),
            None => AuthDecision::Cancel,
        }
    }

    fn on_auth_failure(&self, _url: &str) -> CloneError {
        CloneError::new(
            CloneErrorKind::Authentication,
            format!("Authentication failed for {}", self.domain),
        )
    }

    fn on_auth_success(&self, _url: &str, credentials: &GitCredentials) {
        if let Err(e) = self.store.set(&self.key, credentials) {
            tracing::warn!(domain = %self.domain, error = %e, "Failed to save credentials");
        }
    }
}
