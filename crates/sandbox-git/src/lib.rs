//! Repository cloning into a remote sandbox
//!
//! Drives a version-control engine against the sandbox filesystem adapter,
//! handling domain-scoped credentials, transient network retries and
//! classification of clone failures.

pub mod classify;
pub mod coordinator;
pub mod credentials;
pub mod engine;
pub mod error;
pub mod git2_engine;
pub mod notify;
pub mod prompt;
pub mod retry;

pub use classify::{CloneError, CloneErrorKind, classify_clone_error};
pub use coordinator::{CloneConfig, CloneCoordinator, CloneResult};
pub use credentials::{
    CredentialStore, FileCredentialStore, GitCredentials, MemoryCredentialStore, basic_auth_header,
    credential_key, domain_of,
};
pub use engine::{AuthCallbacks, AuthDecision, CloneRequest, ProgressEvent, VcsEngine};
pub use error::{Error, Result};
pub use git2_engine::Git2Engine;
pub use notify::{Notifier, TracingNotifier};
pub use prompt::{AuthPrompt, DialoguerPrompt, NoPrompt};
pub use retry::LinearBackoff;
