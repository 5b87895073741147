//! Interactive credential prompts

use dialoguer::{Confirm, Input, Password};

use crate::GitCredentials;

/// Asks the user for credentials when none are saved for a host.
pub trait AuthPrompt: Send + Sync {
    /// `None` means the user declined.
    fn prompt(&self, url: &str) -> Option<GitCredentials>;
}

/// Never supplies credentials.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoPrompt;

impl AuthPrompt for NoPrompt {
    fn prompt(&self, _url: &str) -> Option<GitCredentials> {
        None
    }
}

/// Prompts on the controlling terminal.
#[derive(Debug, Default, Clone, Copy)]
pub struct DialoguerPrompt;

impl AuthPrompt for DialoguerPrompt {
    fn prompt(&self, url: &str) -> Option<GitCredentials> {
        let ready = Confirm::new()
            .with_prompt(format!(
                "{url} is password protected. Ready to enter a username & password?"
            ))
            .default(true)
            .interact()
            .unwrap_or(false);
        if !ready {
            return None;
        }

        let username: String = match Input::new().with_prompt("Username").interact_text() {
            Ok(username) => username,
            Err(e) => {
                tracing::warn!(error = %e, "Username prompt failed");
                return None;
            }
        };
        let password = match Password::new().with_prompt("Password").interact() {
            Ok(password) => password,
            Err(e) => {
                tracing::warn!(error = %e, "Password prompt failed");
                return None;
            }
        };
        Some(GitCredentials::new(username, password))
    }
}
