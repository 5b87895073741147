//! Clone failure taxonomy

use std::fmt;

/// Categories of clone failure. Only `Network` is retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CloneErrorKind {
    /// Credentials were rejected after being offered.
    Authentication,
    /// Name resolution, timeout or refused connection.
    Network,
    /// The repository does not exist (HTTP 404).
    NotFound,
    /// The remote refused access (HTTP 401).
    Unauthorized,
    Other,
}

impl fmt::Display for CloneErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Authentication => "authentication",
            Self::Network => "network",
            Self::NotFound => "not found",
            Self::Unauthorized => "unauthorized",
            Self::Other => "other",
        })
    }
}

/// Substrings that mark a transient network failure.
const NETWORK_MARKERS: [&str; 3] = ["ENOTFOUND", "ETIMEDOUT", "ECONNREFUSED"];

/// Classify a free-text engine error.
///
/// Patterns are checked in precedence order and the first match wins:
///
/// | kind             | message contains                            |
/// |------------------|---------------------------------------------|
/// | `Authentication` | `Authentication failed`                     |
/// | `Network`        | `ENOTFOUND`, `ETIMEDOUT` or `ECONNREFUSED`  |
/// | `NotFound`       | `404`                                       |
/// | `Unauthorized`   | `401`                                       |
/// | `Other`          | anything else                               |
pub fn classify_clone_error(message: &str) -> CloneErrorKind {
    if message.contains("Authentication failed") {
        CloneErrorKind::Authentication
    } else if NETWORK_MARKERS.iter().any(|marker| message.contains(marker)) {
        CloneErrorKind::Network
    } else if message.contains("404") {
        CloneErrorKind::NotFound
    } else if message.contains("401") {
        CloneErrorKind::Unauthorized
    } else {
        CloneErrorKind::Other
    }
}

/// A classified clone failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct CloneError {
    pub kind: CloneErrorKind,
    pub message: String,
}

impl CloneError {
    /// An error whose kind is known to the engine.
    pub fn new(kind: CloneErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// An error whose kind must be inferred from its text.
    pub fn from_message(message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            kind: classify_clone_error(&message),
            message,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind == CloneErrorKind::Network
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("Authentication failed for github.com", CloneErrorKind::Authentication)]
    #[case("getaddrinfo ENOTFOUND github.com", CloneErrorKind::Network)]
    #[case("connect ETIMEDOUT 140.82.112.3:443", CloneErrorKind::Network)]
    #[case("connect ECONNREFUSED 127.0.0.1:443", CloneErrorKind::Network)]
    #[case("HTTP Error: 404 Not Found", CloneErrorKind::NotFound)]
    #[case("HTTP Error: 401 Unauthorized", CloneErrorKind::Unauthorized)]
    #[case("unexpected packfile trailer", CloneErrorKind::Other)]
    fn classifies_by_message(#[case] message: &str, #[case] expected: CloneErrorKind) {
        assert_eq!(classify_clone_error(message), expected);
    }

    #[test]
    fn precedence_prefers_earlier_patterns() {
        assert_eq!(
            classify_clone_error("Authentication failed: 401"),
            CloneErrorKind::Authentication
        );
        assert_eq!(
            classify_clone_error("ETIMEDOUT after 404 redirects"),
            CloneErrorKind::Network
        );
        assert_eq!(classify_clone_error("404 then 401"), CloneErrorKind::NotFound);
    }

    #[test]
    fn only_network_is_retryable() {
        assert!(CloneError::from_message("ECONNREFUSED").is_retryable());
        assert!(!CloneError::from_message("401").is_retryable());
        assert!(!CloneError::new(CloneErrorKind::Other, "ETIMEDOUT").is_retryable());
    }
}
