//! GitHub API failures, classified for retrying.
//!
//! Server errors, rate limits and network trouble are transient. Anything
//! else fails the same way on every attempt, so it is reported on the PR and
//! left for the next delivery.

use std::fmt;

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GitHubErrorKind {
    Transient,
    Permanent,
}

impl GitHubErrorKind {
    pub fn is_retriable(&self) -> bool {
        matches!(self, GitHubErrorKind::Transient)
    }
}

#[derive(Debug, Error)]
pub struct GitHubApiError {
    pub kind: GitHubErrorKind,

    /// HTTP status, when GitHub answered at all.
    pub status_code: Option<u16>,

    pub message: String,

    #[source]
    pub source: Option<octocrab::Error>,
}

impl fmt::Display for GitHubApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status_code {
            Some(code) => write!(f, "GitHub API error (HTTP {code}): {}", self.message),
            None => write!(f, "GitHub API error: {}", self.message),
        }
    }
}

impl GitHubApiError {
    fn bare(kind: GitHubErrorKind, message: impl Into<String>) -> Self {
        GitHubApiError {
            kind,
            status_code: None,
            message: message.into(),
            source: None,
        }
    }

    pub fn permanent(message: impl Into<String>) -> Self {
        Self::bare(GitHubErrorKind::Permanent, message)
    }

    pub fn transient(message: impl Into<String>) -> Self {
        Self::bare(GitHubErrorKind::Transient, message)
    }

    /// A 404 for `what`.
    pub fn not_found(what: &str) -> Self {
        Self::permanent(format!("{what} not found")).with_status(404)
    }

    pub fn with_status(mut self, code: u16) -> Self {
        self.status_code = Some(code);
        self
    }

    /// An effect answered with the wrong response variant.
    pub fn unexpected_response(expected: &str, got: &str) -> Self {
        Self::permanent(format!(
            "unexpected GitHub response: expected {expected}, got {got}"
        ))
    }

    pub fn is_not_found(&self) -> bool {
        self.status_code == Some(404)
    }

    pub fn from_octocrab(err: octocrab::Error) -> Self {
        let message = err.to_string();
        let status_code = match &err {
            octocrab::Error::GitHub { source, .. } => Some(source.status_code.as_u16()),
            _ => status_in_message(&message),
        };
        GitHubApiError {
            kind: classify(status_code, &message),
            status_code,
            message,
            source: Some(err),
        }
    }
}

const RETRY_HINTS: &[&str] = &["try again", "temporarily unavailable"];
const RATE_LIMIT_HINTS: &[&str] = &["rate limit", "api rate", "abuse detection"];
const NETWORK_HINTS: &[&str] = &["timeout", "timed out", "connection", "network", "dns"];

fn mentions(message: &str, hints: &[&str]) -> bool {
    hints.iter().any(|hint| message.contains(hint))
}

fn classify(status: Option<u16>, message: &str) -> GitHubErrorKind {
    let message = message.to_lowercase();
    let transient = mentions(&message, RETRY_HINTS)
        || match status {
            Some(429) | Some(500..=599) => true,
            Some(403) => mentions(&message, RATE_LIMIT_HINTS),
            Some(_) => false,
            None => mentions(&message, NETWORK_HINTS),
        };
    if transient {
        GitHubErrorKind::Transient
    } else {
        GitHubErrorKind::Permanent
    }
}

/// Transport and decoding errors only carry the status in their text.
fn status_in_message(message: &str) -> Option<u16> {
    if let Some((_, rest)) = message.split_once("status: ") {
        let digits: String = rest.chars().take_while(char::is_ascii_digit).collect();
        if let Ok(code) = digits.parse() {
            return Some(code);
        }
    }
    if message.contains("404") && message.to_lowercase().contains("not found") {
        return Some(404);
    }
    [422, 403, 401, 429, 500, 502, 503]
        .into_iter()
        .find(|code| message.contains(&code.to_string()))
}
