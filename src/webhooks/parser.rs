//! GitHub webhook payload parser.
//!
//! Turns a raw delivery into a [`PullRequestEvent`], or `None` for anything
//! Peacock does not act on.
//!
//! # Parsing Strategy
//!
//! 1. The event type comes from the `X-GitHub-Event` header
//! 2. Only `pull_request` deliveries are parsed; every other type is ignored
//! 3. Actions outside [`PrAction`] are ignored
//! 4. Malformed payloads return `Err` with details

use serde::Deserialize;
use thiserror::Error;

use crate::types::{PrId, PrNumber, RepoId, Sha};

use super::events::{PrAction, PullRequestEvent};

/// Error type for webhook parsing failures.
#[derive(Debug, Error)]
pub enum ParseError {
    /// JSON deserialization failed (includes missing required fields).
    #[error("JSON parse error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Field has an unusable value.
    #[error("invalid field value for {field}: {value}")]
    InvalidField { field: &'static str, value: String },
}

/// Parses a webhook payload.
///
/// * `Ok(Some(event))` - a pull request action Peacock handles
/// * `Ok(None)` - another event type or action (ignored, not an error)
/// * `Err(e)` - malformed payload
///
/// ```
/// use peacock::webhooks::parse_webhook;
///
/// let payload = br#"{
///     "action": "opened",
///     "pull_request": {
///         "id": 9001,
///         "number": 42,
///         "body": "Hello",
///         "merged": false,
///         "head": { "ref": "feature", "sha": "abc123" },
///         "base": { "ref": "main", "sha": "def456" },
///         "user": { "login": "octocat" }
///     },
///     "repository": {
///         "owner": { "login": "owner" },
///         "name": "repo",
///         "default_branch": "main"
///     }
/// }"#;
///
/// let event = parse_webhook("pull_request", payload).unwrap().unwrap();
/// assert_eq!(event.pr_number.0, 42);
/// assert!(parse_webhook("ping", b"{}").unwrap().is_none());
/// ```
pub fn parse_webhook(
    event_type: &str,
    payload: &[u8],
) -> Result<Option<PullRequestEvent>, ParseError> {
    match event_type {
        "pull_request" => parse_pull_request(payload),
        _ => Ok(None),
    }
}

#[derive(Debug, Deserialize)]
struct RawPullRequestPayload {
    action: String,
    pull_request: RawPullRequest,
    repository: RawRepository,
}

#[derive(Debug, Deserialize)]
struct RawRepository {
    owner: RawOwner,
    name: String,
    default_branch: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawOwner {
    login: String,
}

#[derive(Debug, Deserialize)]
struct RawPullRequest {
    id: u64,
    number: u64,
    body: Option<String>,
    merged: Option<bool>,
    head: Option<RawRef>,
    base: RawRef,
    user: RawOwner,
}

#[derive(Debug, Deserialize)]
struct RawRef {
    #[serde(rename = "ref")]
    ref_name: String,
    sha: Option<String>,
}

fn parse_pull_request(payload: &[u8]) -> Result<Option<PullRequestEvent>, ParseError> {
    let raw: RawPullRequestPayload = serde_json::from_slice(payload)?;

    let Some(action) = PrAction::from_github(&raw.action) else {
        return Ok(None);
    };

    if raw.repository.name.is_empty() || raw.repository.owner.login.is_empty() {
        return Err(ParseError::InvalidField {
            field: "repository",
            value: format!("{}/{}", raw.repository.owner.login, raw.repository.name),
        });
    }

    let pr = raw.pull_request;
    let (head_branch, head_sha) = match pr.head {
        Some(head) => (
            Some(head.ref_name).filter(|r| !r.is_empty()),
            head.sha.filter(|s| !s.is_empty()).map(Sha::from),
        ),
        None => (None, None),
    };

    Ok(Some(PullRequestEvent {
        repo: RepoId::new(raw.repository.owner.login, raw.repository.name),
        action,
        pr_id: PrId(pr.id),
        pr_number: PrNumber(pr.number),
        head_branch,
        head_sha,
        default_branch: raw.repository.default_branch.unwrap_or(pr.base.ref_name),
        body: pr.body.unwrap_or_default(),
        merged: pr.merged.unwrap_or(false),
        author: pr.user.login,
    }))
}
