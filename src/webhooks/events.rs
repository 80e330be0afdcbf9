//! The pull request event the engine consumes.
//!
//! Webhook deliveries and the command-line mode both produce a
//! [`PullRequestEvent`]; nothing downstream cares where it came from.

use serde::{Deserialize, Serialize};

use crate::types::{PrId, PrNumber, RepoId, Sha};

/// Pull request actions Peacock reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrAction {
    Opened,
    Reopened,
    /// New commits were pushed to the head branch.
    Synchronize,
    /// Title, body or base branch changed.
    Edited,
    /// Merged or abandoned; check [`PullRequestEvent::merged`].
    Closed,
}

impl PrAction {
    /// Parses GitHub's action string. Actions Peacock ignores yield `None`.
    pub fn from_github(action: &str) -> Option<Self> {
        match action {
            "opened" => Some(PrAction::Opened),
            "reopened" => Some(PrAction::Reopened),
            "synchronize" => Some(PrAction::Synchronize),
            "edited" => Some(PrAction::Edited),
            "closed" => Some(PrAction::Closed),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PrAction::Opened => "opened",
            PrAction::Reopened => "reopened",
            PrAction::Synchronize => "synchronize",
            PrAction::Edited => "edited",
            PrAction::Closed => "closed",
        }
    }
}

/// A pull request lifecycle event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequestEvent {
    pub repo: RepoId,

    pub action: PrAction,

    /// GitHub's global id, stable across events for the same PR.
    pub pr_id: PrId,

    pub pr_number: PrNumber,

    /// The PR's source branch. Absent when the event was built from a bare
    /// PR number; the engine then looks it up.
    pub head_branch: Option<String>,

    /// The head commit. Absent under the same conditions as `head_branch`.
    pub head_sha: Option<Sha>,

    /// The repository's default branch.
    pub default_branch: String,

    /// The PR description in markdown.
    pub body: String,

    /// Only meaningful for [`PrAction::Closed`].
    pub merged: bool,

    pub author: String,
}
