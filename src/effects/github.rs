//! GitHub API effect types.
//!
//! These types describe GitHub API operations as data, without executing them.
//! The octocrab interpreter in [`crate::github`] executes them against the real
//! API; tests use a scripted interpreter instead.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{CommentId, PrId, PrNumber, Sha};

/// Commit status states Peacock publishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusState {
    Pending,
    Success,
    Failure,
}

impl StatusState {
    /// Returns the GitHub API string for this state.
    pub fn as_api_str(&self) -> &'static str {
        match self {
            StatusState::Pending => "pending",
            StatusState::Success => "success",
            StatusState::Failure => "failure",
        }
    }
}

/// A GitHub API effect.
///
/// Each variant describes a GitHub API operation. Effects are repo-scoped:
/// the interpreter is constructed with a `RepoId`, so effects don't include it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GitHubEffect {
    // ─── PR Queries ───────────────────────────────────────────────────────────
    /// Fetch a single PR by number.
    GetPr { pr: PrNumber },

    /// List the paths a PR changes.
    ListPrFiles { pr: PrNumber },

    /// List the PRs associated with a commit.
    ListPrsForCommit { sha: Sha },

    // ─── Repository Contents ──────────────────────────────────────────────────
    /// Fetch a file's decoded text at a branch or commit.
    ///
    /// A missing file is not an error: the response carries `None`.
    GetFileContents { path: String, reference: String },

    /// Resolve the commit a branch points at.
    GetBranchHead { branch: String },

    // ─── Comments ─────────────────────────────────────────────────────────────
    /// List all comments on a PR, oldest first.
    ListComments { pr: PrNumber },

    /// Post a new comment on a PR.
    PostComment { pr: PrNumber, body: String },

    /// Delete a comment.
    DeleteComment { comment_id: CommentId },

    // ─── Statuses ─────────────────────────────────────────────────────────────
    /// Publish a commit status under a context.
    CreateStatus {
        sha: Sha,
        state: StatusState,
        context: String,
        description: String,
    },

    // ─── Identity ─────────────────────────────────────────────────────────────
    /// Fetch the login the token authenticates as.
    GetAuthenticatedUser,
}

impl GitHubEffect {
    /// Snake-case variant name, matching the serialized `type` tag.
    pub fn name(&self) -> &'static str {
        match self {
            GitHubEffect::GetPr { .. } => "get_pr",
            GitHubEffect::ListPrFiles { .. } => "list_pr_files",
            GitHubEffect::ListPrsForCommit { .. } => "list_prs_for_commit",
            GitHubEffect::GetFileContents { .. } => "get_file_contents",
            GitHubEffect::GetBranchHead { .. } => "get_branch_head",
            GitHubEffect::ListComments { .. } => "list_comments",
            GitHubEffect::PostComment { .. } => "post_comment",
            GitHubEffect::DeleteComment { .. } => "delete_comment",
            GitHubEffect::CreateStatus { .. } => "create_status",
            GitHubEffect::GetAuthenticatedUser => "get_authenticated_user",
        }
    }
}

// ─── Response Types ───────────────────────────────────────────────────────────

/// PR data returned from the GitHub API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrData {
    pub id: PrId,
    pub number: PrNumber,
    pub head_sha: Sha,
    pub head_ref: String,
    pub base_ref: String,
    /// The default branch of the base repository.
    pub default_branch: String,
    pub body: String,
    pub merged: bool,
    pub merged_at: Option<DateTime<Utc>>,
    pub author: String,
}

/// A PR associated with a commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitPrData {
    pub number: PrNumber,
    /// `None` when the PR is open or was closed without merging.
    pub merged_at: Option<DateTime<Utc>>,
}

/// Comment data returned from the GitHub API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentData {
    pub id: CommentId,
    pub author_login: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

/// Response from a GitHub effect.
///
/// Each variant corresponds to the response from a particular effect type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum GitHubResponse {
    /// Response to `GetPr`.
    Pr(PrData),

    /// Response to `ListPrFiles`.
    PrFiles(Vec<String>),

    /// Response to `ListPrsForCommit`.
    CommitPrs(Vec<CommitPrData>),

    /// Response to `GetFileContents`; `None` if the file does not exist.
    FileContents(Option<String>),

    /// Response to `GetBranchHead`.
    BranchHead(Sha),

    /// Response to `ListComments`.
    Comments(Vec<CommentData>),

    /// Response to `PostComment`.
    CommentPosted { id: CommentId },

    /// Response to `DeleteComment`.
    CommentDeleted,

    /// Response to `CreateStatus`.
    StatusCreated,

    /// Response to `GetAuthenticatedUser`.
    User { login: String },
}

impl GitHubResponse {
    /// Short variant name for error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            GitHubResponse::Pr(_) => "pr",
            GitHubResponse::PrFiles(_) => "pr_files",
            GitHubResponse::CommitPrs(_) => "commit_prs",
            GitHubResponse::FileContents(_) => "file_contents",
            GitHubResponse::BranchHead(_) => "branch_head",
            GitHubResponse::Comments(_) => "comments",
            GitHubResponse::CommentPosted { .. } => "comment_posted",
            GitHubResponse::CommentDeleted => "comment_deleted",
            GitHubResponse::StatusCreated => "status_created",
            GitHubResponse::User { .. } => "user",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn effects_serialize_with_type_tag() {
        let effect = GitHubEffect::CreateStatus {
            sha: Sha::new("abc"),
            state: StatusState::Pending,
            context: "peacock/validation".into(),
            description: "Validating".into(),
        };
        let json = serde_json::to_value(&effect).unwrap();
        assert_eq!(json["type"], "create_status");
        assert_eq!(json["type"], effect.name());
        assert_eq!(json["state"], "pending");
    }

    #[test]
    fn status_state_api_strings() {
        assert_eq!(StatusState::Pending.as_api_str(), "pending");
        assert_eq!(StatusState::Success.as_api_str(), "success");
        assert_eq!(StatusState::Failure.as_api_str(), "failure");
    }

    #[test]
    fn response_kind_names_variant() {
        assert_eq!(GitHubResponse::FileContents(None).kind(), "file_contents");
        assert_eq!(GitHubResponse::StatusCreated.kind(), "status_created");
    }
}
