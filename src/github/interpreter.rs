//! GitHub effect interpreter using octocrab.
//!
//! This module implements the `GitHubInterpreter` trait, executing GitHub effects
//! against the real GitHub API via octocrab.
//!
//! Key implementation details:
//! - Plain REST routes with local response types where octocrab's models carry
//!   far more than Peacock reads
//! - A missing file is a response (`FileContents(None)`), not an error
//! - Retry logic with exponential backoff for transient errors

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::effects::{
    CommentData, CommitPrData, GitHubEffect, GitHubInterpreter, GitHubResponse, PrData,
    StatusState,
};
use crate::types::{CommentId, PrId, PrNumber, Sha};

use super::client::OctocrabClient;
use super::error::GitHubApiError;
use super::retry::with_backoff;

const PAGE_SIZE: u32 = 100;

// ─── Interpreter Implementation ───────────────────────────────────────────────

impl GitHubInterpreter for OctocrabClient {
    type Error = GitHubApiError;

    async fn interpret(&self, effect: GitHubEffect) -> Result<GitHubResponse, Self::Error> {
        interpret_github_effect(self, effect).await
    }
}

/// Runs an effect against the GitHub API, retrying transient failures with
/// the client's backoff.
pub async fn interpret_github_effect(
    client: &OctocrabClient,
    effect: GitHubEffect,
) -> Result<GitHubResponse, GitHubApiError> {
    tracing::trace!(repo = %client.repo(), ?effect, "interpreting GitHub effect");
    with_backoff(client.backoff(), effect.name(), || {
        execute_effect(client, effect.clone())
    })
    .await
}

/// Executes a single effect without retry logic.
async fn execute_effect(
    client: &OctocrabClient,
    effect: GitHubEffect,
) -> Result<GitHubResponse, GitHubApiError> {
    match effect {
        GitHubEffect::GetPr { pr } => get_pr(client, pr).await,
        GitHubEffect::ListPrFiles { pr } => list_pr_files(client, pr).await,
        GitHubEffect::ListPrsForCommit { sha } => list_prs_for_commit(client, sha).await,
        GitHubEffect::GetFileContents { path, reference } => {
            get_file_contents(client, path, reference).await
        }
        GitHubEffect::GetBranchHead { branch } => get_branch_head(client, branch).await,
        GitHubEffect::ListComments { pr } => list_comments(client, pr).await,
        GitHubEffect::PostComment { pr, body } => post_comment(client, pr, body).await,
        GitHubEffect::DeleteComment { comment_id } => delete_comment(client, comment_id).await,
        GitHubEffect::CreateStatus {
            sha,
            state,
            context,
            description,
        } => create_status(client, sha, state, context, description).await,
        GitHubEffect::GetAuthenticatedUser => get_authenticated_user(client).await,
    }
}

#[derive(Debug, Serialize)]
struct PageParams {
    per_page: u32,
    page: u32,
}

// ─── PR Operations ────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct PullResponse {
    id: u64,
    number: u64,
    body: Option<String>,
    #[serde(default)]
    merged: bool,
    merged_at: Option<DateTime<Utc>>,
    head: PullRef,
    base: PullRef,
    user: Option<UserResponse>,
}

#[derive(Debug, Deserialize)]
struct PullRef {
    #[serde(rename = "ref")]
    ref_name: String,
    sha: String,
    repo: Option<RepoResponse>,
}

#[derive(Debug, Deserialize)]
struct RepoResponse {
    default_branch: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UserResponse {
    login: String,
}

async fn get_pr(client: &OctocrabClient, pr: PrNumber) -> Result<GitHubResponse, GitHubApiError> {
    let url = format!(
        "/repos/{}/{}/pulls/{}",
        client.owner(),
        client.repo_name(),
        pr.0
    );
    let pull: PullResponse = client
        .inner()
        .get(&url, None::<&()>)
        .await
        .map_err(GitHubApiError::from_octocrab)?;

    let default_branch = pull
        .base
        .repo
        .and_then(|r| r.default_branch)
        .unwrap_or_else(|| pull.base.ref_name.clone());

    Ok(GitHubResponse::Pr(PrData {
        id: PrId(pull.id),
        number: PrNumber(pull.number),
        head_sha: Sha::from(pull.head.sha),
        head_ref: pull.head.ref_name,
        base_ref: pull.base.ref_name,
        default_branch,
        body: pull.body.unwrap_or_default(),
        merged: pull.merged || pull.merged_at.is_some(),
        merged_at: pull.merged_at,
        author: pull.user.map(|u| u.login).unwrap_or_default(),
    }))
}

#[derive(Debug, Deserialize)]
struct PullFile {
    filename: String,
}

async fn list_pr_files(
    client: &OctocrabClient,
    pr: PrNumber,
) -> Result<GitHubResponse, GitHubApiError> {
    let url = format!(
        "/repos/{}/{}/pulls/{}/files",
        client.owner(),
        client.repo_name(),
        pr.0
    );
    let mut page = 1u32;
    let mut files = Vec::new();

    loop {
        let params = PageParams {
            per_page: PAGE_SIZE,
            page,
        };
        let items: Vec<PullFile> = client
            .inner()
            .get(&url, Some(&params))
            .await
            .map_err(GitHubApiError::from_octocrab)?;

        let is_last_page = items.len() < PAGE_SIZE as usize;
        files.extend(items.into_iter().map(|f| f.filename));

        if is_last_page {
            break;
        }
        page += 1;
    }

    Ok(GitHubResponse::PrFiles(files))
}

#[derive(Debug, Deserialize)]
struct CommitPull {
    number: u64,
    merged_at: Option<DateTime<Utc>>,
}

async fn list_prs_for_commit(
    client: &OctocrabClient,
    sha: Sha,
) -> Result<GitHubResponse, GitHubApiError> {
    let url = format!(
        "/repos/{}/{}/commits/{}/pulls",
        client.owner(),
        client.repo_name(),
        sha
    );
    let pulls: Vec<CommitPull> = client
        .inner()
        .get(&url, None::<&()>)
        .await
        .map_err(GitHubApiError::from_octocrab)?;

    Ok(GitHubResponse::CommitPrs(
        pulls
            .into_iter()
            .map(|p| CommitPrData {
                number: PrNumber(p.number),
                merged_at: p.merged_at,
            })
            .collect(),
    ))
}

// ─── Repository Contents ──────────────────────────────────────────────────────

async fn get_file_contents(
    client: &OctocrabClient,
    path: String,
    reference: String,
) -> Result<GitHubResponse, GitHubApiError> {
    let result = client
        .inner()
        .repos(client.owner(), client.repo_name())
        .get_content()
        .path(&path)
        .r#ref(&reference)
        .send()
        .await;

    match result {
        Ok(mut contents) => {
            if contents.items.len() != 1 {
                // A directory, not a file.
                return Ok(GitHubResponse::FileContents(None));
            }
            let item = contents.items.remove(0);
            let text = item.decoded_content().ok_or_else(|| {
                GitHubApiError::permanent(format!(
                    "{path} at {reference} is not a text file"
                ))
            })?;
            Ok(GitHubResponse::FileContents(Some(text)))
        }
        Err(e) => {
            let err = GitHubApiError::from_octocrab(e);
            if err.is_not_found() {
                tracing::debug!(path = %path, reference = %reference, "file not found");
                Ok(GitHubResponse::FileContents(None))
            } else {
                Err(err)
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct BranchResponse {
    commit: BranchCommit,
}

#[derive(Debug, Deserialize)]
struct BranchCommit {
    sha: String,
}

async fn get_branch_head(
    client: &OctocrabClient,
    branch: String,
) -> Result<GitHubResponse, GitHubApiError> {
    // Branch names may contain '/'
    let url = format!(
        "/repos/{}/{}/branches/{}",
        client.owner(),
        client.repo_name(),
        urlencoding::encode(&branch)
    );
    let response: BranchResponse = client
        .inner()
        .get(&url, None::<&()>)
        .await
        .map_err(GitHubApiError::from_octocrab)?;

    Ok(GitHubResponse::BranchHead(Sha::from(response.commit.sha)))
}

// ─── Comment Operations ───────────────────────────────────────────────────────

async fn list_comments(
    client: &OctocrabClient,
    pr: PrNumber,
) -> Result<GitHubResponse, GitHubApiError> {
    let mut page = 1u32;
    let mut all_comments = Vec::new();

    loop {
        let page_result = client
            .inner()
            .issues(client.owner(), client.repo_name())
            .list_comments(pr.0)
            .per_page(PAGE_SIZE as u8)
            .page(page)
            .send()
            .await
            .map_err(GitHubApiError::from_octocrab)?;

        let items = page_result.items;
        let is_last_page = items.len() < PAGE_SIZE as usize;

        for comment in items {
            all_comments.push(CommentData {
                id: CommentId(comment.id.into_inner()),
                author_login: comment.user.login,
                body: comment.body.unwrap_or_default(),
                created_at: comment.created_at,
            });
        }

        if is_last_page {
            break;
        }
        page += 1;
    }

    Ok(GitHubResponse::Comments(all_comments))
}

async fn post_comment(
    client: &OctocrabClient,
    pr: PrNumber,
    body: String,
) -> Result<GitHubResponse, GitHubApiError> {
    let comment = client
        .inner()
        .issues(client.owner(), client.repo_name())
        .create_comment(pr.0, body)
        .await
        .map_err(GitHubApiError::from_octocrab)?;

    Ok(GitHubResponse::CommentPosted {
        id: CommentId(comment.id.into_inner()),
    })
}

async fn delete_comment(
    client: &OctocrabClient,
    comment_id: CommentId,
) -> Result<GitHubResponse, GitHubApiError> {
    let result = client
        .inner()
        .issues(client.owner(), client.repo_name())
        .delete_comment(octocrab::models::CommentId(comment_id.0))
        .await;

    match result {
        Ok(()) => Ok(GitHubResponse::CommentDeleted),
        Err(e) => {
            let err = GitHubApiError::from_octocrab(e);
            // Already gone, e.g. a concurrent delivery deleted it first.
            if err.is_not_found() {
                Ok(GitHubResponse::CommentDeleted)
            } else {
                Err(err)
            }
        }
    }
}

// ─── Status Operations ────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct StatusRequest<'a> {
    state: &'static str,
    context: &'a str,
    description: &'a str,
}

async fn create_status(
    client: &OctocrabClient,
    sha: Sha,
    state: StatusState,
    context: String,
    description: String,
) -> Result<GitHubResponse, GitHubApiError> {
    let url = format!(
        "/repos/{}/{}/statuses/{}",
        client.owner(),
        client.repo_name(),
        sha
    );
    let request = StatusRequest {
        state: state.as_api_str(),
        context: &context,
        description: &description,
    };
    let _: serde_json::Value = client
        .inner()
        .post(&url, Some(&request))
        .await
        .map_err(GitHubApiError::from_octocrab)?;

    Ok(GitHubResponse::StatusCreated)
}

// ─── Identity ─────────────────────────────────────────────────────────────────

async fn get_authenticated_user(
    client: &OctocrabClient,
) -> Result<GitHubResponse, GitHubApiError> {
    let user: UserResponse = client
        .inner()
        .get("/user", None::<&()>)
        .await
        .map_err(GitHubApiError::from_octocrab)?;

    Ok(GitHubResponse::User { login: user.login })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pull_response_reads_default_branch_from_base_repo() {
        let json = r#"{
            "id": 9001,
            "number": 42,
            "body": null,
            "merged": false,
            "merged_at": null,
            "head": { "ref": "feature", "sha": "aaa", "repo": null },
            "base": { "ref": "develop", "sha": "bbb", "repo": { "default_branch": "main" } },
            "user": { "login": "octocat" }
        }"#;
        let pull: PullResponse = serde_json::from_str(json).unwrap();
        assert_eq!(pull.id, 9001);
        assert_eq!(
            pull.base.repo.and_then(|r| r.default_branch).as_deref(),
            Some("main")
        );
        assert!(pull.body.is_none());
    }

    #[test]
    fn commit_pulls_parse_merge_time() {
        let json = r#"[
            { "number": 1, "merged_at": null },
            { "number": 2, "merged_at": "2024-05-01T12:00:00Z" }
        ]"#;
        let pulls: Vec<CommitPull> = serde_json::from_str(json).unwrap();
        assert!(pulls[0].merged_at.is_none());
        assert_eq!(
            pulls[1].merged_at.unwrap().to_rfc3339(),
            "2024-05-01T12:00:00+00:00"
        );
    }

    #[test]
    fn status_request_shape() {
        let request = StatusRequest {
            state: StatusState::Failure.as_api_str(),
            context: "peacock/release",
            description: "boom",
        };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            serde_json::json!({
                "state": "failure",
                "context": "peacock/release",
                "description": "boom"
            })
        );
    }
}
