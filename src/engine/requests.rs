//! Typed wrappers over single GitHub effects.
//!
//! Each helper runs one effect and unpacks the matching response variant,
//! turning any other variant into a permanent error.

use crate::effects::{
    CommentData, CommitPrData, GitHubEffect, GitHubInterpreter, GitHubResponse, PrData,
    StatusState,
};
use crate::github::GitHubApiError;
use crate::types::{CommentId, PrNumber, Sha};

pub(crate) async fn get_pr<C>(client: &C, pr: PrNumber) -> Result<PrData, GitHubApiError>
where
    C: GitHubInterpreter<Error = GitHubApiError>,
{
    match client.interpret(GitHubEffect::GetPr { pr }).await? {
        GitHubResponse::Pr(data) => Ok(data),
        other => Err(GitHubApiError::unexpected_response("pr", other.kind())),
    }
}

pub(crate) async fn list_pr_files<C>(client: &C, pr: PrNumber) -> Result<Vec<String>, GitHubApiError>
where
    C: GitHubInterpreter<Error = GitHubApiError>,
{
    match client.interpret(GitHubEffect::ListPrFiles { pr }).await? {
        GitHubResponse::PrFiles(files) => Ok(files),
        other => Err(GitHubApiError::unexpected_response("pr_files", other.kind())),
    }
}

pub(crate) async fn prs_for_commit<C>(client: &C, sha: &Sha) -> Result<Vec<CommitPrData>, GitHubApiError>
where
    C: GitHubInterpreter<Error = GitHubApiError>,
{
    let effect = GitHubEffect::ListPrsForCommit { sha: sha.clone() };
    match client.interpret(effect).await? {
        GitHubResponse::CommitPrs(prs) => Ok(prs),
        other => Err(GitHubApiError::unexpected_response("commit_prs", other.kind())),
    }
}

/// `None` when the file does not exist at `reference`.
pub(crate) async fn file_contents<C>(
    client: &C,
    path: &str,
    reference: &str,
) -> Result<Option<String>, GitHubApiError>
where
    C: GitHubInterpreter<Error = GitHubApiError>,
{
    let effect = GitHubEffect::GetFileContents {
        path: path.to_string(),
        reference: reference.to_string(),
    };
    match client.interpret(effect).await? {
        GitHubResponse::FileContents(contents) => Ok(contents),
        other => Err(GitHubApiError::unexpected_response("file_contents", other.kind())),
    }
}

pub(crate) async fn branch_head<C>(client: &C, branch: &str) -> Result<Sha, GitHubApiError>
where
    C: GitHubInterpreter<Error = GitHubApiError>,
{
    let effect = GitHubEffect::GetBranchHead {
        branch: branch.to_string(),
    };
    match client.interpret(effect).await? {
        GitHubResponse::BranchHead(sha) => Ok(sha),
        other => Err(GitHubApiError::unexpected_response("branch_head", other.kind())),
    }
}

pub(crate) async fn list_comments<C>(client: &C, pr: PrNumber) -> Result<Vec<CommentData>, GitHubApiError>
where
    C: GitHubInterpreter<Error = GitHubApiError>,
{
    match client.interpret(GitHubEffect::ListComments { pr }).await? {
        GitHubResponse::Comments(comments) => Ok(comments),
        other => Err(GitHubApiError::unexpected_response("comments", other.kind())),
    }
}

pub(crate) async fn post_comment<C>(
    client: &C,
    pr: PrNumber,
    body: String,
) -> Result<CommentId, GitHubApiError>
where
    C: GitHubInterpreter<Error = GitHubApiError>,
{
    match client.interpret(GitHubEffect::PostComment { pr, body }).await? {
        GitHubResponse::CommentPosted { id } => Ok(id),
        other => Err(GitHubApiError::unexpected_response("comment_posted", other.kind())),
    }
}

pub(crate) async fn delete_comment<C>(client: &C, comment_id: CommentId) -> Result<(), GitHubApiError>
where
    C: GitHubInterpreter<Error = GitHubApiError>,
{
    match client.interpret(GitHubEffect::DeleteComment { comment_id }).await? {
        GitHubResponse::CommentDeleted => Ok(()),
        other => Err(GitHubApiError::unexpected_response("comment_deleted", other.kind())),
    }
}

pub(crate) async fn create_status<C>(
    client: &C,
    sha: &Sha,
    state: StatusState,
    context: &str,
    description: &str,
) -> Result<(), GitHubApiError>
where
    C: GitHubInterpreter<Error = GitHubApiError>,
{
    let effect = GitHubEffect::CreateStatus {
        sha: sha.clone(),
        state,
        context: context.to_string(),
        description: description.to_string(),
    };
    match client.interpret(effect).await? {
        GitHubResponse::StatusCreated => Ok(()),
        other => Err(GitHubApiError::unexpected_response("status_created", other.kind())),
    }
}

pub(crate) async fn authenticated_login<C>(client: &C) -> Result<String, GitHubApiError>
where
    C: GitHubInterpreter<Error = GitHubApiError>,
{
    match client.interpret(GitHubEffect::GetAuthenticatedUser).await? {
        GitHubResponse::User { login } => Ok(login),
        other => Err(GitHubApiError::unexpected_response("user", other.kind())),
    }
}
