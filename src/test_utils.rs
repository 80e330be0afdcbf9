//! Shared test doubles: a scripted GitHub, a recording channel and fixtures.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};

use crate::channels::{Channel, ChannelError};
use crate::effects::{
    CommentData, CommitPrData, GitHubEffect, GitHubInterpreter, GitHubProvider, GitHubResponse,
    PrData, StatusState,
};
use crate::github::GitHubApiError;
use crate::types::{CommentId, PrId, PrNumber, RepoId, Sha};
use crate::webhooks::{PrAction, PullRequestEvent};

pub const BOT_LOGIN: &str = "peacock-bot";

pub const FEATHERS_YAML: &str = r#"
teams:
  - name: infra
    apiKey: infra-key
    contactType: slack
    addresses: [C02BA9QHMD0]
  - name: payments
    apiKey: payments-key
    contactType: webhook
    addresses: [payments@example.com]
  - name: docs
    apiKey: docs-key
    contactType: none
config:
  messages:
    subject: Widgets release
"#;

/// A commit status as the mock recorded it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusRecord {
    pub sha: Sha,
    pub state: StatusState,
    pub context: String,
    pub description: String,
}

#[derive(Debug, Default)]
pub struct MockState {
    pub prs: HashMap<PrNumber, PrData>,
    /// Keyed by `(reference, path)`.
    pub files: HashMap<(String, String), String>,
    pub branch_heads: HashMap<String, Sha>,
    pub pr_files: HashMap<PrNumber, Vec<String>>,
    pub commit_prs: HashMap<Sha, Vec<CommitPrData>>,
    pub comments: Vec<(PrNumber, CommentData)>,
    pub statuses: Vec<StatusRecord>,
    pub effects: Vec<GitHubEffect>,
    /// Effect names (serde tags) that fail with a transient error.
    pub failing: HashSet<&'static str>,
    next_comment_id: u64,
    clock: i64,
}

/// An in-memory GitHub. Clones share state, so the same value serves as
/// provider and as every repository's client.
#[derive(Debug, Clone, Default)]
pub struct MockGitHub {
    state: Arc<Mutex<MockState>>,
}

impl MockGitHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_state<R>(&self, f: impl FnOnce(&mut MockState) -> R) -> R {
        f(&mut self.state.lock().unwrap())
    }

    pub fn add_file(&self, reference: &str, path: &str, contents: &str) {
        self.with_state(|s| {
            s.files
                .insert((reference.to_string(), path.to_string()), contents.to_string())
        });
    }

    pub fn remove_file(&self, reference: &str, path: &str) {
        self.with_state(|s| s.files.remove(&(reference.to_string(), path.to_string())));
    }

    pub fn set_branch_head(&self, branch: &str, sha: &str) {
        self.with_state(|s| s.branch_heads.insert(branch.to_string(), Sha::new(sha)));
    }

    pub fn set_pr_files(&self, pr: u64, files: &[&str]) {
        self.with_state(|s| {
            s.pr_files
                .insert(PrNumber(pr), files.iter().map(|f| f.to_string()).collect())
        });
    }

    pub fn add_pr(&self, pr: PrData) {
        self.with_state(|s| s.prs.insert(pr.number, pr));
    }

    pub fn add_comment(&self, pr: u64, author: &str, body: &str) -> CommentId {
        self.with_state(|s| s.push_comment(PrNumber(pr), author, body.to_string()))
    }

    pub fn fail(&self, effect: &'static str) {
        self.with_state(|s| s.failing.insert(effect));
    }

    pub fn comments(&self, pr: u64) -> Vec<CommentData> {
        self.with_state(|s| {
            s.comments
                .iter()
                .filter(|(n, _)| n.0 == pr)
                .map(|(_, c)| c.clone())
                .collect()
        })
    }

    pub fn statuses(&self) -> Vec<StatusRecord> {
        self.with_state(|s| s.statuses.clone())
    }

    pub fn last_status(&self, context: &str) -> Option<StatusRecord> {
        self.with_state(|s| s.statuses.iter().rev().find(|r| r.context == context).cloned())
    }

    pub fn effects(&self) -> Vec<GitHubEffect> {
        self.with_state(|s| s.effects.clone())
    }

    pub fn clear_effects(&self) {
        self.with_state(|s| s.effects.clear());
    }

    /// How many times a file was fetched.
    pub fn file_fetches(&self, path: &str) -> usize {
        self.effects()
            .iter()
            .filter(|e| matches!(e, GitHubEffect::GetFileContents { path: p, .. } if p == path))
            .count()
    }

    pub fn posted_comments(&self) -> usize {
        self.effects()
            .iter()
            .filter(|e| matches!(e, GitHubEffect::PostComment { .. }))
            .count()
    }

    fn respond(&self, effect: GitHubEffect) -> Result<GitHubResponse, GitHubApiError> {
        let mut s = self.state.lock().unwrap();
        s.effects.push(effect.clone());

        let name = effect.name();
        if s.failing.contains(name) {
            return Err(GitHubApiError::transient(format!(
                "scripted failure for {name}"
            )));
        }

        let response = match effect {
            GitHubEffect::GetPr { pr } => GitHubResponse::Pr(
                s.prs.get(&pr).cloned().ok_or_else(|| GitHubApiError::not_found("pull request"))?,
            ),
            GitHubEffect::ListPrFiles { pr } => {
                GitHubResponse::PrFiles(s.pr_files.get(&pr).cloned().unwrap_or_default())
            }
            GitHubEffect::ListPrsForCommit { sha } => {
                GitHubResponse::CommitPrs(s.commit_prs.get(&sha).cloned().unwrap_or_default())
            }
            GitHubEffect::GetFileContents { path, reference } => {
                GitHubResponse::FileContents(s.files.get(&(reference, path)).cloned())
            }
            GitHubEffect::GetBranchHead { branch } => GitHubResponse::BranchHead(
                s.branch_heads
                    .get(&branch)
                    .cloned()
                    .ok_or_else(|| GitHubApiError::not_found("branch"))?,
            ),
            GitHubEffect::ListComments { pr } => GitHubResponse::Comments(
                s.comments
                    .iter()
                    .filter(|(n, _)| *n == pr)
                    .map(|(_, c)| c.clone())
                    .collect(),
            ),
            GitHubEffect::PostComment { pr, body } => {
                let id = s.push_comment(pr, BOT_LOGIN, body);
                GitHubResponse::CommentPosted { id }
            }
            GitHubEffect::DeleteComment { comment_id } => {
                s.comments.retain(|(_, c)| c.id != comment_id);
                GitHubResponse::CommentDeleted
            }
            GitHubEffect::CreateStatus {
                sha,
                state,
                context,
                description,
            } => {
                s.statuses.push(StatusRecord {
                    sha,
                    state,
                    context,
                    description,
                });
                GitHubResponse::StatusCreated
            }
            GitHubEffect::GetAuthenticatedUser => GitHubResponse::User {
                login: BOT_LOGIN.to_string(),
            },
        };
        Ok(response)
    }
}

impl MockState {
    fn push_comment(&mut self, pr: PrNumber, author: &str, body: String) -> CommentId {
        self.next_comment_id += 1;
        self.clock += 1;
        let id = CommentId(self.next_comment_id);
        self.comments.push((
            pr,
            CommentData {
                id,
                author_login: author.to_string(),
                body,
                created_at: epoch() + Duration::seconds(self.clock),
            },
        ));
        id
    }
}

impl GitHubInterpreter for MockGitHub {
    type Error = GitHubApiError;

    fn interpret(
        &self,
        effect: GitHubEffect,
    ) -> impl Future<Output = Result<GitHubResponse, Self::Error>> + Send {
        let result = self.respond(effect);
        async move { result }
    }
}

impl GitHubProvider for MockGitHub {
    type Client = MockGitHub;

    fn client_for(&self, _repo: &RepoId) -> MockGitHub {
        self.clone()
    }
}

fn epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
}

/// One recorded `Channel::send` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub content: String,
    pub subject: String,
    pub addresses: Vec<String>,
}

/// Records every send; optionally fails all of them.
#[derive(Debug, Default)]
pub struct RecordingChannel {
    sent: Mutex<Vec<SentMessage>>,
    fail: bool,
}

impl RecordingChannel {
    pub fn failing() -> Self {
        RecordingChannel {
            fail: true,
            ..Default::default()
        }
    }

    pub fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Channel for RecordingChannel {
    async fn send(
        &self,
        content: &str,
        subject: &str,
        addresses: &[String],
    ) -> Result<(), ChannelError> {
        self.sent.lock().unwrap().push(SentMessage {
            content: content.to_string(),
            subject: subject.to_string(),
            addresses: addresses.to_vec(),
        });
        if self.fail {
            return Err(ChannelError::Slack {
                channel: addresses.first().cloned().unwrap_or_default(),
                error: "channel_not_found".into(),
            });
        }
        Ok(())
    }
}

pub fn repo() -> RepoId {
    RepoId::new("acme", "widgets")
}

/// An event for PR #7 on `feature` at `sha`.
pub fn pr_event(action: PrAction, sha: &str, body: &str) -> PullRequestEvent {
    PullRequestEvent {
        repo: repo(),
        action,
        pr_id: PrId(700),
        pr_number: PrNumber(7),
        head_branch: Some("feature".to_string()),
        head_sha: Some(Sha::new(sha)),
        default_branch: "main".to_string(),
        body: body.to_string(),
        merged: false,
        author: "octocat".to_string(),
    }
}

pub fn merged_event(body: &str) -> PullRequestEvent {
    PullRequestEvent {
        merged: true,
        ..pr_event(PrAction::Closed, "head-sha", body)
    }
}

pub fn pr_data(number: u64, head_sha: &str, body: &str) -> PrData {
    PrData {
        id: PrId(number * 100),
        number: PrNumber(number),
        head_sha: Sha::new(head_sha),
        head_ref: "feature".to_string(),
        base_ref: "main".to_string(),
        default_branch: "main".to_string(),
        body: body.to_string(),
        merged: false,
        merged_at: None,
        author: "octocat".to_string(),
    }
}
