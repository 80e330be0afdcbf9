//! The validation and dispatch engine.
//!
//! Every pull request event ends up here. Open PRs are validated: their
//! release notes are parsed, checked against the team directory and the PR
//! template, and previewed in a breakdown comment. Merged PRs are released:
//! the notes are sent to each team's channel and a [`Release`] is recorded.
//!
//! Progress is reported through two commit status contexts,
//! [`Context::Validation`] and [`Context::Release`]. Failures never escape as
//! errors when they can be reported on the PR instead; see
//! [`Engine::process`].

pub mod cache;
pub(crate) mod requests;


pub use cache::PrCache;

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use thiserror::Error;
use tokio::sync::OnceCell;
use tracing::{debug, error, info, instrument, warn};

use crate::channels::{ChannelRegistry, FanOutError};
use crate::comment::{self, BREAKDOWN};
use crate::effects::{CommentData, GitHubProvider, StatusState};
use crate::feathers::{FEATHERS_PATH, Feathers, FeathersError};
use crate::github::GitHubApiError;
use crate::notes::{self, NoteError, ParsedNote};
use crate::store::{PullRequestSummary, Release, ReleaseStore, StoreError};
use crate::types::{CommentId, PrId, PrNumber, RepoId, Sha};
use crate::webhooks::{PrAction, PullRequestEvent};

pub const DEFAULT_TEMPLATE_PATH: &str = ".github/pull_request_template.md";

/// Failure message when the directory file is absent at the ref.
pub const FEATHERS_MISSING: &str = "feathers does not exist in branch";

/// Failure message when the notes are the unedited PR template.
pub const TEMPLATE_UNCHANGED: &str =
    "release notes cannot be the same as the pull request template";

/// The commit status context a piece of work reports under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Context {
    Validation,
    Release,
}

impl Context {
    pub fn as_str(&self) -> &'static str {
        match self {
            Context::Validation => "peacock/validation",
            Context::Release => "peacock/release",
        }
    }

    /// Word used in failure comments.
    pub fn title(&self) -> &'static str {
        match self {
            Context::Validation => "Validation",
            Context::Release => "Release",
        }
    }
}

impl std::fmt::Display for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where the team directory is read from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum FeathersSource {
    /// `.peacock/feathers.yaml` at the branch being validated or released.
    #[default]
    Repository,
    /// A file on the local filesystem (command-line mode).
    LocalFile(PathBuf),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// The bot's own login. Looked up from the token when `None`.
    pub bot_login: Option<String>,
    pub template_path: String,
    pub feathers_source: FeathersSource,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            bot_login: None,
            template_path: DEFAULT_TEMPLATE_PATH.to_string(),
            feathers_source: FeathersSource::Repository,
        }
    }
}

#[derive(Debug, Error)]
pub enum EngineError {
    /// A problem with the PR's content, reported to its author as is.
    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Feathers(#[from] FeathersError),

    #[error(transparent)]
    Notes(#[from] NoteError),

    #[error(transparent)]
    FanOut(#[from] FanOutError),

    #[error(transparent)]
    GitHub(#[from] GitHubApiError),

    #[error("release store: {0}")]
    Store(#[from] StoreError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<serde_json::Error> for EngineError {
    fn from(err: serde_json::Error) -> Self {
        EngineError::Internal(err.to_string())
    }
}

/// Why work stopped early without failing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    EmptyBody,
    NoNotes,
    /// The latest breakdown comment already describes these notes.
    Unchanged,
}

impl SkipReason {
    fn status_description(&self) -> &'static str {
        match self {
            SkipReason::EmptyBody => "Pull request has no description",
            SkipReason::NoNotes => "No release notes found",
            SkipReason::Unchanged => "Release notes unchanged",
        }
    }
}

/// What handling an event did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// A fresh breakdown comment was posted.
    Validated { notes: usize, comment: CommentId },
    Skipped(SkipReason),
    /// Notes were sent. `release_id` is `None` when no environment could be
    /// derived from the changed files.
    Released {
        notes: usize,
        environment: Option<String>,
        release_id: Option<u64>,
    },
    /// A closed, unmerged PR's caches were dropped.
    Cleaned,
    /// The failure was reported on the PR.
    Failed { context: Context, reason: String },
}

impl Outcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, Outcome::Failed { .. })
    }

    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Validated { .. } => "validated",
            Outcome::Skipped(_) => "skipped",
            Outcome::Released { .. } => "released",
            Outcome::Cleaned => "cleaned",
            Outcome::Failed { .. } => "failed",
        }
    }
}

/// Consumes pull request events. The worker pool holds one of these.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, event: PullRequestEvent) -> Result<Outcome, EngineError>;
}

/// The engine, generic over how GitHub clients are obtained.
pub struct Engine<P: GitHubProvider> {
    provider: P,
    channels: ChannelRegistry,
    store: Arc<dyn ReleaseStore>,
    config: EngineConfig,
    login: OnceCell<String>,
    feathers_cache: PrCache<Feathers>,
    template_cache: PrCache<Vec<ParsedNote>>,
}

impl<P: GitHubProvider> Engine<P> {
    pub fn new(
        provider: P,
        channels: ChannelRegistry,
        store: Arc<dyn ReleaseStore>,
        config: EngineConfig,
    ) -> Self {
        Engine {
            provider,
            channels,
            store,
            login: OnceCell::new_with(config.bot_login.clone()),
            config,
            feathers_cache: PrCache::new(),
            template_cache: PrCache::new(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn ReleaseStore> {
        &self.store
    }

    /// Routes an event to validation, release or cleanup.
    ///
    /// Returns `Ok` whenever the result is visible on the PR, including
    /// [`Outcome::Failed`]. `Err` means even reporting the failure failed.
    pub async fn process(&self, event: &PullRequestEvent) -> Result<Outcome, EngineError> {
        match event.action {
            PrAction::Opened | PrAction::Reopened | PrAction::Synchronize | PrAction::Edited => {
                self.validate(event).await
            }
            PrAction::Closed if event.merged => self.release(event).await,
            PrAction::Closed => {
                self.cleanup(event.pr_id).await;
                Ok(Outcome::Cleaned)
            }
        }
    }

    /// Validates the notes of an open PR and previews them in a comment.
    #[instrument(skip_all, fields(repo = %event.repo, pr = %event.pr_number))]
    pub async fn validate(&self, event: &PullRequestEvent) -> Result<Outcome, EngineError> {
        let client = self.provider.client_for(&event.repo);

        let (branch, sha) = match (&event.head_branch, &event.head_sha) {
            (Some(branch), Some(sha)) => (branch.clone(), sha.clone()),
            _ => {
                let pr = requests::get_pr(&client, event.pr_number).await?;
                (pr.head_ref, pr.head_sha)
            }
        };

        let context = Context::Validation;
        match self.run_validation(&client, event, &branch, &sha).await {
            Ok(outcome) => {
                self.publish_success(&client, &sha, context, &outcome).await;
                Ok(outcome)
            }
            Err(err) => {
                self.report_failure(&client, event.pr_number, &sha, context, err)
                    .await
            }
        }
    }

    async fn run_validation(
        &self,
        client: &P::Client,
        event: &PullRequestEvent,
        branch: &str,
        sha: &Sha,
    ) -> Result<Outcome, EngineError> {
        requests::create_status(
            client,
            sha,
            StatusState::Pending,
            Context::Validation.as_str(),
            "Validating release notes",
        )
        .await?;

        if event.body.trim().is_empty() {
            return Ok(Outcome::Skipped(SkipReason::EmptyBody));
        }

        let feathers = self.head_feathers(client, event.pr_id, branch, sha).await?;

        let parsed = notes::parse_notes(&event.body);
        if parsed.is_empty() {
            return Ok(Outcome::Skipped(SkipReason::NoNotes));
        }
        let release_notes = notes::resolve_notes(&parsed, &feathers)?;

        let template = self.head_template(client, event.pr_id, branch, sha).await?;
        let template = notes::resolve_template(&template, &feathers);
        if notes::matches_template(&release_notes, &template) {
            return Err(EngineError::Validation(TEMPLATE_UNCHANGED.to_string()));
        }

        self.channels.check_registered(&release_notes)?;

        let hash = comment::hash_notes(&release_notes)?;
        let login = self.bot_login(client).await?;
        let previous = own_comments(
            requests::list_comments(client, event.pr_number).await?,
            &login,
        );

        if let Some(latest) = previous.first() {
            let tag = comment::extract(&latest.body);
            if tag.hash == hash && tag.kind == BREAKDOWN {
                debug!(hash = %hash, "breakdown unchanged");
                return Ok(Outcome::Skipped(SkipReason::Unchanged));
            }
        }

        let body = comment::tag(
            &comment::render_breakdown(
                &release_notes,
                notes::distinct_team_count(&release_notes),
            ),
            &hash,
            BREAKDOWN,
        );
        for old in &previous {
            requests::delete_comment(client, old.id).await?;
        }
        let comment = requests::post_comment(client, event.pr_number, body).await?;

        info!(notes = release_notes.len(), comment = %comment, "release notes validated");
        Ok(Outcome::Validated {
            notes: release_notes.len(),
            comment,
        })
    }

    /// Sends a merged PR's notes and records the release.
    ///
    /// The PR's cache entries are dropped whatever the result.
    #[instrument(skip_all, fields(repo = %event.repo, pr = %event.pr_number))]
    pub async fn release(&self, event: &PullRequestEvent) -> Result<Outcome, EngineError> {
        let result = self.release_inner(event).await;
        self.cleanup(event.pr_id).await;
        result
    }

    async fn release_inner(&self, event: &PullRequestEvent) -> Result<Outcome, EngineError> {
        let client = self.provider.client_for(&event.repo);
        let sha = requests::branch_head(&client, &event.default_branch).await?;

        let context = Context::Release;
        match self.run_release(&client, event, &sha).await {
            Ok(outcome) => {
                self.publish_success(&client, &sha, context, &outcome).await;
                Ok(outcome)
            }
            Err(err) => {
                self.report_failure(&client, event.pr_number, &sha, context, err)
                    .await
            }
        }
    }

    async fn run_release(
        &self,
        client: &P::Client,
        event: &PullRequestEvent,
        sha: &Sha,
    ) -> Result<Outcome, EngineError> {
        requests::create_status(
            client,
            sha,
            StatusState::Pending,
            Context::Release.as_str(),
            "Sending release notes",
        )
        .await?;

        if event.body.trim().is_empty() {
            return Ok(Outcome::Skipped(SkipReason::EmptyBody));
        }

        let feathers = self.load_feathers(client, &event.default_branch).await?;

        let parsed = notes::parse_notes(&event.body);
        if parsed.is_empty() {
            return Ok(Outcome::Skipped(SkipReason::NoNotes));
        }
        let release_notes = notes::resolve_notes(&parsed, &feathers)?;

        let sent = self
            .channels
            .send(&feathers.config().subject, &release_notes)
            .await?;
        info!(notes = release_notes.len(), sent, "release notes sent");

        let files = requests::list_pr_files(client, event.pr_number).await?;
        let Some(environment) = environment_from_paths(files.iter().map(String::as_str)) else {
            warn!("no helmfiles environment among changed files, release not recorded");
            return Ok(Outcome::Released {
                notes: release_notes.len(),
                environment: None,
                release_id: None,
            });
        };

        let record = self
            .store
            .save(Release {
                created_at: Utc::now(),
                environment: environment.clone(),
                release_notes: release_notes.clone(),
                pull_request: PullRequestSummary::new(&event.repo, event.pr_number),
            })
            .await?;
        info!(release = record.id, environment = %environment, "release recorded");

        Ok(Outcome::Released {
            notes: release_notes.len(),
            environment: Some(environment),
            release_id: Some(record.id),
        })
    }

    /// Drops both cache entries for a PR.
    pub async fn cleanup(&self, pr: PrId) {
        self.feathers_cache.remove(pr).await;
        self.template_cache.remove(pr).await;
        debug!(pr_id = %pr, "caches cleared");
    }

    /// Fetches a PR and shapes it as an event with the given action.
    pub async fn event_for_pr(
        &self,
        repo: &RepoId,
        pr: PrNumber,
        action: PrAction,
    ) -> Result<PullRequestEvent, EngineError> {
        let client = self.provider.client_for(repo);
        let data = requests::get_pr(&client, pr).await?;
        Ok(PullRequestEvent {
            repo: repo.clone(),
            action,
            pr_id: data.id,
            pr_number: data.number,
            head_branch: Some(data.head_ref),
            head_sha: Some(data.head_sha),
            default_branch: data.default_branch,
            body: data.body,
            merged: data.merged,
            author: data.author,
        })
    }

    /// Finds the merged PR that introduced `sha`.
    ///
    /// When several merged PRs contain the commit, the most recently merged
    /// one wins.
    pub async fn merged_pr_for_commit(
        &self,
        repo: &RepoId,
        sha: &Sha,
    ) -> Result<Option<PrNumber>, EngineError> {
        let client = self.provider.client_for(repo);
        let prs = requests::prs_for_commit(&client, sha).await?;
        Ok(prs
            .into_iter()
            .filter_map(|pr| pr.merged_at.map(|at| (at, pr.number)))
            .max_by_key(|(at, _)| *at)
            .map(|(_, number)| number))
    }

    async fn head_feathers(
        &self,
        client: &P::Client,
        pr: PrId,
        branch: &str,
        sha: &Sha,
    ) -> Result<Arc<Feathers>, EngineError> {
        if let Some(feathers) = self.feathers_cache.get(pr, sha).await {
            debug!("feathers cache hit");
            return Ok(feathers);
        }
        let feathers = self.load_feathers(client, branch).await?;
        Ok(self.feathers_cache.insert(pr, sha.clone(), feathers).await)
    }

    async fn load_feathers(
        &self,
        client: &P::Client,
        reference: &str,
    ) -> Result<Feathers, EngineError> {
        match &self.config.feathers_source {
            FeathersSource::LocalFile(path) => Ok(Feathers::from_path(path)?),
            FeathersSource::Repository => {
                let yaml = requests::file_contents(client, FEATHERS_PATH, reference)
                    .await?
                    .ok_or_else(|| EngineError::Validation(FEATHERS_MISSING.to_string()))?;
                Ok(Feathers::from_yaml(&yaml)?)
            }
        }
    }

    async fn head_template(
        &self,
        client: &P::Client,
        pr: PrId,
        branch: &str,
        sha: &Sha,
    ) -> Result<Arc<Vec<ParsedNote>>, EngineError> {
        if let Some(template) = self.template_cache.get(pr, sha).await {
            debug!("template cache hit");
            return Ok(template);
        }
        let text = requests::file_contents(client, &self.config.template_path, branch)
            .await?
            .unwrap_or_default();
        let parsed = notes::parse_notes(&text);
        Ok(self.template_cache.insert(pr, sha.clone(), parsed).await)
    }

    async fn bot_login(&self, client: &P::Client) -> Result<String, EngineError> {
        let login = self
            .login
            .get_or_try_init(|| requests::authenticated_login(client))
            .await?;
        Ok(login.clone())
    }

    /// Publishes the closing `success` status. A failure here is only logged:
    /// the work itself is done.
    async fn publish_success(
        &self,
        client: &P::Client,
        sha: &Sha,
        context: Context,
        outcome: &Outcome,
    ) {
        let description = match outcome {
            Outcome::Skipped(reason) => reason.status_description(),
            Outcome::Released { .. } => "Release notes sent",
            _ => "Release notes validated",
        };
        if let Err(e) =
            requests::create_status(client, sha, StatusState::Success, context.as_str(), description)
                .await
        {
            warn!(context = %context, sha = %sha, error = %e, "could not publish success status");
        }
    }

    /// Turns an error into a `failure` status and a failure comment.
    ///
    /// Returns the original error if either cannot be published.
    async fn report_failure(
        &self,
        client: &P::Client,
        pr: PrNumber,
        sha: &Sha,
        context: Context,
        err: EngineError,
    ) -> Result<Outcome, EngineError> {
        let reason = err.to_string();
        warn!(context = %context, sha = %sha, reason = %reason, "reporting failure");

        let description = comment::status_description(&reason);
        let reported = async {
            requests::create_status(client, sha, StatusState::Failure, context.as_str(), &description)
                .await?;
            requests::post_comment(client, pr, comment::failure_comment(context.title(), &reason))
                .await?;
            Ok::<_, GitHubApiError>(())
        }
        .await;

        match reported {
            Ok(()) => Ok(Outcome::Failed { context, reason }),
            Err(report_err) => {
                error!(context = %context, error = %report_err, "could not report failure");
                Err(err)
            }
        }
    }
}

#[async_trait]
impl<P: GitHubProvider> EventHandler for Engine<P> {
    async fn handle(&self, event: PullRequestEvent) -> Result<Outcome, EngineError> {
        self.process(&event).await
    }
}

/// The bot's own comments, most recent first.
fn own_comments(comments: Vec<CommentData>, login: &str) -> Vec<CommentData> {
    let mut own: Vec<_> = comments
        .into_iter()
        .filter(|c| c.author_login.eq_ignore_ascii_case(login))
        .collect();
    own.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| b.id.cmp(&a.id))
    });
    own
}

/// Names the environment a change deploys to.
///
/// The first path with a `helmfiles` segment wins; the segment right after
/// it is the environment.
pub fn environment_from_paths<'a>(paths: impl IntoIterator<Item = &'a str>) -> Option<String> {
    paths.into_iter().find_map(|path| {
        let segments: Vec<&str> = path.split('/').collect();
        segments
            .windows(2)
            .find(|w| w[0] == "helmfiles" && !w[1].is_empty())
            .map(|w| w[1].to_string())
    })
}
