//! Octocrab clients scoped to a repository, and the provider that hands them
//! out.

use octocrab::Octocrab;

use crate::effects::GitHubProvider;
use crate::types::RepoId;

use super::error::GitHubApiError;
use super::retry::Backoff;

/// A GitHub API client scoped to a specific repository.
///
/// All operations performed through this client target the same repository,
/// matching the design where `GitHubEffect` variants don't include repo info.
#[derive(Clone)]
pub struct OctocrabClient {
    client: Octocrab,
    repo: RepoId,
    backoff: Backoff,
}

impl OctocrabClient {
    /// Creates a new client scoped to the given repository.
    pub fn new(client: Octocrab, repo: RepoId) -> Self {
        Self {
            client,
            repo,
            backoff: Backoff::WEBHOOK,
        }
    }

    /// Overrides how transient failures are retried.
    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn inner(&self) -> &Octocrab {
        &self.client
    }

    pub fn repo(&self) -> &RepoId {
        &self.repo
    }

    pub fn owner(&self) -> &str {
        &self.repo.owner
    }

    pub fn repo_name(&self) -> &str {
        &self.repo.repo
    }

    pub fn backoff(&self) -> Backoff {
        self.backoff
    }
}

impl std::fmt::Debug for OctocrabClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OctocrabClient")
            .field("repo", &self.repo)
            .finish_non_exhaustive()
    }
}

/// Builds the shared octocrab instance from a token and optional GitHub
/// Enterprise API base URL.
pub fn build_octocrab(token: &str, base_url: Option<&str>) -> Result<Octocrab, GitHubApiError> {
    let mut builder = Octocrab::builder().personal_token(token.to_string());
    if let Some(url) = base_url {
        builder = builder
            .base_uri(url)
            .map_err(GitHubApiError::from_octocrab)?;
    }
    builder.build().map_err(GitHubApiError::from_octocrab)
}

/// Hands out [`OctocrabClient`]s that share one authenticated octocrab.
#[derive(Clone)]
pub struct OctocrabProvider {
    client: Octocrab,
    backoff: Backoff,
}

impl OctocrabProvider {
    pub fn new(client: Octocrab) -> Self {
        Self {
            client,
            backoff: Backoff::WEBHOOK,
        }
    }

    /// Backoff for every client handed out from now on.
    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn octocrab(&self) -> &Octocrab {
        &self.client
    }
}

impl GitHubProvider for OctocrabProvider {
    type Client = OctocrabClient;

    fn client_for(&self, repo: &RepoId) -> OctocrabClient {
        OctocrabClient::new(self.client.clone(), repo.clone())
            .with_backoff(self.backoff)
    }
}
