//! The seam between the engine and GitHub.
//!
//! Production runs effects through octocrab; tests run them against a
//! scripted in-memory repository.

use std::future::Future;

use super::github::{GitHubEffect, GitHubResponse};
use crate::types::RepoId;

/// Runs effects against one repository.
pub trait GitHubInterpreter {
    type Error;

    fn interpret(
        &self,
        effect: GitHubEffect,
    ) -> impl Future<Output = Result<GitHubResponse, Self::Error>> + Send;
}

/// Hands out repository-scoped interpreters.
///
/// The engine serves every repository that installs the webhook, so it asks
/// the provider for a client per event rather than holding one.
pub trait GitHubProvider: Send + Sync + 'static {
    type Client: GitHubInterpreter<Error = crate::github::GitHubApiError> + Send + Sync;

    fn client_for(&self, repo: &RepoId) -> Self::Client;
}
