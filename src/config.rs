//! Runtime configuration.
//!
//! Every flag falls back to an environment variable so the same binary runs
//! as a long-lived service or as a CI step.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, ValueEnum};
use reqwest::Client;
use tracing::info;

use crate::channels::{ChannelRegistry, SlackChannel, WebhookChannel};
use crate::engine::{DEFAULT_TEMPLATE_PATH, EngineConfig, FeathersSource};
use crate::feathers::ContactType;
use crate::github::{GitHubApiError, OctocrabProvider, build_octocrab};

pub const DEFAULT_LISTEN: &str = "0.0.0.0:3000";

/// File name of the release store inside `--data-dir`.
pub const RELEASES_FILE: &str = "releases.json";

/// Settings shared by `serve` and `run`.
#[derive(Debug, Clone, Args)]
pub struct CommonArgs {
    /// Token used for every GitHub API call.
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    pub github_token: String,

    /// GitHub Enterprise API base URL.
    #[arg(long, env = "GIT_SERVER")]
    pub git_server: Option<String>,

    /// Slack bot token. Slack teams cannot be notified without it.
    #[arg(long, env = "SLACK_TOKEN", hide_env_values = true)]
    pub slack_token: Option<String>,

    /// Endpoint receiving notifications for webhook teams.
    #[arg(long, env = "WEBHOOK_URL")]
    pub webhook_url: Option<String>,

    #[arg(long, env = "WEBHOOK_AUTH_TOKEN", hide_env_values = true)]
    pub webhook_auth_token: Option<String>,

    /// Key for signing outbound webhook notifications.
    #[arg(long, env = "WEBHOOK_SECRET", hide_env_values = true)]
    pub webhook_secret: Option<String>,

    /// Path of the release-note template in the repository.
    #[arg(long, env = "PEACOCK_TEMPLATE_PATH", default_value = DEFAULT_TEMPLATE_PATH)]
    pub template_path: String,

    /// The bot's GitHub login. Looked up from the token when absent.
    #[arg(long, env = "PEACOCK_BOT_LOGIN")]
    pub bot_login: Option<String>,
}

impl CommonArgs {
    pub fn provider(&self) -> Result<OctocrabProvider, GitHubApiError> {
        build_octocrab(&self.github_token, self.git_server.as_deref()).map(OctocrabProvider::new)
    }

    /// Registers a channel for each contact type that has credentials.
    pub fn channels(&self) -> ChannelRegistry {
        let client = Client::new();
        let mut registry = ChannelRegistry::new();

        if let Some(token) = &self.slack_token {
            info!("Slack notifications enabled");
            registry = registry.with(
                ContactType::Slack,
                Arc::new(SlackChannel::new(client.clone(), token.clone())),
            );
        }

        if let Some(url) = &self.webhook_url {
            info!(url = %url, "Webhook notifications enabled");
            let mut channel = WebhookChannel::new(client, url.clone());
            if let Some(token) = &self.webhook_auth_token {
                channel = channel.with_auth_token(token.clone());
            }
            if let Some(secret) = &self.webhook_secret {
                channel = channel.with_secret(secret.clone());
            }
            registry = registry.with(ContactType::Webhook, Arc::new(channel));
        }

        registry
    }

    pub fn engine_config(&self, feathers_source: FeathersSource) -> EngineConfig {
        EngineConfig {
            bot_login: self.bot_login.clone(),
            template_path: self.template_path.clone(),
            feathers_source,
        }
    }
}

#[derive(Debug, Clone, Args)]
pub struct ServeArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    #[arg(long, env = "PEACOCK_LISTEN", default_value = DEFAULT_LISTEN)]
    pub listen: SocketAddr,

    /// Key for verifying inbound GitHub webhook signatures.
    #[arg(long, env = "GITHUB_WEBHOOK_SECRET", hide_env_values = true)]
    pub github_webhook_secret: String,

    /// Directory for the release store. Releases stay in memory without it.
    #[arg(long, env = "PEACOCK_DATA_DIR")]
    pub data_dir: Option<PathBuf>,
}

impl ServeArgs {
    pub fn releases_path(&self) -> Option<PathBuf> {
        self.data_dir.as_ref().map(|dir| dir.join(RELEASES_FILE))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Stage {
    /// Check the notes and post the breakdown comment.
    Validate,
    /// Send the notes of a merged pull request.
    Release,
}

#[derive(Debug, Clone, Args)]
pub struct RunArgs {
    pub stage: Stage,

    #[command(flatten)]
    pub common: CommonArgs,

    #[arg(long, env = "PULL_NUMBER", required_unless_present = "commit")]
    pub pull_number: Option<u64>,

    #[arg(long, env = "REPO_OWNER")]
    pub repo_owner: String,

    #[arg(long, env = "REPO_NAME")]
    pub repo_name: String,

    /// Read the team directory from this file instead of the repository.
    #[arg(long, env = "PEACOCK_FEATHERS_PATH")]
    pub feathers_path: Option<PathBuf>,

    /// Find the pull request through a merged commit (release only).
    #[arg(long)]
    pub commit: Option<String>,
}

impl RunArgs {
    pub fn feathers_source(&self) -> FeathersSource {
        match &self.feathers_path {
            Some(path) => FeathersSource::LocalFile(path.clone()),
            None => FeathersSource::Repository,
        }
    }
}
