//! Command-line entry points.
//!
//! `peacock serve` runs the webhook server. `peacock run validate|release`
//! handles a single pull request and exits, for use as a CI step.

use std::sync::Arc;

use anyhow::{Context as _, anyhow, bail};
use clap::{Parser, Subcommand};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::{RunArgs, ServeArgs, Stage};
use crate::engine::{Engine, FeathersSource, Outcome};
use crate::feathers::Feathers;
use crate::github::Backoff;
use crate::server::{AppState, build_router};
use crate::store::{FileReleaseStore, MemoryReleaseStore, ReleaseStore};
use crate::types::{PrNumber, RepoId, Sha};
use crate::webhooks::PrAction;
use crate::worker::Dispatcher;

#[derive(Debug, Parser)]
#[command(name = "peacock", version)]
#[command(about = "Validates release notes on pull requests and notifies teams when they merge")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Serve GitHub webhooks and the releases API
    Serve(ServeArgs),
    /// Validate or release one pull request, then exit
    Run(RunArgs),
}

/// Runs the HTTP server until ctrl-c.
pub async fn serve(args: ServeArgs) -> anyhow::Result<()> {
    let provider = args
        .common
        .provider()
        .context("failed to build GitHub client")?;

    let store: Arc<dyn ReleaseStore> = match args.releases_path() {
        Some(path) => Arc::new(
            FileReleaseStore::open(&path)
                .with_context(|| format!("failed to open release store {}", path.display()))?,
        ),
        None => {
            warn!("No data directory configured, releases are kept in memory");
            Arc::new(MemoryReleaseStore::new())
        }
    };

    let engine = Engine::new(
        provider,
        args.common.channels(),
        Arc::clone(&store),
        args.common.engine_config(FeathersSource::Repository),
    );

    let shutdown = CancellationToken::new();
    let dispatcher = Arc::new(Dispatcher::new_with_shutdown(
        Arc::new(engine),
        shutdown.clone(),
    ));
    let app = build_router(AppState::new(
        Arc::clone(&dispatcher),
        store,
        args.github_webhook_secret.into_bytes(),
    ));

    let listener = TcpListener::bind(args.listen)
        .await
        .with_context(|| format!("failed to bind {}", args.listen))?;
    info!(addr = %args.listen, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(dispatcher))
        .await
        .context("server error")?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal(dispatcher: Arc<Dispatcher>) {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(error = %err, "Failed to listen for ctrl-c");
    }
    info!("Shutdown requested");
    dispatcher.shutdown_all().await;
}

/// Handles one pull request and returns what happened.
pub async fn run(args: RunArgs) -> anyhow::Result<Outcome> {
    check_run_args(&args)?;

    if let Some(path) = &args.feathers_path {
        Feathers::from_path(path)
            .with_context(|| format!("invalid team directory {}", path.display()))?;
    }

    let provider = args
        .common
        .provider()
        .context("failed to build GitHub client")?
        .with_backoff(Backoff::CLI);
    let engine = Engine::new(
        provider,
        args.common.channels(),
        Arc::new(MemoryReleaseStore::new()),
        args.common.engine_config(args.feathers_source()),
    );

    let repo = RepoId::new(args.repo_owner.clone(), args.repo_name.clone());
    let pr = match (args.pull_number, &args.commit) {
        (Some(number), _) => PrNumber(number),
        (None, Some(commit)) => engine
            .merged_pr_for_commit(&repo, &Sha::from(commit.as_str()))
            .await?
            .ok_or_else(|| anyhow!("no merged pull request contains {commit}"))?,
        (None, None) => bail!("--pull-number or --commit is required"),
    };

    let action = match args.stage {
        Stage::Validate => PrAction::Opened,
        Stage::Release => PrAction::Closed,
    };
    let event = engine.event_for_pr(&repo, pr, action).await?;
    if args.stage == Stage::Release && !event.merged {
        bail!("pull request {pr} in {repo} is not merged");
    }

    info!(repo = %repo, pr = %pr, stage = ?args.stage, "Running");
    let outcome = engine.process(&event).await?;
    Ok(outcome)
}

fn check_run_args(args: &RunArgs) -> anyhow::Result<()> {
    if args.commit.is_some() && args.stage != Stage::Release {
        bail!("--commit only applies to release");
    }
    Ok(())
}

/// One-line summary printed after `run`.
pub fn describe(outcome: &Outcome) -> String {
    match outcome {
        Outcome::Validated { notes, comment } => {
            format!("validated {notes} release note(s), breakdown comment {comment}")
        }
        Outcome::Skipped(reason) => format!("skipped: {reason:?}"),
        Outcome::Released {
            notes,
            environment,
            release_id,
        } => match (environment, release_id) {
            (Some(env), Some(id)) => format!("released {notes} note(s) to {env} as release {id}"),
            _ => format!("released {notes} note(s), no environment recorded"),
        },
        Outcome::Cleaned => "cleaned".to_string(),
        Outcome::Failed { context, reason } => format!("{context} failed: {reason}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_LISTEN;
    use crate::engine::SkipReason;
    use crate::types::CommentId;

    fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
        Cli::try_parse_from(std::iter::once("peacock").chain(args.iter().copied()))
    }

    #[test]
    fn serve_takes_flags() {
        let cli = parse(&[
            "serve",
            "--github-token",
            "ghp_x",
            "--github-webhook-secret",
            "s3cret",
            "--listen",
            "127.0.0.1:8080",
            "--data-dir",
            "/var/lib/peacock",
            "--slack-token",
            "xoxb",
        ])
        .unwrap();

        let Command::Serve(args) = cli.command else {
            panic!("expected serve");
        };
        assert_eq!(args.listen.to_string(), "127.0.0.1:8080");
        assert_eq!(
            args.releases_path().unwrap(),
            std::path::Path::new("/var/lib/peacock/releases.json")
        );
        assert_eq!(args.common.slack_token.as_deref(), Some("xoxb"));
        assert_eq!(args.github_webhook_secret, "s3cret");
    }

    #[test]
    fn default_listen_address_parses() {
        assert!(DEFAULT_LISTEN.parse::<std::net::SocketAddr>().is_ok());
    }

    #[test]
    fn run_release_by_commit() {
        let cli = parse(&[
            "run",
            "release",
            "--github-token",
            "ghp_x",
            "--repo-owner",
            "acme",
            "--repo-name",
            "widgets",
            "--commit",
            "abc123",
            "--feathers-path",
            "feathers.yaml",
        ])
        .unwrap();

        let Command::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.stage, Stage::Release);
        assert_eq!(args.commit.as_deref(), Some("abc123"));
        assert_eq!(
            args.feathers_source(),
            FeathersSource::LocalFile("feathers.yaml".into())
        );
        assert!(check_run_args(&args).is_ok());
    }

    #[test]
    fn run_rejects_unknown_stage() {
        let result = parse(&[
            "run",
            "deploy",
            "--github-token",
            "ghp_x",
            "--repo-owner",
            "acme",
            "--repo-name",
            "widgets",
            "--pull-number",
            "3",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn commit_is_release_only() {
        let cli = parse(&[
            "run",
            "validate",
            "--github-token",
            "ghp_x",
            "--repo-owner",
            "acme",
            "--repo-name",
            "widgets",
            "--commit",
            "abc123",
        ])
        .unwrap();

        let Command::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert!(check_run_args(&args).is_err());
    }

    #[test]
    fn template_path_has_default() {
        let cli = parse(&[
            "run",
            "validate",
            "--github-token",
            "ghp_x",
            "--repo-owner",
            "acme",
            "--repo-name",
            "widgets",
            "--pull-number",
            "3",
            "--bot-login",
            "peacock-bot",
        ])
        .unwrap();

        let Command::Run(args) = cli.command else {
            panic!("expected run");
        };
        let config = args.common.engine_config(args.feathers_source());
        assert_eq!(config.bot_login.as_deref(), Some("peacock-bot"));
        assert_eq!(args.pull_number, Some(3));
        assert!(!config.template_path.is_empty());
    }

    #[test]
    fn outcomes_are_described() {
        assert_eq!(
            describe(&Outcome::Validated {
                notes: 2,
                comment: CommentId(9)
            }),
            format!("validated 2 release note(s), breakdown comment {}", CommentId(9))
        );
        assert_eq!(
            describe(&Outcome::Skipped(SkipReason::NoNotes)),
            "skipped: NoNotes"
        );
    }
}
