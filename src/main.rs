use std::process::ExitCode;

use clap::Parser;
use tracing::error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use peacock::cli::{self, Cli, Command};

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "peacock=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let result = match Cli::parse().command {
        Command::Serve(args) => cli::serve(args).await.map(|()| ExitCode::SUCCESS),
        Command::Run(args) => cli::run(args).await.map(|outcome| {
            println!("{}", cli::describe(&outcome));
            if outcome.is_failure() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            }
        }),
    };

    result.unwrap_or_else(|err| {
        error!("{err:#}");
        ExitCode::FAILURE
    })
}
