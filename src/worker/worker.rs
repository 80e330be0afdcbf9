//! The per-repo worker loop.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument};

use crate::engine::{EngineError, EventHandler, Outcome};
use crate::types::{DeliveryId, RepoId};
use crate::webhooks::PullRequestEvent;

use super::message::WorkerMessage;

/// Processes one repository's events serially.
pub struct RepoWorker {
    repo: RepoId,
    handler: Arc<dyn EventHandler>,
}

impl RepoWorker {
    pub fn new(repo: RepoId, handler: Arc<dyn EventHandler>) -> Self {
        RepoWorker { repo, handler }
    }

    /// Runs until the channel closes, a `Shutdown` message arrives, or
    /// `shutdown` is cancelled. An event already being handled is finished
    /// first.
    pub async fn run(self, mut rx: mpsc::Receiver<WorkerMessage>, shutdown: CancellationToken) {
        info!(repo = %self.repo, "Worker event loop started");

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!(repo = %self.repo, "Shutdown signal received, stopping worker");
                    break;
                }

                msg = rx.recv() => match msg {
                    Some(WorkerMessage::Event { event, delivery, reply }) => {
                        let result = self.process(event, delivery).await;
                        if reply.send(result).is_err() {
                            debug!(repo = %self.repo, "Requester went away before the reply");
                        }
                    }
                    Some(WorkerMessage::Shutdown) => {
                        info!(repo = %self.repo, "Shutdown message received");
                        break;
                    }
                    None => {
                        debug!(repo = %self.repo, "Channel closed, stopping worker");
                        break;
                    }
                }
            }
        }
    }

    #[instrument(
        skip_all,
        fields(
            repo = %self.repo,
            pr = %event.pr_number,
            action = event.action.as_str(),
            delivery = delivery.as_ref().map(|d| d.as_str())
        )
    )]
    async fn process(
        &self,
        event: PullRequestEvent,
        delivery: Option<DeliveryId>,
    ) -> Result<Outcome, EngineError> {
        let result = self.handler.handle(event).await;
        match &result {
            Ok(outcome) => info!(?outcome, "Event handled"),
            Err(e) => error!(error = %e, "Event could not be handled or reported"),
        }
        result
    }
}
