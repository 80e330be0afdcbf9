//! Event dispatch layer for routing pull request events to per-repo workers.
//!
//! The dispatcher routes events to the appropriate per-repo worker, creating
//! workers on demand when the first event for a repository arrives.
//! Different repositories are processed concurrently, but events within a
//! single repository are strictly serialized.
//!
//! ```text
//!                                     ┌──► repo A channel (64) ──► worker A ──┐
//! ┌─────────────┐     ┌──────────┐    │                                       │
//! │   axum      │ ──► │ dispatch │ ───┤                                       ├──► engine
//! │  handler    │     │ by repo  │    │                                       │
//! └─────────────┘     └──────────┘    └──► repo B channel (64) ──► worker B ──┘
//!       ▲                                                                     │
//!       └──────────────────────── oneshot reply ──────────────────────────────┘
//! ```
//!
//! The HTTP handler awaits the reply, so GitHub sees the outcome of its own
//! delivery in the response status.

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{RwLock, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, trace};

use crate::engine::{EngineError, EventHandler, Outcome};
use crate::types::{DeliveryId, RepoId};
use crate::webhooks::PullRequestEvent;

use super::message::WorkerMessage;
use super::worker::RepoWorker;

/// Channel buffer size for worker messages.
pub const WORKER_CHANNEL_BUFFER: usize = 64;

#[derive(Debug, Error)]
pub enum DispatchError {
    /// The pool is shutting down and accepts no more work.
    #[error("worker pool is shut down")]
    ShutDown,

    /// The worker exited without answering.
    #[error("worker for {0} stopped before replying")]
    WorkerGone(RepoId),

    /// The engine could neither handle nor report the event.
    #[error(transparent)]
    Engine(#[from] EngineError),
}

pub type Result<T> = std::result::Result<T, DispatchError>;

struct WorkerHandle {
    tx: mpsc::Sender<WorkerMessage>,

    #[allow(dead_code)]
    task: JoinHandle<()>,

    cancel: CancellationToken,
}

/// Routes events to per-repo workers.
///
/// Safe to share across HTTP handler tasks.
pub struct Dispatcher {
    handler: Arc<dyn EventHandler>,

    /// Active workers, keyed by repository ID.
    workers: RwLock<HashMap<RepoId, WorkerHandle>>,

    /// Global shutdown token. Each worker holds a child of it.
    shutdown: CancellationToken,
}

impl Dispatcher {
    pub fn new(handler: Arc<dyn EventHandler>) -> Self {
        Self::new_with_shutdown(handler, CancellationToken::new())
    }

    /// Creates a dispatcher that stops when `shutdown` is cancelled.
    pub fn new_with_shutdown(handler: Arc<dyn EventHandler>, shutdown: CancellationToken) -> Self {
        info!("Creating dispatcher");
        Dispatcher {
            handler,
            workers: RwLock::new(HashMap::new()),
            shutdown,
        }
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Hands an event to its repository's worker and waits for the outcome.
    #[instrument(skip(self, event), fields(repo = %event.repo, pr = %event.pr_number))]
    pub async fn dispatch(
        &self,
        event: PullRequestEvent,
        delivery: Option<DeliveryId>,
    ) -> Result<Outcome> {
        if self.shutdown.is_cancelled() {
            return Err(DispatchError::ShutDown);
        }

        let repo = event.repo.clone();
        let tx = self.get_or_spawn_worker(&repo).await;

        let (reply, answer) = oneshot::channel();
        tx.send(WorkerMessage::Event {
            event,
            delivery,
            reply,
        })
        .await
        .map_err(|_| DispatchError::ShutDown)?;

        let outcome = answer
            .await
            .map_err(|_| DispatchError::WorkerGone(repo))??;
        Ok(outcome)
    }

    /// Gets an existing worker's sender or spawns a new worker task.
    async fn get_or_spawn_worker(&self, repo: &RepoId) -> mpsc::Sender<WorkerMessage> {
        {
            let workers = self.workers.read().await;
            if let Some(handle) = workers.get(repo) {
                return handle.tx.clone();
            }
        }

        let mut workers = self.workers.write().await;

        // Double-check after acquiring write lock
        if let Some(handle) = workers.get(repo) {
            return handle.tx.clone();
        }

        debug!(repo = %repo, "Spawning new worker task");
        let worker = RepoWorker::new(repo.clone(), Arc::clone(&self.handler));

        // The handle keeps the same token the task watches so that
        // remove_worker() stops the right task.
        let (tx, rx) = mpsc::channel(WORKER_CHANNEL_BUFFER);
        let cancel = self.shutdown.child_token();
        let task = tokio::spawn(worker.run(rx, cancel.clone()));

        workers.insert(
            repo.clone(),
            WorkerHandle {
                tx: tx.clone(),
                task,
                cancel,
            },
        );
        tx
    }

    pub async fn worker_count(&self) -> usize {
        self.workers.read().await.len()
    }

    pub async fn has_worker(&self, repo: &RepoId) -> bool {
        self.workers.read().await.contains_key(repo)
    }

    /// Stops and forgets the worker for `repo`.
    pub async fn remove_worker(&self, repo: &RepoId) -> bool {
        let mut workers = self.workers.write().await;

        if let Some(handle) = workers.remove(repo) {
            handle.cancel.cancel();
            let _ = handle.tx.send(WorkerMessage::Shutdown).await;
            true
        } else {
            false
        }
    }

    /// Cancels the shutdown token and tells every worker to stop.
    pub async fn shutdown_all(&self) {
        info!("Shutting down all workers");
        self.shutdown.cancel();

        let workers = self.workers.read().await;
        for (repo, handle) in workers.iter() {
            trace!(repo = %repo, "Sending shutdown to worker");
            if handle.tx.try_send(WorkerMessage::Shutdown).is_err() {
                error!(repo = %repo, "Worker channel full or closed during shutdown");
            }
        }
    }

    /// Waits for the shutdown signal.
    pub async fn run(&self) {
        info!("Dispatcher background loop started");
        self.shutdown.cancelled().await;
        info!("Dispatcher shutdown signal received, stopping");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::pr_event;
    use crate::webhooks::PrAction;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Records events; optionally fails them; tracks peak concurrency.
    #[derive(Default)]
    struct FakeHandler {
        seen: Mutex<Vec<(RepoId, u64)>>,
        active: AtomicUsize,
        peak: AtomicUsize,
        delay: Option<Duration>,
        fail: bool,
    }

    #[async_trait]
    impl EventHandler for FakeHandler {
        async fn handle(&self, event: PullRequestEvent) -> std::result::Result<Outcome, EngineError> {
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.seen
                .lock()
                .unwrap()
                .push((event.repo.clone(), event.pr_number.0));
            self.active.fetch_sub(1, Ordering::SeqCst);

            if self.fail {
                return Err(EngineError::Internal("boom".into()));
            }
            Ok(Outcome::Cleaned)
        }
    }

    fn event_for(owner: &str, repo: &str) -> PullRequestEvent {
        let mut event = pr_event(PrAction::Closed, "sha", "");
        event.repo = RepoId::new(owner, repo);
        event
    }

    // ─── Routing ───

    #[tokio::test]
    async fn first_event_spawns_worker_and_returns_outcome() {
        let handler = Arc::new(FakeHandler::default());
        let dispatcher = Dispatcher::new(handler.clone());
        let repo = RepoId::new("owner", "repo");

        assert_eq!(dispatcher.worker_count().await, 0);
        assert!(!dispatcher.has_worker(&repo).await);

        let outcome = dispatcher
            .dispatch(event_for("owner", "repo"), Some(DeliveryId::new("d-1")))
            .await
            .unwrap();

        assert_eq!(outcome, Outcome::Cleaned);
        assert!(dispatcher.has_worker(&repo).await);
        assert_eq!(handler.seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn workers_are_per_repo() {
        let dispatcher = Dispatcher::new(Arc::new(FakeHandler::default()));

        dispatcher.dispatch(event_for("owner", "a"), None).await.unwrap();
        dispatcher.dispatch(event_for("owner", "a"), None).await.unwrap();
        assert_eq!(dispatcher.worker_count().await, 1);

        dispatcher.dispatch(event_for("owner", "b"), None).await.unwrap();
        assert_eq!(dispatcher.worker_count().await, 2);
    }

    #[tokio::test]
    async fn same_repo_events_never_overlap() {
        let handler = Arc::new(FakeHandler {
            delay: Some(Duration::from_millis(5)),
            ..Default::default()
        });
        let dispatcher = Arc::new(Dispatcher::new(handler.clone()));

        let tasks: Vec<_> = (0..5)
            .map(|_| {
                let dispatcher = Arc::clone(&dispatcher);
                tokio::spawn(async move { dispatcher.dispatch(event_for("owner", "repo"), None).await })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        assert_eq!(handler.peak.load(Ordering::SeqCst), 1);
        assert_eq!(handler.seen.lock().unwrap().len(), 5);
        assert_eq!(dispatcher.worker_count().await, 1);
    }

    #[tokio::test]
    async fn engine_error_is_returned() {
        let handler = Arc::new(FakeHandler {
            fail: true,
            ..Default::default()
        });
        let dispatcher = Dispatcher::new(handler);

        let err = dispatcher
            .dispatch(event_for("owner", "repo"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::Engine(EngineError::Internal(_))));
    }

    // ─── Lifecycle ───

    #[tokio::test]
    async fn dispatch_after_shutdown_is_refused() {
        let shutdown = CancellationToken::new();
        let dispatcher =
            Dispatcher::new_with_shutdown(Arc::new(FakeHandler::default()), shutdown.clone());
        dispatcher.dispatch(event_for("owner", "repo"), None).await.unwrap();

        dispatcher.shutdown_all().await;
        assert!(shutdown.is_cancelled());

        let err = dispatcher
            .dispatch(event_for("owner", "other"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::ShutDown));
    }

    #[tokio::test]
    async fn removed_worker_is_respawned_on_next_event() {
        let dispatcher = Dispatcher::new(Arc::new(FakeHandler::default()));
        let repo = RepoId::new("owner", "repo");
        dispatcher.dispatch(event_for("owner", "repo"), None).await.unwrap();

        assert!(dispatcher.remove_worker(&repo).await);
        assert!(!dispatcher.has_worker(&repo).await);
        assert!(!dispatcher.remove_worker(&repo).await);

        dispatcher.dispatch(event_for("owner", "repo"), None).await.unwrap();
        assert!(dispatcher.has_worker(&repo).await);
    }

    #[tokio::test]
    async fn run_exits_on_shutdown() {
        let shutdown = CancellationToken::new();
        let dispatcher = Arc::new(Dispatcher::new_with_shutdown(
            Arc::new(FakeHandler::default()),
            shutdown.clone(),
        ));

        let handle = {
            let dispatcher = Arc::clone(&dispatcher);
            tokio::spawn(async move { dispatcher.run().await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!handle.is_finished());

        shutdown.cancel();
        let result = tokio::time::timeout(Duration::from_secs(1), handle).await;
        assert!(result.is_ok(), "run() should exit after shutdown signal");
    }
}
