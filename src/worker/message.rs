//! Messages sent to a per-repo worker.

use tokio::sync::oneshot;

use crate::engine::{EngineError, Outcome};
use crate::types::DeliveryId;
use crate::webhooks::PullRequestEvent;

/// Messages a per-repo worker receives over its `mpsc` channel.
///
/// Workers handle these one at a time, which is what orders events within a
/// repository.
#[derive(Debug)]
pub enum WorkerMessage {
    /// An event to hand to the engine. The result goes back on `reply`.
    Event {
        event: PullRequestEvent,
        /// GitHub's delivery id, when the event came from a webhook.
        delivery: Option<DeliveryId>,
        reply: oneshot::Sender<Result<Outcome, EngineError>>,
    },

    /// Finish the current event and exit.
    Shutdown,
}
