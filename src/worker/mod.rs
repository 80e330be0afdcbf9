//! Per-repo workers that drive the engine.
//!
//! Each repository gets a dedicated worker that processes events serially,
//! ensuring a PR's `closed` event is handled after any earlier validation
//! while different repositories proceed concurrently.
//!
//! - [`dispatch`]: routing, lazy worker creation, shutdown
//! - [`message`]: what workers receive
//! - [`worker`]: the event loop

pub mod dispatch;
mod message;
mod worker;

pub use dispatch::{DispatchError, Dispatcher, WORKER_CHANNEL_BUFFER};
pub use message::WorkerMessage;
pub use worker::RepoWorker;
