//! Peacock - a GitHub bot that checks release notes written in pull request
//! descriptions and sends them to the owning teams once the pull request merges.
//!
//! The library holds the note parser, team directory, notification channels
//! and the engine that ties them to GitHub. The binary wraps it in a webhook
//! server and a one-shot command-line mode.

pub mod channels;
pub mod cli;
pub mod comment;
pub mod config;
pub mod effects;
pub mod engine;
pub mod feathers;
pub mod github;
pub mod markup;
pub mod notes;
pub mod server;
pub mod store;
pub mod types;
pub mod webhooks;
pub mod worker;

#[cfg(test)]
pub(crate) mod test_utils;
