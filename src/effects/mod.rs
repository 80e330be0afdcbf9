//! Effects-as-data for GitHub operations.
//!
//! This module defines effect types that describe operations without executing them.
//! This enables:
//! - Engine logic that is tested against a scripted interpreter
//! - Logging/tracing of intended operations
//! - A single place where GitHub errors are classified and retried

pub mod github;
pub mod interpreter;

pub use github::{
    CommentData, CommitPrData, GitHubEffect, GitHubResponse, PrData, StatusState,
};
pub use interpreter::{GitHubInterpreter, GitHubProvider};
