//! GitHub API client and effect interpreter.
//!
//! This module provides the implementation for executing GitHub effects via the octocrab
//! library. It implements the `GitHubInterpreter` trait defined in the effects module.
//!
//! Key features:
//! - Exponential backoff retry for transient failures
//! - Distinguishes transient vs permanent errors
//! - One shared octocrab instance, one scoped client per repository

mod client;
mod error;
mod interpreter;
mod retry;

pub use client::{OctocrabClient, OctocrabProvider, build_octocrab};
pub use error::{GitHubApiError, GitHubErrorKind};
pub use interpreter::interpret_github_effect;
pub use retry::{Backoff, with_backoff};
