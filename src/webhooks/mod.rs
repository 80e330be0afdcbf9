//! Webhook handling for GitHub events.
//!
//! This module provides:
//! - Signature verification for webhook payloads (HMAC-SHA256)
//! - Parsing of `pull_request` deliveries into [`PullRequestEvent`]

pub mod events;
pub mod parser;
pub mod signature;

pub use events::{PrAction, PullRequestEvent};
pub use parser::{ParseError, parse_webhook};
pub use signature::{
    GITHUB_SIGNATURE_HEADER, compute_signature, format_signature_header, parse_signature_header,
    verify_signature,
};
