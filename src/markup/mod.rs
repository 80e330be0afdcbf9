//! Markdown rewrites for outbound channels.
//!
//! Release notes are authored in GitHub-flavoured markdown. Slack understands
//! its own "mrkdwn" dialect, and notification webhooks receive HTML. Both
//! rewrites are pure functions over a constrained markdown subset:
//! headings, bullets, emphasis, strong and links.

pub mod html;
pub mod slack;

pub use html::to_html;
pub use slack::to_slack;
