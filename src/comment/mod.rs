//! PR comments written by the bot.
//!
//! Breakdown comments carry a hidden hash of the notes they describe. On each
//! validation the bot compares that hash with the freshly computed one and
//! only re-posts when the notes changed.

pub mod breakdown;
pub mod tag;

pub use breakdown::{
    STATUS_DESCRIPTION_LIMIT, failure_comment, render_breakdown, status_description,
};
pub use tag::{BREAKDOWN, CommentTag, extract, hash_notes, tag};
