//! Hidden `(hash, kind)` tags in PR comments.
//!
//! A tagged comment ends with
//!
//! ```text
//! <!-- hash: 3f2a... type: breakdown -->
//! ```
//!
//! on its own line. The hash identifies the release notes the comment was
//! rendered from, which lets a re-delivered event recognise its own earlier
//! output.

use std::sync::LazyLock;

use regex::Regex;
use sha2::{Digest, Sha256};

use crate::notes::ReleaseNote;

/// Kind for the validation breakdown comment.
pub const BREAKDOWN: &str = "breakdown";

static TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^<!-- hash: (\S*) type: (\S*) -->$").expect("tag pattern is valid")
});

/// The tag carried by a comment. Both fields are empty for untagged comments.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommentTag {
    pub hash: String,
    pub kind: String,
}

impl CommentTag {
    pub fn is_empty(&self) -> bool {
        self.hash.is_empty() && self.kind.is_empty()
    }
}

/// Appends the hidden tag to a comment body.
pub fn tag(body: &str, hash: &str, kind: &str) -> String {
    format!("{body}\n<!-- hash: {hash} type: {kind} -->\n")
}

/// Reads the tag back out of a comment body.
///
/// When a body carries several tags, the last one wins.
pub fn extract(body: &str) -> CommentTag {
    TAG.captures_iter(body)
        .last()
        .map(|caps| CommentTag {
            hash: caps[1].to_string(),
            kind: caps[2].to_string(),
        })
        .unwrap_or_default()
}

/// Lowercase hex SHA-256 of the JSON encoding of the notes.
pub fn hash_notes(notes: &[ReleaseNote]) -> Result<String, serde_json::Error> {
    let json = serde_json::to_vec(notes)?;
    Ok(hex::encode(Sha256::digest(&json)))
}
