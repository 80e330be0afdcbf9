//! Markdown to Slack mrkdwn.

use std::sync::LazyLock;

use regex::{Captures, Regex};

static BULLET: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^([ \t]*)\*[ \t]+").expect("bullet pattern is valid"));

// Up to depth 4, at most 15 leading spaces, optional leading tab.
static HEADING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^\t?[ ]{0,15}#{1,4}[ \t]+(.+?)(?:[ \t]+#+)?[ \t]*$")
        .expect("heading pattern is valid")
});

static STRONG_STARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*(.+?)\*\*").expect("strong pattern is valid"));

static STRONG_UNDERSCORES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"__(.+?)__").expect("strong pattern is valid"));

static LINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[([^\]]+)\]\(([^)\s]+)\)").expect("link pattern is valid"));

/// Rewrites markdown into Slack's mrkdwn flavour.
///
/// | Markdown            | mrkdwn        |
/// |---------------------|---------------|
/// | `* item`            | `• item`      |
/// | `## Heading`        | `*Heading*`   |
/// | `**bold**`, `__b__` | `*bold*`      |
/// | `[label](url)`      | `<url\|label>` |
pub fn to_slack(markdown: &str) -> String {
    let text = markdown.replace("\r\n", "\n");
    let text = BULLET.replace_all(&text, "${1}• ");
    let text = HEADING.replace_all(&text, |caps: &Captures| {
        format!("*{}*", plain_heading(&caps[1]))
    });
    let text = STRONG_STARS.replace_all(&text, "*${1}*");
    let text = STRONG_UNDERSCORES.replace_all(&text, "*${1}*");
    let text = LINK.replace_all(&text, "<${2}|${1}>");
    text.into_owned()
}

/// A heading is already bold, so strong runs inside it lose their markers.
fn plain_heading(text: &str) -> String {
    let text = STRONG_STARS.replace_all(text, "${1}");
    let text = STRONG_UNDERSCORES.replace_all(&text, "${1}");
    text.replace('*', "")
}
