//! The release-note grammar.
//!
//! A note starts at a `### Notify T1, T2` line and runs until the next one or
//! the end of the input. Anything before the first notify line is preamble
//! and is dropped.

use std::sync::LazyLock;

use regex::Regex;

static NOTIFY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"### Notify(.*)\n").expect("notify pattern is valid"));

// Link-reference comments that editors and bots insert, e.g. `[//]: # (ticket)`.
static ANNOTATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n?\[//\]: # \(.*\)").expect("annotation pattern is valid"));

/// A note as written, before team names are resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedNote {
    pub teams: Vec<String>,
    pub content: String,
}

/// Extracts every note from a markdown body, in order.
pub fn parse_notes(markdown: &str) -> Vec<ParsedNote> {
    let text = markdown.replace("\r\n", "\n");
    let headers: Vec<_> = NOTIFY.captures_iter(&text).collect();

    headers
        .iter()
        .enumerate()
        .map(|(i, caps)| {
            let whole = caps.get(0).map_or(0..0, |m| m.range());
            let end = headers
                .get(i + 1)
                .and_then(|next| next.get(0))
                .map_or(text.len(), |m| m.start());

            let teams = caps
                .get(1)
                .map(|m| split_teams(m.as_str()))
                .unwrap_or_default();

            ParsedNote {
                teams,
                content: clean_content(&text[whole.end..end]),
            }
        })
        .collect()
}

fn split_teams(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}

fn clean_content(raw: &str) -> String {
    ANNOTATION
        .replace_all(raw, "")
        .trim_end()
        .trim_start()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn names(note: &ParsedNote) -> Vec<&str> {
        note.teams.iter().map(String::as_str).collect()
    }

    #[test]
    fn parses_two_notes() {
        let notes = parse_notes("### Notify infra\nHello infra\n### Notify product\nHello product");
        assert_eq!(notes.len(), 2);
        assert_eq!(names(&notes[0]), vec!["infra"]);
        assert_eq!(notes[0].content, "Hello infra");
        assert_eq!(names(&notes[1]), vec!["product"]);
        assert_eq!(notes[1].content, "Hello product");
    }

    #[test]
    fn splits_and_trims_team_names() {
        let notes = parse_notes("### Notify  infra ,product,, ops \nbody");
        assert_eq!(names(&notes[0]), vec!["infra", "product", "ops"]);
    }

    #[test]
    fn blank_capture_yields_no_teams() {
        let notes = parse_notes("### Notify   \nbody");
        assert_eq!(notes.len(), 1);
        assert!(notes[0].teams.is_empty());
        assert_eq!(notes[0].content, "body");
    }

    #[test]
    fn preamble_is_discarded() {
        let notes = parse_notes("Fixes the thing.\n\n### Notify infra\nDeployed.");
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].content, "Deployed.");
    }

    #[test]
    fn no_notify_line_means_no_notes() {
        assert!(parse_notes("## Summary\nnothing to see").is_empty());
        assert!(parse_notes("").is_empty());
    }

    #[test]
    fn header_without_newline_is_not_a_note() {
        assert!(parse_notes("### Notify infra").is_empty());
    }

    #[test]
    fn nested_headings_are_kept() {
        let notes = parse_notes("### Notify infra\n## What\n* moved\n### Why\nbecause");
        assert_eq!(notes[0].content, "## What\n* moved\n### Why\nbecause");
    }

    #[test]
    fn annotations_are_removed() {
        let body = "### Notify infra\nFirst line\n[//]: # (JIRA-123)\nSecond line\n[//]: # (end)";
        let notes = parse_notes(body);
        assert_eq!(notes[0].content, "First line\nSecond line");
    }

    #[test]
    fn content_is_trimmed() {
        let notes = parse_notes("### Notify infra\n\n\n   indented start\n\n  \n");
        assert_eq!(notes[0].content, "indented start");
    }

    #[test]
    fn crlf_bodies_parse_like_lf() {
        let lf = parse_notes("### Notify infra\nline one\nline two");
        let crlf = parse_notes("### Notify infra\r\nline one\r\nline two");
        assert_eq!(lf, crlf);
    }

    proptest! {
        #[test]
        fn text_without_notify_has_no_notes(body in "(?s).{0,200}") {
            prop_assume!(!body.replace("\r\n", "\n").contains("### Notify"));
            prop_assert!(parse_notes(&body).is_empty());
        }

        #[test]
        fn one_note_per_notify_line(
            sections in prop::collection::vec(("[a-z]{1,8}", "[A-Za-z ]{0,30}"), 1..6)
        ) {
            let body: String = sections
                .iter()
                .map(|(team, text)| format!("### Notify {team}\n{text}\n"))
                .collect();
            let notes = parse_notes(&body);
            prop_assert_eq!(notes.len(), sections.len());
            for (note, (team, text)) in notes.iter().zip(&sections) {
                prop_assert_eq!(&note.teams, &vec![team.clone()]);
                prop_assert_eq!(&note.content, text.trim());
            }
        }
    }
}
