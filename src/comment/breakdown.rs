//! The validation breakdown comment and failure comments.

use std::fmt::Write as _;

use crate::notes::ReleaseNote;

/// GitHub rejects commit status descriptions longer than this.
pub const STATUS_DESCRIPTION_LIMIT: usize = 140;

/// Renders the preview of who receives which note.
///
/// ```text
/// Successfully validated 2 release notes.
/// Notifying 3 teams.
///
/// ---
/// Release Note 1 will be sent to: infra, product
///
/// <details>
/// <summary>Release Note Breakdown</summary>
///
/// ...
///
/// </details>
/// ```
pub fn render_breakdown(notes: &[ReleaseNote], team_count: usize) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Successfully validated {} release {}.",
        notes.len(),
        plural(notes.len(), "note", "notes")
    );
    let _ = writeln!(
        out,
        "Notifying {} {}.",
        team_count,
        plural(team_count, "team", "teams")
    );

    for (i, note) in notes.iter().enumerate() {
        let teams: Vec<&str> = note.teams.iter().map(|t| t.name.as_str()).collect();
        let _ = write!(
            out,
            "\n---\nRelease Note {} will be sent to: {}\n\n<details>\n<summary>Release Note Breakdown</summary>\n\n{}\n\n</details>\n",
            i + 1,
            teams.join(", "),
            note.content
        );
    }

    out
}

fn plural<'a>(n: usize, one: &'a str, many: &'a str) -> &'a str {
    if n == 1 { one } else { many }
}

/// Comment body posted when validation or release fails.
pub fn failure_comment(title: &str, reason: &str) -> String {
    format!("[Peacock] {title} Failed: {reason}")
}

/// Truncates a reason to fit a commit status description.
pub fn status_description(reason: &str) -> String {
    if reason.chars().count() <= STATUS_DESCRIPTION_LIMIT {
        return reason.to_string();
    }
    let mut out: String = reason.chars().take(STATUS_DESCRIPTION_LIMIT - 3).collect();
    out.push_str("...");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feathers::{ContactType, Team};

    fn note(teams: &[&str], content: &str) -> ReleaseNote {
        ReleaseNote {
            teams: teams
                .iter()
                .map(|name| Team {
                    name: name.to_string(),
                    api_key: format!("key-{name}"),
                    contact_type: ContactType::None,
                    addresses: vec![],
                })
                .collect(),
            content: content.into(),
        }
    }

    #[test]
    fn single_note_uses_singular() {
        let out = render_breakdown(&[note(&["infra"], "Hello")], 1);
        assert!(out.starts_with("Successfully validated 1 release note.\nNotifying 1 team.\n"));
    }

    #[test]
    fn breakdown_lists_each_note() {
        let notes = [note(&["infra", "product"], "Hello all"), note(&["infra"], "Only infra")];
        let out = render_breakdown(&notes, 2);
        let expected = "Successfully validated 2 release notes.\n\
            Notifying 2 teams.\n\
            \n---\n\
            Release Note 1 will be sent to: infra, product\n\
            \n<details>\n<summary>Release Note Breakdown</summary>\n\nHello all\n\n</details>\n\
            \n---\n\
            Release Note 2 will be sent to: infra\n\
            \n<details>\n<summary>Release Note Breakdown</summary>\n\nOnly infra\n\n</details>\n";
        assert_eq!(out, expected);
    }

    #[test]
    fn failure_comment_has_prefix() {
        assert_eq!(
            failure_comment("Validation", "team ghost does not exist"),
            "[Peacock] Validation Failed: team ghost does not exist"
        );
    }

    #[test]
    fn short_descriptions_are_untouched() {
        assert_eq!(status_description("fine"), "fine");
    }

    #[test]
    fn long_descriptions_are_truncated() {
        let long = "x".repeat(500);
        let out = status_description(&long);
        assert_eq!(out.chars().count(), STATUS_DESCRIPTION_LIMIT);
        assert!(out.ends_with("..."));
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        let long = "é".repeat(200);
        assert_eq!(status_description(&long).chars().count(), STATUS_DESCRIPTION_LIMIT);
    }
}
