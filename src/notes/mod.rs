//! Release notes extracted from pull request descriptions.

pub mod parser;

pub use parser::{ParsedNote, parse_notes};

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::feathers::{Feathers, FeathersError, Team};

/// One `(teams, content)` pair, with team names resolved against the
/// directory.
///
/// The JSON encoding of a list of these is what the breakdown comment hash
/// is computed over.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseNote {
    pub teams: Vec<Team>,
    pub content: String,
}

#[derive(Debug, Error)]
pub enum NoteError {
    #[error("release note {0} has no teams to notify")]
    NoTeams(usize),

    #[error(transparent)]
    Feathers(#[from] FeathersError),
}

/// Resolves parsed notes strictly: every named team must exist and every
/// note must name at least one team.
pub fn resolve_notes(
    parsed: &[ParsedNote],
    feathers: &Feathers,
) -> Result<Vec<ReleaseNote>, NoteError> {
    parsed
        .iter()
        .enumerate()
        .map(|(i, note)| {
            if note.teams.is_empty() {
                return Err(NoteError::NoTeams(i + 1));
            }
            feathers.contains(&note.teams)?;
            Ok(ReleaseNote {
                teams: feathers.teams_by_names(&note.teams),
                content: note.content.clone(),
            })
        })
        .collect()
}

/// Resolves notes leniently, skipping unknown names.
///
/// Used for the PR template, whose placeholder team names need not exist.
pub fn resolve_template(parsed: &[ParsedNote], feathers: &Feathers) -> Vec<ReleaseNote> {
    parsed
        .iter()
        .map(|note| ReleaseNote {
            teams: feathers.teams_by_names(&note.teams),
            content: note.content.clone(),
        })
        .collect()
}

/// Reports whether the notes are just the PR template left unedited.
///
/// Each note must be paired with a distinct template note having the same
/// content and the same teams.
pub fn matches_template(notes: &[ReleaseNote], template: &[ReleaseNote]) -> bool {
    if notes.len() != template.len() {
        return false;
    }

    let mut used = vec![false; template.len()];
    notes.iter().all(|note| {
        let candidate = template.iter().enumerate().find(|(i, t)| {
            !used[*i] && t.content == note.content && same_teams(&note.teams, &t.teams)
        });
        match candidate {
            Some((i, _)) => {
                used[i] = true;
                true
            }
            None => false,
        }
    })
}

fn same_teams(a: &[Team], b: &[Team]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.same_as(y))
}

/// Number of distinct teams addressed across all notes.
pub fn distinct_team_count(notes: &[ReleaseNote]) -> usize {
    notes
        .iter()
        .flat_map(|n| n.teams.iter().map(|t| t.name.as_str()))
        .collect::<HashSet<_>>()
        .len()
}
