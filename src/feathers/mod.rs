//! The feathers team directory.
//!
//! Each repository that opts in carries a `.peacock/feathers.yaml` listing the
//! teams a release may notify. The file is loaded for every event and never
//! mutated in memory. Loading validates the whole directory up-front so that
//! later queries can assume well-formed teams.

pub mod team;

pub use team::{ContactType, Team};

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;
use thiserror::Error;

/// Path of the directory file inside a repository.
pub const FEATHERS_PATH: &str = ".peacock/feathers.yaml";

/// Subject used when the directory does not configure one.
pub const DEFAULT_SUBJECT: &str = "New release notes";

static SLACK_CHANNEL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z0-9]{9,11}$").expect("slack channel pattern is valid"));

/// Errors from loading or querying the directory.
///
/// Every variant is user-actionable and ends up in a PR comment, so the
/// messages name the offending team.
#[derive(Debug, Error)]
pub enum FeathersError {
    #[error("feathers is not valid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("failed to read feathers from {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no teams are defined")]
    NoTeams,

    #[error("team {team} is missing {field}")]
    MissingField { team: String, field: &'static str },

    #[error("team {team} has unknown contact type {contact_type:?}")]
    UnknownContactType { team: String, contact_type: String },

    #[error("team {team} has contact type none but lists addresses")]
    UnexpectedAddresses { team: String },

    #[error("team {team} has no addresses for contact type {contact_type}")]
    MissingAddresses {
        team: String,
        contact_type: ContactType,
    },

    #[error("team {team} has invalid slack channel id {address:?}")]
    InvalidSlackChannel { team: String, address: String },

    #[error("team name {0} is defined more than once")]
    DuplicateName(String),

    #[error("team {0} reuses an api key from another team")]
    DuplicateApiKey(String),

    #[error("team {0} does not exist")]
    TeamNotFound(String),
}

#[derive(Debug, Default, Deserialize)]
struct RawFeathers {
    #[serde(default)]
    teams: Vec<RawTeam>,
    #[serde(default)]
    config: RawConfig,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawTeam {
    #[serde(default)]
    name: String,
    #[serde(default)]
    api_key: String,
    #[serde(default)]
    contact_type: String,
    #[serde(default)]
    addresses: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawConfig {
    #[serde(default)]
    messages: RawMessages,
}

#[derive(Debug, Default, Deserialize)]
struct RawMessages {
    #[serde(default)]
    subject: String,
}

/// Directory-wide settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeathersConfig {
    /// Subject line for outgoing notifications.
    pub subject: String,
}

impl Default for FeathersConfig {
    fn default() -> Self {
        FeathersConfig {
            subject: DEFAULT_SUBJECT.to_string(),
        }
    }
}

/// A validated team directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Feathers {
    teams: Vec<Team>,
    config: FeathersConfig,
}

impl Feathers {
    /// Parses and validates a directory from YAML.
    pub fn from_yaml(yaml: &str) -> Result<Self, FeathersError> {
        let raw: RawFeathers = if yaml.trim().is_empty() {
            RawFeathers::default()
        } else {
            serde_yaml::from_str(yaml)?
        };
        Self::validate(raw)
    }

    /// Reads a directory from the local filesystem.
    pub fn from_path(path: &Path) -> Result<Self, FeathersError> {
        let yaml = std::fs::read_to_string(path).map_err(|source| FeathersError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&yaml)
    }

    /// Builds a directory from already-typed teams, applying the same rules
    /// as [`Feathers::from_yaml`].
    pub fn new(teams: Vec<Team>, config: FeathersConfig) -> Result<Self, FeathersError> {
        let raw = RawFeathers {
            teams: teams
                .into_iter()
                .map(|t| RawTeam {
                    name: t.name,
                    api_key: t.api_key,
                    contact_type: t.contact_type.as_str().to_string(),
                    addresses: t.addresses,
                })
                .collect(),
            config: RawConfig {
                messages: RawMessages {
                    subject: config.subject,
                },
            },
        };
        Self::validate(raw)
    }

    fn validate(raw: RawFeathers) -> Result<Self, FeathersError> {
        if raw.teams.is_empty() {
            return Err(FeathersError::NoTeams);
        }

        let mut teams = Vec::with_capacity(raw.teams.len());
        for (index, raw_team) in raw.teams.into_iter().enumerate() {
            teams.push(validate_team(index, raw_team)?);
        }

        let mut names = HashSet::new();
        for team in &teams {
            if !names.insert(team.name.as_str()) {
                return Err(FeathersError::DuplicateName(team.name.clone()));
            }
        }

        let mut keys = HashSet::new();
        for team in &teams {
            if !keys.insert(team.api_key.as_str()) {
                return Err(FeathersError::DuplicateApiKey(team.name.clone()));
            }
        }

        let subject = raw.config.messages.subject.trim();
        let config = if subject.is_empty() {
            FeathersConfig::default()
        } else {
            FeathersConfig {
                subject: subject.to_string(),
            }
        };

        Ok(Feathers { teams, config })
    }

    pub fn teams(&self) -> &[Team] {
        &self.teams
    }

    pub fn config(&self) -> &FeathersConfig {
        &self.config
    }

    pub fn names(&self) -> Vec<&str> {
        self.teams.iter().map(|t| t.name.as_str()).collect()
    }

    pub fn team(&self, name: &str) -> Option<&Team> {
        self.teams.iter().find(|t| t.name == name)
    }

    /// Looks up teams by name, preserving the order of `names`.
    ///
    /// Unknown names are skipped.
    pub fn teams_by_names<S: AsRef<str>>(&self, names: &[S]) -> Vec<Team> {
        names
            .iter()
            .filter_map(|name| self.team(name.as_ref()).cloned())
            .collect()
    }

    /// Fails with [`FeathersError::TeamNotFound`] for the first unknown name.
    pub fn contains<S: AsRef<str>>(&self, names: &[S]) -> Result<(), FeathersError> {
        match names.iter().find(|name| self.team(name.as_ref()).is_none()) {
            Some(missing) => Err(FeathersError::TeamNotFound(missing.as_ref().to_string())),
            None => Ok(()),
        }
    }

    /// Groups the addresses of the named teams by contact type.
    pub fn address_pool<S: AsRef<str>>(&self, names: &[S]) -> AddressPool {
        AddressPool::from_teams(&self.teams_by_names(names))
    }
}

fn validate_team(index: usize, raw: RawTeam) -> Result<Team, FeathersError> {
    let label = if raw.name.trim().is_empty() {
        format!("#{}", index + 1)
    } else {
        raw.name.clone()
    };

    for (value, field) in [
        (&raw.name, "name"),
        (&raw.contact_type, "contactType"),
        (&raw.api_key, "apiKey"),
    ] {
        if value.trim().is_empty() {
            return Err(FeathersError::MissingField {
                team: label,
                field,
            });
        }
    }

    let contact_type: ContactType =
        raw.contact_type
            .parse()
            .map_err(|()| FeathersError::UnknownContactType {
                team: label.clone(),
                contact_type: raw.contact_type.clone(),
            })?;

    match contact_type {
        ContactType::None if !raw.addresses.is_empty() => {
            return Err(FeathersError::UnexpectedAddresses { team: label });
        }
        ContactType::Slack | ContactType::Webhook if raw.addresses.is_empty() => {
            return Err(FeathersError::MissingAddresses {
                team: label,
                contact_type,
            });
        }
        _ => {}
    }

    if contact_type == ContactType::Slack
        && let Some(bad) = raw.addresses.iter().find(|a| !SLACK_CHANNEL.is_match(a))
    {
        return Err(FeathersError::InvalidSlackChannel {
            team: label,
            address: bad.clone(),
        });
    }

    Ok(Team {
        name: raw.name,
        api_key: raw.api_key,
        contact_type,
        addresses: raw.addresses,
    })
}

/// Addresses grouped by contact type, in the order each type was first seen.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddressPool {
    groups: Vec<(ContactType, Vec<String>)>,
}

impl AddressPool {
    pub fn from_teams(teams: &[Team]) -> Self {
        let mut pool = AddressPool::default();
        for team in teams {
            pool.extend(team.contact_type, &team.addresses);
        }
        pool
    }

    fn extend(&mut self, contact_type: ContactType, addresses: &[String]) {
        match self.groups.iter_mut().find(|(ct, _)| *ct == contact_type) {
            Some((_, existing)) => existing.extend(addresses.iter().cloned()),
            None => self.groups.push((contact_type, addresses.to_vec())),
        }
    }

    pub fn get(&self, contact_type: ContactType) -> &[String] {
        self.groups
            .iter()
            .find(|(ct, _)| *ct == contact_type)
            .map(|(_, addresses)| addresses.as_slice())
            .unwrap_or(&[])
    }

    pub fn contact_types(&self) -> impl Iterator<Item = ContactType> + '_ {
        self.groups.iter().map(|(ct, _)| *ct)
    }

    pub fn iter(&self) -> impl Iterator<Item = (ContactType, &[String])> {
        self.groups.iter().map(|(ct, a)| (*ct, a.as_slice()))
    }

    pub fn is_empty(&self) -> bool {
        self.groups.iter().all(|(_, a)| a.is_empty())
    }
}
