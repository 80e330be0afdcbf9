//! A single team entry in the feathers directory.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// How a team wants to hear about releases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContactType {
    /// Addresses are Slack channel ids.
    Slack,
    /// Addresses are forwarded to the notification webhook.
    Webhook,
    /// The team is listed but never contacted.
    None,
}

impl ContactType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContactType::Slack => "slack",
            ContactType::Webhook => "webhook",
            ContactType::None => "none",
        }
    }
}

impl fmt::Display for ContactType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContactType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "slack" => Ok(ContactType::Slack),
            "webhook" => Ok(ContactType::Webhook),
            "none" => Ok(ContactType::None),
            _ => Err(()),
        }
    }
}

/// A validated team.
///
/// The JSON form of this struct is part of the comment hash, so field names
/// and order are stable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Team {
    pub name: String,
    pub api_key: String,
    pub contact_type: ContactType,
    pub addresses: Vec<String>,
}

impl Team {
    /// Equality used when comparing notes against the PR template.
    ///
    /// Addresses are compared as multisets; everything else must match.
    pub fn same_as(&self, other: &Team) -> bool {
        if self.name != other.name
            || self.api_key != other.api_key
            || self.contact_type != other.contact_type
            || self.addresses.len() != other.addresses.len()
        {
            return false;
        }
        let mut ours: Vec<&str> = self.addresses.iter().map(String::as_str).collect();
        let mut theirs: Vec<&str> = other.addresses.iter().map(String::as_str).collect();
        ours.sort_unstable();
        theirs.sort_unstable();
        ours == theirs
    }
}
