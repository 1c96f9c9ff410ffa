//! Team roster - the team directory consulted when validating `{team}` slots
//!
//! Loaded from `.ngt/teams.yaml`:
//!
//! ```yaml
//! teams:
//!   - name: platform
//!     members: [alice, bob]
//!     approvers: [alice]
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::core::collaborator::{CollaboratorError, TeamDirectory};
use crate::yaml::{parse_yaml_file, YamlError};

/// A team known to the roster
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    pub name: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub members: Vec<String>,

    /// Members allowed to approve change and exception requests
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub approvers: Vec<String>,
}

/// Roster of teams
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamRoster {
    #[serde(default)]
    pub teams: Vec<Team>,
}

impl TeamRoster {
    /// Build a roster from bare team names
    pub fn from_teams<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            teams: names
                .into_iter()
                .map(|name| Team {
                    name: name.into(),
                    ..Team::default()
                })
                .collect(),
        }
    }

    /// Load the roster from a YAML file
    pub fn load(path: &Path) -> Result<Self, YamlError> {
        parse_yaml_file(path)
    }

    pub fn team(&self, name: &str) -> Option<&Team> {
        self.teams.iter().find(|t| t.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.team(name).is_some()
    }

    /// Every approver across all teams, sorted and deduplicated
    pub fn approvers(&self) -> Vec<&str> {
        let mut all: Vec<&str> = self
            .teams
            .iter()
            .flat_map(|t| t.approvers.iter().map(String::as_str))
            .collect();
        all.sort_unstable();
        all.dedup();
        all
    }
}

impl TeamDirectory for TeamRoster {
    fn is_known_team(&self, team: &str) -> Result<bool, CollaboratorError> {
        Ok(self.contains(team))
    }
}
