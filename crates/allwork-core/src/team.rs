use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::PreconditionError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Team {
    pub id: i64,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTeam {
    pub name: String,
}

impl CreateTeam {
    /// Build a create request from raw user input. The name is trimmed and
    /// must not be empty.
    pub fn from_input(input: &str) -> Result<Self, PreconditionError> {
        let name = input.trim();
        if name.is_empty() {
            return Err(PreconditionError::EmptyTeamName);
        }
        Ok(Self {
            name: name.to_string(),
        })
    }
}

/// A team can only be deleted once it owns no tasks.
pub fn ensure_deletable(team: &Team, task_count: i64) -> Result<(), PreconditionError> {
    if task_count > 0 {
        return Err(PreconditionError::TeamHasTasks {
            team: team.name.clone(),
            count: task_count,
        });
    }
    Ok(())
}
