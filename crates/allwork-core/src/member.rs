use std::fmt;

use serde::{Deserialize, Serialize};

use crate::profile::Profile;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Owner,
    Member,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Owner => "owner",
            Role::Member => "member",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Membership join row. `profile` is filled when the backend embeds the
/// member's profile (`profiles:user_id(*)`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamMember {
    pub team_id: i64,
    pub user_id: String,
    pub role: Role,
    #[serde(default, rename = "profiles", skip_serializing)]
    pub profile: Option<Profile>,
}

impl TeamMember {
    pub fn display_name(&self) -> &str {
        match self.profile {
            Some(ref p) if !p.display_name.is_empty() => &p.display_name,
            _ => "Unknown",
        }
    }

    pub fn is_owner(&self) -> bool {
        self.role == Role::Owner
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTeamMember {
    pub team_id: i64,
    pub user_id: String,
    pub role: Role,
}
