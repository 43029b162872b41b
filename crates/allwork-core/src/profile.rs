use serde::{Deserialize, Serialize};

use crate::session::AuthUser;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    #[serde(default)]
    pub email: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub display_name: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub first_name: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub last_name: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub position: String,
}

impl Profile {
    /// Up to two uppercase characters for the column avatar.
    pub fn initials(&self) -> String {
        self.display_name.chars().take(2).collect::<String>().to_uppercase()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpsertProfile {
    pub id: String,
    pub email: String,
    pub display_name: String,
    pub first_name: String,
    pub last_name: String,
    pub position: String,
}

impl UpsertProfile {
    /// Build the row saved by the profile form. `display_name` is always
    /// derived, never typed.
    pub fn from_form(user: &AuthUser, first_name: &str, last_name: &str, position: &str) -> Self {
        Self {
            id: user.id.clone(),
            email: user.email.clone(),
            display_name: derive_display_name(first_name, last_name, &user.email),
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            position: position.to_string(),
        }
    }

    /// Minimal row for a user that has no profile yet.
    pub fn bootstrap(user: &AuthUser) -> Self {
        Self::from_form(user, "", "", "")
    }
}

impl From<UpsertProfile> for Profile {
    fn from(p: UpsertProfile) -> Self {
        Self {
            id: p.id,
            email: p.email,
            display_name: p.display_name,
            first_name: p.first_name,
            last_name: p.last_name,
            position: p.position,
        }
    }
}

/// `"first last"` trimmed, or the email local-part when both names are blank.
pub fn derive_display_name(first_name: &str, last_name: &str, email: &str) -> String {
    let full = format!("{first_name} {last_name}");
    let full = full.trim();
    if full.is_empty() {
        email_local_part(email).to_string()
    } else {
        full.to_string()
    }
}

pub fn email_local_part(email: &str) -> &str {
    email.split('@').next().unwrap_or(email)
}

fn null_as_empty<'de, D>(de: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(de)?.unwrap_or_default())
}
