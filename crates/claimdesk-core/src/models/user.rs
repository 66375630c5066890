//! User domain model and the acting principal.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ClaimdeskError;

/// Staff role. The dominance order between roles lives in
/// [`crate::access`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    ClaimsManager,
    Adjuster,
    User,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::Admin, Role::ClaimsManager, Role::Adjuster, Role::User];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::ClaimsManager => "claims_manager",
            Role::Adjuster => "adjuster",
            Role::User => "user",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ClaimdeskError;

    /// Accepts the stored names plus `agent`, the front-office name for a
    /// claims manager.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "claims_manager" | "agent" => Ok(Role::ClaimsManager),
            "adjuster" => Ok(Role::Adjuster),
            "user" => Ok(Role::User),
            other => Err(ClaimdeskError::validation(format!("unknown role: {other}"))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    /// Argon2id PHC string. Never the plaintext.
    pub password_hash: String,
    pub role: Role,
    pub branch_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUser {
    pub username: String,
    /// Raw password (hashed with Argon2id before storage).
    pub password: String,
    pub role: Role,
    pub branch_id: Option<i64>,
}

/// The principal on whose behalf a repository operation runs.
///
/// `user_id` is `None` only for system actions performed by the
/// composition root (e.g. creating the first administrator).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub user_id: Option<i64>,
    pub role: Role,
}

impl Actor {
    pub fn user(user_id: i64, role: Role) -> Self {
        Self {
            user_id: Some(user_id),
            role,
        }
    }

    pub fn system() -> Self {
        Self {
            user_id: None,
            role: Role::Admin,
        }
    }
}

impl From<&User> for Actor {
    fn from(user: &User) -> Self {
        Actor::user(user.id, user.role)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_names_round_trip() {
        for role in Role::ALL {
            assert_eq!(role.as_str().parse::<Role>().unwrap(), role);
        }
    }

    #[test]
    fn agent_is_a_claims_manager() {
        assert_eq!("agent".parse::<Role>().unwrap(), Role::ClaimsManager);
        assert_eq!(" Admin ".parse::<Role>().unwrap(), Role::Admin);
    }

    #[test]
    fn unknown_role_is_rejected() {
        assert!("superuser".parse::<Role>().is_err());
    }
}
