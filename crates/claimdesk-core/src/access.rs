//! Static role hierarchy.
//!
//! Each role may act as the roles it dominates:
//!
//! | actor            | may act as                                   |
//! |------------------|----------------------------------------------|
//! | `admin`          | admin, claims_manager, adjuster, user        |
//! | `claims_manager` | claims_manager, adjuster, user               |
//! | `adjuster`       | adjuster, user                               |
//! | `user`           | user                                         |
//!
//! Pure functions, no storage access. Repositories call [`authorize`]
//! before touching a connection.

use crate::error::{ClaimdeskError, ClaimdeskResult};
use crate::models::user::{Actor, Role};

/// The roles `role` may act as.
pub fn dominated_roles(role: Role) -> &'static [Role] {
    match role {
        Role::Admin => &[Role::Admin, Role::ClaimsManager, Role::Adjuster, Role::User],
        Role::ClaimsManager => &[Role::ClaimsManager, Role::Adjuster, Role::User],
        Role::Adjuster => &[Role::Adjuster, Role::User],
        Role::User => &[Role::User],
    }
}

pub fn has_access(actor_role: Role, required_role: Role) -> bool {
    dominated_roles(actor_role).contains(&required_role)
}

/// Loose-string variant for callers holding raw role names.
///
/// An unknown actor role dominates nothing and an unknown required role is
/// never satisfied.
pub fn has_access_named(actor_role: &str, required_role: &str) -> bool {
    match (actor_role.parse::<Role>(), required_role.parse::<Role>()) {
        (Ok(actor), Ok(required)) => has_access(actor, required),
        _ => false,
    }
}

/// Refuse with [`ClaimdeskError::AccessDenied`] unless `actor` may act as
/// `required`.
pub fn authorize(actor: &Actor, required: Role) -> ClaimdeskResult<()> {
    if has_access(actor.role, required) {
        Ok(())
    } else {
        Err(ClaimdeskError::AccessDenied {
            reason: format!("role {} cannot act as {}", actor.role, required),
        })
    }
}
