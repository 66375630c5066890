//! Authentication service — staff login.

use claimdesk_core::error::{ClaimdeskError, ClaimdeskResult};
use claimdesk_core::models::user::{Actor, Role};
use claimdesk_core::repository::UserRepository;
use tracing::{info, warn};

use crate::config::AuthConfig;
use crate::error::AuthError;
use crate::password;

/// Input for the login flow.
#[derive(Debug)]
pub struct LoginInput {
    pub username: String,
    pub password: String,
}

/// The authenticated staff member, handed to the UI after login.
#[derive(Debug, Clone)]
pub struct Session {
    pub user_id: i64,
    pub username: String,
    pub role: Role,
    pub branch_id: Option<i64>,
}

impl Session {
    /// The principal to pass into repository calls.
    pub fn actor(&self) -> Actor {
        Actor::user(self.user_id, self.role)
    }
}

/// Authentication service.
///
/// Generic over the user repository so that the auth layer has no
/// dependency on the database crate.
pub struct AuthService<U: UserRepository> {
    user_repo: U,
    config: AuthConfig,
}

impl<U: UserRepository> AuthService<U> {
    pub fn new(user_repo: U, config: AuthConfig) -> Self {
        Self { user_repo, config }
    }

    /// Check a username/password pair and return the user's role and
    /// branch. Unknown users and wrong passwords fail identically.
    pub async fn login(&self, input: LoginInput) -> ClaimdeskResult<Session> {
        let user = match self.user_repo.get_by_username(&input.username).await {
            Ok(u) => u,
            Err(ClaimdeskError::NotFound { .. }) => {
                password::verify_absent(&input.password, self.config.pepper.as_deref());
                warn!(username = %input.username, "Login for unknown user");
                return Err(AuthError::InvalidCredentials.into());
            }
            Err(e) => return Err(e),
        };

        let valid = password::verify_password(
            &input.password,
            &user.password_hash,
            self.config.pepper.as_deref(),
        )?;

        if !valid {
            warn!(user_id = user.id, "Login with wrong password");
            return Err(AuthError::InvalidCredentials.into());
        }

        info!(user_id = user.id, role = %user.role, "User logged in");

        Ok(Session {
            user_id: user.id,
            username: user.username,
            role: user.role,
            branch_id: user.branch_id,
        })
    }
}
