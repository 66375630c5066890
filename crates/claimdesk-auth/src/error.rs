//! Authentication error types.

use claimdesk_core::error::ClaimdeskError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("password must be at least {min} characters")]
    WeakPassword { min: usize },

    #[error("invalid encryption key: {0}")]
    InvalidKey(String),

    #[error("cryptography error: {0}")]
    Crypto(String),
}

impl From<AuthError> for ClaimdeskError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidCredentials => ClaimdeskError::AuthenticationFailed {
                reason: err.to_string(),
            },
            AuthError::WeakPassword { .. } => ClaimdeskError::Validation {
                message: err.to_string(),
            },
            AuthError::InvalidKey(msg) | AuthError::Crypto(msg) => ClaimdeskError::Crypto(msg),
        }
    }
}
