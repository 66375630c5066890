//! Error types for the Claimdesk system.
//!
//! Every repository operation returns [`ClaimdeskResult`]. The `Display`
//! text of each variant is the human-readable reason the UI shows the
//! user, so no storage-specific detail leaks through it beyond the name
//! of a violated constraint.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClaimdeskError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    #[error("duplicate value violates unique constraint {constraint}")]
    DuplicateKey { constraint: String },

    #[error("access denied: {reason}")]
    AccessDenied { reason: String },

    #[error("validation error: {message}")]
    Validation { message: String },

    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("audit trail could not be written: {0}")]
    AuditWriteFailure(String),

    #[error("authentication failed: {reason}")]
    AuthenticationFailed { reason: String },

    #[error("cryptography error: {0}")]
    Crypto(String),
}

impl ClaimdeskError {
    pub fn not_found(entity: &str, id: impl ToString) -> Self {
        Self::NotFound {
            entity: entity.to_string(),
            id: id.to_string(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// True for failures the user caused and can correct from the form
    /// (as opposed to storage or audit failures).
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            Self::NotFound { .. }
                | Self::DuplicateKey { .. }
                | Self::AccessDenied { .. }
                | Self::Validation { .. }
                | Self::AuthenticationFailed { .. }
        )
    }
}

pub type ClaimdeskResult<T> = Result<T, ClaimdeskError>;
