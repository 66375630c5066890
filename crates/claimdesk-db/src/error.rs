//! Database-specific error types and conversions.

use claimdesk_core::error::ClaimdeskError;
use tracing::error;

/// Database-layer error type.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Invalid database configuration: {0}")]
    Config(String),

    #[error("Connection pool is closed")]
    PoolClosed,

    #[error("Record not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Audit write failed: {0}")]
    Audit(#[source] sqlx::Error),

    #[error("Stored value is corrupt: {0}")]
    Corrupt(String),

    #[error("{0}")]
    Refused(String),
}

impl DbError {
    pub(crate) fn not_found(entity: &str, id: impl ToString) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }
}

/// Name of the violated unique constraint, if `err` is one.
///
/// SQLite reports these as `UNIQUE constraint failed: customers.email`.
fn unique_violation(err: &sqlx::Error) -> Option<String> {
    let db_err = err.as_database_error()?;
    if !db_err.is_unique_violation() {
        return None;
    }
    let message = db_err.message();
    Some(
        message
            .split_once(": ")
            .map(|(_, columns)| columns.to_string())
            .unwrap_or_else(|| message.to_string()),
    )
}

impl From<DbError> for ClaimdeskError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => ClaimdeskError::NotFound { entity, id },
            DbError::Sqlx(ref e) => match unique_violation(e) {
                Some(constraint) => ClaimdeskError::DuplicateKey { constraint },
                None => {
                    error!(error = %e, "Storage operation failed");
                    ClaimdeskError::StorageUnavailable(e.to_string())
                }
            },
            DbError::Refused(message) => ClaimdeskError::Validation { message },
            DbError::Audit(e) => {
                error!(error = %e, "Audit entry could not be written");
                ClaimdeskError::AuditWriteFailure(e.to_string())
            }
            other => {
                error!(error = %other, "Storage operation failed");
                ClaimdeskError::StorageUnavailable(other.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_keeps_entity_and_id() {
        let err: ClaimdeskError = DbError::not_found("policy", 42).into();
        assert!(matches!(
            err,
            ClaimdeskError::NotFound { ref entity, ref id } if entity == "policy" && id == "42"
        ));
    }

    #[test]
    fn refusal_is_a_validation_error() {
        let err: ClaimdeskError = DbError::Refused("customer still owns policies".into()).into();
        assert!(matches!(err, ClaimdeskError::Validation { .. }));
        assert!(err.is_user_error());
    }

    #[test]
    fn audit_failure_is_not_swallowed() {
        let err: ClaimdeskError = DbError::Audit(sqlx::Error::RowNotFound).into();
        assert!(matches!(err, ClaimdeskError::AuditWriteFailure(_)));
    }

    #[test]
    fn closed_pool_is_unavailable() {
        let err: ClaimdeskError = DbError::PoolClosed.into();
        assert!(matches!(
            err,
            ClaimdeskError::StorageUnavailable(ref msg) if msg == "Connection pool is closed"
        ));
    }

    #[test]
    fn other_storage_errors_are_unavailable() {
        let err: ClaimdeskError = DbError::Sqlx(sqlx::Error::PoolClosed).into();
        assert!(matches!(err, ClaimdeskError::StorageUnavailable(_)));
    }
}
