//! SQLite repository implementations.
//!
//! Every implementation holds a clone of the [`ConnectionPool`]. Mutations
//! take the pool's writer lock, acquire a connection and run one
//! transaction that also appends the audit entry; reads acquire a
//! connection only.
//!
//! [`ConnectionPool`]: crate::connection::ConnectionPool

mod audit;
mod branch;
mod claim;
mod customer;
mod payment;
mod policy;
mod user;

use std::fmt::Display;
use std::str::FromStr;

pub use audit::SqliteAuditLogRepository;
pub use branch::SqliteBranchRepository;
pub use claim::SqliteClaimRepository;
pub use customer::SqliteCustomerRepository;
pub use payment::SqlitePaymentRepository;
pub use policy::SqlitePolicyRepository;
pub use user::SqliteUserRepository;

use crate::error::DbError;

/// Parse a TEXT column into a domain value (enum or decimal amount).
pub(crate) fn parse_column<T>(column: &str, raw: &str) -> Result<T, DbError>
where
    T: FromStr,
    T::Err: Display,
{
    raw.parse()
        .map_err(|e| DbError::Corrupt(format!("{column} = {raw:?}: {e}")))
}
