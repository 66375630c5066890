//! Claimdesk Database — SQLite connection pool, schema migrations and
//! repository implementations.
//!
//! This crate provides:
//! - Connection management ([`ConnectionPool`], [`DbConfig`])
//! - Schema initialization and migrations ([`run_migrations`])
//! - Error types ([`DbError`])
//! - Implementations of the `claimdesk-core` repository traits
//!   ([`repository`]), bundled by [`Database`]

mod connection;
mod error;
pub mod repository;
mod schema;

use claimdesk_auth::{AuthConfig, FieldCipher};

pub use connection::{ConnectionPool, DbConfig, PooledConnection};
pub use error::DbError;
pub use repository::{
    SqliteAuditLogRepository, SqliteBranchRepository, SqliteClaimRepository,
    SqliteCustomerRepository, SqlitePaymentRepository, SqlitePolicyRepository,
    SqliteUserRepository,
};
pub use schema::{run_migrations, schema_v1};

/// An open, migrated store plus the secrets its repositories need.
///
/// Repositories handed out by the accessors share the one pool.
#[derive(Debug, Clone)]
pub struct Database {
    pool: ConnectionPool,
    cipher: FieldCipher,
    auth: AuthConfig,
}

impl Database {
    /// Open the pool and bring the schema up to date.
    ///
    /// Refuses an all-zero field encryption key before touching the file.
    pub async fn open(config: &DbConfig, auth: AuthConfig) -> Result<Self, DbError> {
        if auth.field_encryption_key == [0u8; 32] {
            return Err(DbError::Config(
                "field encryption key must not be all zeros".into(),
            ));
        }
        let pool = ConnectionPool::connect(config).await?;
        run_migrations(&pool).await?;
        Ok(Self::with_pool(pool, auth))
    }

    /// Wrap an already migrated pool.
    pub fn with_pool(pool: ConnectionPool, auth: AuthConfig) -> Self {
        let cipher = FieldCipher::new(&auth.field_encryption_key);
        Self { pool, cipher, auth }
    }

    pub fn pool(&self) -> &ConnectionPool {
        &self.pool
    }

    pub fn users(&self) -> SqliteUserRepository {
        SqliteUserRepository::new(self.pool.clone(), self.auth.clone())
    }

    pub fn branches(&self) -> SqliteBranchRepository {
        SqliteBranchRepository::new(self.pool.clone())
    }

    pub fn customers(&self) -> SqliteCustomerRepository {
        SqliteCustomerRepository::new(self.pool.clone(), self.cipher.clone())
    }

    pub fn policies(&self) -> SqlitePolicyRepository {
        SqlitePolicyRepository::new(self.pool.clone())
    }

    pub fn claims(&self) -> SqliteClaimRepository {
        SqliteClaimRepository::new(self.pool.clone())
    }

    pub fn payments(&self) -> SqlitePaymentRepository {
        SqlitePaymentRepository::new(self.pool.clone())
    }

    pub fn audit(&self) -> SqliteAuditLogRepository {
        SqliteAuditLogRepository::new(self.pool.clone())
    }

    /// Close idle connections. Call once at shutdown.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}
