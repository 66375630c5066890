//! Schema definitions and migration runner for SQLite.
//!
//! Monetary amounts are stored as canonical decimal TEXT. Enums are stored
//! as lowercase (policy types uppercase) strings guarded by CHECK
//! constraints. Timestamps are RFC 3339 TEXT written by the repositories.

use tracing::info;

use crate::connection::ConnectionPool;
use crate::error::DbError;

// -----------------------------------------------------------------------
// Migration tracking
// -----------------------------------------------------------------------

const MIGRATION_TABLE_DDL: &str = "\
CREATE TABLE IF NOT EXISTS _migration (
    version    INTEGER PRIMARY KEY,
    name       TEXT NOT NULL,
    applied_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
);
";

struct Migration {
    version: i64,
    name: &'static str,
    sql: &'static str,
}

static MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    name: "initial_schema",
    sql: SCHEMA_V1,
}];

// -----------------------------------------------------------------------
// Schema v1
// -----------------------------------------------------------------------

const SCHEMA_V1: &str = "\
-- =======================================================================
-- Branches
-- =======================================================================
CREATE TABLE branches (
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    name       TEXT NOT NULL,
    address    TEXT,
    phone      TEXT,
    email      TEXT,
    created_at TEXT NOT NULL
);

-- =======================================================================
-- Staff accounts
-- =======================================================================
CREATE TABLE users (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    username      TEXT NOT NULL UNIQUE,
    password_hash TEXT NOT NULL,
    role          TEXT NOT NULL
        CHECK (role IN ('admin', 'claims_manager', 'adjuster', 'user')),
    branch_id     INTEGER REFERENCES branches(id),
    created_at    TEXT NOT NULL
);

-- =======================================================================
-- Customers
-- =======================================================================
CREATE TABLE customers (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    first_name    TEXT NOT NULL,
    last_name     TEXT NOT NULL,
    email         TEXT NOT NULL UNIQUE,
    phone         TEXT,
    address       TEXT,
    date_of_birth TEXT,
    ssn_encrypted TEXT,
    created_at    TEXT NOT NULL,
    updated_at    TEXT NOT NULL
);

-- =======================================================================
-- Policies
-- =======================================================================
CREATE TABLE policies (
    id               INTEGER PRIMARY KEY AUTOINCREMENT,
    customer_id      INTEGER NOT NULL REFERENCES customers(id),
    policy_type      TEXT NOT NULL
        CHECK (policy_type IN ('AUTO', 'HOME', 'LIFE', 'HEALTH', 'TRAVEL',
                               'PET', 'BUSINESS')),
    policy_number    TEXT NOT NULL UNIQUE,
    start_date       TEXT NOT NULL,
    end_date         TEXT NOT NULL,
    premium          TEXT NOT NULL,
    coverage_limit   TEXT NOT NULL,
    status           TEXT NOT NULL DEFAULT 'active'
        CHECK (status IN ('active', 'inactive', 'cancelled', 'expired')),
    payment_schedule TEXT,
    beneficiary_info TEXT,
    exclusions       TEXT,
    created_at       TEXT NOT NULL,
    updated_at       TEXT NOT NULL
);
CREATE INDEX idx_policies_customer ON policies(customer_id);

-- =======================================================================
-- Claims (status may be NULL in rows written by older tools; reads
-- repair it)
-- =======================================================================
CREATE TABLE claims (
    id                INTEGER PRIMARY KEY AUTOINCREMENT,
    policy_id         INTEGER NOT NULL REFERENCES policies(id),
    claim_number      TEXT NOT NULL UNIQUE,
    claim_date        TEXT NOT NULL,
    incident_date     TEXT NOT NULL,
    incident_time     TEXT,
    incident_location TEXT,
    description       TEXT NOT NULL,
    claim_amount      TEXT NOT NULL,
    status            TEXT
        CHECK (status IS NULL
               OR status IN ('pending', 'approved', 'rejected', 'paid')),
    created_at        TEXT NOT NULL,
    updated_at        TEXT NOT NULL
);
CREATE INDEX idx_claims_policy ON claims(policy_id);
CREATE INDEX idx_claims_status ON claims(status);

-- =======================================================================
-- Payments (exactly one of policy_id / claim_id)
-- =======================================================================
CREATE TABLE payments (
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    policy_id    INTEGER REFERENCES policies(id),
    claim_id     INTEGER REFERENCES claims(id),
    amount       TEXT NOT NULL,
    payment_date TEXT NOT NULL,
    status       TEXT NOT NULL DEFAULT 'completed'
        CHECK (status IN ('pending', 'completed', 'failed')),
    created_at   TEXT NOT NULL,
    CHECK ((policy_id IS NULL) <> (claim_id IS NULL))
);
CREATE INDEX idx_payments_policy ON payments(policy_id);
CREATE INDEX idx_payments_claim ON payments(claim_id);

-- =======================================================================
-- Audit trail (append-only)
-- =======================================================================
CREATE TABLE audit_logs (
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id    INTEGER,
    action     TEXT NOT NULL
        CHECK (action IN ('create', 'update', 'view', 'delete')),
    table_name TEXT NOT NULL,
    record_id  INTEGER,
    details    TEXT,
    created_at TEXT NOT NULL
);
CREATE INDEX idx_audit_logs_user ON audit_logs(user_id);
CREATE INDEX idx_audit_logs_record ON audit_logs(table_name, record_id);
";

/// Run all pending schema migrations.
///
/// Each migration and its `_migration` row commit together, so a failed
/// migration leaves the previous version in place.
pub async fn run_migrations(pool: &ConnectionPool) -> Result<(), DbError> {
    let _writer = pool.lock_writer().await;
    let mut conn = pool.acquire().await?;

    sqlx::raw_sql(MIGRATION_TABLE_DDL).execute(&mut *conn).await?;

    let current_version: i64 =
        sqlx::query_scalar("SELECT COALESCE(MAX(version), 0) FROM _migration")
            .fetch_one(&mut *conn)
            .await?;

    for migration in MIGRATIONS {
        if migration.version <= current_version {
            continue;
        }
        info!(
            version = migration.version,
            name = migration.name,
            "Applying migration"
        );

        let mut tx = conn.begin_write().await?;
        sqlx::raw_sql(migration.sql)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                DbError::Migration(format!(
                    "Migration v{} '{}' failed: {}",
                    migration.version, migration.name, e,
                ))
            })?;

        sqlx::query("INSERT INTO _migration (version, name) VALUES (?, ?)")
            .bind(migration.version)
            .bind(migration.name)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                DbError::Migration(format!(
                    "Failed to record migration v{}: {}",
                    migration.version, e,
                ))
            })?;
        tx.commit().await?;

        info!(
            version = migration.version,
            "Migration applied successfully"
        );
    }

    Ok(())
}

/// Returns the raw schema DDL for version 1.
pub fn schema_v1() -> &'static str {
    SCHEMA_V1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_v1_is_nonempty() {
        assert!(!SCHEMA_V1.is_empty());
    }

    #[test]
    fn migrations_are_ordered() {
        for window in MIGRATIONS.windows(2) {
            assert!(
                window[0].version < window[1].version,
                "Migrations must be in ascending version order"
            );
        }
    }

    #[test]
    fn schema_v1_defines_every_table() {
        for table in [
            "users",
            "branches",
            "customers",
            "policies",
            "claims",
            "payments",
            "audit_logs",
        ] {
            assert!(
                SCHEMA_V1.contains(&format!("CREATE TABLE {table} (")),
                "missing {table} table"
            );
        }
    }
}
