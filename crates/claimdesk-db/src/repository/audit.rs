//! SQLite implementation of [`AuditLogRepository`].
//!
//! Entries are append-only. Other repositories write theirs through
//! [`append`] on the connection (or transaction) that performs the
//! mutation, so the mutation and its entry commit together.

use chrono::{DateTime, Utc};
use claimdesk_core::access::authorize;
use claimdesk_core::error::ClaimdeskResult;
use claimdesk_core::models::audit::{AuditAction, AuditLogEntry, CreateAuditLogEntry};
use claimdesk_core::models::user::{Actor, Role};
use claimdesk_core::repository::AuditLogRepository;
use sqlx::sqlite::SqliteConnection;
use tracing::debug;

use super::parse_column;
use crate::connection::ConnectionPool;
use crate::error::DbError;

#[derive(Debug, sqlx::FromRow)]
struct AuditLogRow {
    id: i64,
    user_id: Option<i64>,
    action: String,
    table_name: String,
    record_id: Option<i64>,
    details: Option<String>,
    created_at: DateTime<Utc>,
}

impl AuditLogRow {
    fn into_entry(self) -> Result<AuditLogEntry, DbError> {
        let details = self
            .details
            .map(|raw| {
                serde_json::from_str(&raw)
                    .map_err(|e| DbError::Corrupt(format!("audit_logs.details: {e}")))
            })
            .transpose()?;
        Ok(AuditLogEntry {
            id: self.id,
            user_id: self.user_id,
            action: parse_column("audit_logs.action", &self.action)?,
            table_name: self.table_name,
            record_id: self.record_id,
            details,
            created_at: self.created_at,
        })
    }
}

/// Build the entry for `actor` acting on one record.
pub(crate) fn entry(
    actor: &Actor,
    action: AuditAction,
    table_name: &str,
    record_id: i64,
    details: Option<serde_json::Value>,
) -> CreateAuditLogEntry {
    CreateAuditLogEntry {
        user_id: actor.user_id,
        action,
        table_name: table_name.to_string(),
        record_id: Some(record_id),
        details,
    }
}

/// Append one entry on `conn`. Any failure is reported as
/// [`DbError::Audit`].
pub(crate) async fn append(
    conn: &mut SqliteConnection,
    input: CreateAuditLogEntry,
) -> Result<AuditLogEntry, DbError> {
    let now = Utc::now();
    let details = input
        .details
        .as_ref()
        .map(serde_json::to_string)
        .transpose()
        .map_err(|e| DbError::Corrupt(format!("audit details: {e}")))?;

    let id = sqlx::query(
        "INSERT INTO audit_logs \
         (user_id, action, table_name, record_id, details, created_at) \
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(input.user_id)
    .bind(input.action.as_str())
    .bind(&input.table_name)
    .bind(input.record_id)
    .bind(details)
    .bind(now)
    .execute(conn)
    .await
    .map_err(DbError::Audit)?
    .last_insert_rowid();

    debug!(
        audit_id = id,
        action = %input.action,
        table = %input.table_name,
        record_id = input.record_id,
        "Audit entry written"
    );

    Ok(AuditLogEntry {
        id,
        user_id: input.user_id,
        action: input.action,
        table_name: input.table_name,
        record_id: input.record_id,
        details: input.details,
        created_at: now,
    })
}

/// SQLite implementation of the audit log.
#[derive(Debug, Clone)]
pub struct SqliteAuditLogRepository {
    pool: ConnectionPool,
}

impl SqliteAuditLogRepository {
    pub fn new(pool: ConnectionPool) -> Self {
        Self { pool }
    }
}

impl AuditLogRepository for SqliteAuditLogRepository {
    async fn record(&self, input: CreateAuditLogEntry) -> ClaimdeskResult<AuditLogEntry> {
        let _writer = self.pool.lock_writer().await;
        let mut conn = self.pool.acquire().await?;
        Ok(append(&mut *conn, input).await?)
    }

    async fn actions_by(&self, actor: &Actor, user_id: i64) -> ClaimdeskResult<Vec<AuditLogEntry>> {
        if actor.user_id == Some(user_id) {
            authorize(actor, Role::User)?;
        } else {
            authorize(actor, Role::Admin)?;
        }
        let mut conn = self.pool.acquire().await?;
        let rows = sqlx::query_as::<_, AuditLogRow>(
            "SELECT * FROM audit_logs WHERE user_id = ? \
             ORDER BY created_at DESC, id DESC",
        )
        .bind(user_id)
        .fetch_all(&mut *conn)
        .await
        .map_err(DbError::from)?;
        Ok(rows
            .into_iter()
            .map(AuditLogRow::into_entry)
            .collect::<Result<_, _>>()?)
    }

    async fn for_record(
        &self,
        actor: &Actor,
        table_name: &str,
        record_id: i64,
    ) -> ClaimdeskResult<Vec<AuditLogEntry>> {
        authorize(actor, Role::User)?;
        let mut conn = self.pool.acquire().await?;
        let rows = sqlx::query_as::<_, AuditLogRow>(
            "SELECT * FROM audit_logs WHERE table_name = ? AND record_id = ? \
             ORDER BY created_at ASC, id ASC",
        )
        .bind(table_name)
        .bind(record_id)
        .fetch_all(&mut *conn)
        .await
        .map_err(DbError::from)?;
        Ok(rows
            .into_iter()
            .map(AuditLogRow::into_entry)
            .collect::<Result<_, _>>()?)
    }
}
