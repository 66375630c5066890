//! SQLite implementation of [`ClaimRepository`].
//!
//! Claim numbers are generated inside the creating transaction while the
//! pool's writer lock is held, so two concurrent creations can never read
//! the same highest sequence. The `UNIQUE` constraint on `claim_number`
//! backs this up.
//!
//! Rows whose `status` is NULL are repaired on read: once the reading
//! connection is released, the writer lock is taken and the row is
//! rewritten to `pending`, audited as an `update` by the reading actor,
//! and returned as pending.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use claimdesk_core::access::authorize;
use claimdesk_core::error::ClaimdeskResult;
use claimdesk_core::models::audit::AuditAction;
use claimdesk_core::models::claim::{
    CLAIM_NUMBER_PREFIX, Claim, ClaimStatus, CreateClaim, next_claim_number,
};
use claimdesk_core::models::payment::{Payment, PaymentTarget, validate_payment_amount};
use claimdesk_core::models::user::{Actor, Role};
use claimdesk_core::repository::ClaimRepository;
use rust_decimal::Decimal;
use sqlx::sqlite::SqliteConnection;
use tracing::{info, warn};

use super::{audit, parse_column, payment};
use crate::connection::{ConnectionPool, PooledConnection};
use crate::error::DbError;

#[derive(Debug, sqlx::FromRow)]
struct ClaimRow {
    id: i64,
    policy_id: i64,
    claim_number: String,
    claim_date: NaiveDate,
    incident_date: NaiveDate,
    incident_time: Option<NaiveTime>,
    incident_location: Option<String>,
    description: String,
    claim_amount: String,
    status: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ClaimRow {
    /// Convert a row whose status has already been repaired.
    fn try_into_claim(self) -> Result<Claim, DbError> {
        let status = match self.status.as_deref() {
            Some(raw) => parse_column("claims.status", raw)?,
            None => {
                return Err(DbError::Corrupt(format!(
                    "claim {} has no status",
                    self.id
                )));
            }
        };
        Ok(Claim {
            id: self.id,
            policy_id: self.policy_id,
            claim_number: self.claim_number,
            claim_date: self.claim_date,
            incident_date: self.incident_date,
            incident_time: self.incident_time,
            incident_location: self.incident_location,
            description: self.description,
            claim_amount: parse_column("claims.claim_amount", &self.claim_amount)?,
            status,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// Highest sequence issued so far, `None` for an empty table.
async fn highest_sequence(conn: &mut SqliteConnection) -> Result<Option<u64>, DbError> {
    let sql = format!(
        "SELECT MAX(CAST(SUBSTR(claim_number, {}) AS INTEGER)) FROM claims \
         WHERE claim_number LIKE '{}%'",
        CLAIM_NUMBER_PREFIX.len() + 1,
        CLAIM_NUMBER_PREFIX,
    );
    let highest: Option<i64> = sqlx::query_scalar(&sql).fetch_one(conn).await?;
    Ok(highest.and_then(|n| u64::try_from(n).ok()))
}

async fn policy_exists(conn: &mut SqliteConnection, id: i64) -> Result<bool, DbError> {
    let found: Option<i64> = sqlx::query_scalar("SELECT id FROM policies WHERE id = ?")
        .bind(id)
        .fetch_optional(conn)
        .await?;
    Ok(found.is_some())
}

async fn fetch_row(conn: &mut SqliteConnection, id: i64) -> Result<ClaimRow, DbError> {
    sqlx::query_as::<_, ClaimRow>("SELECT * FROM claims WHERE id = ?")
        .bind(id)
        .fetch_optional(conn)
        .await?
        .ok_or_else(|| DbError::not_found("claim", id))
}

/// Rewrite a NULL status to `pending` and audit the repair.
///
/// Runs under the writer lock. If another reader repaired the row first,
/// the current status is re-read instead.
async fn heal_status(
    conn: &mut PooledConnection,
    actor: &Actor,
    row: &mut ClaimRow,
) -> Result<(), DbError> {
    let mut tx = conn.begin_write().await?;
    let now = Utc::now();
    let repaired = sqlx::query(
        "UPDATE claims SET status = ?, updated_at = ? WHERE id = ? AND status IS NULL",
    )
    .bind(ClaimStatus::Pending.as_str())
    .bind(now)
    .bind(row.id)
    .execute(&mut *tx)
    .await?
    .rows_affected();

    if repaired == 0 {
        let current: Option<String> =
            sqlx::query_scalar("SELECT status FROM claims WHERE id = ?")
                .bind(row.id)
                .fetch_one(&mut *tx)
                .await?;
        tx.commit().await?;
        row.status = Some(current.unwrap_or_else(|| ClaimStatus::Pending.as_str().into()));
        return Ok(());
    }

    audit::append(
        &mut *tx,
        audit::entry(
            actor,
            AuditAction::Update,
            "claims",
            row.id,
            Some(serde_json::json!({
                "status": { "from": null, "to": ClaimStatus::Pending.as_str() },
                "reason": "missing status repaired on read",
            })),
        ),
    )
    .await?;
    tx.commit().await?;

    warn!(
        claim_id = row.id,
        claim_number = %row.claim_number,
        "Claim had no status; repaired to pending"
    );
    row.status = Some(ClaimStatus::Pending.as_str().into());
    row.updated_at = now;
    Ok(())
}

/// SQLite implementation of the Claim repository.
#[derive(Debug, Clone)]
pub struct SqliteClaimRepository {
    pool: ConnectionPool,
}

impl SqliteClaimRepository {
    pub fn new(pool: ConnectionPool) -> Self {
        Self { pool }
    }

    async fn insert(&self, actor: &Actor, input: CreateClaim) -> Result<Claim, DbError> {
        let status = match input.status.as_deref() {
            None => ClaimStatus::Pending,
            Some(raw) => raw.parse().unwrap_or_else(|_| {
                warn!(status = raw, "Unrecognized claim status; defaulting to pending");
                ClaimStatus::Pending
            }),
        };

        let _writer = self.pool.lock_writer().await;
        let mut conn = self.pool.acquire().await?;
        let mut tx = conn.begin_write().await?;

        if !policy_exists(&mut tx, input.policy_id).await? {
            return Err(DbError::not_found("policy", input.policy_id));
        }

        let claim_number = next_claim_number(highest_sequence(&mut tx).await?);
        let now = Utc::now();

        let id = sqlx::query(
            "INSERT INTO claims \
             (policy_id, claim_number, claim_date, incident_date, incident_time, \
              incident_location, description, claim_amount, status, \
              created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(input.policy_id)
        .bind(&claim_number)
        .bind(input.claim_date)
        .bind(input.incident_date)
        .bind(input.incident_time)
        .bind(&input.incident_location)
        .bind(&input.description)
        .bind(input.claim_amount.to_string())
        .bind(status.as_str())
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();

        audit::append(
            &mut *tx,
            audit::entry(
                actor,
                AuditAction::Create,
                "claims",
                id,
                Some(serde_json::json!({
                    "claim_number": &claim_number,
                    "policy_id": input.policy_id,
                    "claim_amount": input.claim_amount.to_string(),
                })),
            ),
        )
        .await?;
        tx.commit().await?;

        info!(
            claim_id = id,
            %claim_number,
            policy_id = input.policy_id,
            %status,
            "Claim created"
        );

        Ok(Claim {
            id,
            policy_id: input.policy_id,
            claim_number,
            claim_date: input.claim_date,
            incident_date: input.incident_date,
            incident_time: input.incident_time,
            incident_location: input.incident_location,
            description: input.description,
            claim_amount: input.claim_amount,
            status,
            created_at: now,
            updated_at: now,
        })
    }

    async fn set_status(
        &self,
        actor: &Actor,
        id: i64,
        status: ClaimStatus,
    ) -> Result<Claim, DbError> {
        let _writer = self.pool.lock_writer().await;
        let mut conn = self.pool.acquire().await?;
        let mut tx = conn.begin_write().await?;

        let mut row = fetch_row(&mut tx, id).await?;
        let previous = row.status.clone();
        if let Some(from) = previous.as_deref().and_then(|s| s.parse::<ClaimStatus>().ok()) {
            if !from.can_transition_to(status) {
                warn!(
                    claim_id = id,
                    from = %from,
                    to = %status,
                    "Claim status moved outside the forward workflow"
                );
            }
        }

        let now = Utc::now();
        sqlx::query("UPDATE claims SET status = ?, updated_at = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(now)
            .bind(id)
            .execute(&mut *tx)
            .await?;

        audit::append(
            &mut *tx,
            audit::entry(
                actor,
                AuditAction::Update,
                "claims",
                id,
                Some(serde_json::json!({
                    "status": { "from": previous, "to": status.as_str() },
                })),
            ),
        )
        .await?;
        tx.commit().await?;

        info!(claim_id = id, %status, "Claim status updated");

        row.status = Some(status.as_str().into());
        row.updated_at = now;
        row.try_into_claim()
    }

    /// Repair any NULL statuses among `rows` and convert them.
    ///
    /// Call only after the reading connection has been released: the
    /// writer lock is always taken before a connection.
    async fn into_claims(
        &self,
        actor: &Actor,
        mut rows: Vec<ClaimRow>,
    ) -> Result<Vec<Claim>, DbError> {
        if rows.iter().any(|r| r.status.is_none()) {
            let _writer = self.pool.lock_writer().await;
            let mut conn = self.pool.acquire().await?;
            for row in rows.iter_mut().filter(|r| r.status.is_none()) {
                heal_status(&mut conn, actor, row).await?;
            }
        }
        rows.into_iter().map(ClaimRow::try_into_claim).collect()
    }

    async fn fetch_one(&self, actor: &Actor, id: i64) -> Result<Claim, DbError> {
        let row = {
            let mut conn = self.pool.acquire().await?;
            fetch_row(&mut conn, id).await?
        };
        self.into_claims(actor, vec![row])
            .await?
            .pop()
            .ok_or_else(|| DbError::not_found("claim", id))
    }

    async fn fetch_by_number(&self, actor: &Actor, claim_number: &str) -> Result<Claim, DbError> {
        let row = {
            let mut conn = self.pool.acquire().await?;
            sqlx::query_as::<_, ClaimRow>("SELECT * FROM claims WHERE claim_number = ?")
                .bind(claim_number.trim())
                .fetch_optional(&mut *conn)
                .await?
                .ok_or_else(|| DbError::not_found("claim", claim_number))?
        };
        self.into_claims(actor, vec![row])
            .await?
            .pop()
            .ok_or_else(|| DbError::not_found("claim", claim_number))
    }

    async fn fetch_many(&self, actor: &Actor, filter: ClaimFilter) -> Result<Vec<Claim>, DbError> {
        let rows = self.fetch_rows(filter).await?;
        self.into_claims(actor, rows).await
    }

    async fn fetch_rows(&self, filter: ClaimFilter) -> Result<Vec<ClaimRow>, DbError> {
        let mut conn = self.pool.acquire().await?;
        let rows = match filter {
            ClaimFilter::All => {
                sqlx::query_as::<_, ClaimRow>("SELECT * FROM claims ORDER BY id")
                    .fetch_all(&mut *conn)
                    .await?
            }
            ClaimFilter::Status(ClaimStatus::Pending) => {
                sqlx::query_as::<_, ClaimRow>(
                    "SELECT * FROM claims WHERE status = ? OR status IS NULL ORDER BY id",
                )
                .bind(ClaimStatus::Pending.as_str())
                .fetch_all(&mut *conn)
                .await?
            }
            ClaimFilter::Status(status) => {
                sqlx::query_as::<_, ClaimRow>("SELECT * FROM claims WHERE status = ? ORDER BY id")
                    .bind(status.as_str())
                    .fetch_all(&mut *conn)
                    .await?
            }
            ClaimFilter::Policy(policy_id) => {
                sqlx::query_as::<_, ClaimRow>(
                    "SELECT * FROM claims WHERE policy_id = ? ORDER BY id",
                )
                .bind(policy_id)
                .fetch_all(&mut *conn)
                .await?
            }
        };
        Ok(rows)
    }

    async fn insert_payment(
        &self,
        actor: &Actor,
        claim_id: i64,
        amount: Decimal,
        payment_date: NaiveDate,
    ) -> Result<Payment, DbError> {
        let _writer = self.pool.lock_writer().await;
        let mut conn = self.pool.acquire().await?;
        let mut tx = conn.begin_write().await?;

        let row = fetch_row(&mut tx, claim_id).await?;
        let claim_amount: Decimal = parse_column("claims.claim_amount", &row.claim_amount)?;
        if amount > claim_amount {
            warn!(
                claim_id,
                %amount,
                %claim_amount,
                "Payout exceeds the claimed amount"
            );
        }

        let payment = payment::insert(
            &mut tx,
            actor,
            PaymentTarget::Claim(claim_id),
            amount,
            payment_date,
        )
        .await?;
        tx.commit().await?;
        Ok(payment)
    }
}

#[derive(Debug, Clone, Copy)]
enum ClaimFilter {
    All,
    Status(ClaimStatus),
    Policy(i64),
}

impl ClaimRepository for SqliteClaimRepository {
    async fn next_claim_number(&self) -> ClaimdeskResult<String> {
        let mut conn = self.pool.acquire().await?;
        Ok(next_claim_number(highest_sequence(&mut conn).await?))
    }

    async fn create(&self, actor: &Actor, input: CreateClaim) -> ClaimdeskResult<Claim> {
        authorize(actor, Role::Adjuster)?;
        input.validate()?;
        Ok(self.insert(actor, input).await?)
    }

    async fn update_status(
        &self,
        actor: &Actor,
        id: i64,
        status: ClaimStatus,
    ) -> ClaimdeskResult<Claim> {
        authorize(actor, Role::ClaimsManager)?;
        Ok(self.set_status(actor, id, status).await?)
    }

    async fn get(&self, actor: &Actor, id: i64) -> ClaimdeskResult<Claim> {
        authorize(actor, Role::User)?;
        Ok(self.fetch_one(actor, id).await?)
    }

    async fn get_by_number(&self, actor: &Actor, claim_number: &str) -> ClaimdeskResult<Claim> {
        authorize(actor, Role::User)?;
        Ok(self.fetch_by_number(actor, claim_number).await?)
    }

    async fn list(&self, actor: &Actor) -> ClaimdeskResult<Vec<Claim>> {
        authorize(actor, Role::User)?;
        Ok(self.fetch_many(actor, ClaimFilter::All).await?)
    }

    async fn list_by_status(
        &self,
        actor: &Actor,
        status: ClaimStatus,
    ) -> ClaimdeskResult<Vec<Claim>> {
        authorize(actor, Role::User)?;
        Ok(self.fetch_many(actor, ClaimFilter::Status(status)).await?)
    }

    async fn list_for_policy(&self, actor: &Actor, policy_id: i64) -> ClaimdeskResult<Vec<Claim>> {
        authorize(actor, Role::User)?;
        Ok(self.fetch_many(actor, ClaimFilter::Policy(policy_id)).await?)
    }

    async fn record_payment(
        &self,
        actor: &Actor,
        claim_id: i64,
        amount: Decimal,
        payment_date: NaiveDate,
    ) -> ClaimdeskResult<Payment> {
        authorize(actor, Role::ClaimsManager)?;
        validate_payment_amount(amount)?;
        Ok(self
            .insert_payment(actor, claim_id, amount, payment_date)
            .await?)
    }
}
