//! SQLite implementation of [`PaymentRepository`] (read side) and the
//! insert helper the policy and claim repositories record payments with.
//!
//! Amounts are summed as [`Decimal`] in Rust; SQLite's `SUM` over TEXT
//! would go through binary floating point.

use chrono::{DateTime, NaiveDate, Utc};
use claimdesk_core::access::authorize;
use claimdesk_core::error::ClaimdeskResult;
use claimdesk_core::models::audit::AuditAction;
use claimdesk_core::models::payment::{Payment, PaymentStatus, PaymentTarget};
use claimdesk_core::models::user::{Actor, Role};
use claimdesk_core::repository::PaymentRepository;
use rust_decimal::Decimal;
use sqlx::sqlite::SqliteConnection;
use tracing::info;

use super::{audit, parse_column};
use crate::connection::ConnectionPool;
use crate::error::DbError;

#[derive(Debug, sqlx::FromRow)]
struct PaymentRow {
    id: i64,
    policy_id: Option<i64>,
    claim_id: Option<i64>,
    amount: String,
    payment_date: NaiveDate,
    status: String,
    created_at: DateTime<Utc>,
}

impl PaymentRow {
    fn try_into_payment(self) -> Result<Payment, DbError> {
        let target = match (self.policy_id, self.claim_id) {
            (Some(policy_id), None) => PaymentTarget::Policy(policy_id),
            (None, Some(claim_id)) => PaymentTarget::Claim(claim_id),
            _ => {
                return Err(DbError::Corrupt(format!(
                    "payment {} must reference exactly one of policy or claim",
                    self.id
                )));
            }
        };
        Ok(Payment {
            id: self.id,
            target,
            amount: parse_column("payments.amount", &self.amount)?,
            payment_date: self.payment_date,
            status: parse_column("payments.status", &self.status)?,
            created_at: self.created_at,
        })
    }
}

/// Insert a completed payment and its audit entry on `conn`, which the
/// caller has opened a transaction on.
pub(crate) async fn insert(
    conn: &mut SqliteConnection,
    actor: &Actor,
    target: PaymentTarget,
    amount: Decimal,
    payment_date: NaiveDate,
) -> Result<Payment, DbError> {
    let (policy_id, claim_id) = match target {
        PaymentTarget::Policy(id) => (Some(id), None),
        PaymentTarget::Claim(id) => (None, Some(id)),
    };
    let status = PaymentStatus::Completed;
    let now = Utc::now();

    let id = sqlx::query(
        "INSERT INTO payments \
         (policy_id, claim_id, amount, payment_date, status, created_at) \
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(policy_id)
    .bind(claim_id)
    .bind(amount.to_string())
    .bind(payment_date)
    .bind(status.as_str())
    .bind(now)
    .execute(&mut *conn)
    .await?
    .last_insert_rowid();

    audit::append(
        conn,
        audit::entry(
            actor,
            AuditAction::Create,
            "payments",
            id,
            Some(serde_json::json!({
                "target": target,
                "amount": amount.to_string(),
                "payment_date": payment_date,
            })),
        ),
    )
    .await?;

    info!(payment_id = id, ?target, %amount, "Payment recorded");

    Ok(Payment {
        id,
        target,
        amount,
        payment_date,
        status,
        created_at: now,
    })
}

/// Read side of the payments table.
#[derive(Debug, Clone)]
pub struct SqlitePaymentRepository {
    pool: ConnectionPool,
}

impl SqlitePaymentRepository {
    pub fn new(pool: ConnectionPool) -> Self {
        Self { pool }
    }

    async fn fetch_where(&self, column: &str, id: i64) -> Result<Vec<Payment>, DbError> {
        let sql = format!(
            "SELECT * FROM payments WHERE {column} = ? ORDER BY payment_date, id"
        );
        let mut conn = self.pool.acquire().await?;
        sqlx::query_as::<_, PaymentRow>(&sql)
            .bind(id)
            .fetch_all(&mut *conn)
            .await?
            .into_iter()
            .map(PaymentRow::try_into_payment)
            .collect()
    }
}

fn completed_total(payments: &[Payment]) -> Decimal {
    payments
        .iter()
        .filter(|p| p.status == PaymentStatus::Completed)
        .map(|p| p.amount)
        .sum()
}

impl PaymentRepository for SqlitePaymentRepository {
    async fn get(&self, actor: &Actor, id: i64) -> ClaimdeskResult<Payment> {
        authorize(actor, Role::User)?;
        let mut conn = self.pool.acquire().await?;
        let row = sqlx::query_as::<_, PaymentRow>("SELECT * FROM payments WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *conn)
            .await
            .map_err(DbError::from)?
            .ok_or_else(|| DbError::not_found("payment", id))?;
        Ok(row.try_into_payment()?)
    }

    async fn list_for_policy(
        &self,
        actor: &Actor,
        policy_id: i64,
    ) -> ClaimdeskResult<Vec<Payment>> {
        authorize(actor, Role::User)?;
        Ok(self.fetch_where("policy_id", policy_id).await?)
    }

    async fn list_for_claim(&self, actor: &Actor, claim_id: i64) -> ClaimdeskResult<Vec<Payment>> {
        authorize(actor, Role::User)?;
        Ok(self.fetch_where("claim_id", claim_id).await?)
    }

    async fn total_for_policy(&self, actor: &Actor, policy_id: i64) -> ClaimdeskResult<Decimal> {
        authorize(actor, Role::User)?;
        let payments = self.fetch_where("policy_id", policy_id).await?;
        Ok(completed_total(&payments))
    }

    async fn total_for_claim(&self, actor: &Actor, claim_id: i64) -> ClaimdeskResult<Decimal> {
        authorize(actor, Role::User)?;
        let payments = self.fetch_where("claim_id", claim_id).await?;
        Ok(completed_total(&payments))
    }
}
