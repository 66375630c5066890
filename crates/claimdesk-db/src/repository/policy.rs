//! SQLite implementation of [`PolicyRepository`].

use chrono::{DateTime, NaiveDate, Utc};
use claimdesk_core::access::authorize;
use claimdesk_core::error::ClaimdeskResult;
use claimdesk_core::models::audit::AuditAction;
use claimdesk_core::models::payment::{Payment, PaymentTarget, validate_payment_amount};
use claimdesk_core::models::policy::{CreatePolicy, Policy, PolicyStatus, UpdatePolicyDetails};
use claimdesk_core::models::user::{Actor, Role};
use claimdesk_core::repository::PolicyRepository;
use rust_decimal::Decimal;
use sqlx::sqlite::SqliteConnection;
use tracing::{info, warn};

use super::{audit, parse_column, payment};
use crate::connection::ConnectionPool;
use crate::error::DbError;

#[derive(Debug, sqlx::FromRow)]
struct PolicyRow {
    id: i64,
    customer_id: i64,
    policy_type: String,
    policy_number: String,
    start_date: NaiveDate,
    end_date: NaiveDate,
    premium: String,
    coverage_limit: String,
    status: String,
    payment_schedule: Option<String>,
    beneficiary_info: Option<String>,
    exclusions: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl PolicyRow {
    fn try_into_policy(self) -> Result<Policy, DbError> {
        Ok(Policy {
            id: self.id,
            customer_id: self.customer_id,
            policy_type: parse_column("policies.policy_type", &self.policy_type)?,
            policy_number: self.policy_number,
            start_date: self.start_date,
            end_date: self.end_date,
            premium: parse_column("policies.premium", &self.premium)?,
            coverage_limit: parse_column("policies.coverage_limit", &self.coverage_limit)?,
            status: parse_column("policies.status", &self.status)?,
            payment_schedule: self.payment_schedule,
            beneficiary_info: self.beneficiary_info,
            exclusions: self.exclusions,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

pub(crate) async fn fetch_policy(conn: &mut SqliteConnection, id: i64) -> Result<Policy, DbError> {
    sqlx::query_as::<_, PolicyRow>("SELECT * FROM policies WHERE id = ?")
        .bind(id)
        .fetch_optional(conn)
        .await?
        .ok_or_else(|| DbError::not_found("policy", id))?
        .try_into_policy()
}

async fn customer_exists(conn: &mut SqliteConnection, id: i64) -> Result<bool, DbError> {
    let found: Option<i64> = sqlx::query_scalar("SELECT id FROM customers WHERE id = ?")
        .bind(id)
        .fetch_optional(conn)
        .await?;
    Ok(found.is_some())
}

/// SQLite implementation of the Policy repository.
#[derive(Debug, Clone)]
pub struct SqlitePolicyRepository {
    pool: ConnectionPool,
}

impl SqlitePolicyRepository {
    pub fn new(pool: ConnectionPool) -> Self {
        Self { pool }
    }

    async fn insert(&self, actor: &Actor, input: CreatePolicy) -> Result<Policy, DbError> {
        let _writer = self.pool.lock_writer().await;
        let mut conn = self.pool.acquire().await?;
        let mut tx = conn.begin_write().await?;

        if !customer_exists(&mut tx, input.customer_id).await? {
            return Err(DbError::not_found("customer", input.customer_id));
        }

        let now = Utc::now();
        let status = input.status.unwrap_or_default();
        let policy_number = input.policy_number.trim().to_string();

        let id = sqlx::query(
            "INSERT INTO policies \
             (customer_id, policy_type, policy_number, start_date, end_date, \
              premium, coverage_limit, status, payment_schedule, \
              beneficiary_info, exclusions, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(input.customer_id)
        .bind(input.policy_type.as_str())
        .bind(&policy_number)
        .bind(input.start_date)
        .bind(input.end_date)
        .bind(input.premium.to_string())
        .bind(input.coverage_limit.to_string())
        .bind(status.as_str())
        .bind(&input.payment_schedule)
        .bind(&input.beneficiary_info)
        .bind(&input.exclusions)
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
                "policies",
                id,
                Some(serde_json::json!({
                    "customer_id": input.customer_id,
                    "policy_number": &policy_number,
                    "policy_type": input.policy_type.as_str(),
                })),
            ),
        )
        .await?;
        tx.commit().await?;

        info!(
            policy_id = id,
            customer_id = input.customer_id,
            policy_type = %input.policy_type,
            "Policy created"
        );

        Ok(Policy {
            id,
            customer_id: input.customer_id,
            policy_type: input.policy_type,
            policy_number,
            start_date: input.start_date,
            end_date: input.end_date,
            premium: input.premium,
            coverage_limit: input.coverage_limit,
            status,
            payment_schedule: input.payment_schedule,
            beneficiary_info: input.beneficiary_info,
            exclusions: input.exclusions,
            created_at: now,
            updated_at: now,
        })
    }

    async fn apply_details(
        &self,
        actor: &Actor,
        id: i64,
        input: UpdatePolicyDetails,
    ) -> Result<Policy, DbError> {
        let _writer = self.pool.lock_writer().await;
        let mut conn = self.pool.acquire().await?;
        let mut tx = conn.begin_write().await?;

        let current = fetch_policy(&mut tx, id).await?;
        let mut details = serde_json::Map::new();
        if let Some(premium) = input.premium {
            details.insert(
                "premium".into(),
                serde_json::json!({
                    "from": current.premium.to_string(),
                    "to": premium.to_string(),
                }),
            );
        }
        if let Some(limit) = input.coverage_limit {
            details.insert(
                "coverage_limit".into(),
                serde_json::json!({
                    "from": current.coverage_limit.to_string(),
                    "to": limit.to_string(),
                }),
            );
        }

        let updated = Policy {
            premium: input.premium.unwrap_or(current.premium),
            coverage_limit: input.coverage_limit.unwrap_or(current.coverage_limit),
            updated_at: Utc::now(),
            ..current
        };

        sqlx::query(
            "UPDATE policies SET premium = ?, coverage_limit = ?, updated_at = ? \
             WHERE id = ?",
        )
        .bind(updated.premium.to_string())
        .bind(updated.coverage_limit.to_string())
        .bind(updated.updated_at)
        .bind(id)
        .execute(&mut *tx)
        .await?;

        audit::append(
            &mut *tx,
            audit::entry(
                actor,
                AuditAction::Update,
                "policies",
                id,
                Some(serde_json::Value::Object(details)),
            ),
        )
        .await?;
        tx.commit().await?;

        info!(policy_id = id, "Policy details updated");
        Ok(updated)
    }

    async fn fetch_one(&self, id: i64) -> Result<Policy, DbError> {
        let mut conn = self.pool.acquire().await?;
        fetch_policy(&mut conn, id).await
    }

    async fn fetch_many(&self, customer_id: Option<i64>) -> Result<Vec<Policy>, DbError> {
        let mut conn = self.pool.acquire().await?;
        let rows = match customer_id {
            Some(customer_id) => {
                sqlx::query_as::<_, PolicyRow>(
                    "SELECT * FROM policies WHERE customer_id = ? ORDER BY start_date, id",
                )
                .bind(customer_id)
                .fetch_all(&mut *conn)
                .await?
            }
            None => {
                sqlx::query_as::<_, PolicyRow>("SELECT * FROM policies ORDER BY id")
                    .fetch_all(&mut *conn)
                    .await?
            }
        };
        rows.into_iter().map(PolicyRow::try_into_policy).collect()
    }

    async fn insert_payment(
        &self,
        actor: &Actor,
        policy_id: i64,
        amount: Decimal,
        payment_date: NaiveDate,
    ) -> Result<Payment, DbError> {
        let _writer = self.pool.lock_writer().await;
        let mut conn = self.pool.acquire().await?;
        let mut tx = conn.begin_write().await?;

        let policy = fetch_policy(&mut tx, policy_id).await?;
        if policy.status != PolicyStatus::Active {
            warn!(
                policy_id,
                status = %policy.status,
                "Recording payment against a policy that is not active"
            );
        }

        let payment = payment::insert(
            &mut tx,
            actor,
            PaymentTarget::Policy(policy_id),
            amount,
            payment_date,
        )
        .await?;
        tx.commit().await?;
        Ok(payment)
    }
}

impl PolicyRepository for SqlitePolicyRepository {
    async fn create(&self, actor: &Actor, input: CreatePolicy) -> ClaimdeskResult<Policy> {
        authorize(actor, Role::ClaimsManager)?;
        input.validate()?;
        Ok(self.insert(actor, input).await?)
    }

    async fn update_details(
        &self,
        actor: &Actor,
        id: i64,
        input: UpdatePolicyDetails,
    ) -> ClaimdeskResult<Policy> {
        authorize(actor, Role::ClaimsManager)?;
        input.validate()?;
        if input.is_empty() {
            return Ok(self.fetch_one(id).await?);
        }
        Ok(self.apply_details(actor, id, input).await?)
    }

    async fn get(&self, actor: &Actor, id: i64) -> ClaimdeskResult<Policy> {
        authorize(actor, Role::User)?;
        Ok(self.fetch_one(id).await?)
    }

    async fn list_for_customer(
        &self,
        actor: &Actor,
        customer_id: i64,
    ) -> ClaimdeskResult<Vec<Policy>> {
        authorize(actor, Role::User)?;
        Ok(self.fetch_many(Some(customer_id)).await?)
    }

    async fn list(&self, actor: &Actor) -> ClaimdeskResult<Vec<Policy>> {
        authorize(actor, Role::User)?;
        Ok(self.fetch_many(None).await?)
    }

    async fn record_payment(
        &self,
        actor: &Actor,
        policy_id: i64,
        amount: Decimal,
        payment_date: NaiveDate,
    ) -> ClaimdeskResult<Payment> {
        authorize(actor, Role::ClaimsManager)?;
        validate_payment_amount(amount)?;
        Ok(self
            .insert_payment(actor, policy_id, amount, payment_date)
            .await?)
    }
}
