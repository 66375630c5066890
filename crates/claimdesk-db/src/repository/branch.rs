//! SQLite implementation of [`BranchRepository`].

use chrono::{DateTime, Utc};
use claimdesk_core::access::authorize;
use claimdesk_core::error::{ClaimdeskError, ClaimdeskResult};
use claimdesk_core::models::audit::AuditAction;
use claimdesk_core::models::branch::{Branch, CreateBranch};
use claimdesk_core::models::user::{Actor, Role};
use claimdesk_core::repository::BranchRepository;
use tracing::info;

use super::audit;
use crate::connection::ConnectionPool;
use crate::error::DbError;

#[derive(Debug, sqlx::FromRow)]
struct BranchRow {
    id: i64,
    name: String,
    address: Option<String>,
    phone: Option<String>,
    email: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<BranchRow> for Branch {
    fn from(row: BranchRow) -> Self {
        Branch {
            id: row.id,
            name: row.name,
            address: row.address,
            phone: row.phone,
            email: row.email,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SqliteBranchRepository {
    pool: ConnectionPool,
}

impl SqliteBranchRepository {
    pub fn new(pool: ConnectionPool) -> Self {
        Self { pool }
    }

    async fn insert(&self, actor: &Actor, input: CreateBranch) -> Result<Branch, DbError> {
        let _writer = self.pool.lock_writer().await;
        let mut conn = self.pool.acquire().await?;
        let mut tx = conn.begin_write().await?;

        let now = Utc::now();
        let id = sqlx::query(
            "INSERT INTO branches (name, address, phone, email, created_at) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&input.name)
        .bind(&input.address)
        .bind(&input.phone)
        .bind(&input.email)
        .bind(now)
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();

        audit::append(
            &mut *tx,
            audit::entry(actor, AuditAction::Create, "branches", id, None),
        )
        .await?;
        tx.commit().await?;

        info!(branch_id = id, name = %input.name, "Branch created");

        Ok(Branch {
            id,
            name: input.name,
            address: input.address,
            phone: input.phone,
            email: input.email,
            created_at: now,
        })
    }
}

impl BranchRepository for SqliteBranchRepository {
    async fn create(&self, actor: &Actor, input: CreateBranch) -> ClaimdeskResult<Branch> {
        authorize(actor, Role::Admin)?;
        if input.name.trim().is_empty() {
            return Err(ClaimdeskError::validation("branch name is required"));
        }
        Ok(self.insert(actor, input).await?)
    }

    async fn get(&self, actor: &Actor, id: i64) -> ClaimdeskResult<Branch> {
        authorize(actor, Role::User)?;
        let mut conn = self.pool.acquire().await?;
        let row = sqlx::query_as::<_, BranchRow>("SELECT * FROM branches WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *conn)
            .await
            .map_err(DbError::from)?
            .ok_or_else(|| DbError::not_found("branch", id))?;
        Ok(row.into())
    }

    async fn list(&self, actor: &Actor) -> ClaimdeskResult<Vec<Branch>> {
        authorize(actor, Role::User)?;
        let mut conn = self.pool.acquire().await?;
        let rows = sqlx::query_as::<_, BranchRow>("SELECT * FROM branches ORDER BY name")
            .fetch_all(&mut *conn)
            .await
            .map_err(DbError::from)?;
        Ok(rows.into_iter().map(Branch::from).collect())
    }
}
