//! SQLite implementation of [`UserRepository`].
//!
//! Passwords are hashed with Argon2id (see [`claimdesk_auth::password`])
//! before they reach storage; the plaintext is never persisted.

use chrono::{DateTime, Utc};
use claimdesk_auth::AuthConfig;
use claimdesk_auth::password::{check_strength, hash_password};
use claimdesk_core::access::authorize;
use claimdesk_core::error::{ClaimdeskError, ClaimdeskResult};
use claimdesk_core::models::audit::AuditAction;
use claimdesk_core::models::user::{Actor, CreateUser, Role, User};
use claimdesk_core::repository::UserRepository;
use tracing::info;

use super::{audit, parse_column};
use crate::connection::ConnectionPool;
use crate::error::DbError;

#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: i64,
    username: String,
    password_hash: String,
    role: String,
    branch_id: Option<i64>,
    created_at: DateTime<Utc>,
}

impl UserRow {
    fn try_into_user(self) -> Result<User, DbError> {
        Ok(User {
            id: self.id,
            username: self.username,
            password_hash: self.password_hash,
            role: parse_column("users.role", &self.role)?,
            branch_id: self.branch_id,
            created_at: self.created_at,
        })
    }
}

/// SQLite implementation of the User repository.
#[derive(Debug, Clone)]
pub struct SqliteUserRepository {
    pool: ConnectionPool,
    /// Pepper and minimum password length.
    config: AuthConfig,
}

impl SqliteUserRepository {
    pub fn new(pool: ConnectionPool, config: AuthConfig) -> Self {
        Self { pool, config }
    }

    async fn insert(
        &self,
        actor: &Actor,
        username: String,
        password_hash: String,
        role: Role,
        branch_id: Option<i64>,
    ) -> Result<User, DbError> {
        let _writer = self.pool.lock_writer().await;
        let mut conn = self.pool.acquire().await?;
        let mut tx = conn.begin_write().await?;

        if let Some(branch_id) = branch_id {
            let exists: Option<i64> = sqlx::query_scalar("SELECT id FROM branches WHERE id = ?")
                .bind(branch_id)
                .fetch_optional(&mut *tx)
                .await?;
            if exists.is_none() {
                return Err(DbError::not_found("branch", branch_id));
            }
        }

        let now = Utc::now();
        let id = sqlx::query(
            "INSERT INTO users (username, password_hash, role, branch_id, created_at) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&username)
        .bind(&password_hash)
        .bind(role.as_str())
        .bind(branch_id)
        .bind(now)
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();

        audit::append(
            &mut *tx,
            audit::entry(
                actor,
                AuditAction::Create,
                "users",
                id,
                Some(serde_json::json!({ "username": &username, "role": role.as_str() })),
            ),
        )
        .await?;
        tx.commit().await?;

        info!(user_id = id, %role, "User created");

        Ok(User {
            id,
            username,
            password_hash,
            role,
            branch_id,
            created_at: now,
        })
    }

    async fn fetch_by_username(&self, username: &str) -> Result<User, DbError> {
        let mut conn = self.pool.acquire().await?;
        sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE username = ?")
            .bind(username)
            .fetch_optional(&mut *conn)
            .await?
            .ok_or_else(|| DbError::not_found("user", username))?
            .try_into_user()
    }

    async fn fetch_by_id(&self, id: i64) -> Result<User, DbError> {
        let mut conn = self.pool.acquire().await?;
        sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?
            .ok_or_else(|| DbError::not_found("user", id))?
            .try_into_user()
    }

    async fn fetch_all(&self) -> Result<Vec<User>, DbError> {
        let mut conn = self.pool.acquire().await?;
        sqlx::query_as::<_, UserRow>("SELECT * FROM users ORDER BY username")
            .fetch_all(&mut *conn)
            .await?
            .into_iter()
            .map(UserRow::try_into_user)
            .collect()
    }
}

impl UserRepository for SqliteUserRepository {
    async fn create(&self, actor: &Actor, input: CreateUser) -> ClaimdeskResult<User> {
        authorize(actor, Role::Admin)?;

        let username = input.username.trim().to_string();
        if username.is_empty() {
            return Err(ClaimdeskError::validation("username is required"));
        }
        check_strength(&input.password, self.config.min_password_length)?;
        let password_hash = hash_password(&input.password, self.config.pepper.as_deref())?;

        Ok(self
            .insert(actor, username, password_hash, input.role, input.branch_id)
            .await?)
    }

    async fn get_by_username(&self, username: &str) -> ClaimdeskResult<User> {
        Ok(self.fetch_by_username(username).await?)
    }

    async fn get_by_id(&self, id: i64) -> ClaimdeskResult<User> {
        Ok(self.fetch_by_id(id).await?)
    }

    async fn list(&self, actor: &Actor) -> ClaimdeskResult<Vec<User>> {
        authorize(actor, Role::User)?;
        Ok(self.fetch_all().await?)
    }

    async fn count(&self) -> ClaimdeskResult<u64> {
        let mut conn = self.pool.acquire().await?;
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&mut *conn)
            .await
            .map_err(DbError::from)?;
        Ok(total.max(0) as u64)
    }
}
