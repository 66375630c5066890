//! SQLite implementation of [`CustomerRepository`].
//!
//! The national identifier is encrypted with the repository's
//! [`FieldCipher`] before it is written and decrypted on `get`. Listings
//! never carry it, so only single-record reads disclose it, and each such
//! disclosure is audited as a `view`.

use chrono::{DateTime, NaiveDate, Utc};
use claimdesk_auth::FieldCipher;
use claimdesk_core::access::authorize;
use claimdesk_core::error::ClaimdeskResult;
use claimdesk_core::models::audit::AuditAction;
use claimdesk_core::models::customer::{
    CreateCustomer, Customer, CustomerFilter, UpdateCustomer,
};
use claimdesk_core::models::user::{Actor, Role};
use claimdesk_core::repository::CustomerRepository;
use sqlx::sqlite::SqliteConnection;
use tracing::{info, warn};

use super::audit;
use crate::connection::ConnectionPool;
use crate::error::DbError;

#[derive(Debug, Clone, sqlx::FromRow)]
struct CustomerRow {
    id: i64,
    first_name: String,
    last_name: String,
    email: String,
    phone: Option<String>,
    address: Option<String>,
    date_of_birth: Option<NaiveDate>,
    ssn_encrypted: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl CustomerRow {
    /// Convert without disclosing the national identifier.
    fn into_masked(self) -> Customer {
        Customer {
            id: self.id,
            first_name: self.first_name,
            last_name: self.last_name,
            email: self.email,
            phone: self.phone,
            address: self.address,
            date_of_birth: self.date_of_birth,
            national_id: None,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

async fn fetch_row(conn: &mut SqliteConnection, id: i64) -> Result<CustomerRow, DbError> {
    sqlx::query_as::<_, CustomerRow>("SELECT * FROM customers WHERE id = ?")
        .bind(id)
        .fetch_optional(conn)
        .await?
        .ok_or_else(|| DbError::not_found("customer", id))
}

/// Names of the fields an update touches, for the audit details.
fn changed_fields(input: &UpdateCustomer) -> Vec<&'static str> {
    let mut fields = Vec::new();
    if input.first_name.is_some() {
        fields.push("first_name");
    }
    if input.last_name.is_some() {
        fields.push("last_name");
    }
    if input.email.is_some() {
        fields.push("email");
    }
    if input.phone.is_some() {
        fields.push("phone");
    }
    if input.address.is_some() {
        fields.push("address");
    }
    if input.date_of_birth.is_some() {
        fields.push("date_of_birth");
    }
    if input.national_id.is_some() {
        fields.push("national_id");
    }
    fields
}

/// SQLite implementation of the Customer repository.
#[derive(Debug, Clone)]
pub struct SqliteCustomerRepository {
    pool: ConnectionPool,
    cipher: FieldCipher,
}

impl SqliteCustomerRepository {
    pub fn new(pool: ConnectionPool, cipher: FieldCipher) -> Self {
        Self { pool, cipher }
    }

    async fn insert(
        &self,
        actor: &Actor,
        input: CreateCustomer,
        ssn_encrypted: Option<String>,
    ) -> Result<CustomerRow, DbError> {
        let _writer = self.pool.lock_writer().await;
        let mut conn = self.pool.acquire().await?;
        let mut tx = conn.begin_write().await?;

        let now = Utc::now();
        let row = CustomerRow {
            id: 0,
            first_name: input.first_name.trim().to_string(),
            last_name: input.last_name.trim().to_string(),
            email: input.email.trim().to_string(),
            phone: input.phone,
            address: input.address,
            date_of_birth: input.date_of_birth,
            ssn_encrypted,
            created_at: now,
            updated_at: now,
        };

        let id = sqlx::query(
            "INSERT INTO customers \
             (first_name, last_name, email, phone, address, date_of_birth, \
              ssn_encrypted, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&row.first_name)
        .bind(&row.last_name)
        .bind(&row.email)
        .bind(&row.phone)
        .bind(&row.address)
        .bind(row.date_of_birth)
        .bind(&row.ssn_encrypted)
        .bind(row.created_at)
        .bind(row.updated_at)
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();

        audit::append(
            &mut *tx,
            audit::entry(
                actor,
                AuditAction::Create,
                "customers",
                id,
                Some(serde_json::json!({ "email": &row.email })),
            ),
        )
        .await?;
        tx.commit().await?;

        info!(customer_id = id, "Customer created");
        Ok(CustomerRow { id, ..row })
    }

    /// Read one customer and, when a national identifier is stored, record
    /// its disclosure.
    ///
    /// The audit insert is a write, so it runs under the writer lock on a
    /// fresh connection once the reading one is back in the pool.
    async fn fetch_disclosing(&self, actor: &Actor, id: i64) -> Result<CustomerRow, DbError> {
        let row = {
            let mut conn = self.pool.acquire().await?;
            fetch_row(&mut conn, id).await?
        };
        if row.ssn_encrypted.is_some() {
            let _writer = self.pool.lock_writer().await;
            let mut conn = self.pool.acquire().await?;
            audit::append(
                &mut conn,
                audit::entry(
                    actor,
                    AuditAction::View,
                    "customers",
                    id,
                    Some(serde_json::json!({ "field": "national_id" })),
                ),
            )
            .await?;
        }
        Ok(row)
    }

    async fn fetch_all(&self, filter: Option<CustomerFilter>) -> Result<Vec<CustomerRow>, DbError> {
        let sql = match filter {
            None => "SELECT * FROM customers c ORDER BY c.last_name, c.first_name, c.id",
            Some(CustomerFilter::WithPolicies) => {
                "SELECT * FROM customers c \
                 WHERE EXISTS (SELECT 1 FROM policies p WHERE p.customer_id = c.id) \
                 ORDER BY c.last_name, c.first_name, c.id"
            }
            Some(CustomerFilter::WithoutPolicies) => {
                "SELECT * FROM customers c \
                 WHERE NOT EXISTS (SELECT 1 FROM policies p WHERE p.customer_id = c.id) \
                 ORDER BY c.last_name, c.first_name, c.id"
            }
        };
        let mut conn = self.pool.acquire().await?;
        Ok(sqlx::query_as::<_, CustomerRow>(sql)
            .fetch_all(&mut *conn)
            .await?)
    }

    async fn apply_update(
        &self,
        actor: &Actor,
        id: i64,
        input: UpdateCustomer,
        ssn_encrypted: Option<Option<String>>,
    ) -> Result<CustomerRow, DbError> {
        let _writer = self.pool.lock_writer().await;
        let mut conn = self.pool.acquire().await?;
        let mut tx = conn.begin_write().await?;

        let current = fetch_row(&mut tx, id).await?;
        let fields = changed_fields(&input);
        let row = CustomerRow {
            first_name: input
                .first_name
                .map(|v| v.trim().to_string())
                .unwrap_or(current.first_name),
            last_name: input
                .last_name
                .map(|v| v.trim().to_string())
                .unwrap_or(current.last_name),
            email: input
                .email
                .map(|v| v.trim().to_string())
                .unwrap_or(current.email),
            phone: input.phone.unwrap_or(current.phone),
            address: input.address.unwrap_or(current.address),
            date_of_birth: input.date_of_birth.unwrap_or(current.date_of_birth),
            ssn_encrypted: ssn_encrypted.unwrap_or(current.ssn_encrypted),
            updated_at: Utc::now(),
            ..current
        };

        sqlx::query(
            "UPDATE customers SET first_name = ?, last_name = ?, email = ?, \
             phone = ?, address = ?, date_of_birth = ?, ssn_encrypted = ?, \
             updated_at = ? WHERE id = ?",
        )
        .bind(&row.first_name)
        .bind(&row.last_name)
        .bind(&row.email)
        .bind(&row.phone)
        .bind(&row.address)
        .bind(row.date_of_birth)
        .bind(&row.ssn_encrypted)
        .bind(row.updated_at)
        .bind(id)
        .execute(&mut *tx)
        .await?;

        audit::append(
            &mut *tx,
            audit::entry(
                actor,
                AuditAction::Update,
                "customers",
                id,
                Some(serde_json::json!({ "fields": fields })),
            ),
        )
        .await?;
        tx.commit().await?;

        info!(customer_id = id, "Customer updated");
        Ok(row)
    }

    async fn remove(&self, actor: &Actor, id: i64) -> Result<(), DbError> {
        let _writer = self.pool.lock_writer().await;
        let mut conn = self.pool.acquire().await?;
        let mut tx = conn.begin_write().await?;

        let current = fetch_row(&mut tx, id).await?;
        let policies: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM policies WHERE customer_id = ?")
                .bind(id)
                .fetch_one(&mut *tx)
                .await?;
        if policies > 0 {
            warn!(customer_id = id, policies, "Refusing to delete customer with policies");
            return Err(DbError::Refused(format!(
                "customer {id} still owns {policies} policies"
            )));
        }

        sqlx::query("DELETE FROM customers WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        audit::append(
            &mut *tx,
            audit::entry(
                actor,
                AuditAction::Delete,
                "customers",
                id,
                Some(serde_json::json!({ "email": current.email })),
            ),
        )
        .await?;
        tx.commit().await?;

        info!(customer_id = id, "Customer deleted");
        Ok(())
    }

    fn decrypt(&self, row: CustomerRow) -> ClaimdeskResult<Customer> {
        let national_id = row
            .ssn_encrypted
            .as_deref()
            .map(|v| self.cipher.decrypt(v))
            .transpose()?;
        Ok(Customer {
            national_id,
            ..row.into_masked()
        })
    }

    fn encrypt(&self, national_id: Option<&str>) -> ClaimdeskResult<Option<String>> {
        Ok(national_id
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(|v| self.cipher.encrypt(v))
            .transpose()?)
    }
}

impl CustomerRepository for SqliteCustomerRepository {
    async fn create(&self, actor: &Actor, input: CreateCustomer) -> ClaimdeskResult<Customer> {
        authorize(actor, Role::ClaimsManager)?;
        input.validate()?;

        let ssn_encrypted = self.encrypt(input.national_id.as_deref())?;
        let national_id = ssn_encrypted.as_ref().and(input.national_id.clone());
        let row = self.insert(actor, input, ssn_encrypted).await?;
        Ok(Customer {
            national_id: national_id.map(|v| v.trim().to_string()),
            ..row.into_masked()
        })
    }

    async fn get(&self, actor: &Actor, id: i64) -> ClaimdeskResult<Customer> {
        authorize(actor, Role::User)?;
        let row = self.fetch_disclosing(actor, id).await?;
        self.decrypt(row)
    }

    async fn list(
        &self,
        actor: &Actor,
        filter: Option<CustomerFilter>,
    ) -> ClaimdeskResult<Vec<Customer>> {
        authorize(actor, Role::User)?;
        let rows = self.fetch_all(filter).await?;
        Ok(rows.into_iter().map(CustomerRow::into_masked).collect())
    }

    async fn update(
        &self,
        actor: &Actor,
        id: i64,
        input: UpdateCustomer,
    ) -> ClaimdeskResult<Customer> {
        authorize(actor, Role::ClaimsManager)?;
        input.validate()?;

        if input.is_empty() {
            let mut conn = self.pool.acquire().await?;
            return Ok(fetch_row(&mut conn, id).await?.into_masked());
        }

        let ssn_encrypted = match &input.national_id {
            Some(value) => Some(self.encrypt(value.as_deref())?),
            None => None,
        };
        let row = self.apply_update(actor, id, input, ssn_encrypted).await?;
        self.decrypt(row)
    }

    async fn delete(&self, actor: &Actor, id: i64) -> ClaimdeskResult<()> {
        authorize(actor, Role::Admin)?;
        Ok(self.remove(actor, id).await?)
    }
}
