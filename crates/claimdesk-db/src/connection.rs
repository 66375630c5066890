//! Fixed-size SQLite connection pool.
//!
//! The pool opens exactly `max_connections` connections up front and never
//! grows. [`ConnectionPool::acquire`] waits, in FIFO order and without a
//! timeout, until a connection is free; the returned [`PooledConnection`]
//! puts the connection back when it is dropped, so every exit path of a
//! repository operation releases it.

use std::ops::{Deref, DerefMut};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use sqlx::sqlite::{Sqlite, SqliteConnectOptions, SqliteConnection, SqliteJournalMode};
use sqlx::{Connection, Transaction};
use tokio::sync::{MutexGuard, OwnedSemaphorePermit, Semaphore};
use tracing::{debug, info, warn};

use crate::error::DbError;

/// Configuration for the SQLite store.
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Database file; created if missing.
    pub path: PathBuf,
    /// Number of pre-opened connections.
    pub max_connections: usize,
    /// How long SQLite waits on a locked database before failing a
    /// statement.
    pub busy_timeout_secs: u64,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("insurance.db"),
            max_connections: 5,
            busy_timeout_secs: 5,
        }
    }
}

struct PoolInner {
    idle: Mutex<Vec<SqliteConnection>>,
    permits: Arc<Semaphore>,
    capacity: usize,
    writer: tokio::sync::Mutex<()>,
}

impl PoolInner {
    fn checkin(&self, conn: SqliteConnection) {
        self.idle
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(conn);
    }
}

/// A bounded set of pre-opened connections. Cheap to clone; clones share
/// the same connections.
#[derive(Clone)]
pub struct ConnectionPool {
    inner: Arc<PoolInner>,
}

impl std::fmt::Debug for ConnectionPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionPool")
            .field("capacity", &self.inner.capacity)
            .field("available", &self.available())
            .finish()
    }
}

impl ConnectionPool {
    /// Open `config.max_connections` connections to the database file.
    ///
    /// Every connection has foreign keys enforced and uses WAL journaling
    /// so readers never block the writer.
    pub async fn connect(config: &DbConfig) -> Result<Self, DbError> {
        if config.max_connections == 0 {
            return Err(DbError::Config(
                "connection pool needs at least one connection".into(),
            ));
        }

        info!(
            path = %config.path.display(),
            connections = config.max_connections,
            "Opening SQLite connection pool"
        );

        let options = SqliteConnectOptions::new()
            .filename(&config.path)
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(config.busy_timeout_secs));

        let mut connections = Vec::with_capacity(config.max_connections);
        for _ in 0..config.max_connections {
            connections.push(SqliteConnection::connect_with(&options).await?);
        }

        Ok(Self {
            inner: Arc::new(PoolInner {
                idle: Mutex::new(connections),
                permits: Arc::new(Semaphore::new(config.max_connections)),
                capacity: config.max_connections,
                writer: tokio::sync::Mutex::new(()),
            }),
        })
    }

    /// Check out a connection, waiting until one is released if all are
    /// in use.
    pub async fn acquire(&self) -> Result<PooledConnection, DbError> {
        let permit = Arc::clone(&self.inner.permits)
            .acquire_owned()
            .await
            .map_err(|_| DbError::PoolClosed)?;

        let conn = self
            .inner
            .idle
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .pop()
            .ok_or(DbError::PoolClosed)?;

        debug!(available = self.available(), "Connection acquired");

        Ok(PooledConnection {
            conn: Some(conn),
            pool: Arc::clone(&self.inner),
            _permit: permit,
        })
    }

    /// Return a connection to the pool. Equivalent to dropping it.
    pub fn release(&self, conn: PooledConnection) {
        drop(conn);
    }

    /// Serialize a mutation. Held for the whole read-check-write
    /// transaction so existence checks and claim numbering cannot
    /// interleave with another writer. Take it *before* acquiring a
    /// connection.
    pub async fn lock_writer(&self) -> MutexGuard<'_, ()> {
        self.inner.writer.lock().await
    }

    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    /// Connections not currently checked out.
    pub fn available(&self) -> usize {
        self.inner.permits.available_permits()
    }

    /// Stop handing out connections and close the idle ones.
    ///
    /// Waiting acquirers fail; connections still checked out are dropped
    /// when their guards are.
    pub async fn close(&self) {
        self.inner.permits.close();
        let idle: Vec<SqliteConnection> = std::mem::take(
            &mut *self
                .inner
                .idle
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner()),
        );
        for conn in idle {
            if let Err(e) = conn.close().await {
                warn!(error = %e, "Failed to close connection cleanly");
            }
        }
        info!("Connection pool closed");
    }
}

/// A checked-out connection. Dereferences to [`SqliteConnection`] and
/// returns itself to the pool on drop.
pub struct PooledConnection {
    conn: Option<SqliteConnection>,
    pool: Arc<PoolInner>,
    // Dropped after `Drop::drop` has checked the connection back in.
    _permit: OwnedSemaphorePermit,
}

impl PooledConnection {
    /// Open a write transaction with `BEGIN IMMEDIATE`.
    ///
    /// SQLite takes its write lock at `BEGIN`, so the transaction never has
    /// to upgrade a read snapshot and `busy_timeout` covers any wait.
    /// Callers hold [`ConnectionPool::lock_writer`] for its whole lifetime.
    pub async fn begin_write(&mut self) -> Result<Transaction<'_, Sqlite>, DbError> {
        Ok(self.begin_with("BEGIN IMMEDIATE").await?)
    }
}

impl Deref for PooledConnection {
    type Target = SqliteConnection;

    fn deref(&self) -> &SqliteConnection {
        self.conn.as_ref().expect("connection present until drop")
    }
}

impl DerefMut for PooledConnection {
    fn deref_mut(&mut self) -> &mut SqliteConnection {
        self.conn.as_mut().expect("connection present until drop")
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            if self.pool.permits.is_closed() {
                return;
            }
            self.pool.checkin(conn);
        }
    }
}
