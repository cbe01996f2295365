//! Bounded connection pool with explicit acquire/release.
//!
//! SeaORM already pools sqlx connections internally, but it hands out the
//! whole pool rather than a single connection. [`ConnectionPool`] puts a
//! semaphore with `max_connections` slots in front of it so every search holds
//! exactly one slot from just before execution until just after, and so pool
//! exhaustion is observable and bounded by `acquire_timeout`.

use std::ops::Deref;
use std::sync::Arc;
use std::time::Duration;

use sea_orm::{ConnectionTrait, DatabaseConnection, QueryResult, Statement};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, instrument};

use super::{ConnectionConfig, connector};
use crate::common::{DatabaseError, DatabaseResult};

/// A bounded pool of store connections.
///
/// Cloning is not supported; share it behind an `Arc`.
pub struct ConnectionPool {
    db: DatabaseConnection,
    slots: Arc<Semaphore>,
    size: usize,
    acquire_timeout: Option<Duration>,
    query_timeout: Option<Duration>,
}

impl ConnectionPool {
    /// Connect to the store described by `config`.
    ///
    /// An unreachable store fails here with [`DatabaseError::ConnectionFailed`].
    #[instrument(skip(config), fields(target_db = %config.display_target()))]
    pub async fn connect(config: &ConnectionConfig) -> DatabaseResult<Self> {
        let db = connector::connect_with_retry(config).await?;

        let mut pool = Self::from_connection(db, config.max_connections as usize)
            .with_acquire_timeout(config.acquire_timeout);
        pool.query_timeout = config.query_timeout;

        Ok(pool)
    }

    /// Wrap an existing connection (including a SeaORM mock connection) with
    /// `size` slots and no acquire timeout.
    pub fn from_connection(db: DatabaseConnection, size: usize) -> Self {
        let size = size.max(1);
        Self {
            db,
            slots: Arc::new(Semaphore::new(size)),
            size,
            acquire_timeout: None,
            query_timeout: None,
        }
    }

    pub fn with_acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = Some(timeout);
        self
    }

    pub fn with_query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout = Some(timeout);
        self
    }

    /// Wait for a free slot.
    ///
    /// Fails with [`DatabaseError::PoolExhausted`] if no slot frees up within
    /// the acquire timeout, or [`DatabaseError::ConnectionFailed`] once the
    /// pool has been closed.
    pub async fn acquire(&self) -> DatabaseResult<PooledConnection> {
        let slots = Arc::clone(&self.slots);

        let permit = match self.acquire_timeout {
            Some(timeout) => tokio::time::timeout(timeout, slots.acquire_owned())
                .await
                .map_err(|_| {
                    DatabaseError::PoolExhausted(format!(
                        "no connection available within {:?} ({} in use)",
                        timeout, self.size
                    ))
                })?,
            None => slots.acquire_owned().await,
        }
        .map_err(|_| DatabaseError::ConnectionFailed("connection pool is closed".to_string()))?;

        debug!(available = self.available(), size = self.size, "Connection acquired");

        Ok(PooledConnection {
            db: self.db.clone(),
            query_timeout: self.query_timeout,
            _slot: permit,
        })
    }

    /// Return a connection to the pool.
    ///
    /// Dropping a [`PooledConnection`] has the same effect; this exists so call
    /// sites can make the hand-back explicit.
    pub fn release(&self, conn: PooledConnection) {
        drop(conn);
        debug!(available = self.available(), size = self.size, "Connection released");
    }

    /// Total number of slots
    pub fn size(&self) -> usize {
        self.size
    }

    /// Slots not currently held by a caller
    pub fn available(&self) -> usize {
        self.slots.available_permits()
    }

    /// Reject further acquires and close the underlying pool
    pub async fn close(&self) -> DatabaseResult<()> {
        self.slots.close();
        self.db.clone().close().await?;
        Ok(())
    }
}

/// One acquired pool slot. The slot is returned when this value is dropped,
/// on success and error paths alike.
pub struct PooledConnection {
    db: DatabaseConnection,
    query_timeout: Option<Duration>,
    _slot: OwnedSemaphorePermit,
}

impl PooledConnection {
    /// Run a statement and collect every row, bounded by the query timeout
    pub async fn query_all(&self, stmt: Statement) -> DatabaseResult<Vec<QueryResult>> {
        match self.query_timeout {
            Some(timeout) => tokio::time::timeout(timeout, self.db.query_all_raw(stmt))
                .await
                .map_err(|_| DatabaseError::QueryTimeout(timeout))?
                .map_err(DatabaseError::from),
            None => self.db.query_all_raw(stmt).await.map_err(DatabaseError::from),
        }
    }

    /// Run a statement and return the first row, if any
    pub async fn query_one(&self, stmt: Statement) -> DatabaseResult<Option<QueryResult>> {
        match self.query_timeout {
            Some(timeout) => tokio::time::timeout(timeout, self.db.query_one_raw(stmt))
                .await
                .map_err(|_| DatabaseError::QueryTimeout(timeout))?
                .map_err(DatabaseError::from),
            None => self.db.query_one_raw(stmt).await.map_err(DatabaseError::from),
        }
    }
}

impl Deref for PooledConnection {
    type Target = DatabaseConnection;

    fn deref(&self) -> &Self::Target {
        &self.db
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::{DatabaseBackend, DbErr, MockDatabase, Value};
    use std::collections::BTreeMap;

    fn row(n: i32) -> BTreeMap<&'static str, Value> {
        BTreeMap::from([("n", Value::from(n))])
    }

    #[tokio::test]
    async fn test_acquire_and_release_restores_capacity() {
        let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();
        let pool = ConnectionPool::from_connection(db, 2);

        let first = pool.acquire().await.unwrap();
        let second = pool.acquire().await.unwrap();
        assert_eq!(pool.available(), 0);

        pool.release(first);
        assert_eq!(pool.available(), 1);
        drop(second);
        assert_eq!(pool.available(), 2);
    }

    #[tokio::test]
    async fn test_exhausted_pool_times_out() {
        let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();
        let pool = ConnectionPool::from_connection(db, 1)
            .with_acquire_timeout(Duration::from_millis(20));

        let _held = pool.acquire().await.unwrap();
        let err = pool.acquire().await.err().unwrap();

        assert!(matches!(err, DatabaseError::PoolExhausted(_)));
        assert!(err.is_connection_error());
    }

    #[tokio::test]
    async fn test_failed_query_still_returns_slot() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_errors([DbErr::Custom("relation \"documents\" does not exist".into())])
            .into_connection();
        let pool = ConnectionPool::from_connection(db, 3);
        let before = pool.available();

        let result = async {
            let conn = pool.acquire().await?;
            conn.query_all(Statement::from_string(DatabaseBackend::Postgres, "SELECT 1".to_owned()))
                .await
        }
        .await;

        assert!(result.is_err());
        assert_eq!(pool.available(), before);
    }

    #[tokio::test]
    async fn test_query_all_returns_rows() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![row(1), row(2)]])
            .into_connection();
        let pool = ConnectionPool::from_connection(db, 1);

        let conn = pool.acquire().await.unwrap();
        let rows = conn
            .query_all(Statement::from_string(DatabaseBackend::Postgres, "SELECT n".to_owned()))
            .await
            .unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].try_get::<i32>("", "n").unwrap(), 2);
    }

    #[tokio::test]
    async fn test_closed_pool_rejects_acquire() {
        let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();
        let pool = ConnectionPool::from_connection(db, 1);
        pool.close().await.unwrap();

        let err = pool.acquire().await.err().unwrap();
        assert!(matches!(err, DatabaseError::ConnectionFailed(_)));
    }
}
