use std::time::Instant;

use sea_orm::{DatabaseBackend, Statement};
use tracing::debug;

use super::ConnectionPool;
use crate::common::{DatabaseError, DatabaseResult};

/// Check that the store answers a trivial query.
///
/// Holds one pool slot for the duration of the probe.
///
/// # Example
/// ```ignore
/// use database::postgres::{ConnectionPool, check_health};
///
/// let pool = ConnectionPool::connect(&config).await?;
/// check_health(&pool).await?;
/// ```
pub async fn check_health(pool: &ConnectionPool) -> DatabaseResult<()> {
    debug!("Running PostgreSQL health check");

    let conn = pool.acquire().await?;
    let stmt = Statement::from_string(DatabaseBackend::Postgres, "SELECT 1".to_owned());
    conn.query_one(stmt).await.map_err(|e| {
        DatabaseError::HealthCheckFailed(format!("PostgreSQL health check failed: {}", e))
    })?;

    debug!("PostgreSQL health check passed");
    Ok(())
}

/// Return the installed version of the `vector` extension, or `None` when the
/// extension is missing from the target database.
pub async fn vector_extension_version(pool: &ConnectionPool) -> DatabaseResult<Option<String>> {
    let conn = pool.acquire().await?;
    let stmt = Statement::from_string(
        DatabaseBackend::Postgres,
        "SELECT extversion FROM pg_extension WHERE extname = 'vector'".to_owned(),
    );

    let row = conn.query_one(stmt).await.map_err(|e| {
        DatabaseError::HealthCheckFailed(format!("pgvector extension lookup failed: {}", e))
    })?;

    match row {
        Some(row) => Ok(Some(row.try_get::<String>("", "extversion")?)),
        None => Ok(None),
    }
}

/// Health check result for status reporting
#[derive(Debug, Clone)]
pub struct HealthStatus {
    pub healthy: bool,

    /// Error message when unhealthy
    pub message: Option<String>,

    /// Installed pgvector version, when the extension is present
    pub vector_version: Option<String>,

    pub response_time_ms: u64,
}

impl HealthStatus {
    pub fn healthy(vector_version: Option<String>, response_time_ms: u64) -> Self {
        Self {
            healthy: true,
            message: None,
            vector_version,
            response_time_ms,
        }
    }

    pub fn unhealthy(message: String, response_time_ms: u64) -> Self {
        Self {
            healthy: false,
            message: Some(message),
            vector_version: None,
            response_time_ms,
        }
    }
}

/// Probe the store and the pgvector extension, never failing.
///
/// A reachable store without the `vector` extension is reported unhealthy,
/// since no similarity query can run against it.
pub async fn check_health_detailed(pool: &ConnectionPool) -> HealthStatus {
    let start = Instant::now();
    let elapsed = || start.elapsed().as_millis() as u64;

    if let Err(e) = check_health(pool).await {
        return HealthStatus::unhealthy(e.to_string(), elapsed());
    }

    match vector_extension_version(pool).await {
        Ok(Some(version)) => HealthStatus::healthy(Some(version), elapsed()),
        Ok(None) => HealthStatus::unhealthy(
            "pgvector extension is not installed".to_string(),
            elapsed(),
        ),
        Err(e) => HealthStatus::unhealthy(e.to_string(), elapsed()),
    }
}
