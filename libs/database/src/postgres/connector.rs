use sea_orm::{Database, DatabaseConnection};
use tracing::{info, warn};

use super::ConnectionConfig;
use crate::common::{DatabaseError, DatabaseResult, retry_with_policy};

/// Open the underlying SeaORM/sqlx pool for `config`.
///
/// Fails with [`DatabaseError::ConnectionFailed`] when the store cannot be
/// reached. No retry happens here; see [`connect_with_retry`].
///
/// # Example
/// ```ignore
/// use database::postgres::{ConnectionConfig, connect};
///
/// let db = connect(&ConnectionConfig::new("localhost", "vectors")).await?;
/// ```
pub async fn connect(config: &ConnectionConfig) -> DatabaseResult<DatabaseConnection> {
    let db = Database::connect(config.to_connect_options())
        .await
        .map_err(|e| {
            DatabaseError::ConnectionFailed(format!("{}: {}", config.display_target(), e))
        })?;

    info!(
        target_db = %config.display_target(),
        tls = %config.tls_mode,
        max_connections = config.max_connections,
        "Connected to PostgreSQL"
    );

    Ok(db)
}

/// Connect, honouring the config's retry policy when one is set.
///
/// Without a policy this is exactly [`connect`]: a single attempt whose
/// failure is returned to the caller.
pub async fn connect_with_retry(config: &ConnectionConfig) -> DatabaseResult<DatabaseConnection> {
    match &config.retry {
        Some(policy) => {
            retry_with_policy(|| connect(config), policy, DatabaseError::is_connection_error)
                .await
                .inspect_err(|e| warn!(error = %e, "PostgreSQL unreachable after retries"))
        }
        None => connect(config).await,
    }
}
