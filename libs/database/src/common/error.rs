/// Error type for connection management and raw statement execution
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    /// Errors surfaced by SeaORM / sqlx
    #[cfg(feature = "postgres")]
    #[error("PostgreSQL error: {0}")]
    Postgres(#[from] sea_orm::DbErr),

    /// The store could not be reached (after retries, if any were configured)
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// No pool slot became free within the acquire timeout
    #[error("Connection pool exhausted: {0}")]
    PoolExhausted(String),

    /// A statement did not finish within the configured query timeout
    #[error("Query timed out after {0:?}")]
    QueryTimeout(std::time::Duration),

    /// Health check failed
    #[error("Health check failed: {0}")]
    HealthCheckFailed(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl DatabaseError {
    /// Whether the error means the store itself is unavailable, as opposed to
    /// a statement failing on a live connection.
    pub fn is_connection_error(&self) -> bool {
        match self {
            DatabaseError::ConnectionFailed(_) | DatabaseError::PoolExhausted(_) => true,
            #[cfg(feature = "postgres")]
            DatabaseError::Postgres(err) => matches!(
                err,
                sea_orm::DbErr::Conn(_) | sea_orm::DbErr::ConnectionAcquire(_)
            ),
            _ => false,
        }
    }
}

#[cfg(feature = "config")]
impl From<core_config::ConfigError> for DatabaseError {
    fn from(err: core_config::ConfigError) -> Self {
        DatabaseError::ConfigError(err.to_string())
    }
}

/// Result type alias for database operations
pub type DatabaseResult<T> = Result<T, DatabaseError>;
