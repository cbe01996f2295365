use core_config::ConfigError;
use database::DatabaseError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RetrievalError {
    /// Malformed configuration or payload. Never retried.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The store is unreachable or the pool is exhausted
    #[error("Connection error: {0}")]
    Connection(String),

    /// The statement failed or timed out on a live connection
    #[error("Execution error: {0}")]
    Execution(String),

    #[error("Embedding error: {0}")]
    Embedding(String),
}

pub type RetrievalResult<T> = Result<T, RetrievalError>;

impl RetrievalError {
    pub fn configuration(details: impl Into<String>) -> Self {
        RetrievalError::Configuration(details.into())
    }
}

impl From<DatabaseError> for RetrievalError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::ConfigError(msg) => RetrievalError::Configuration(msg),
            err if err.is_connection_error() => RetrievalError::Connection(err.to_string()),
            err => RetrievalError::Execution(err.to_string()),
        }
    }
}

impl From<ConfigError> for RetrievalError {
    fn from(err: ConfigError) -> Self {
        RetrievalError::Configuration(err.to_string())
    }
}

impl From<reqwest::Error> for RetrievalError {
    fn from(err: reqwest::Error) -> Self {
        RetrievalError::Embedding(err.to_string())
    }
}
