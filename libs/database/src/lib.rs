//! PostgreSQL connection layer for vector retrieval
//!
//! Opens TLS-capable connections to a pgvector store, bounds concurrent use
//! through an acquire/release pool, and retries connection attempts only when
//! a [`common::RetryPolicy`] is configured.
//!
//! # Features
//!
//! - `postgres` (default) - PostgreSQL support with SeaORM
//! - `config` - Configuration support with `core_config::FromEnv`
//!
//! # Example
//!
//! ```ignore
//! use database::postgres::{ConnectionConfig, ConnectionPool, TlsMode};
//!
//! let config = ConnectionConfig::new("localhost", "vectors")
//!     .with_credentials("reader", "secret")
//!     .with_tls_mode(TlsMode::Verify);
//! let pool = ConnectionPool::connect(&config).await?;
//!
//! let conn = pool.acquire().await?;
//! let rows = conn.query_all(stmt).await?;
//! pool.release(conn);
//! ```

pub mod common;

#[cfg(feature = "postgres")]
pub mod postgres;

pub use common::{DatabaseError, DatabaseResult};
