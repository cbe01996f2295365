//! PostgreSQL connection management for pgvector-backed stores
//!
//! Connection settings, a bounded acquire/release pool on top of SeaORM, and
//! health probes that also verify the `vector` extension.

mod config;
mod connector;
mod health;
mod pool;

pub use config::{ConnectionConfig, TlsMode};
pub use connector::{connect, connect_with_retry};
pub use health::{HealthStatus, check_health, check_health_detailed, vector_extension_version};
pub use pool::{ConnectionPool, PooledConnection};

// Re-export SeaORM types for convenience
pub use sea_orm::{ConnectOptions, DatabaseConnection, DbErr};
