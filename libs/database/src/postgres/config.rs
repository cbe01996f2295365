use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use sea_orm::ConnectOptions;
use tracing::log::LevelFilter;
use tracing::warn;

use crate::common::{DatabaseError, DatabaseResult, RetryPolicy};

#[cfg(feature = "config")]
use core_config::{
    ConfigError, FromEnv, env_optional, env_or_default, env_parse, env_parse_optional, env_required,
};

/// Keys owned by named [`ConnectionConfig`] fields. They are dropped from the
/// passthrough options so the named fields always win.
const RESERVED_OPTION_KEYS: &[&str] = &[
    "type", "host", "port", "user", "username", "password", "database", "dbname", "ssl",
    "sslmode",
];

/// TLS behaviour for the store connection.
///
/// The default is [`TlsMode::NoVerify`]: traffic is encrypted but the server
/// certificate is not checked. Deployments that already connect this way keep
/// working; set [`TlsMode::Verify`] to validate certificates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TlsMode {
    /// Plain TCP, for local development and test containers
    Disable,
    /// Encrypt without verifying the server certificate (`sslmode=require`)
    #[default]
    NoVerify,
    /// Encrypt and verify certificate and host name (`sslmode=verify-full`)
    Verify,
}

impl TlsMode {
    /// The libpq/sqlx `sslmode` value for this mode
    pub fn sslmode(&self) -> &'static str {
        match self {
            TlsMode::Disable => "disable",
            TlsMode::NoVerify => "require",
            TlsMode::Verify => "verify-full",
        }
    }
}

impl fmt::Display for TlsMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TlsMode::Disable => "disable",
            TlsMode::NoVerify => "no-verify",
            TlsMode::Verify => "verify",
        })
    }
}

impl FromStr for TlsMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "disable" | "off" | "false" => Ok(TlsMode::Disable),
            "no-verify" | "require" | "true" | "on" => Ok(TlsMode::NoVerify),
            "verify" | "verify-full" => Ok(TlsMode::Verify),
            other => Err(format!(
                "unknown TLS mode '{}', expected disable, no-verify or verify",
                other
            )),
        }
    }
}

/// Connection settings for the PostgreSQL/pgvector store.
///
/// Built once from operator-supplied configuration and never mutated
/// afterwards; the pool keeps its own copy for its whole lifetime.
///
/// # Example
///
/// ```ignore
/// use database::postgres::{ConnectionConfig, TlsMode};
///
/// let config = ConnectionConfig::new("db.internal", "vectors")
///     .with_port(6432)
///     .with_credentials("reader", "secret")
///     .with_tls_mode(TlsMode::Verify)
///     .with_additional_config(r#"{"application_name": "retriever"}"#)?;
/// ```
#[derive(Clone)]
pub struct ConnectionConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub username: String,
    pub password: String,
    pub tls_mode: TlsMode,

    /// Driver-specific options appended to the connection URL verbatim
    pub driver_options: BTreeMap<String, String>,

    /// Upper bound on concurrently held connections
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout: Duration,

    /// How long `acquire` waits for a free slot before reporting exhaustion
    pub acquire_timeout: Duration,
    pub idle_timeout: Duration,

    /// Per-statement timeout; `None` lets statements run to completion
    pub query_timeout: Option<Duration>,

    /// Retry policy for establishing connections; `None` disables retrying
    pub retry: Option<RetryPolicy>,

    pub sqlx_logging: bool,
    pub sqlx_logging_level: LevelFilter,
}

impl ConnectionConfig {
    pub fn new(host: impl Into<String>, database: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            database: database.into(),
            ..Self::default()
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = username.into();
        self.password = password.into();
        self
    }

    pub fn with_tls_mode(mut self, tls_mode: TlsMode) -> Self {
        self.tls_mode = tls_mode;
        self
    }

    pub fn with_pool_size(mut self, max_connections: u32, min_connections: u32) -> Self {
        self.max_connections = max_connections.max(1);
        self.min_connections = min_connections.min(self.max_connections);
        self
    }

    pub fn with_acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    pub fn with_query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout = Some(timeout);
        self
    }

    pub fn with_retry(mut self, policy: RetryPolicy) -> Self {
        self.retry = Some(policy);
        self
    }

    pub fn with_driver_option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let key = key.into();
        if is_reserved(&key) {
            warn!(option = %key, "Ignoring driver option that shadows a named connection field");
        } else {
            self.driver_options.insert(key, value.into());
        }
        self
    }

    /// Merge a JSON object of extra driver options.
    ///
    /// Scalars are stringified, nested values are passed on as JSON text and
    /// `null` entries are skipped. Anything that is not a JSON object is a
    /// configuration error.
    pub fn with_additional_config(mut self, raw: &str) -> DatabaseResult<Self> {
        if raw.trim().is_empty() {
            return Ok(self);
        }

        let parsed: serde_json::Value = serde_json::from_str(raw).map_err(|e| {
            DatabaseError::ConfigError(format!("Invalid JSON in the Additional Configuration: {}", e))
        })?;

        let serde_json::Value::Object(entries) = parsed else {
            return Err(DatabaseError::ConfigError(
                "Invalid JSON in the Additional Configuration: expected an object".to_string(),
            ));
        };

        for (key, value) in entries {
            let value = match value {
                serde_json::Value::Null => continue,
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            };
            self = self.with_driver_option(key, value);
        }

        Ok(self)
    }

    /// Connection URL understood by sqlx, including `sslmode` and driver options
    pub fn url(&self) -> String {
        let mut url = String::from("postgres://");

        if !self.username.is_empty() {
            url.push_str(&urlencoding::encode(&self.username));
            if !self.password.is_empty() {
                url.push(':');
                url.push_str(&urlencoding::encode(&self.password));
            }
            url.push('@');
        }

        url.push_str(&format!(
            "{}:{}/{}?sslmode={}",
            self.host,
            self.port,
            urlencoding::encode(&self.database),
            self.tls_mode.sslmode()
        ));

        for (key, value) in &self.driver_options {
            url.push_str(&format!(
                "&{}={}",
                urlencoding::encode(key),
                urlencoding::encode(value)
            ));
        }

        url
    }

    /// Convert into SeaORM connect options
    pub fn to_connect_options(&self) -> ConnectOptions {
        let mut opt = ConnectOptions::new(self.url());
        opt.max_connections(self.max_connections)
            .min_connections(self.min_connections)
            .connect_timeout(self.connect_timeout)
            .acquire_timeout(self.acquire_timeout)
            .idle_timeout(self.idle_timeout)
            .sqlx_logging(self.sqlx_logging)
            .sqlx_logging_level(self.sqlx_logging_level);
        opt
    }

    /// Host, port and database, without credentials
    pub fn display_target(&self) -> String {
        format!("{}:{}/{}", self.host, self.port, self.database)
    }
}

fn is_reserved(key: &str) -> bool {
    RESERVED_OPTION_KEYS
        .iter()
        .any(|reserved| reserved.eq_ignore_ascii_case(key))
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            database: "postgres".to_string(),
            username: String::new(),
            password: String::new(),
            tls_mode: TlsMode::default(),
            driver_options: BTreeMap::new(),
            max_connections: 10,
            min_connections: 1,
            connect_timeout: Duration::from_secs(8),
            acquire_timeout: Duration::from_secs(8),
            idle_timeout: Duration::from_secs(300),
            query_timeout: None,
            retry: None,
            sqlx_logging: false,
            sqlx_logging_level: LevelFilter::Debug,
        }
    }
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("tls_mode", &self.tls_mode)
            .field("driver_options", &self.driver_options)
            .field("max_connections", &self.max_connections)
            .field("min_connections", &self.min_connections)
            .field("acquire_timeout", &self.acquire_timeout)
            .field("query_timeout", &self.query_timeout)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

/// Load ConnectionConfig from environment variables
///
/// - `PG_HOST`, `PG_DATABASE` (required)
/// - `PG_PORT` (default: 5432)
/// - `PG_USER` (default: postgres), `PG_PASSWORD` (default: empty)
/// - `PG_SSL_MODE` (default: no-verify)
/// - `PG_ADDITIONAL_CONFIG` (optional JSON object of driver options)
/// - `DB_MAX_CONNECTIONS` (default: 10), `DB_MIN_CONNECTIONS` (default: 1)
/// - `DB_CONNECT_TIMEOUT_SECS`, `DB_ACQUIRE_TIMEOUT_SECS` (default: 8)
/// - `DB_QUERY_TIMEOUT_SECS` (optional)
/// - `DB_CONNECT_RETRIES` (optional, enables retrying with backoff)
#[cfg(feature = "config")]
impl FromEnv for ConnectionConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let tls_mode = env_or_default("PG_SSL_MODE", "no-verify")
            .parse::<TlsMode>()
            .map_err(|details| ConfigError::ParseError {
                key: "PG_SSL_MODE".to_string(),
                details,
            })?;

        let mut config = Self::new(env_required("PG_HOST")?, env_required("PG_DATABASE")?)
            .with_port(env_parse("PG_PORT", 5432)?)
            .with_credentials(
                env_or_default("PG_USER", "postgres"),
                env_or_default("PG_PASSWORD", ""),
            )
            .with_tls_mode(tls_mode)
            .with_pool_size(
                env_parse("DB_MAX_CONNECTIONS", 10)?,
                env_parse("DB_MIN_CONNECTIONS", 1)?,
            );

        config.connect_timeout = Duration::from_secs(env_parse("DB_CONNECT_TIMEOUT_SECS", 8)?);
        config.acquire_timeout = Duration::from_secs(env_parse("DB_ACQUIRE_TIMEOUT_SECS", 8)?);
        config.query_timeout =
            env_parse_optional::<u64>("DB_QUERY_TIMEOUT_SECS")?.map(Duration::from_secs);
        config.retry = env_parse_optional::<u32>("DB_CONNECT_RETRIES")?
            .map(|retries| RetryPolicy::new().with_max_retries(retries));

        if let Some(raw) = env_optional("PG_ADDITIONAL_CONFIG") {
            config = config
                .with_additional_config(&raw)
                .map_err(|e| ConfigError::invalid("PG_ADDITIONAL_CONFIG", e))?;
        }

        Ok(config)
    }
}
