use core_config::{ConfigError, FromEnv, env_optional, env_or_default};
use serde_json::Value;

use crate::models::DistanceStrategy;

pub const DEFAULT_TABLE: &str = "documents";
pub const DEFAULT_TOP_K: usize = 4;

/// Operator-authored search settings, fixed for the lifetime of an engine
#[derive(Debug, Clone, PartialEq)]
pub struct SearchConfig {
    pub table: String,
    pub k: usize,

    /// Extra SQL condition appended to the single-vector query with `AND`
    pub extra_where: Option<String>,

    /// Multi-key template; when set the engine runs in template mode
    pub full_query: Option<String>,

    /// jsonb containment filter used when a search does not supply one
    pub filter: Option<Value>,

    pub distance: DistanceStrategy,
}

impl SearchConfig {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            ..Self::default()
        }
    }

    pub fn with_k(mut self, k: usize) -> Self {
        self.k = k.max(1);
        self
    }

    pub fn with_extra_where(mut self, fragment: impl Into<String>) -> Self {
        self.extra_where = non_blank(fragment.into());
        self
    }

    pub fn with_full_query(mut self, template: impl Into<String>) -> Self {
        self.full_query = non_blank(template.into());
        self
    }

    pub fn with_filter(mut self, filter: Value) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn with_distance(mut self, distance: DistanceStrategy) -> Self {
        self.distance = distance;
        self
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            table: DEFAULT_TABLE.to_string(),
            k: DEFAULT_TOP_K,
            extra_where: None,
            full_query: None,
            filter: None,
            distance: DistanceStrategy::default(),
        }
    }
}

/// Lenient top-k parsing: a finite number >= 1 is floored, anything else
/// (absent, blank, non-numeric, zero, negative) falls back to 4.
pub fn parse_top_k(raw: Option<&str>) -> usize {
    raw.and_then(|s| s.trim().parse::<f64>().ok())
        .filter(|k| k.is_finite() && *k >= 1.0)
        .map(|k| k.floor() as usize)
        .unwrap_or(DEFAULT_TOP_K)
}

fn non_blank(s: String) -> Option<String> {
    if s.trim().is_empty() { None } else { Some(s) }
}

/// Load SearchConfig from environment variables
///
/// - `PGVECTOR_TABLE` (default: documents)
/// - `PGVECTOR_TOP_K` (default: 4, unparsable values also give 4)
/// - `PGVECTOR_WHERE` (optional extra condition)
/// - `PGVECTOR_FULL_QUERY` (optional multi-key template)
/// - `PGVECTOR_DISTANCE` (default: euclidean)
impl FromEnv for SearchConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let distance = env_or_default("PGVECTOR_DISTANCE", "euclidean")
            .parse::<DistanceStrategy>()
            .map_err(|details| ConfigError::ParseError {
                key: "PGVECTOR_DISTANCE".to_string(),
                details,
            })?;

        let mut config = Self::new(
            env_optional("PGVECTOR_TABLE").unwrap_or_else(|| DEFAULT_TABLE.to_string()),
        )
        .with_distance(distance);
        config.k = parse_top_k(env_optional("PGVECTOR_TOP_K").as_deref());
        config.extra_where = env_optional("PGVECTOR_WHERE");
        config.full_query = env_optional("PGVECTOR_FULL_QUERY");

        Ok(config)
    }
}
