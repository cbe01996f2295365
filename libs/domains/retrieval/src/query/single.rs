use sea_orm::{DbBackend, Statement, Value};
use serde_json::Value as Json;

use crate::config::SearchConfig;
use crate::models::DistanceStrategy;

/// Builds the nearest-neighbour statement for one query vector.
///
/// The table name and `extra_where` fragment are operator configuration and
/// are concatenated into the SQL text as-is. They must never be derived from
/// end-user input. The vector, metadata filter and limit are always bound.
#[derive(Debug, Clone, PartialEq)]
pub struct SingleVectorQuery {
    table: String,
    extra_where: Option<String>,
    distance: DistanceStrategy,
}

impl SingleVectorQuery {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            extra_where: None,
            distance: DistanceStrategy::default(),
        }
    }

    pub fn from_config(config: &SearchConfig) -> Self {
        Self {
            table: config.table.clone(),
            extra_where: config.extra_where.clone(),
            distance: config.distance,
        }
    }

    pub fn with_extra_where(mut self, fragment: impl Into<String>) -> Self {
        let fragment = fragment.into();
        self.extra_where = (!fragment.trim().is_empty()).then_some(fragment);
        self
    }

    pub fn with_distance(mut self, distance: DistanceStrategy) -> Self {
        self.distance = distance;
        self
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// SQL text with `$1` vector, `$2` jsonb filter and `$3` limit
    pub fn sql(&self) -> String {
        let mut sql = format!(
            "SELECT *, embedding {} $1::vector AS \"_distance\"\nFROM {}\nWHERE metadata @> $2",
            self.distance.operator(),
            self.table
        );

        if let Some(fragment) = &self.extra_where {
            sql.push_str("\nAND ");
            sql.push_str(fragment.trim());
        }

        sql.push_str("\nORDER BY \"_distance\" ASC\nLIMIT $3;");
        sql
    }

    pub fn build(&self, vector: &[f32], filter: Option<&Json>, k: usize) -> Statement {
        let values: [Value; 3] = [
            vector_literal(vector).into(),
            normalize_filter(filter).into(),
            i64::try_from(k).unwrap_or(i64::MAX).into(),
        ];

        Statement::from_sql_and_values(DbBackend::Postgres, self.sql(), values)
    }
}

/// pgvector text form, e.g. `[0.1,0.2,0.3]`
pub fn vector_literal(vector: &[f32]) -> String {
    let parts: Vec<String> = vector.iter().map(|v| v.to_string()).collect();
    format!("[{}]", parts.join(","))
}

/// Only a JSON object (or a string holding one) is a usable containment
/// filter; everything else means "no filter".
pub fn normalize_filter(filter: Option<&Json>) -> Json {
    match filter {
        Some(Json::Object(map)) => Json::Object(map.clone()),
        Some(Json::String(raw)) => match serde_json::from_str::<Json>(raw) {
            Ok(parsed @ Json::Object(_)) => parsed,
            _ => Json::Object(Default::default()),
        },
        _ => Json::Object(Default::default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn bound(stmt: &Statement) -> Vec<Value> {
        stmt.values.clone().map(|v| v.0).unwrap_or_default()
    }

    #[test]
    fn test_sql_shape() {
        let query = SingleVectorQuery::new("documents");
        assert_eq!(
            query.sql(),
            "SELECT *, embedding <-> $1::vector AS \"_distance\"\n\
             FROM documents\n\
             WHERE metadata @> $2\n\
             ORDER BY \"_distance\" ASC\n\
             LIMIT $3;"
        );
    }

    #[test]
    fn test_extra_where_and_distance() {
        let query = SingleVectorQuery::new("candidates")
            .with_extra_where("  metadata->>'lang' = 'en' ")
            .with_distance(DistanceStrategy::Cosine);
        let sql = query.sql();

        assert!(sql.contains("embedding <=> $1::vector"));
        assert!(sql.contains("WHERE metadata @> $2\nAND metadata->>'lang' = 'en'\nORDER BY"));
    }

    #[test]
    fn test_bound_values() {
        let stmt = SingleVectorQuery::new("documents").build(
            &[0.5, -1.0, 0.25],
            Some(&json!({"source": "wiki"})),
            3,
        );
        let values = bound(&stmt);

        assert_eq!(values.len(), 3);
        assert_eq!(values[0], Value::from("[0.5,-1,0.25]".to_string()));
        assert_eq!(values[1], Value::from(json!({"source": "wiki"})));
        assert_eq!(values[2], Value::from(3i64));
    }

    #[test]
    fn test_oversized_k_saturates_limit() {
        let stmt = SingleVectorQuery::new("documents").build(&[0.1], None, usize::MAX);
        assert_eq!(bound(&stmt)[2], Value::from(i64::MAX));
    }

    #[test]
    fn test_missing_filter_binds_empty_object() {
        let stmt = SingleVectorQuery::new("documents").build(&[0.1], None, 4);
        assert_eq!(bound(&stmt)[1], Value::from(json!({})));
    }

    #[test]
    fn test_normalize_filter() {
        assert_eq!(normalize_filter(Some(&json!({"a": 1}))), json!({"a": 1}));
        assert_eq!(normalize_filter(Some(&json!(r#"{"a": 1}"#))), json!({"a": 1}));
        assert_eq!(normalize_filter(Some(&json!("{broken"))), json!({}));
        assert_eq!(normalize_filter(Some(&json!([1, 2]))), json!({}));
        assert_eq!(normalize_filter(Some(&Json::Null)), json!({}));
    }

    #[test]
    fn test_vector_literal() {
        assert_eq!(vector_literal(&[]), "[]");
        assert_eq!(vector_literal(&[1.0, 0.125]), "[1,0.125]");
    }
}
