use std::collections::HashMap;
use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde_json::Value;

use super::single::vector_literal;
use crate::error::{RetrievalError, RetrievalResult};
use crate::models::{DirectFilterMap, EmbeddingKeyMap};

static TOKEN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\[(.*?)\]").unwrap());

/// Operator-authored SQL containing `[name]` tokens.
///
/// Resolution is plain text substitution and the result runs with no bound
/// parameters, so the template itself must come from trusted configuration.
/// Direct filter values are the only caller-supplied text that reaches the
/// SQL; they are quoted with embedded single quotes doubled.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryTemplate {
    sql: String,
}

impl QueryTemplate {
    pub fn new(sql: impl Into<String>) -> RetrievalResult<Self> {
        let sql = sql.into();
        if sql.trim().is_empty() {
            return Err(RetrievalError::configuration("query template is empty"));
        }
        Ok(Self { sql })
    }

    pub fn as_str(&self) -> &str {
        &self.sql
    }

    /// Distinct token names in order of first appearance
    pub fn tokens(&self) -> Vec<&str> {
        let mut seen = Vec::new();
        for caps in TOKEN.captures_iter(&self.sql) {
            if let Some(name) = caps.get(1).map(|m| m.as_str())
                && !seen.contains(&name)
            {
                seen.push(name);
            }
        }
        seen
    }

    /// Replace every token with its literal.
    ///
    /// Each token resolves to exactly one source: an embedding when the name
    /// is in `embeddings` (even if it is also a direct filter), otherwise the
    /// direct filter. Any token found in neither is a configuration error and
    /// nothing is substituted. Replacement is single-pass, so text inside an
    /// inserted literal is never rescanned.
    pub fn resolve(
        &self,
        embeddings: &EmbeddingKeyMap,
        filters: &DirectFilterMap,
    ) -> RetrievalResult<String> {
        let mut literals: HashMap<&str, String> = HashMap::new();

        for name in self.tokens() {
            let literal = if let Some(vector) = embeddings.get(name) {
                format!("'{}'", vector_literal(vector))
            } else if let Some(value) = filters.get(name) {
                filter_literal(value)
            } else {
                return Err(RetrievalError::configuration(format!(
                    "template token [{}] has no embedding input or direct filter",
                    name
                )));
            };
            literals.insert(name, literal);
        }

        let resolved = TOKEN.replace_all(&self.sql, |caps: &Captures| {
            // Every token was resolved above
            literals
                .get(&caps[1])
                .cloned()
                .unwrap_or_else(|| caps[0].to_string())
        });

        Ok(resolved.into_owned())
    }
}

fn filter_literal(value: &Value) -> String {
    let raw = match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    format!("'{}'", raw.replace('\'', "''"))
}
