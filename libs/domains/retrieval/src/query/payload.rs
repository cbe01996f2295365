use serde_json::{Map, Value};

use crate::error::{RetrievalError, RetrievalResult};
use crate::models::DirectFilterMap;

/// A multi-key query payload after normalization.
///
/// Two shapes are accepted:
///
/// ```text
/// { "to_embed": { "skill": "java" }, "direct_filters": { "city": "Berlin" } }
/// { "skill": "java" }        // legacy: every entry is embedded
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryPayload {
    /// Token name and text to embed, in payload order
    pub to_embed: Vec<(String, String)>,
    pub direct_filters: DirectFilterMap,
}

impl QueryPayload {
    pub fn parse(raw: &str) -> RetrievalResult<Self> {
        let value: Value = serde_json::from_str(raw).map_err(|e| {
            RetrievalError::configuration(format!("multi-key query is not valid JSON: {}", e))
        })?;
        Self::from_value(&value)
    }

    pub fn from_value(value: &Value) -> RetrievalResult<Self> {
        let Value::Object(root) = value else {
            return Err(RetrievalError::configuration(
                "multi-key query must be a JSON object",
            ));
        };

        match root.get("to_embed") {
            Some(Value::Object(to_embed)) => {
                let direct_filters = match root.get("direct_filters") {
                    None | Some(Value::Null) => DirectFilterMap::new(),
                    Some(Value::Object(filters)) => filters
                        .iter()
                        .map(|(name, value)| (name.clone(), value.clone()))
                        .collect(),
                    Some(_) => {
                        return Err(RetrievalError::configuration(
                            "'direct_filters' must be a JSON object",
                        ));
                    }
                };

                Ok(Self {
                    to_embed: texts(to_embed)?,
                    direct_filters,
                })
            }
            Some(_) => Err(RetrievalError::configuration(
                "'to_embed' must be a JSON object",
            )),
            None => Ok(Self {
                to_embed: texts(root)?,
                direct_filters: DirectFilterMap::new(),
            }),
        }
    }

    pub fn texts(&self) -> Vec<String> {
        self.to_embed.iter().map(|(_, text)| text.clone()).collect()
    }
}

fn texts(entries: &Map<String, Value>) -> RetrievalResult<Vec<(String, String)>> {
    entries
        .iter()
        .map(|(name, value)| match value {
            Value::String(text) => Ok((name.clone(), text.clone())),
            other => Err(RetrievalError::configuration(format!(
                "value to embed for '{}' must be a string, got {}",
                name, other
            ))),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_structured_payload() {
        let payload = QueryPayload::from_value(&json!({
            "to_embed": {"skill": "java"},
            "direct_filters": {"city": "Berlin", "years": 5}
        }))
        .unwrap();

        assert_eq!(payload.to_embed, vec![("skill".to_string(), "java".to_string())]);
        assert_eq!(payload.direct_filters.get("city"), Some(&json!("Berlin")));
        assert_eq!(payload.direct_filters.get("years"), Some(&json!(5)));
    }

    #[test]
    fn test_legacy_flat_payload() {
        let payload = QueryPayload::parse(r#"{"skill": "java", "role": "backend"}"#).unwrap();

        assert_eq!(payload.to_embed.len(), 2);
        assert!(payload.direct_filters.is_empty());
        assert!(payload.texts().contains(&"backend".to_string()));
    }

    #[test]
    fn test_missing_direct_filters_is_empty() {
        let payload = QueryPayload::from_value(&json!({"to_embed": {}})).unwrap();
        assert_eq!(payload, QueryPayload::default());
    }

    #[test]
    fn test_malformed_payloads() {
        for bad in [
            json!(["skill"]),
            json!({"to_embed": "java"}),
            json!({"to_embed": {"skill": 3}}),
            json!({"to_embed": {}, "direct_filters": [1]}),
            json!({"skill": {"nested": true}}),
        ] {
            let err = QueryPayload::from_value(&bad).unwrap_err();
            assert!(matches!(err, RetrievalError::Configuration(_)), "{}", bad);
        }

        assert!(QueryPayload::parse("{not json").is_err());
    }
}
