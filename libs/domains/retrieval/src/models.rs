use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Score given to every multi-key result; the template path has no distance
/// column to rank by.
pub const MULTI_KEY_SCORE: f64 = 0.01;

/// A stored text chunk and its metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    /// Unset until the row's id has been read
    pub id: Option<String>,
    pub page_content: String,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl Document {
    pub fn new(page_content: impl Into<String>) -> Self {
        Self {
            id: None,
            page_content: page_content.into(),
            metadata: Map::new(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_metadata(mut self, metadata: Map<String, Value>) -> Self {
        self.metadata = metadata;
        self
    }
}

/// A document with its distance from the query. Lower is more relevant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredDocument {
    pub document: Document,
    pub distance: f64,
}

impl ScoredDocument {
    pub fn new(document: Document, distance: f64) -> Self {
        Self { document, distance }
    }
}

/// Template token name to embedding, built once per multi-key query
pub type EmbeddingKeyMap = HashMap<String, Vec<f32>>;

/// Template token name to the scalar substituted verbatim
pub type DirectFilterMap = HashMap<String, Value>;

/// pgvector distance operator used by the single-vector query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DistanceStrategy {
    /// `<->`
    #[default]
    Euclidean,
    /// `<=>`
    Cosine,
    /// `<#>`, negative inner product
    InnerProduct,
}

impl DistanceStrategy {
    pub fn operator(&self) -> &'static str {
        match self {
            DistanceStrategy::Euclidean => "<->",
            DistanceStrategy::Cosine => "<=>",
            DistanceStrategy::InnerProduct => "<#>",
        }
    }
}

impl fmt::Display for DistanceStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DistanceStrategy::Euclidean => "euclidean",
            DistanceStrategy::Cosine => "cosine",
            DistanceStrategy::InnerProduct => "inner_product",
        };
        f.write_str(name)
    }
}

impl FromStr for DistanceStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "euclidean" | "l2" | "<->" => Ok(DistanceStrategy::Euclidean),
            "cosine" | "<=>" => Ok(DistanceStrategy::Cosine),
            "inner_product" | "innerproduct" | "ip" | "<#>" => Ok(DistanceStrategy::InnerProduct),
            other => Err(format!(
                "unknown distance strategy '{}', expected euclidean, cosine or inner_product",
                other
            )),
        }
    }
}

/// What a caller hands to [`crate::SimilaritySearchEngine::search`].
///
/// The variant decides which path runs.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchInput {
    /// A precomputed query embedding
    Vector {
        vector: Vec<f32>,
        k: Option<usize>,
        filter: Option<Value>,
    },
    /// Free text, embedded before the single-vector query runs
    Text {
        query: String,
        k: Option<usize>,
        filter: Option<Value>,
    },
    /// A multi-key payload for the configured template
    Payload(Value),
}

impl SearchInput {
    pub fn text(query: impl Into<String>) -> Self {
        SearchInput::Text {
            query: query.into(),
            k: None,
            filter: None,
        }
    }

    pub fn vector(vector: Vec<f32>) -> Self {
        SearchInput::Vector {
            vector,
            k: None,
            filter: None,
        }
    }

    /// Classify a raw query string: a JSON object is a multi-key payload,
    /// anything else is search text.
    pub fn parse(raw: &str) -> Self {
        match serde_json::from_str::<Value>(raw) {
            Ok(value @ Value::Object(_)) => SearchInput::Payload(value),
            _ => SearchInput::text(raw),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_distance_operators() {
        assert_eq!(DistanceStrategy::default().operator(), "<->");
        assert_eq!("cosine".parse::<DistanceStrategy>().unwrap().operator(), "<=>");
        assert_eq!("IP".parse::<DistanceStrategy>().unwrap(), DistanceStrategy::InnerProduct);
        assert!("manhattan".parse::<DistanceStrategy>().is_err());
    }

    #[test]
    fn test_search_input_parse() {
        assert_eq!(
            SearchInput::parse(r#"{"to_embed": {"skill": "java"}}"#),
            SearchInput::Payload(json!({"to_embed": {"skill": "java"}}))
        );
        assert_eq!(SearchInput::parse("senior rust engineer"), SearchInput::text("senior rust engineer"));
        // A JSON scalar is still plain text
        assert_eq!(SearchInput::parse("42"), SearchInput::text("42"));
    }

    #[test]
    fn test_document_serializes_camel_case() {
        let doc = Document::new("hello").with_id("doc-1");
        let value = serde_json::to_value(&doc).unwrap();
        assert_eq!(value, json!({"id": "doc-1", "pageContent": "hello", "metadata": {}}));
    }
}
