use async_trait::async_trait;
use core_config::{
    ConfigError, FromEnv, env_optional, env_or_default, env_parse_optional, env_required,
};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::EmbeddingProvider;
use crate::error::{RetrievalError, RetrievalResult};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "text-embedding-3-small";

/// Settings for any OpenAI-compatible `/embeddings` endpoint
#[derive(Clone)]
pub struct OpenAIConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,

    /// Output size for models that support shortening
    pub dimensions: Option<u32>,
}

impl OpenAIConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            dimensions: None,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_dimensions(mut self, dimensions: u32) -> Self {
        self.dimensions = Some(dimensions);
        self
    }
}

impl std::fmt::Debug for OpenAIConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAIConfig")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("dimensions", &self.dimensions)
            .finish_non_exhaustive()
    }
}

/// Load OpenAIConfig from environment variables
///
/// - `OPENAI_API_KEY` (required)
/// - `OPENAI_BASE_URL` (default: https://api.openai.com/v1)
/// - `OPENAI_EMBEDDING_MODEL` (default: text-embedding-3-small)
/// - `OPENAI_EMBEDDING_DIMENSIONS` (optional)
impl FromEnv for OpenAIConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::new(env_required("OPENAI_API_KEY")?)
            .with_base_url(env_or_default("OPENAI_BASE_URL", DEFAULT_BASE_URL))
            .with_model(env_optional("OPENAI_EMBEDDING_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()));
        config.dimensions = env_parse_optional("OPENAI_EMBEDDING_DIMENSIONS")?;
        Ok(config)
    }
}

/// OpenAI embeddings provider
pub struct OpenAIProvider {
    client: Client,
    config: OpenAIConfig,
}

impl OpenAIProvider {
    pub fn new(config: OpenAIConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    pub fn from_env() -> RetrievalResult<Self> {
        Ok(Self::new(OpenAIConfig::from_env()?))
    }

    pub fn config(&self) -> &OpenAIConfig {
        &self.config
    }
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}

/// Order vectors by their input index and check one came back per input
fn into_vectors(response: EmbeddingResponse, expected: usize) -> RetrievalResult<Vec<Vec<f32>>> {
    let mut data = response.data;
    if data.len() != expected {
        return Err(RetrievalError::Embedding(format!(
            "expected {} embeddings, provider returned {}",
            expected,
            data.len()
        )));
    }

    data.sort_by_key(|d| d.index);
    Ok(data.into_iter().map(|d| d.embedding).collect())
}

#[async_trait]
impl EmbeddingProvider for OpenAIProvider {
    async fn embed(&self, text: &str) -> RetrievalResult<Vec<f32>> {
        self.embed_batch(&[text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| RetrievalError::Embedding("No embedding returned".to_string()))
    }

    async fn embed_batch(&self, texts: &[String]) -> RetrievalResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        let request = EmbeddingRequest {
            model: &self.config.model,
            input: texts,
            dimensions: self.config.dimensions,
        };

        let response = self
            .client
            .post(format!("{}/embeddings", self.config.base_url))
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(RetrievalError::Embedding(format!(
                "OpenAI API error ({}): {}",
                status, error_text
            )));
        }

        let vectors = into_vectors(response.json().await?, texts.len())?;
        debug!(model = %self.config.model, count = vectors.len(), "Embeddings received");

        Ok(vectors)
    }
}
