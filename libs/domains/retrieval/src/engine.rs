use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use database::postgres::ConnectionPool;
use sea_orm::{DbBackend, QueryResult, Statement};
use serde_json::Value;
use tracing::{debug, instrument};

use crate::config::SearchConfig;
use crate::embedding::EmbeddingProvider;
use crate::error::{RetrievalError, RetrievalResult};
use crate::mapper::RowMapper;
use crate::models::{EmbeddingKeyMap, ScoredDocument, SearchInput};
use crate::query::{QueryPayload, QueryTemplate, SingleVectorQuery};

/// Anything that can answer a top-k similarity query
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Searchable: Send + Sync {
    /// At most `k` results, best first
    async fn similarity_search_with_score(
        &self,
        query: &str,
        k: usize,
    ) -> RetrievalResult<Vec<ScoredDocument>>;
}

/// How free-form queries are answered, fixed when the engine is built
#[derive(Debug, Clone, PartialEq)]
pub enum SearchStrategy {
    /// Embed the query text and run the nearest-neighbour query
    SingleVector,
    /// Treat the query as a multi-key payload for this template
    Template(QueryTemplate),
}

pub struct SimilaritySearchEngine {
    pool: Arc<ConnectionPool>,
    embeddings: Arc<dyn EmbeddingProvider>,
    vector_query: SingleVectorQuery,
    strategy: SearchStrategy,
    filter: Option<Value>,
    k: usize,
}

impl SimilaritySearchEngine {
    /// Build an engine. A non-blank `full_query` selects the template strategy.
    pub fn new(
        pool: Arc<ConnectionPool>,
        embeddings: Arc<dyn EmbeddingProvider>,
        config: &SearchConfig,
    ) -> RetrievalResult<Self> {
        let strategy = match config.full_query.as_deref() {
            Some(sql) if !sql.trim().is_empty() => SearchStrategy::Template(QueryTemplate::new(sql)?),
            _ => SearchStrategy::SingleVector,
        };

        Ok(Self {
            pool,
            embeddings,
            vector_query: SingleVectorQuery::from_config(config),
            strategy,
            filter: config.filter.clone(),
            k: config.k.max(1),
        })
    }

    pub fn strategy(&self) -> &SearchStrategy {
        &self.strategy
    }

    /// Configured top-k
    pub fn k(&self) -> usize {
        self.k
    }

    pub fn pool(&self) -> &ConnectionPool {
        &self.pool
    }

    /// Nearest neighbours of `vector`, closest first.
    ///
    /// `filter` is a jsonb containment filter on `metadata`. When absent the
    /// configured filter applies; a value that is not a JSON object binds `{}`.
    #[instrument(skip(self, vector, filter), fields(table = %self.vector_query.table(), dims = vector.len()))]
    pub async fn search_single(
        &self,
        vector: &[f32],
        k: usize,
        filter: Option<&Value>,
    ) -> RetrievalResult<Vec<ScoredDocument>> {
        let filter = filter.or(self.filter.as_ref());
        let stmt = self.vector_query.build(vector, filter, k.max(1));

        let rows = self.execute(stmt).await?;
        let mut docs = RowMapper::map_single(&rows);
        docs.sort_by(|a, b| a.distance.total_cmp(&b.distance));

        debug!(rows = rows.len(), results = docs.len(), "Single-vector search complete");
        Ok(docs)
    }

    /// Run the configured template for a multi-key payload.
    ///
    /// All `to_embed` texts are embedded in one batch call. Results keep row
    /// order and carry [`crate::MULTI_KEY_SCORE`].
    #[instrument(skip(self, payload))]
    pub async fn search_multi(&self, payload: &Value) -> RetrievalResult<Vec<ScoredDocument>> {
        let SearchStrategy::Template(template) = &self.strategy else {
            return Err(RetrievalError::configuration(
                "multi-key search requires a query template",
            ));
        };

        let payload = QueryPayload::from_value(payload)?;
        let embeddings = self.embed_inputs(&payload).await?;
        let sql = template.resolve(&embeddings, &payload.direct_filters)?;

        debug!(sql = %collapse_whitespace(&sql), "Resolved query template");

        let rows = self
            .execute(Statement::from_string(DbBackend::Postgres, sql))
            .await?;
        let docs = RowMapper::map_multi(&rows);

        debug!(rows = rows.len(), results = docs.len(), "Multi-key search complete");
        Ok(docs)
    }

    /// Dispatch on the shape of `input`
    pub async fn search(&self, input: SearchInput) -> RetrievalResult<Vec<ScoredDocument>> {
        match input {
            SearchInput::Vector { vector, k, filter } => {
                self.search_single(&vector, k.unwrap_or(self.k), filter.as_ref())
                    .await
            }
            SearchInput::Text { query, k, filter } => {
                let vector = self.embeddings.embed(&query).await?;
                self.search_single(&vector, k.unwrap_or(self.k), filter.as_ref())
                    .await
            }
            SearchInput::Payload(payload) => self.search_multi(&payload).await,
        }
    }

    async fn embed_inputs(&self, payload: &QueryPayload) -> RetrievalResult<EmbeddingKeyMap> {
        if payload.to_embed.is_empty() {
            return Ok(HashMap::new());
        }

        let started = Instant::now();
        let vectors = self.embeddings.embed_batch(&payload.texts()).await?;
        debug!(
            count = vectors.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Embedded template inputs"
        );

        if vectors.len() != payload.to_embed.len() {
            return Err(RetrievalError::Embedding(format!(
                "expected {} embeddings, provider returned {}",
                payload.to_embed.len(),
                vectors.len()
            )));
        }

        Ok(payload
            .to_embed
            .iter()
            .map(|(name, _)| name.clone())
            .zip(vectors)
            .collect())
    }

    /// Hold one pool slot for exactly the duration of the statement
    async fn execute(&self, stmt: Statement) -> RetrievalResult<Vec<QueryResult>> {
        let conn = self.pool.acquire().await?;
        let result = conn.query_all(stmt).await;
        self.pool.release(conn);

        Ok(result?)
    }
}

#[async_trait]
impl Searchable for SimilaritySearchEngine {
    async fn similarity_search_with_score(
        &self,
        query: &str,
        k: usize,
    ) -> RetrievalResult<Vec<ScoredDocument>> {
        match &self.strategy {
            SearchStrategy::SingleVector => {
                let vector = self.embeddings.embed(query).await?;
                self.search_single(&vector, k, None).await
            }
            SearchStrategy::Template(_) => {
                let payload = serde_json::from_str::<Value>(query).map_err(|e| {
                    RetrievalError::configuration(format!(
                        "multi-key query is not valid JSON: {}",
                        e
                    ))
                })?;
                let mut docs = self.search_multi(&payload).await?;
                docs.truncate(k.max(1));
                Ok(docs)
            }
        }
    }
}

fn collapse_whitespace(sql: &str) -> String {
    sql.split_whitespace().collect::<Vec<_>>().join(" ")
}
