//! Retrieval Domain Library
//!
//! Similarity search over a PostgreSQL table with the pgvector extension.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐
//! │ RetrieverFacade  │  ← top-k documents, scores dropped
//! └────────┬─────────┘
//!          │ Searchable
//! ┌────────▼──────────────┐     ┌───────────────────┐
//! │ SimilaritySearchEngine│────▶│ EmbeddingProvider │
//! │  SingleVector |       │     │  (OpenAIProvider) │
//! │  Template strategy    │     └───────────────────┘
//! └──┬─────────────┬──────┘
//!    │             │
//! ┌──▼───────────┐ ┌▼──────────┐     ┌────────────────┐
//! │ Query        │ │ RowMapper │     │ ConnectionPool │
//! │ builders     │ └───────────┘     │ (database)     │
//! └──────────────┘                   └────────────────┘
//! ```
//!
//! Two search paths share the pool and the row mapper:
//!
//! - **Single vector**: one embedding, bound parameters, `ORDER BY` distance.
//! - **Multi-key template**: several texts embedded in one batch call and
//!   substituted into an operator-authored SQL template alongside literal
//!   filters. Every result carries [`MULTI_KEY_SCORE`].
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use core_config::FromEnv;
//! use database::postgres::{ConnectionConfig, ConnectionPool};
//! use domain_retrieval::{OpenAIProvider, RetrieverFacade, SearchConfig, SimilaritySearchEngine};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let pool = ConnectionPool::connect(&ConnectionConfig::from_env()?).await?;
//! let config = SearchConfig::from_env()?;
//!
//! let engine = SimilaritySearchEngine::new(
//!     Arc::new(pool),
//!     Arc::new(OpenAIProvider::from_env()?),
//!     &config,
//! )?;
//!
//! let retriever = RetrieverFacade::new(Arc::new(engine), config.k);
//! let docs = retriever.retrieve("how do I rotate credentials?").await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod embedding;
pub mod engine;
pub mod error;
pub mod mapper;
pub mod models;
pub mod query;
pub mod retriever;

pub use config::{DEFAULT_TABLE, DEFAULT_TOP_K, SearchConfig, parse_top_k};
pub use embedding::{EmbeddingProvider, OpenAIConfig, OpenAIProvider};
pub use engine::{SearchStrategy, Searchable, SimilaritySearchEngine};
pub use error::{RetrievalError, RetrievalResult};
pub use mapper::RowMapper;
pub use models::{
    DirectFilterMap, DistanceStrategy, Document, EmbeddingKeyMap, MULTI_KEY_SCORE, ScoredDocument,
    SearchInput,
};
pub use query::{QueryPayload, QueryTemplate, SingleVectorQuery};
pub use retriever::{
    OutputKind, RetrieverFacade, RetrieverOutput, VectorStoreHandle, build_output,
};
