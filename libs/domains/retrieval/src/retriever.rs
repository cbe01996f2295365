use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::engine::Searchable;
use crate::error::RetrievalResult;
use crate::models::{Document, ScoredDocument};

/// Top-k retrieval over a [`Searchable`] engine. Scores are dropped and no
/// re-ranking happens.
pub struct RetrieverFacade<S: Searchable> {
    engine: Arc<S>,
    k: usize,
}

impl<S: Searchable> RetrieverFacade<S> {
    pub fn new(engine: Arc<S>, k: usize) -> Self {
        Self { engine, k: k.max(1) }
    }

    pub fn k(&self) -> usize {
        self.k
    }

    pub async fn retrieve(&self, query: &str) -> RetrievalResult<Vec<Document>> {
        let docs = self
            .engine
            .similarity_search_with_score(query, self.k)
            .await?;
        Ok(docs.into_iter().map(|scored| scored.document).collect())
    }

    pub fn as_vector_store(&self) -> VectorStoreHandle<S> {
        VectorStoreHandle {
            engine: Arc::clone(&self.engine),
            k: self.k,
        }
    }
}

/// The engine itself plus its configured k, for callers that want scores
pub struct VectorStoreHandle<S: Searchable> {
    engine: Arc<S>,
    k: usize,
}

impl<S: Searchable> VectorStoreHandle<S> {
    pub fn new(engine: Arc<S>, k: usize) -> Self {
        Self { engine, k: k.max(1) }
    }

    pub fn engine(&self) -> &Arc<S> {
        &self.engine
    }

    pub fn k(&self) -> usize {
        self.k
    }

    pub async fn similarity_search_with_score(
        &self,
        query: &str,
    ) -> RetrievalResult<Vec<ScoredDocument>> {
        self.engine.similarity_search_with_score(query, self.k).await
    }
}

/// Which handle the caller asked for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputKind {
    #[default]
    Retriever,
    VectorStore,
}

impl fmt::Display for OutputKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputKind::Retriever => f.write_str("retriever"),
            OutputKind::VectorStore => f.write_str("vectorStore"),
        }
    }
}

impl FromStr for OutputKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "retriever" => Ok(OutputKind::Retriever),
            "vectorStore" | "vector-store" | "vector_store" => Ok(OutputKind::VectorStore),
            other => Err(format!(
                "unknown output '{}', expected retriever or vectorStore",
                other
            )),
        }
    }
}

pub enum RetrieverOutput<S: Searchable> {
    Retriever(RetrieverFacade<S>),
    VectorStore(VectorStoreHandle<S>),
}

impl<S: Searchable> RetrieverOutput<S> {
    pub fn kind(&self) -> OutputKind {
        match self {
            RetrieverOutput::Retriever(_) => OutputKind::Retriever,
            RetrieverOutput::VectorStore(_) => OutputKind::VectorStore,
        }
    }
}

/// Wrap `engine` in the requested handle, both sized to `k`
pub fn build_output<S: Searchable>(engine: Arc<S>, k: usize, kind: OutputKind) -> RetrieverOutput<S> {
    match kind {
        OutputKind::Retriever => RetrieverOutput::Retriever(RetrieverFacade::new(engine, k)),
        OutputKind::VectorStore => RetrieverOutput::VectorStore(VectorStoreHandle::new(engine, k)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::MockSearchable;

    fn scored(id: &str, distance: f64) -> ScoredDocument {
        ScoredDocument::new(Document::new(format!("content {}", id)).with_id(id), distance)
    }

    #[tokio::test]
    async fn test_retrieve_uses_configured_k_and_drops_scores() {
        let mut engine = MockSearchable::new();
        engine
            .expect_similarity_search_with_score()
            .withf(|query, k| query == "vector databases" && *k == 2)
            .times(1)
            .returning(|_, _| Ok(vec![scored("a", 0.1), scored("b", 0.2)]));

        let retriever = RetrieverFacade::new(Arc::new(engine), 2);
        let docs = retriever.retrieve("vector databases").await.unwrap();

        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].id.as_deref(), Some("a"));
    }

    #[tokio::test]
    async fn test_vector_store_keeps_scores() {
        let mut engine = MockSearchable::new();
        engine
            .expect_similarity_search_with_score()
            .withf(|_, k| *k == 4)
            .returning(|_, _| Ok(vec![scored("a", 0.3)]));

        let retriever = RetrieverFacade::new(Arc::new(engine), 4);
        let store = retriever.as_vector_store();

        assert_eq!(store.k(), 4);
        let docs = store.similarity_search_with_score("q").await.unwrap();
        assert_eq!(docs[0].distance, 0.3);
    }

    #[test]
    fn test_build_output() {
        let engine = Arc::new(MockSearchable::new());

        let output = build_output(Arc::clone(&engine), 6, "vectorStore".parse().unwrap());
        assert_eq!(output.kind(), OutputKind::VectorStore);

        let output = build_output(engine, 6, OutputKind::default());
        match output {
            RetrieverOutput::Retriever(retriever) => assert_eq!(retriever.k(), 6),
            RetrieverOutput::VectorStore(_) => panic!("expected a retriever"),
        }

        assert!("index".parse::<OutputKind>().is_err());
        assert_eq!(OutputKind::VectorStore.to_string(), "vectorStore");
    }
}
