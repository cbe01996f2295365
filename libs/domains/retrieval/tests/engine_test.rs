//! Engine tests against SeaORM's mock connection
//!
//! These cover the public search API end to end without a real store:
//! - bound parameters of the single-vector query
//! - template substitution and batched embedding
//! - pool slots returned on every path

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use database::postgres::ConnectionPool;
use domain_retrieval::*;
use sea_orm::{DatabaseBackend, DatabaseConnection, DbErr, MockDatabase, Statement, Transaction, Value};
use serde_json::json;
use test_utils::assertions::assert_non_decreasing;

/// Embeds text as a fixed vector per word and counts calls
#[derive(Default)]
struct FakeEmbeddings {
    vectors: HashMap<String, Vec<f32>>,
    batch_calls: AtomicUsize,
    batches: Mutex<Vec<Vec<String>>>,
}

impl FakeEmbeddings {
    fn with(mut self, text: &str, vector: Vec<f32>) -> Self {
        self.vectors.insert(text.to_string(), vector);
        self
    }

    fn lookup(&self, text: &str) -> RetrievalResult<Vec<f32>> {
        self.vectors
            .get(text)
            .cloned()
            .ok_or_else(|| RetrievalError::Embedding(format!("no vector for '{}'", text)))
    }
}

#[async_trait]
impl EmbeddingProvider for FakeEmbeddings {
    async fn embed(&self, text: &str) -> RetrievalResult<Vec<f32>> {
        self.lookup(text)
    }

    async fn embed_batch(&self, texts: &[String]) -> RetrievalResult<Vec<Vec<f32>>> {
        self.batch_calls.fetch_add(1, Ordering::SeqCst);
        self.batches.lock().unwrap().push(texts.to_vec());
        texts.iter().map(|t| self.lookup(t)).collect()
    }
}

fn doc_row(id: &str, content: Option<&str>, distance: Option<f64>) -> BTreeMap<&'static str, Value> {
    BTreeMap::from([
        ("id", Value::from(id)),
        ("pageContent", content.map(str::to_string).into()),
        ("metadata", Value::from(json!({"source": "handbook"}))),
        ("_distance", distance.into()),
    ])
}

fn build(
    db: MockDatabase,
    embeddings: Arc<FakeEmbeddings>,
    config: SearchConfig,
) -> (SimilaritySearchEngine, Arc<FakeEmbeddings>) {
    let (engine, embeddings, _) = build_logged(db, embeddings, config);
    (engine, embeddings)
}

/// Like `build`, also returning a handle on the mock connection so tests can
/// read back the executed statements
fn build_logged(
    db: MockDatabase,
    embeddings: Arc<FakeEmbeddings>,
    config: SearchConfig,
) -> (SimilaritySearchEngine, Arc<FakeEmbeddings>, DatabaseConnection) {
    let conn = db.into_connection();
    let pool = Arc::new(ConnectionPool::from_connection(conn.clone(), 4));
    let engine = SimilaritySearchEngine::new(pool, embeddings.clone(), &config).unwrap();
    (engine, embeddings, conn)
}

fn candidates_template() -> SearchConfig {
    SearchConfig::new("candidates").with_full_query(
        "SELECT * FROM candidates\n  WHERE skills <=> [skill] < 0.5\n  AND role <=> [role] < 0.5\n  AND city = [city]\n  LIMIT 4;",
    )
}

// ============================================================================
// Single-vector path
// ============================================================================

#[tokio::test]
async fn test_single_vector_results_are_ordered_and_filtered() {
    let db = MockDatabase::new(DatabaseBackend::Postgres).append_query_results([vec![
        doc_row("a", Some("rotate keys monthly"), Some(0.12)),
        doc_row("b", None, Some(0.15)),
        doc_row("c", Some("use a vault"), None),
        doc_row("d", Some("audit access"), Some(0.31)),
    ]]);
    let (engine, _) = build(db, Arc::new(FakeEmbeddings::default()), SearchConfig::default());

    let docs = engine
        .search(SearchInput::Vector {
            vector: vec![0.1, 0.2, 0.3],
            k: Some(4),
            filter: Some(json!({"source": "handbook"})),
        })
        .await
        .unwrap();

    let ids: Vec<_> = docs.iter().filter_map(|d| d.document.id.clone()).collect();
    assert_eq!(ids, vec!["a", "d"]);
    assert_non_decreasing(&docs.iter().map(|d| d.distance).collect::<Vec<_>>(), "single vector");
    assert_eq!(engine.pool().available(), 4);
}

#[tokio::test]
async fn test_text_search_uses_configured_k() {
    let embeddings = Arc::new(FakeEmbeddings::default().with("credentials", vec![1.0, 0.0]));
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([vec![doc_row("a", Some("rotate keys"), Some(0.2))]]);
    let (engine, embeddings) = build(
        db,
        embeddings,
        SearchConfig::new("handbook").with_k(2),
    );

    let docs = engine.search(SearchInput::text("credentials")).await.unwrap();

    assert_eq!(docs.len(), 1);
    assert_eq!(engine.k(), 2);
    assert_eq!(embeddings.batch_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_failed_query_returns_slot_to_pool() {
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_errors([DbErr::Custom("relation \"handbook\" does not exist".into())]);
    let (engine, _) = build(db, Arc::new(FakeEmbeddings::default()), SearchConfig::new("handbook"));
    let before = engine.pool().available();

    let err = engine
        .search(SearchInput::vector(vec![0.0, 1.0]))
        .await
        .unwrap_err();

    assert!(matches!(err, RetrievalError::Execution(_)));
    assert_eq!(engine.pool().available(), before);
}

// ============================================================================
// Multi-key template path
// ============================================================================

#[tokio::test]
async fn test_template_embeds_in_one_batch() {
    let embeddings = Arc::new(
        FakeEmbeddings::default()
            .with("java", vec![0.5, 0.25])
            .with("backend", vec![0.75, 0.0]),
    );
    let db = MockDatabase::new(DatabaseBackend::Postgres).append_query_results([vec![
        doc_row("cand-1", Some("Java backend engineer"), None),
        doc_row("cand-2", None, None),
        doc_row("cand-3", Some("Kotlin backend engineer"), None),
    ]]);
    let (engine, embeddings, conn) = build_logged(db, embeddings, candidates_template());

    let docs = engine
        .similarity_search_with_score(
            r#"{"to_embed": {"skill": "java", "role": "backend"}, "direct_filters": {"city": "Berlin"}}"#,
            4,
        )
        .await
        .unwrap();

    assert_eq!(embeddings.batch_calls.load(Ordering::SeqCst), 1);
    assert_eq!(embeddings.batches.lock().unwrap()[0].len(), 2);
    assert_eq!(docs.len(), 2);
    assert!(docs.iter().all(|d| d.distance == MULTI_KEY_SCORE));
    assert_eq!(docs[1].document.id.as_deref(), Some("cand-3"));

    let log = conn.into_transaction_log();
    assert_eq!(
        log,
        [Transaction::one(Statement::from_string(
            DatabaseBackend::Postgres,
            "SELECT * FROM candidates\n  WHERE skills <=> '[0.5,0.25]' < 0.5\n  AND role <=> '[0.75,0]' < 0.5\n  AND city = 'Berlin'\n  LIMIT 4;"
                .to_owned(),
        ))]
    );
    let sql = &log[0].statements()[0].sql;
    assert!(!sql.contains("[skill]") && !sql.contains("[role]") && !sql.contains("[city]"));
}

#[tokio::test]
async fn test_template_results_capped_at_k() {
    let embeddings = Arc::new(
        FakeEmbeddings::default()
            .with("java", vec![0.5, 0.25])
            .with("backend", vec![0.75, 0.0]),
    );
    let db = MockDatabase::new(DatabaseBackend::Postgres).append_query_results([vec![
        doc_row("cand-1", Some("Java backend engineer"), None),
        doc_row("cand-2", Some("Go backend engineer"), None),
        doc_row("cand-3", Some("Kotlin backend engineer"), None),
    ]]);
    let (engine, _) = build(db, embeddings, candidates_template().with_k(2));
    let k = engine.k();

    let retriever = RetrieverFacade::new(Arc::new(engine), k);
    let docs = retriever
        .retrieve(
            r#"{"to_embed": {"skill": "java", "role": "backend"}, "direct_filters": {"city": "Berlin"}}"#,
        )
        .await
        .unwrap();

    let contents: Vec<_> = docs.iter().map(|d| d.page_content.as_str()).collect();
    assert_eq!(contents, vec!["Java backend engineer", "Go backend engineer"]);
}

#[tokio::test]
async fn test_legacy_payload_through_search() {
    let embeddings = Arc::new(FakeEmbeddings::default().with("java", vec![0.5]));
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([vec![doc_row("cand-1", Some("Java"), None)]]);
    let config = SearchConfig::default().with_full_query("SELECT * FROM documents WHERE tag = [skill] LIMIT 1;");
    let (engine, embeddings) = build(db, embeddings, config);

    let docs = engine
        .search(SearchInput::parse(r#"{"skill": "java"}"#))
        .await
        .unwrap();

    assert_eq!(docs.len(), 1);
    assert_eq!(embeddings.batch_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_malformed_payload_fails_fast() {
    let embeddings = Arc::new(FakeEmbeddings::default());
    let config = SearchConfig::default().with_full_query("SELECT * FROM documents WHERE tag = [skill]");
    let (engine, embeddings) = build(MockDatabase::new(DatabaseBackend::Postgres), embeddings, config);

    let err = engine
        .similarity_search_with_score("java developers", 4)
        .await
        .unwrap_err();

    assert!(matches!(err, RetrievalError::Configuration(_)));
    assert_eq!(embeddings.batch_calls.load(Ordering::SeqCst), 0);
}

// ============================================================================
// Retriever facade
// ============================================================================

#[tokio::test]
async fn test_retriever_over_engine() {
    let embeddings = Arc::new(FakeEmbeddings::default().with("keys", vec![0.2, 0.2]));
    let db = MockDatabase::new(DatabaseBackend::Postgres).append_query_results([vec![
        doc_row("a", Some("rotate keys"), Some(0.3)),
        doc_row("b", Some("revoke keys"), Some(0.1)),
    ]]);
    let (engine, _) = build(db, embeddings, SearchConfig::default().with_k(2));
    let k = engine.k();

    let retriever = RetrieverFacade::new(Arc::new(engine), k);
    let docs = retriever.retrieve("keys").await.unwrap();

    assert_eq!(docs.len(), 2);
    assert_eq!(docs[0].page_content, "revoke keys");
}
