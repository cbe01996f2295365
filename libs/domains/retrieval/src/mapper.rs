use sea_orm::{QueryResult, TryGetable};
use serde_json::{Map, Value};
use tracing::debug;
use uuid::Uuid;

use crate::models::{Document, MULTI_KEY_SCORE, ScoredDocument};

const ID: &str = "id";
const PAGE_CONTENT: &str = "pageContent";
const METADATA: &str = "metadata";
const DISTANCE: &str = "_distance";

/// Turns result rows into scored documents.
///
/// Only `id`, `pageContent`, `metadata` and `_distance` are read; any other
/// column (the embedding itself, for instance) is ignored. Rows that cannot
/// form a valid document are skipped, never reported as errors.
pub struct RowMapper;

impl RowMapper {
    /// Single-vector rows, which must carry `_distance` and `pageContent`
    pub fn map_single(rows: &[QueryResult]) -> Vec<ScoredDocument> {
        let total = rows.len();
        let docs: Vec<ScoredDocument> = rows
            .iter()
            .filter_map(|row| {
                let distance = column::<f64>(row, DISTANCE)?;
                Some(ScoredDocument::new(document(row)?, distance))
            })
            .collect();

        log_dropped(total, docs.len());
        docs
    }

    /// Template rows, scored with [`MULTI_KEY_SCORE`] in row order
    pub fn map_multi(rows: &[QueryResult]) -> Vec<ScoredDocument> {
        let total = rows.len();
        let docs: Vec<ScoredDocument> = rows
            .iter()
            .filter_map(|row| Some(ScoredDocument::new(document(row)?, MULTI_KEY_SCORE)))
            .collect();

        log_dropped(total, docs.len());
        docs
    }
}

fn document(row: &QueryResult) -> Option<Document> {
    let page_content = column::<String>(row, PAGE_CONTENT)?;
    let id = row_id(row)?;

    Some(
        Document::new(page_content)
            .with_id(id)
            .with_metadata(metadata(row)),
    )
}

/// A missing column, a NULL, or a type mismatch all read as `None`
fn column<T: TryGetable>(row: &QueryResult, name: &str) -> Option<T> {
    row.try_get::<Option<T>>("", name).ok().flatten()
}

fn row_id(row: &QueryResult) -> Option<String> {
    column::<Uuid>(row, ID)
        .map(|id| id.to_string())
        .or_else(|| column::<String>(row, ID))
        .or_else(|| column::<i64>(row, ID).map(|id| id.to_string()))
        .or_else(|| column::<i32>(row, ID).map(|id| id.to_string()))
}

fn metadata(row: &QueryResult) -> Map<String, Value> {
    let raw = column::<Value>(row, METADATA).or_else(|| {
        column::<String>(row, METADATA).and_then(|s| serde_json::from_str(&s).ok())
    });

    match raw {
        Some(Value::Object(map)) => map,
        _ => Map::new(),
    }
}

fn log_dropped(total: usize, kept: usize) {
    if kept < total {
        debug!(dropped = total - kept, kept, "Skipped rows without id, content or distance");
    }
}
