//! SQLite-backed vector index.
//!
//! Sources carry the filterable metadata; chunks carry text and embeddings.
//! Queries filter on source metadata first, then rank the surviving chunks by
//! cosine similarity.

use crate::embedding::cosine_similarity;
use crate::types::{KnowledgeChunk, KnowledgeSource, RetrievedChunk};
use chrono::{DateTime, Utc};
use kbfilter_core::{AppError, AppResult};
use kbfilter_filter::FilterExpression;
use rusqlite::{params, Connection};
use serde_json::{Map, Value};
use std::path::Path;

/// Open (creating if needed) the index database.
pub fn init_index(db_path: &Path) -> AppResult<Connection> {
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| AppError::Knowledge(format!("Failed to create index directory: {}", e)))?;
    }

    let conn = Connection::open(db_path)
        .map_err(|e| AppError::Knowledge(format!("Failed to open SQLite index: {}", e)))?;

    conn.execute_batch(
        r#"
        PRAGMA foreign_keys = ON;

        CREATE TABLE IF NOT EXISTS sources (
            id TEXT PRIMARY KEY,
            path TEXT NOT NULL,
            ingested_at TEXT NOT NULL,
            size_bytes INTEGER NOT NULL,
            metadata TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS chunks (
            id TEXT PRIMARY KEY,
            source_id TEXT NOT NULL,
            position INTEGER NOT NULL,
            text TEXT NOT NULL,
            embedding BLOB NOT NULL,
            FOREIGN KEY (source_id) REFERENCES sources(id) ON DELETE CASCADE
        );

        CREATE INDEX IF NOT EXISTS idx_chunks_source ON chunks(source_id);
        CREATE INDEX IF NOT EXISTS idx_sources_path ON sources(path);
        "#,
    )
    .map_err(|e| AppError::Knowledge(format!("Failed to create tables: {}", e)))?;

    tracing::debug!("Initialized SQLite index at {:?}", db_path);
    Ok(conn)
}

/// Insert a source, replacing any earlier version of the same path or content.
///
/// Chunks of replaced sources are removed with them.
pub fn upsert_source(conn: &Connection, source: &KnowledgeSource) -> AppResult<()> {
    let metadata_json = serde_json::to_string(&source.metadata)?;

    conn.execute(
        "DELETE FROM sources WHERE path = ?1 OR id = ?2",
        params![source.path, source.id],
    )
    .map_err(|e| AppError::Knowledge(format!("Failed to replace source: {}", e)))?;

    conn.execute(
        "INSERT INTO sources (id, path, ingested_at, size_bytes, metadata)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            source.id,
            source.path,
            source.ingested_at.to_rfc3339(),
            source.size_bytes as i64,
            metadata_json,
        ],
    )
    .map_err(|e| AppError::Knowledge(format!("Failed to insert source: {}", e)))?;

    Ok(())
}

/// Insert a chunk with embedding.
pub fn insert_chunk(conn: &Connection, chunk: &KnowledgeChunk) -> AppResult<()> {
    let embedding = chunk
        .embedding
        .as_ref()
        .ok_or_else(|| AppError::Knowledge(format!("Chunk {} missing embedding", chunk.id)))?;

    conn.execute(
        "INSERT OR REPLACE INTO chunks (id, source_id, position, text, embedding)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            chunk.id,
            chunk.source_id,
            chunk.position as i64,
            chunk.text,
            embedding_to_bytes(embedding),
        ],
    )
    .map_err(|e| AppError::Knowledge(format!("Failed to insert chunk: {}", e)))?;

    Ok(())
}

struct ChunkRow {
    chunk: KnowledgeChunk,
    source_path: String,
    metadata_json: String,
}

/// Top-k chunks most similar to `query_embedding` whose source metadata
/// satisfies `filter`, in descending score order.
pub fn query_chunks(
    conn: &Connection,
    query_embedding: &[f32],
    filter: Option<&FilterExpression>,
    top_k: usize,
) -> AppResult<Vec<RetrievedChunk>> {
    let mut stmt = conn
        .prepare(
            "SELECT c.id, c.source_id, c.position, c.text, c.embedding, s.path, s.metadata
             FROM chunks c JOIN sources s ON s.id = c.source_id",
        )
        .map_err(|e| AppError::Knowledge(format!("Failed to prepare query: {}", e)))?;

    let rows = stmt
        .query_map([], |row| {
            let embedding_bytes: Vec<u8> = row.get(4)?;
            Ok((
                ChunkRow {
                    chunk: KnowledgeChunk {
                        id: row.get(0)?,
                        source_id: row.get(1)?,
                        position: row.get::<_, i64>(2)? as u32,
                        text: row.get(3)?,
                        embedding: None,
                    },
                    source_path: row.get(5)?,
                    metadata_json: row.get(6)?,
                },
                embedding_bytes,
            ))
        })
        .map_err(|e| AppError::Knowledge(format!("Failed to query chunks: {}", e)))?;

    let mut considered = 0usize;
    let mut results = Vec::new();
    for row in rows {
        let (row, embedding_bytes) =
            row.map_err(|e| AppError::Knowledge(format!("Failed to read chunk row: {}", e)))?;
        considered += 1;

        let metadata: Map<String, Value> = serde_json::from_str(&row.metadata_json)?;
        if filter.is_some_and(|f| !f.matches(&metadata)) {
            continue;
        }

        let embedding = bytes_to_embedding(&embedding_bytes)?;
        let score = cosine_similarity(query_embedding, &embedding);
        results.push(RetrievedChunk {
            chunk: row.chunk,
            source_path: row.source_path,
            metadata,
            score,
        });
    }

    results.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.chunk.source_id.cmp(&b.chunk.source_id))
            .then_with(|| a.chunk.position.cmp(&b.chunk.position))
    });

    tracing::debug!(
        considered,
        matched = results.len(),
        top_k,
        filtered = filter.is_some(),
        "Ranked chunks"
    );

    results.truncate(top_k);
    Ok(results)
}

/// Number of sources and chunks.
pub fn get_stats(conn: &Connection) -> AppResult<(u32, u32)> {
    let count = |table: &str| -> AppResult<u32> {
        conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| {
            row.get::<_, i64>(0)
        })
        .map(|v| v as u32)
        .map_err(|e| AppError::Knowledge(format!("Failed to count {}: {}", table, e)))
    };

    Ok((count("sources")?, count("chunks")?))
}

/// Distinct string values of metadata attribute `key` across sources, sorted.
/// List-valued attributes contribute each element.
pub fn metadata_values(conn: &Connection, key: &str) -> AppResult<Vec<String>> {
    let mut stmt = conn
        .prepare("SELECT metadata FROM sources")
        .map_err(|e| AppError::Knowledge(format!("Failed to prepare query: {}", e)))?;
    let rows = stmt
        .query_map([], |row| row.get::<_, String>(0))
        .map_err(|e| AppError::Knowledge(format!("Failed to query sources: {}", e)))?;

    let mut values = std::collections::BTreeSet::new();
    for row in rows {
        let json = row.map_err(|e| AppError::Knowledge(format!("Failed to read source row: {}", e)))?;
        let metadata: Map<String, Value> = serde_json::from_str(&json)?;
        match metadata.get(key) {
            Some(Value::String(s)) => {
                values.insert(s.clone());
            }
            Some(Value::Array(items)) => {
                values.extend(items.iter().filter_map(Value::as_str).map(str::to_string));
            }
            _ => {}
        }
    }

    Ok(values.into_iter().collect())
}

/// Most recent ingestion time, if any source exists.
pub fn last_ingested_at(conn: &Connection) -> AppResult<Option<DateTime<Utc>>> {
    let latest: Option<String> = conn
        .query_row("SELECT MAX(ingested_at) FROM sources", [], |row| row.get(0))
        .map_err(|e| AppError::Knowledge(format!("Failed to read ingestion time: {}", e)))?;

    latest
        .map(|ts| {
            DateTime::parse_from_rfc3339(&ts)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|e| AppError::Knowledge(format!("Corrupt timestamp '{}': {}", ts, e)))
        })
        .transpose()
}

/// Delete all data.
pub fn reset_index(conn: &Connection) -> AppResult<()> {
    conn.execute_batch("DELETE FROM chunks; DELETE FROM sources;")
        .map_err(|e| AppError::Knowledge(format!("Failed to reset index: {}", e)))?;

    tracing::info!("Reset knowledge base index");
    Ok(())
}

fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|v| v.to_le_bytes()).collect()
}

fn bytes_to_embedding(bytes: &[u8]) -> AppResult<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return Err(AppError::Knowledge(
            "Invalid embedding bytes length".to_string(),
        ));
    }

    Ok(bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::NamedTempFile;

    fn source(id: &str, path: &str, metadata: Value) -> KnowledgeSource {
        KnowledgeSource {
            id: id.to_string(),
            path: path.to_string(),
            ingested_at: Utc::now(),
            size_bytes: 10,
            metadata: metadata.as_object().cloned().unwrap_or_default(),
        }
    }

    fn chunk(id: &str, source_id: &str, embedding: Vec<f32>) -> KnowledgeChunk {
        KnowledgeChunk {
            id: id.to_string(),
            source_id: source_id.to_string(),
            position: 0,
            text: format!("text of {}", id),
            embedding: Some(embedding),
        }
    }

    #[test]
    fn test_init_index() {
        let temp_file = NamedTempFile::new().unwrap();
        let conn = init_index(temp_file.path()).unwrap();

        let table_count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert!(table_count >= 2);
    }

    #[test]
    fn test_query_ranks_by_similarity() {
        let temp_file = NamedTempFile::new().unwrap();
        let conn = init_index(temp_file.path()).unwrap();

        upsert_source(&conn, &source("s1", "a.txt", json!({}))).unwrap();
        insert_chunk(&conn, &chunk("near", "s1", vec![1.0, 0.1, 0.0])).unwrap();
        insert_chunk(&conn, &chunk("far", "s1", vec![0.0, 0.0, 1.0])).unwrap();

        let results = query_chunks(&conn, &[1.0, 0.0, 0.0], None, 5).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].chunk.id, "near");
        assert!(results[0].score > results[1].score);
        assert_eq!(results[0].source_path, "a.txt");
    }

    #[test]
    fn test_query_applies_metadata_filter() {
        let temp_file = NamedTempFile::new().unwrap();
        let conn = init_index(temp_file.path()).unwrap();

        upsert_source(&conn, &source("alex", "alex.txt", json!({"name": "Alex Anderson"}))).unwrap();
        upsert_source(&conn, &source("jordan", "jordan.txt", json!({"name": "Jordan Lee"}))).unwrap();
        insert_chunk(&conn, &chunk("c1", "alex", vec![0.0, 1.0])).unwrap();
        insert_chunk(&conn, &chunk("c2", "jordan", vec![1.0, 0.0])).unwrap();

        let filter = FilterExpression::equals("name", "Alex Anderson");
        let results = query_chunks(&conn, &[1.0, 0.0], Some(&filter), 5).unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].chunk.id, "c1");
        assert_eq!(results[0].metadata["name"], "Alex Anderson");
    }

    #[test]
    fn test_metadata_values_distinct_and_sorted() {
        let temp_file = NamedTempFile::new().unwrap();
        let conn = init_index(temp_file.path()).unwrap();

        upsert_source(&conn, &source("a", "a.txt", json!({"category": "healthcare"}))).unwrap();
        upsert_source(&conn, &source("b", "b.txt", json!({"category": ["finance", "healthcare"]}))).unwrap();
        upsert_source(&conn, &source("c", "c.txt", json!({"year": 2024}))).unwrap();

        assert_eq!(
            metadata_values(&conn, "category").unwrap(),
            vec!["finance".to_string(), "healthcare".to_string()]
        );
        assert!(metadata_values(&conn, "missing").unwrap().is_empty());
    }

    #[test]
    fn test_upsert_replaces_same_path() {
        let temp_file = NamedTempFile::new().unwrap();
        let conn = init_index(temp_file.path()).unwrap();

        upsert_source(&conn, &source("v1", "doc.txt", json!({}))).unwrap();
        insert_chunk(&conn, &chunk("old", "v1", vec![1.0])).unwrap();
        upsert_source(&conn, &source("v2", "doc.txt", json!({}))).unwrap();

        assert_eq!(get_stats(&conn).unwrap(), (1, 0));
    }

    #[test]
    fn test_reset_and_last_ingested() {
        let temp_file = NamedTempFile::new().unwrap();
        let conn = init_index(temp_file.path()).unwrap();
        assert_eq!(last_ingested_at(&conn).unwrap(), None);

        upsert_source(&conn, &source("s1", "a.txt", json!({}))).unwrap();
        assert!(last_ingested_at(&conn).unwrap().is_some());

        reset_index(&conn).unwrap();
        assert_eq!(get_stats(&conn).unwrap(), (0, 0));
    }

    #[test]
    fn test_embedding_bytes_roundtrip_rejects_bad_length() {
        assert!(bytes_to_embedding(&[0u8; 3]).is_err());
        let bytes = embedding_to_bytes(&[0.5, -1.0]);
        assert_eq!(bytes_to_embedding(&bytes).unwrap(), vec![0.5, -1.0]);
    }
}
