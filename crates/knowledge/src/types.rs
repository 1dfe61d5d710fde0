//! Knowledge base type definitions.

use chrono::{DateTime, Utc};
use kbfilter_filter::FilterExpression;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::PathBuf;

/// Configuration for a knowledge base.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeBaseConfig {
    /// Name of the knowledge base
    pub name: String,

    /// Chunk size in characters
    #[serde(default = "default_chunk_size")]
    pub chunk_size: u32,

    /// Overlap between chunks
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: u32,

    /// Embedding vector dimension
    #[serde(default = "default_embedding_dim")]
    pub embedding_dim: u32,

    /// Chunks returned per query unless the caller overrides it
    #[serde(default = "default_top_k")]
    pub top_k: u32,

    /// Chunks scoring below this are dropped
    #[serde(default = "default_min_score")]
    pub min_score: f32,
}

fn default_chunk_size() -> u32 {
    512
}

fn default_chunk_overlap() -> u32 {
    64
}

fn default_embedding_dim() -> u32 {
    384
}

fn default_top_k() -> u32 {
    5
}

fn default_min_score() -> f32 {
    0.10
}

impl Default for KnowledgeBaseConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            embedding_dim: default_embedding_dim(),
            top_k: default_top_k(),
            min_score: default_min_score(),
        }
    }
}

/// An ingested document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeSource {
    /// SHA-256 of the path and content
    pub id: String,

    /// Path the document was read from
    pub path: String,

    /// When the document was ingested
    pub ingested_at: DateTime<Utc>,

    /// Document size in bytes
    pub size_bytes: u64,

    /// Filterable metadata attributes
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

/// A text chunk with its embedding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeChunk {
    pub id: String,
    pub source_id: String,

    /// Position within source
    pub position: u32,

    pub text: String,

    /// Embedding vector (normalized)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

/// A chunk returned by a query, with its source context.
#[derive(Debug, Clone, Serialize)]
pub struct RetrievedChunk {
    pub chunk: KnowledgeChunk,
    pub source_path: String,
    pub metadata: Map<String, Value>,
    pub score: f32,
}

/// Options for the ingest operation.
#[derive(Debug, Clone, Default)]
pub struct IngestOptions {
    /// Knowledge base name
    pub base_name: String,

    /// Files or directories to ingest
    pub paths: Vec<PathBuf>,

    /// Substring patterns a path must contain (any)
    pub include: Vec<String>,

    /// Substring patterns that exclude a path
    pub exclude: Vec<String>,

    /// Reset the base before ingesting
    pub reset: bool,
}

/// Statistics from an ingest operation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestStats {
    pub sources_count: u32,
    pub chunks_count: u32,
    pub skipped_count: u32,
    pub bytes_processed: u64,
    pub duration_secs: f64,
}

/// Options for a retrieval query.
#[derive(Debug, Clone)]
pub struct RetrieveOptions {
    pub base_name: String,
    pub query: String,

    /// Overrides the base's configured `top_k`
    pub top_k: Option<u32>,

    /// Only chunks whose source metadata matches are considered
    pub filter: Option<FilterExpression>,
}

/// Statistics for a knowledge base.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BaseStats {
    pub base_name: String,
    pub sources_count: u32,
    pub chunks_count: u32,
    pub db_size_bytes: u64,
    pub last_ingest_at: Option<DateTime<Utc>>,
}

/// Chunk produced by the chunker, before embedding.
#[derive(Debug, Clone)]
pub struct ChunkCandidate {
    pub source_id: String,
    pub position: u32,
    pub text: String,
}
