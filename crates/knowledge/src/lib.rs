//! Local knowledge bases with metadata filtering.
//!
//! Documents are chunked, embedded and stored in SQLite together with the
//! metadata attributes from their sidecar files. Retrieval ranks chunks by
//! similarity after restricting them to sources whose metadata satisfies a
//! [`FilterExpression`](kbfilter_filter::FilterExpression).
//!
//! On top of the store sit the model-backed pieces: the attribute
//! [`extractor`], the [`implicit`] filter generator, the retrieval [`agent`]
//! and the [`pipeline`] that ties them together.

pub mod agent;
pub mod chunker;
pub mod config;
pub mod embedding;
pub mod extractor;
pub mod implicit;
pub mod index;
pub mod metadata;
pub mod pipeline;
pub mod prompts;
pub mod types;

#[cfg(test)]
mod tests;

pub use agent::{AgentAnswer, AgentDefinition, KnowledgeAgent, RetrievalAgent};
pub use extractor::{AttributeExtractor, LlmExtractor};
pub use implicit::{AttributeType, ImplicitFilterGenerator, MetadataAttributeSchema};
pub use pipeline::{FilterMethod, FilteredAnswer, FilteredRetrieval};
pub use prompts::PromptLibrary;
pub use types::{
    BaseStats, IngestOptions, IngestStats, KnowledgeBaseConfig, KnowledgeChunk, KnowledgeSource,
    RetrieveOptions, RetrievedChunk,
};

use chrono::Utc;
use kbfilter_core::{AppError, AppResult};
use sha2::{Digest, Sha256};
use std::path::Path;
use std::time::Instant;
use walkdir::WalkDir;

/// Ingest documents into a knowledge base.
///
/// Files are read as UTF-8 text; anything else is skipped with a warning.
/// Metadata sidecars are attached to their document and never ingested on
/// their own. A malformed sidecar aborts the ingest.
pub fn ingest(workspace: &Path, options: &IngestOptions) -> AppResult<IngestStats> {
    let start = Instant::now();
    tracing::info!("Starting ingest for base '{}'", options.base_name);

    let config = config::load_config(workspace, &options.base_name)?;
    let index_path = config::get_index_path(workspace, &options.base_name);
    let conn = index::init_index(&index_path)?;

    if options.reset {
        tracing::info!("Resetting knowledge base before ingest");
        index::reset_index(&conn)?;
    }

    let mut stats = IngestStats::default();

    for root in &options.paths {
        if !root.exists() {
            return Err(AppError::Knowledge(format!("Path does not exist: {:?}", root)));
        }

        let walker = WalkDir::new(root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !is_hidden(e.path()));

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!("Skipping unreadable entry: {}", e);
                    stats.skipped_count += 1;
                    continue;
                }
            };

            let path = entry.path();
            if !entry.file_type().is_file()
                || metadata::is_sidecar(path)
                || !should_include(path, options)
            {
                continue;
            }

            match ingest_file(&conn, &config, path)? {
                Some((chunks, bytes)) => {
                    stats.sources_count += 1;
                    stats.chunks_count += chunks;
                    stats.bytes_processed += bytes;
                }
                None => stats.skipped_count += 1,
            }
        }
    }

    config::save_config(workspace, &config)?;
    stats.duration_secs = start.elapsed().as_secs_f64();

    tracing::info!(
        "Ingest completed: {} sources, {} chunks, {} skipped, {} bytes in {:.2}s",
        stats.sources_count,
        stats.chunks_count,
        stats.skipped_count,
        stats.bytes_processed,
        stats.duration_secs
    );

    Ok(stats)
}

/// Ingest one file; `None` when it is not UTF-8 text.
fn ingest_file(
    conn: &rusqlite::Connection,
    config: &KnowledgeBaseConfig,
    path: &Path,
) -> AppResult<Option<(u32, u64)>> {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) => {
            tracing::warn!("Skipping {:?}: {}", path, e);
            return Ok(None);
        }
    };

    let metadata = metadata::load_sidecar(path)?;
    let path_str = path.to_string_lossy().to_string();

    let mut hasher = Sha256::new();
    hasher.update(path_str.as_bytes());
    hasher.update([0u8]);
    hasher.update(text.as_bytes());
    let source_id = format!("{:x}", hasher.finalize());

    let source = KnowledgeSource {
        id: source_id.clone(),
        path: path_str,
        ingested_at: Utc::now(),
        size_bytes: text.len() as u64,
        metadata,
    };
    index::upsert_source(conn, &source)?;

    let candidates = chunker::chunk_text(
        &source_id,
        &text,
        config.chunk_size as usize,
        config.chunk_overlap as usize,
    );

    let mut chunks_count = 0u32;
    for candidate in candidates {
        let embedding = embedding::embed_text(&candidate.text, config.embedding_dim as usize);
        let chunk = KnowledgeChunk {
            id: format!("{}-{}", candidate.source_id, candidate.position),
            source_id: candidate.source_id,
            position: candidate.position,
            text: candidate.text,
            embedding: Some(embedding),
        };
        index::insert_chunk(conn, &chunk)?;
        chunks_count += 1;
    }

    tracing::debug!(
        "Ingested {:?}: {} chunks, {} metadata attributes",
        path,
        chunks_count,
        source.metadata.len()
    );

    Ok(Some((chunks_count, source.size_bytes)))
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with('.'))
}

/// Excludes win over includes; with no includes everything passes.
fn should_include(path: &Path, options: &IngestOptions) -> bool {
    let path_str = path.to_string_lossy();

    if options.exclude.iter().any(|p| path_str.contains(p.as_str())) {
        return false;
    }

    options.include.is_empty() || options.include.iter().any(|p| path_str.contains(p.as_str()))
}

/// Retrieve the chunks most relevant to a query, restricted by the
/// options' metadata filter.
pub fn retrieve(workspace: &Path, options: &RetrieveOptions) -> AppResult<Vec<RetrievedChunk>> {
    let config = config::load_config(workspace, &options.base_name)?;

    let index_path = config::get_index_path(workspace, &options.base_name);
    if !index_path.exists() {
        return Err(AppError::Knowledge(format!(
            "Knowledge base '{}' has no index. Run 'kbfilter ingest' first.",
            options.base_name
        )));
    }

    if let Some(filter) = &options.filter {
        filter.validate()?;
    }

    let conn = index::init_index(&index_path)?;
    let query_embedding = embedding::embed_text(&options.query, config.embedding_dim as usize);
    let top_k = options.top_k.unwrap_or(config.top_k) as usize;

    let results: Vec<_> = index::query_chunks(&conn, &query_embedding, options.filter.as_ref(), top_k)?
        .into_iter()
        .filter(|r| r.score >= config.min_score)
        .collect();

    match results.first() {
        Some(best) => tracing::info!(
            "Retrieved {} chunks from '{}' (top score: {:.3})",
            results.len(),
            options.base_name,
            best.score
        ),
        None => tracing::info!(
            "No chunks in '{}' passed the filter and relevance cutoff {:.2}",
            options.base_name,
            config.min_score
        ),
    }

    Ok(results)
}

/// Distinct values of a metadata attribute across a base's sources.
pub fn metadata_values(workspace: &Path, base_name: &str, key: &str) -> AppResult<Vec<String>> {
    let index_path = config::get_index_path(workspace, base_name);
    if !index_path.exists() {
        return Ok(Vec::new());
    }
    let conn = index::init_index(&index_path)?;
    index::metadata_values(&conn, key)
}

/// Clean (reset) a knowledge base.
pub fn clean(workspace: &Path, base_name: &str) -> AppResult<()> {
    tracing::info!("Cleaning knowledge base '{}'", base_name);

    let index_path = config::get_index_path(workspace, base_name);
    if !index_path.exists() {
        return Err(AppError::Knowledge(format!(
            "Knowledge base '{}' does not exist",
            base_name
        )));
    }

    let conn = index::init_index(&index_path)?;
    index::reset_index(&conn)?;

    tracing::info!("Knowledge base '{}' cleaned", base_name);
    Ok(())
}

/// Get statistics for a knowledge base.
pub fn stats(workspace: &Path, base_name: &str) -> AppResult<BaseStats> {
    let index_path = config::get_index_path(workspace, base_name);
    if !index_path.exists() {
        return Err(AppError::Knowledge(format!(
            "Knowledge base '{}' does not exist",
            base_name
        )));
    }

    let conn = index::init_index(&index_path)?;
    let (sources_count, chunks_count) = index::get_stats(&conn)?;
    let db_size_bytes = std::fs::metadata(&index_path).map(|m| m.len()).unwrap_or(0);

    Ok(BaseStats {
        base_name: base_name.to_string(),
        sources_count,
        chunks_count,
        db_size_bytes,
        last_ingest_at: index::last_ingested_at(&conn)?,
    })
}
