//! Cross-module scenarios over a real on-disk knowledge base.


use crate::config;
use crate::types::{IngestOptions, KnowledgeBaseConfig};
use std::path::Path;
use tempfile::TempDir;

pub(crate) const BASE: &str = "people";

/// Workspace with two people documents carrying sidecar metadata and one
/// document without any. Already ingested into [`BASE`].
pub(crate) fn people_workspace() -> TempDir {
    let temp = TempDir::new().unwrap();
    let docs = temp.path().join("docs");
    std::fs::create_dir_all(&docs).unwrap();

    write_doc(
        &docs,
        "alex.txt",
        "Alex Anderson is the chief financial officer. The finance portfolio grew twelve percent this quarter.",
        Some(r#"{"metadataAttributes": {"name": "Alex Anderson", "category": "finance", "role": "executive"}}"#),
    );
    write_doc(
        &docs,
        "jordan.txt",
        "Jordan Lee manages the healthcare operations team. Patient intake times improved this quarter.",
        Some(r#"{"metadataAttributes": {"name": "Jordan Lee", "category": "healthcare", "role": "manager"}}"#),
    );
    write_doc(
        &docs,
        "notes.txt",
        "General quarterly notes shared across the whole company.",
        None,
    );

    config::save_config(
        temp.path(),
        &KnowledgeBaseConfig {
            name: BASE.to_string(),
            min_score: 0.0,
            ..Default::default()
        },
    )
    .unwrap();

    crate::ingest(temp.path(), &ingest_options(&docs)).unwrap();
    temp
}

pub(crate) fn ingest_options(docs: &Path) -> IngestOptions {
    IngestOptions {
        base_name: BASE.to_string(),
        paths: vec![docs.to_path_buf()],
        ..Default::default()
    }
}

pub(crate) fn write_doc(dir: &Path, name: &str, text: &str, sidecar: Option<&str>) {
    let path = dir.join(name);
    std::fs::write(&path, text).unwrap();
    if let Some(sidecar) = sidecar {
        std::fs::write(crate::metadata::sidecar_path(&path), sidecar).unwrap();
    }
}
