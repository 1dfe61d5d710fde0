//! Metadata sidecar files.
//!
//! A document `report.txt` may carry filterable attributes in
//! `report.txt.metadata.json`:
//!
//! ```json
//! {"metadataAttributes": {"name": "Alex Anderson", "category": "finance", "year": 2024}}
//! ```
//!
//! Attribute values must be strings, numbers, booleans or lists of strings.

use kbfilter_core::{AppError, AppResult};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

/// Suffix appended to a document's file name to find its sidecar.
pub const SIDECAR_SUFFIX: &str = ".metadata.json";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct Sidecar {
    metadata_attributes: Map<String, Value>,
}

/// Sidecar path for a document.
pub fn sidecar_path(document: &Path) -> PathBuf {
    let mut name = document.as_os_str().to_os_string();
    name.push(SIDECAR_SUFFIX);
    PathBuf::from(name)
}

/// Whether `path` is itself a sidecar file.
pub fn is_sidecar(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.ends_with(SIDECAR_SUFFIX))
}

/// Load the metadata attributes for `document`; empty when no sidecar exists.
pub fn load_sidecar(document: &Path) -> AppResult<Map<String, Value>> {
    let path = sidecar_path(document);
    if !path.exists() {
        return Ok(Map::new());
    }

    let content = std::fs::read_to_string(&path).map_err(|e| {
        AppError::Knowledge(format!("Failed to read metadata file {:?}: {}", path, e))
    })?;

    parse_sidecar(&content).map_err(|e| match e {
        AppError::Validation(msg) => AppError::Validation(format!("{:?}: {}", path, msg)),
        other => other,
    })
}

/// Parse and validate sidecar JSON.
pub fn parse_sidecar(content: &str) -> AppResult<Map<String, Value>> {
    let sidecar: Sidecar = serde_json::from_str(content)
        .map_err(|e| AppError::Validation(format!("metadata file: {}", e)))?;

    for (key, value) in &sidecar.metadata_attributes {
        validate_attribute(key, value)?;
    }

    Ok(sidecar.metadata_attributes)
}

fn validate_attribute(key: &str, value: &Value) -> AppResult<()> {
    let field = format!("metadataAttributes.{}", key);

    if key.trim().is_empty() {
        return Err(AppError::invalid_field(&field, "attribute name must not be empty"));
    }

    match value {
        Value::String(_) | Value::Number(_) | Value::Bool(_) => Ok(()),
        Value::Array(items) if items.iter().all(Value::is_string) => Ok(()),
        Value::Array(_) => Err(AppError::invalid_field(
            &field,
            "lists may only contain strings",
        )),
        Value::Null | Value::Object(_) => Err(AppError::invalid_field(
            &field,
            "expected a string, number, boolean or list of strings",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_sidecar_path_and_detection() {
        let doc = Path::new("docs/alex.txt");
        let sidecar = sidecar_path(doc);

        assert_eq!(sidecar, PathBuf::from("docs/alex.txt.metadata.json"));
        assert!(is_sidecar(&sidecar));
        assert!(!is_sidecar(doc));
    }

    #[test]
    fn test_parse_valid_sidecar() {
        let attrs = parse_sidecar(
            r#"{"metadataAttributes": {"name": "Alex Anderson", "year": 2024, "active": true, "tags": ["q3"]}}"#,
        )
        .unwrap();

        assert_eq!(attrs.len(), 4);
        assert_eq!(attrs["name"], "Alex Anderson");
    }

    #[test]
    fn test_rejects_nested_objects() {
        let err = parse_sidecar(r#"{"metadataAttributes": {"owner": {"first": "Alex"}}}"#)
            .unwrap_err();
        assert!(err.to_string().contains("metadataAttributes.owner"));
    }

    #[test]
    fn test_rejects_mixed_lists_and_unknown_root_keys() {
        let err = parse_sidecar(r#"{"metadataAttributes": {"tags": ["a", 1]}}"#).unwrap_err();
        assert!(err.to_string().contains("metadataAttributes.tags"));

        let err = parse_sidecar(r#"{"attributes": {}}"#).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn test_load_missing_sidecar_is_empty() {
        let temp = TempDir::new().unwrap();
        let doc = temp.path().join("doc.txt");
        std::fs::write(&doc, "content").unwrap();

        assert!(load_sidecar(&doc).unwrap().is_empty());

        std::fs::write(
            sidecar_path(&doc),
            r#"{"metadataAttributes": {"category": "finance"}}"#,
        )
        .unwrap();
        assert_eq!(load_sidecar(&doc).unwrap()["category"], "finance");
    }
}
