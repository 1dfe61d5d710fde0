//! Knowledge base configuration and on-disk layout.
//!
//! ```text
//! <workspace>/.kbfilter/knowledge/<base>/
//!     config.yaml
//!     index.sqlite
//! ```

use crate::types::KnowledgeBaseConfig;
use kbfilter_core::config::STATE_DIR;
use kbfilter_core::{AppError, AppResult};
use std::fs;
use std::path::{Path, PathBuf};

/// Load a base's configuration, falling back to defaults when the base has
/// no `config.yaml` yet.
pub fn load_config(workspace: &Path, base_name: &str) -> AppResult<KnowledgeBaseConfig> {
    validate_base_name(base_name)?;
    let config_path = get_config_path(workspace, base_name);

    if !config_path.exists() {
        tracing::debug!(
            "Using default knowledge base config for '{}' (no config file found)",
            base_name
        );
        return Ok(KnowledgeBaseConfig {
            name: base_name.to_string(),
            ..Default::default()
        });
    }

    let content = fs::read_to_string(&config_path).map_err(|e| {
        AppError::Knowledge(format!("Failed to read config at {:?}: {}", config_path, e))
    })?;

    let mut config: KnowledgeBaseConfig = serde_yaml::from_str(&content).map_err(|e| {
        AppError::Knowledge(format!("Failed to parse config at {:?}: {}", config_path, e))
    })?;
    config.name = base_name.to_string();

    if config.chunk_size == 0 || config.embedding_dim == 0 {
        return Err(AppError::Knowledge(format!(
            "Invalid config at {:?}: chunk_size and embedding_dim must be positive",
            config_path
        )));
    }

    tracing::debug!("Loaded knowledge base config for '{}'", base_name);
    Ok(config)
}

/// Save a base's configuration.
pub fn save_config(workspace: &Path, config: &KnowledgeBaseConfig) -> AppResult<()> {
    validate_base_name(&config.name)?;
    let config_path = get_config_path(workspace, &config.name);

    if let Some(parent) = config_path.parent() {
        fs::create_dir_all(parent).map_err(|e| {
            AppError::Knowledge(format!("Failed to create config directory: {}", e))
        })?;
    }

    let yaml = serde_yaml::to_string(config)?;
    fs::write(&config_path, yaml).map_err(|e| {
        AppError::Knowledge(format!("Failed to write config to {:?}: {}", config_path, e))
    })?;

    tracing::debug!("Saved knowledge base config for '{}'", config.name);
    Ok(())
}

/// Base names become directory names, so keep them to a safe alphabet.
fn validate_base_name(base_name: &str) -> AppResult<()> {
    let valid = !base_name.is_empty()
        && base_name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if !valid {
        return Err(AppError::invalid_field(
            "base",
            format!(
                "'{}' must be non-empty and use only letters, digits, '-' or '_'",
                base_name
            ),
        ));
    }
    Ok(())
}

/// Directory holding one base.
pub fn get_base_dir(workspace: &Path, base_name: &str) -> PathBuf {
    workspace.join(STATE_DIR).join("knowledge").join(base_name)
}

/// Path to a base's config file.
pub fn get_config_path(workspace: &Path, base_name: &str) -> PathBuf {
    get_base_dir(workspace, base_name).join("config.yaml")
}

/// Path to a base's SQLite index.
pub fn get_index_path(workspace: &Path, base_name: &str) -> PathBuf {
    get_base_dir(workspace, base_name).join("index.sqlite")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_default_config() {
        let temp = TempDir::new().unwrap();
        let config = load_config(temp.path(), "team-docs").unwrap();

        assert_eq!(config.name, "team-docs");
        assert_eq!(config.chunk_size, 512);
        assert_eq!(config.top_k, 5);
    }

    #[test]
    fn test_save_and_load_config() {
        let temp = TempDir::new().unwrap();
        let config = KnowledgeBaseConfig {
            name: "hr".to_string(),
            chunk_size: 1024,
            min_score: 0.0,
            ..Default::default()
        };

        save_config(temp.path(), &config).unwrap();

        let loaded = load_config(temp.path(), "hr").unwrap();
        assert_eq!(loaded.chunk_size, 1024);
        assert_eq!(loaded.min_score, 0.0);
        assert!(get_config_path(temp.path(), "hr").ends_with(".kbfilter/knowledge/hr/config.yaml"));
    }

    #[test]
    fn test_rejects_path_like_base_names() {
        let temp = TempDir::new().unwrap();
        assert!(load_config(temp.path(), "../escape").is_err());
        assert!(load_config(temp.path(), "").is_err());
    }
}
