//! Configuration management.
//!
//! Configuration is layered, later sources winning:
//! - Built-in defaults
//! - Config file (`.kbfilter/config.yaml` or `KBFILTER_CONFIG`)
//! - Environment variables
//! - Command-line flags (`with_overrides`)
//!
//! All workspace state lives under `<workspace>/.kbfilter/`.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::{AppError, AppResult};

/// Name of the per-workspace state directory.
pub const STATE_DIR: &str = ".kbfilter";

/// Providers the LLM factory knows how to build.
pub const KNOWN_PROVIDERS: [&str; 2] = ["ollama", "mock"];

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the workspace root (contains .kbfilter/)
    pub workspace: PathBuf,

    /// Optional config file path
    pub config_file: Option<PathBuf>,

    /// Active LLM provider ("ollama", "mock")
    pub provider: String,

    /// Model identifier used for extraction and answering
    pub model: String,

    /// Endpoint override for the active provider
    pub endpoint: Option<String>,

    /// Request timeout in seconds for the active provider
    pub timeout_secs: Option<u64>,

    /// Log level override
    pub log_level: Option<String>,

    /// Verbose mode (enables debug logging)
    pub verbose: bool,

    /// Disable colored output
    pub no_color: bool,

    /// LLM provider configurations
    pub llm: Option<LlmConfig>,

    /// Metadata keys the filter builder emits
    pub filter: FilterKeyConfig,
}

/// `llm` section of config.yaml.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(rename = "activeProvider")]
    pub active_provider: String,

    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,
}

/// Provider-specific configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProviderConfig {
    Ollama {
        endpoint: String,
        model: String,
        timeout: Option<u64>,
    },
    Mock {
        /// Canned completions, returned in order
        responses: Vec<String>,
        model: Option<String>,
    },
}

impl ProviderConfig {
    /// Model configured for this provider.
    pub fn model(&self) -> &str {
        match self {
            ProviderConfig::Ollama { model, .. } => model,
            ProviderConfig::Mock { model, .. } => model.as_deref().unwrap_or("mock"),
        }
    }
}

/// Metadata key names for the three extracted attribute fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterKeyConfig {
    #[serde(rename = "nameKey", default = "default_name_key")]
    pub name_key: String,

    #[serde(rename = "categoryKey", default = "default_category_key")]
    pub category_key: String,

    #[serde(rename = "roleKey", default = "default_role_key")]
    pub role_key: String,
}

fn default_name_key() -> String {
    "name".to_string()
}

fn default_category_key() -> String {
    "category".to_string()
}

fn default_role_key() -> String {
    "role".to_string()
}

impl Default for FilterKeyConfig {
    fn default() -> Self {
        Self {
            name_key: default_name_key(),
            category_key: default_category_key(),
            role_key: default_role_key(),
        }
    }
}

/// Full configuration file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ConfigFile {
    llm: Option<LlmConfig>,
    filter: Option<FilterKeyConfig>,
    workspace: Option<WorkspaceConfig>,
    logging: Option<LoggingConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WorkspaceConfig {
    path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LoggingConfig {
    level: Option<String>,
    color: Option<bool>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            workspace: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            config_file: None,
            provider: "ollama".to_string(),
            model: "llama3.2".to_string(),
            endpoint: None,
            timeout_secs: None,
            log_level: None,
            verbose: false,
            no_color: false,
            llm: None,
            filter: FilterKeyConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from defaults, the config file and the environment.
    ///
    /// Environment variables:
    /// - `KBFILTER_WORKSPACE`: workspace path
    /// - `KBFILTER_CONFIG`: config file path
    /// - `KBFILTER_PROVIDER`: LLM provider
    /// - `KBFILTER_MODEL`: model identifier
    /// - `KBFILTER_ENDPOINT`: provider endpoint
    /// - `RUST_LOG`: log level
    /// - `NO_COLOR`: disable colored output
    pub fn load() -> AppResult<Self> {
        Self::load_with(None, None)
    }

    /// Like [`AppConfig::load`], with the workspace and config file chosen
    /// by the caller (typically CLI flags) taking precedence over the
    /// environment, so the right config file is merged.
    pub fn load_with(workspace: Option<PathBuf>, config_file: Option<PathBuf>) -> AppResult<Self> {
        let mut config = Self::default();

        if let Some(workspace) =
            workspace.or_else(|| std::env::var_os("KBFILTER_WORKSPACE").map(PathBuf::from))
        {
            config.workspace = workspace;
        }

        config.config_file =
            config_file.or_else(|| std::env::var_os("KBFILTER_CONFIG").map(PathBuf::from));

        if !config.workspace.exists() {
            return Err(AppError::Config(format!(
                "Workspace directory does not exist: {:?}",
                config.workspace
            )));
        }

        let config_path = config
            .config_file
            .clone()
            .unwrap_or_else(|| config.state_dir().join("config.yaml"));

        if config_path.exists() {
            config = config.merge_yaml(&config_path)?;
        } else if config.config_file.is_some() {
            return Err(AppError::Config(format!(
                "Config file does not exist: {:?}",
                config_path
            )));
        }

        if let Ok(provider) = std::env::var("KBFILTER_PROVIDER") {
            config.provider = provider;
        }

        if let Ok(model) = std::env::var("KBFILTER_MODEL") {
            config.model = model;
        }

        if let Ok(endpoint) = std::env::var("KBFILTER_ENDPOINT") {
            config.endpoint = Some(endpoint);
        }

        if let Ok(level) = std::env::var("RUST_LOG") {
            config.log_level = Some(level);
        }

        if std::env::var_os("NO_COLOR").is_some() {
            config.no_color = true;
        }

        Ok(config)
    }

    /// Merge a YAML configuration file into a copy of this config.
    fn merge_yaml(&self, path: &Path) -> AppResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        self.merge_yaml_str(&contents)
            .map_err(|e| AppError::Config(format!("Failed to parse config file {:?}: {}", path, e)))
    }

    fn merge_yaml_str(&self, contents: &str) -> AppResult<Self> {
        let config_file: ConfigFile = serde_yaml::from_str(contents)?;

        let mut result = self.clone();

        if let Some(path) = config_file.workspace.and_then(|ws| ws.path) {
            result.workspace = PathBuf::from(path);
        }

        if let Some(logging) = config_file.logging {
            if let Some(level) = logging.level {
                result.log_level = Some(level);
            }
            if let Some(color) = logging.color {
                result.no_color = !color;
            }
        }

        if let Some(filter) = config_file.filter {
            result.filter = filter;
        }

        if let Some(llm) = config_file.llm {
            result.provider = llm.active_provider.clone();

            if let Some(provider_config) = llm.providers.get(&llm.active_provider) {
                result.model = provider_config.model().to_string();
                if let ProviderConfig::Ollama {
                    endpoint, timeout, ..
                } = provider_config
                {
                    result.endpoint = Some(endpoint.clone());
                    result.timeout_secs = *timeout;
                }
            }

            result.llm = Some(llm);
        }

        Ok(result)
    }

    /// Apply CLI overrides. CLI flags take precedence over everything else.
    #[allow(clippy::too_many_arguments)]
    pub fn with_overrides(
        mut self,
        workspace: Option<PathBuf>,
        config_file: Option<PathBuf>,
        provider: Option<String>,
        model: Option<String>,
        endpoint: Option<String>,
        log_level: Option<String>,
        verbose: bool,
        no_color: bool,
    ) -> Self {
        if let Some(workspace) = workspace {
            self.workspace = workspace;
        }

        if let Some(config_file) = config_file {
            self.config_file = Some(config_file);
        }

        if let Some(provider) = provider {
            self.provider = provider;
        }

        if let Some(model) = model {
            self.model = model;
        }

        if let Some(endpoint) = endpoint {
            self.endpoint = Some(endpoint);
        }

        if let Some(log_level) = log_level {
            self.log_level = Some(log_level);
        }

        if verbose {
            self.verbose = true;
            if self.log_level.is_none() {
                self.log_level = Some("debug".to_string());
            }
        }

        if no_color {
            self.no_color = true;
        }

        self
    }

    /// Path to the `.kbfilter` directory.
    pub fn state_dir(&self) -> PathBuf {
        self.workspace.join(STATE_DIR)
    }

    /// Ensure the `.kbfilter` directory exists.
    pub fn ensure_state_dir(&self) -> AppResult<()> {
        let dir = self.state_dir();
        if !dir.exists() {
            std::fs::create_dir_all(&dir).map_err(|e| {
                AppError::Config(format!("Failed to create {} directory: {}", STATE_DIR, e))
            })?;
        }
        Ok(())
    }

    /// Configuration block for a provider, if one was declared.
    pub fn provider_config(&self, provider: &str) -> Option<&ProviderConfig> {
        self.llm.as_ref().and_then(|llm| llm.providers.get(provider))
    }

    /// Validate configuration for the active provider.
    pub fn validate(&self) -> AppResult<()> {
        if !KNOWN_PROVIDERS.contains(&self.provider.as_str()) {
            return Err(AppError::Config(format!(
                "Unknown provider: {}. Supported: {}",
                self.provider,
                KNOWN_PROVIDERS.join(", ")
            )));
        }

        if self.model.trim().is_empty() {
            return Err(AppError::Config("Model identifier is empty".to_string()));
        }

        let keys = [
            ("filter.nameKey", &self.filter.name_key),
            ("filter.categoryKey", &self.filter.category_key),
            ("filter.roleKey", &self.filter.role_key),
        ];
        for (field, key) in keys {
            if key.trim().is_empty() {
                return Err(AppError::Config(format!("{} must not be empty", field)));
            }
        }

        Ok(())
    }
}
