//! LLM provider factory.
//!
//! Builds the concrete client for a provider name, either from explicit
//! arguments or from the application configuration.

use crate::client::LlmClient;
use crate::providers::{ollama::DEFAULT_OLLAMA_URL, MockClient, OllamaClient};
use crate::types::ProviderType;
use kbfilter_core::config::{AppConfig, ProviderConfig};
use kbfilter_core::{AppError, AppResult};
use std::sync::Arc;
use std::time::Duration;

/// Create an LLM client for `provider`.
///
/// # Arguments
/// * `provider` - Provider identifier ("ollama", "mock")
/// * `endpoint` - Optional custom endpoint URL
/// * `timeout_secs` - Optional per-request timeout
/// * `mock_responses` - Script for the mock provider (ignored otherwise)
///
/// # Errors
/// Returns `AppError::Config` for unknown providers and `AppError::Llm` when
/// the HTTP client cannot be built.
pub fn create_client(
    provider: &str,
    endpoint: Option<&str>,
    timeout_secs: Option<u64>,
    mock_responses: &[String],
) -> AppResult<Arc<dyn LlmClient>> {
    let provider_type = ProviderType::parse(provider)
        .ok_or_else(|| AppError::Config(format!("Unknown provider: {}", provider)))?;

    match provider_type {
        ProviderType::Ollama => {
            let base_url = endpoint.unwrap_or(DEFAULT_OLLAMA_URL);
            let client = match timeout_secs {
                Some(secs) => OllamaClient::with_timeout(base_url, Duration::from_secs(secs))?,
                None => OllamaClient::with_base_url(base_url),
            };
            tracing::debug!("Created Ollama client for {}", base_url);
            Ok(Arc::new(client))
        }
        ProviderType::Mock => {
            if mock_responses.is_empty() {
                return Err(AppError::Config(
                    "Mock provider requires at least one scripted response".to_string(),
                ));
            }
            Ok(Arc::new(MockClient::new(mock_responses.iter().cloned())))
        }
    }
}

/// Create the client for the configured active provider.
pub fn client_from_config(config: &AppConfig) -> AppResult<Arc<dyn LlmClient>> {
    let mock_responses = match config.provider_config(&config.provider) {
        Some(ProviderConfig::Mock { responses, .. }) => responses.clone(),
        _ => Vec::new(),
    };

    create_client(
        &config.provider,
        config.endpoint.as_deref(),
        config.timeout_secs,
        &mock_responses,
    )
}
