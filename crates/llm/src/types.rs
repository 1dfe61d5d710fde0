//! Shared LLM enums.

use serde::{Deserialize, Serialize};

/// Output format requested from the model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseFormat {
    /// Free-form text
    #[default]
    Text,
    /// A single JSON document; providers that support constrained decoding
    /// are asked to enforce it
    Json,
}

/// Provider type enum for matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderType {
    Ollama,
    Mock,
}

impl ProviderType {
    /// Parse provider type from string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "ollama" => Some(Self::Ollama),
            "mock" => Some(Self::Mock),
            _ => None,
        }
    }

    /// Canonical provider name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ollama => "ollama",
            Self::Mock => "mock",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_type_parsing() {
        assert_eq!(ProviderType::parse("ollama"), Some(ProviderType::Ollama));
        assert_eq!(ProviderType::parse("OLLAMA"), Some(ProviderType::Ollama));
        assert_eq!(ProviderType::parse("mock"), Some(ProviderType::Mock));
        assert_eq!(ProviderType::parse("openai"), None);
    }

    #[test]
    fn test_response_format_default() {
        assert_eq!(ResponseFormat::default(), ResponseFormat::Text);
    }
}
