//! LLM integration for kbfilter.
//!
//! A provider-agnostic completion interface used by the attribute extractor,
//! the implicit filter generator and the retrieval agent.
//!
//! # Providers
//! - **Ollama**: local LLM runtime (default)
//! - **Mock**: scripted responses for tests and offline runs
//!
//! # Example
//! ```no_run
//! use kbfilter_llm::{LlmClient, LlmRequest, OllamaClient};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = OllamaClient::new();
//! let request = LlmRequest::new("Which team does Alex Anderson lead?", "llama3.2").json();
//! let response = client.complete(&request).await?;
//! println!("{}", response.content);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod factory;
pub mod providers;
pub mod types;

// Re-export main types
pub use client::{LlmClient, LlmRequest, LlmResponse, LlmUsage};
pub use factory::{client_from_config, create_client};
pub use providers::{MockClient, OllamaClient};
pub use types::{ProviderType, ResponseFormat};
