//! Provider adapter implementations.

pub mod ollama;
pub mod openai;
mod prompt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::types::{ExtractionOptions, ProviderResponse};

pub use ollama::OllamaProvider;
pub use openai::OpenAiProvider;

/// Trait for AI extraction providers.
///
/// Each concrete adapter wraps one external text-to-structured-data service.
/// The contract is intentionally minimal: no provider-specific types leak
/// past the adapter, and adapters do not enforce timeouts themselves; the
/// orchestrator does, so a misbehaving adapter cannot stall the pipeline.
#[async_trait]
pub trait ExtractionProvider: Send + Sync {
    /// Which provider this adapter wraps.
    fn kind(&self) -> ProviderKind;

    /// Extract structured invoice fields from plain text.
    async fn extract(&self, text: &str, options: &ExtractionOptions) -> Result<ProviderResponse>;
}

/// The fixed set of supported provider kinds.
///
/// Selection happens via an ordered configuration list, cheapest/fastest
/// first; fallback exists for availability, not quality arbitration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// OpenAI-compatible chat-completions endpoint.
    OpenAi,
    /// Local Ollama instance.
    Ollama,
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderKind::OpenAi => write!(f, "openai"),
            ProviderKind::Ollama => write!(f, "ollama"),
        }
    }
}

/// Configuration for one provider in the fallback order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Provider kind.
    pub kind: ProviderKind,

    /// Base endpoint URL.
    pub endpoint: String,

    /// Model name to request.
    pub model: String,

    /// API key, where the provider requires one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

/// Build a provider adapter from its configuration.
pub fn build_provider(config: &ProviderConfig) -> Box<dyn ExtractionProvider> {
    match config.kind {
        ProviderKind::OpenAi => Box::new(OpenAiProvider::new(
            &config.endpoint,
            &config.model,
            config.api_key.as_deref(),
        )),
        ProviderKind::Ollama => Box::new(OllamaProvider::new(&config.endpoint, &config.model)),
    }
}
