//! Ollama provider adapter for local LLM extraction.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::prompt::{build_prompt, parse_extraction_json};
use super::{ExtractionProvider, ProviderKind};
use crate::error::{ProviderError, Result};
use crate::types::{ExtractionOptions, ProviderResponse};

/// Adapter for a local Ollama instance via `/api/generate`.
pub struct OllamaProvider {
    client: Client,
    endpoint: String,
    model: String,
}

#[derive(Debug, Serialize)]
struct GenerateRequest {
    model: String,
    prompt: String,
    stream: bool,
    format: &'static str,
    options: GenerateOptions,
}

#[derive(Debug, Serialize)]
struct GenerateOptions {
    temperature: f32,
    num_predict: u32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}

impl OllamaProvider {
    /// Create a new adapter. Timeouts are the orchestrator's concern.
    pub fn new(endpoint: &str, model: &str) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.trim_end_matches('/').to_string(),
            model: model.to_string(),
        }
    }
}

#[async_trait]
impl ExtractionProvider for OllamaProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Ollama
    }

    async fn extract(&self, text: &str, options: &ExtractionOptions) -> Result<ProviderResponse> {
        let request = GenerateRequest {
            model: self.model.clone(),
            prompt: build_prompt(text),
            stream: false,
            format: "json",
            options: GenerateOptions {
                temperature: options.temperature,
                num_predict: options.max_tokens,
            },
        };

        let url = format!("{}/api/generate", self.endpoint);
        debug!(model = %self.model, "Calling Ollama");

        let resp = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| ProviderError::Transient(format!("connection failed: {}", e)))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(ProviderError::from_status(status, &body));
        }

        let raw = resp
            .text()
            .await
            .map_err(|e| ProviderError::Transient(format!("failed to read body: {}", e)))?;

        let generate: GenerateResponse = serde_json::from_str(&raw)
            .map_err(|e| ProviderError::Permanent(format!("malformed generate response: {}", e)))?;

        let fields = parse_extraction_json(&generate.response)?;

        // Ollama reports no confidence of its own; field_confidence comes
        // only from the model's JSON reply, when the model fills it in.
        let confidence = if fields.field_confidence.is_empty() {
            None
        } else {
            Some(
                fields.field_confidence.values().sum::<f32>()
                    / fields.field_confidence.len() as f32,
            )
        };

        Ok(ProviderResponse {
            fields,
            confidence,
            raw,
        })
    }
}
