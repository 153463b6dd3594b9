//! OpenAI-compatible chat-completions provider adapter.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::prompt::{build_prompt, parse_extraction_json};
use super::{ExtractionProvider, ProviderKind};
use crate::error::{ProviderError, Result};
use crate::types::{ExtractionOptions, ProviderResponse};

/// Adapter for any OpenAI-compatible chat-completions endpoint.
pub struct OpenAiProvider {
    client: Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
    response_format: ResponseFormat,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: String,
}

impl OpenAiProvider {
    /// Create a new adapter. No client-level timeout is set: the
    /// orchestrator enforces timeouts around every call.
    pub fn new(endpoint: &str, model: &str, api_key: Option<&str>) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key: api_key.map(|k| k.to_string()),
        }
    }
}

#[async_trait]
impl ExtractionProvider for OpenAiProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::OpenAi
    }

    async fn extract(&self, text: &str, options: &ExtractionOptions) -> Result<ProviderResponse> {
        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage {
                role: "user",
                content: build_prompt(text),
            }],
            temperature: options.temperature,
            max_tokens: options.max_tokens,
            response_format: ResponseFormat {
                format_type: "json_object",
            },
        };

        let url = format!("{}/v1/chat/completions", self.endpoint);
        debug!(model = %self.model, "Calling OpenAI-compatible endpoint");

        let mut req = self.client.post(&url).json(&request);
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }

        let resp = req
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

        let chat: ChatResponse = serde_json::from_str(&raw)
            .map_err(|e| ProviderError::Permanent(format!("malformed chat response: {}", e)))?;

        let content = chat
            .choices
            .first()
            .map(|c| c.message.content.as_str())
            .ok_or_else(|| ProviderError::Permanent("empty choices in response".to_string()))?;

        let fields = parse_extraction_json(content)?;
        let confidence = mean_field_confidence(&fields.field_confidence);

        Ok(ProviderResponse {
            fields,
            confidence,
            raw,
        })
    }
}

/// Overall confidence as the mean of self-reported field confidences.
fn mean_field_confidence(map: &std::collections::HashMap<String, f32>) -> Option<f32> {
    if map.is_empty() {
        return None;
    }
    Some(map.values().sum::<f32>() / map.len() as f32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mean_confidence_over_fields() {
        let mut map = std::collections::HashMap::new();
        map.insert("invoice_number".to_string(), 0.9);
        map.insert("total_amount".to_string(), 0.7);
        let mean = mean_field_confidence(&map).unwrap();
        assert!((mean - 0.8).abs() < 1e-6);
    }

    #[test]
    fn no_field_confidence_yields_none() {
        assert!(mean_field_confidence(&std::collections::HashMap::new()).is_none());
    }
}
