//! Wire-level types shared by provider adapters and the orchestrator.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::provider::ProviderKind;

/// Options passed to every provider call.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionOptions {
    /// Sampling temperature. Kept at zero for deterministic extraction.
    pub temperature: f32,

    /// Maximum tokens the provider may generate.
    pub max_tokens: u32,
}

impl Default for ExtractionOptions {
    fn default() -> Self {
        Self {
            temperature: 0.0,
            max_tokens: 2048,
        }
    }
}

/// A single line item as reported by a provider.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawLineItem {
    /// Product/service description.
    pub description: String,

    /// Quantity.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quantity: Option<Decimal>,

    /// Unit price.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit_price: Option<Decimal>,

    /// Line total.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<Decimal>,

    /// Optional category tag reported by the provider.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

/// Structured fields extracted by a provider from one page group's text.
///
/// Everything is optional at this layer; validity is judged by the
/// orchestrator and confidence is assigned later by the scorer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawExtraction {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invoice_number: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub vendor_name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub invoice_date: Option<NaiveDate>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtotal: Option<Decimal>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub tax_amount: Option<Decimal>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_amount: Option<Decimal>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub line_items: Vec<RawLineItem>,

    /// Per-field confidence as self-reported by the provider, if any.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub field_confidence: HashMap<String, f32>,
}

impl RawExtraction {
    /// Whether the extraction is syntactically valid and may be accepted.
    ///
    /// Required fields must be present and non-empty; amounts are numeric by
    /// construction (`Decimal` fields fail JSON parsing otherwise).
    pub fn is_valid(&self) -> bool {
        self.invoice_number
            .as_deref()
            .is_some_and(|n| !n.trim().is_empty())
            && self
                .vendor_name
                .as_deref()
                .is_some_and(|v| !v.trim().is_empty())
            && self.total_amount.is_some()
    }
}

/// Response from one provider call.
#[derive(Debug, Clone)]
pub struct ProviderResponse {
    /// Structured fields.
    pub fields: RawExtraction,

    /// Overall self-reported confidence, if the provider gives one.
    pub confidence: Option<f32>,

    /// Raw provider response body, retained for audit.
    pub raw: String,
}

/// Record of one provider call for one page group.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionAttempt {
    /// Attempt identifier.
    pub id: Uuid,

    /// Provider that was called.
    pub provider: ProviderKind,

    /// Call start time.
    pub started_at: DateTime<Utc>,

    /// Call end time.
    pub finished_at: DateTime<Utc>,

    /// How the call concluded.
    pub outcome: AttemptOutcome,

    /// Raw response body on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_response: Option<String>,

    /// Self-reported confidence on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub self_confidence: Option<f32>,

    /// Exactly one attempt per page group is accepted once extraction
    /// concludes; zero if all providers failed.
    pub accepted: bool,
}

/// Outcome of one provider call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "detail")]
pub enum AttemptOutcome {
    /// Provider returned a syntactically valid result.
    Success,
    /// The call exceeded the orchestrator's timeout.
    Timeout,
    /// Retryable provider failure.
    Transient(String),
    /// Non-retryable provider failure.
    Permanent(String),
    /// Provider responded, but the result failed validity checks.
    Invalid(String),
}

/// Accepted extraction for one page group, before confidence scoring.
#[derive(Debug, Clone)]
pub struct DraftExtraction {
    /// Structured fields from the accepted attempt.
    pub fields: RawExtraction,

    /// Overall self-reported confidence from the accepted attempt.
    pub confidence: Option<f32>,

    /// Full attempt log, including failed attempts from earlier providers.
    pub attempts: Vec<ExtractionAttempt>,
}

impl DraftExtraction {
    /// The accepted attempt's provider, if any attempt was accepted.
    pub fn accepted_provider(&self) -> Option<ProviderKind> {
        self.attempts
            .iter()
            .find(|a| a.accepted)
            .map(|a| a.provider)
    }
}
