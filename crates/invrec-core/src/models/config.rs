//! Configuration structures for the extraction pipeline.
//!
//! Every heuristic threshold in the pipeline is a configuration field with a
//! documented default, not a literal buried in code.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use invrec_providers::{OrchestratorPolicy, ProviderConfig};

/// Main configuration for the invrec pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct InvrecConfig {
    /// Document segmentation configuration.
    pub segmenter: SegmenterConfig,

    /// Extraction orchestration configuration.
    pub extraction: ExtractionConfig,

    /// Confidence scoring configuration.
    pub scoring: ScoringConfig,

    /// Reconciliation matching configuration.
    pub matching: MatchingConfig,
}

/// Document segmenter configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmenterConfig {
    /// Pages beyond this cap are ignored, with a warning surfaced.
    pub max_pages: usize,

    /// Safety ceiling on pages per group; exceeding it declares a boundary.
    pub max_group_pages: usize,
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self {
            max_pages: 20,
            max_group_pages: 10,
        }
    }
}

/// Extraction orchestration configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Ordered provider priority list, cheapest/fastest first.
    pub providers: Vec<ProviderConfig>,

    /// Timeout/retry/fallback policy.
    pub policy: OrchestratorPolicy,

    /// Page groups processed concurrently within one document.
    pub concurrency: usize,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            providers: Vec::new(),
            policy: OrchestratorPolicy::default(),
            concurrency: 2,
        }
    }
}

/// Confidence scoring configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Confidence assigned when a provider reports none for a field.
    pub neutral_confidence: f32,

    /// Bonus for fields confirmed by structural consistency checks.
    pub consistency_bonus: f32,

    /// Penalty for fields contradicted by structural consistency checks.
    pub consistency_penalty: f32,

    /// Maximum bonus for a field confirmed by a similar training example.
    pub training_bonus: f32,

    /// Minimum structural similarity for a training example to apply.
    pub training_similarity_threshold: f32,

    /// Aggregate confidence below this flags the invoice "needs review".
    pub review_threshold: f32,

    /// Tolerance for `quantity * unit_price` vs the stated line total.
    pub amount_tolerance: Decimal,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            neutral_confidence: 0.5,
            consistency_bonus: 0.1,
            consistency_penalty: 0.15,
            training_bonus: 0.1,
            training_similarity_threshold: 0.8,
            review_threshold: 0.7,
            amount_tolerance: Decimal::new(1, 2),
        }
    }
}

/// Reconciliation matcher configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingConfig {
    /// Minimum similarity score to assign an item to a category.
    pub min_score: f32,

    /// Weight of description similarity in the combined score.
    pub description_weight: f32,

    /// Weight of budget proximity in the combined score.
    pub budget_weight: f32,

    /// Symmetric on-target band around zero variance, as a fraction of the
    /// estimated amount.
    pub on_target_band: Decimal,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            min_score: 0.4,
            description_weight: 0.7,
            budget_weight: 0.3,
            on_target_band: Decimal::new(1, 2),
        }
    }
}

impl InvrecConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &std::path::Path) -> Result<Self, std::io::Error> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()))
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &std::path::Path) -> Result<(), std::io::Error> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()))?;
        std::fs::write(path, content)
    }
}
