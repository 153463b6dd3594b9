//! Error types for provider adapters and the extraction orchestrator.

use thiserror::Error;

use crate::types::ExtractionAttempt;

/// Errors produced by a single provider call.
///
/// The transient/permanent split drives orchestrator behavior: transient
/// errors are retried before falling back, permanent errors fall through to
/// the next provider immediately.
#[derive(Error, Debug)]
pub enum ProviderError {
    /// Retryable failure: timeout, rate limit, 5xx-equivalent.
    #[error("transient provider error: {0}")]
    Transient(String),

    /// Non-retryable failure: invalid credentials, malformed request.
    #[error("permanent provider error: {0}")]
    Permanent(String),
}

impl ProviderError {
    /// Whether the orchestrator may retry this call.
    pub fn is_transient(&self) -> bool {
        matches!(self, ProviderError::Transient(_))
    }

    /// Classify an HTTP status into a provider error.
    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        if status.is_server_error() || status.as_u16() == 429 {
            ProviderError::Transient(format!("HTTP {}: {}", status, body))
        } else {
            ProviderError::Permanent(format!("HTTP {}: {}", status, body))
        }
    }
}

/// Errors produced by the extraction orchestrator.
#[derive(Error, Debug)]
pub enum OrchestratorError {
    /// Every configured provider failed for this page group. The attempt log
    /// is carried so the caller can report the failure with full context.
    #[error("all {} extraction attempts failed", attempts.len())]
    Exhausted { attempts: Vec<ExtractionAttempt> },

    /// No providers were configured at all.
    #[error("no extraction providers configured")]
    NoProviders,
}

/// Result type for provider operations.
pub type Result<T> = std::result::Result<T, ProviderError>;
