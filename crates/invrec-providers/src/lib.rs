//! Provider adapters and extraction orchestration for invrec.
//!
//! This crate abstracts over external AI extraction services behind a single
//! narrow contract, allowing the same pipeline code to run against any
//! configured provider. The orchestrator manages timeouts, retries, and
//! ordered fallback across providers for a single invoice's text.

pub mod error;
pub mod orchestrator;
pub mod provider;
pub mod types;

pub use error::{OrchestratorError, ProviderError, Result};
pub use orchestrator::{Orchestrator, OrchestratorPolicy};
pub use provider::{ExtractionProvider, ProviderConfig, ProviderKind, build_provider};
pub use types::{
    AttemptOutcome, DraftExtraction, ExtractionAttempt, ExtractionOptions, ProviderResponse,
    RawExtraction, RawLineItem,
};
