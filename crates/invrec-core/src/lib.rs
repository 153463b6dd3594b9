//! Core library for supplier invoice extraction and reconciliation.
//!
//! This crate provides:
//! - PDF per-page text extraction
//! - Multi-invoice document segmentation
//! - LLM extraction orchestration with confidence scoring
//! - Correction capture feeding an append-only training store
//! - Line-item reconciliation against project estimates

pub mod error;
pub mod matcher;
pub mod models;
pub mod pdf;
pub mod pipeline;
pub mod score;
pub mod segment;
pub mod training;

pub use error::{InvrecError, PdfError, Result, SegmentError, TrainingError};
pub use matcher::match_invoices;
pub use models::config::InvrecConfig;
pub use models::document::{PageGroup, UploadChannel, UploadedDocument};
pub use models::invoice::{LineItem, ParsedInvoice, ReviewStatus};
pub use models::matching::{MatchResult, ProjectEstimate};
pub use models::training::TrainingExample;
pub use pdf::extract_page_texts;
pub use pipeline::{CancelFlag, ExtractionPipeline, ExtractionReport, Stage};
pub use score::score_draft;
pub use segment::{segment, Segmentation};
pub use training::{approve, reject, JsonlTrainingStore, MemoryTrainingStore, TrainingStore};

/// Re-export extraction provider types.
pub use invrec_providers::{
    build_provider, DraftExtraction, ExtractionProvider, Orchestrator, OrchestratorPolicy,
    ProviderConfig, ProviderKind,
};
