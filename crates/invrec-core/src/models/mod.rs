//! Data models for the extraction and reconciliation pipeline.

pub mod config;
pub mod document;
pub mod invoice;
pub mod matching;
pub mod training;

pub use config::{
    ExtractionConfig, InvrecConfig, MatchingConfig, ScoringConfig, SegmenterConfig,
};
pub use document::{PageGroup, UploadChannel, UploadedDocument};
pub use invoice::{InvoiceWarning, LineItem, PageGroupRef, ParsedInvoice, ReviewStatus};
pub use matching::{
    CategoryVariance, EstimateCategory, LineItemMatch, MatchResult, ProjectEstimate, VarianceBand,
    VarianceTotals,
};
pub use training::{Correction, DocumentMeta, StructuralSignature, TrainingExample};
