//! Error types for the invrec-core library.

use thiserror::Error;

/// Main error type for the invrec library.
#[derive(Error, Debug)]
pub enum InvrecError {
    /// Document segmentation error.
    #[error("segmentation error: {0}")]
    Segment(#[from] SegmentError),

    /// Extraction orchestration error.
    #[error("extraction error: {0}")]
    Extraction(#[from] invrec_providers::OrchestratorError),

    /// PDF processing error.
    #[error("PDF error: {0}")]
    Pdf(#[from] PdfError),

    /// Training store error.
    #[error("training store error: {0}")]
    Training(#[from] TrainingError),

    /// The extraction job was cancelled; partial results were discarded.
    #[error("extraction job cancelled")]
    Cancelled,

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors related to document segmentation.
#[derive(Error, Debug)]
pub enum SegmentError {
    /// Upstream text extraction yielded zero pages. Fatal: surfaced to the
    /// user without starting extraction.
    #[error("document has no extractable text")]
    EmptyDocument,
}

/// Errors related to PDF text extraction.
#[derive(Error, Debug)]
pub enum PdfError {
    /// Failed to open/parse the PDF file.
    #[error("failed to parse PDF: {0}")]
    Parse(String),

    /// The PDF is empty or has no pages.
    #[error("PDF has no pages")]
    NoPages,
}

/// Errors related to the correction and training store.
#[derive(Error, Debug)]
pub enum TrainingError {
    /// The invoice already concluded its review lifecycle.
    #[error("invoice {0} was already reviewed")]
    AlreadyReviewed(uuid::Uuid),

    /// A correction named a field the invoice does not have.
    #[error("unknown field: {0}")]
    UnknownField(String),

    /// A corrected value could not be parsed for its field.
    #[error("failed to parse correction for {field}: {value}")]
    Parse { field: String, value: String },

    /// Underlying storage failure.
    #[error("storage error: {0}")]
    Storage(String),
}

/// Result type for the invrec library.
pub type Result<T> = std::result::Result<T, InvrecError>;
