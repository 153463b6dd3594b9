//! Correction and training example models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::invoice::ParsedInvoice;

/// A field-level diff between an original extracted value and a
/// user-approved value. Created only during human review; never mutated.
/// The corrected field carries an implied confidence of 1.0.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Correction {
    /// Field name (see [`crate::models::invoice::fields`]).
    pub field: String,

    /// Original extracted value, if the field had one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original: Option<String>,

    /// User-approved value.
    pub corrected: String,

    /// When the correction was made.
    pub corrected_at: DateTime<Utc>,
}

impl Correction {
    pub fn new(field: impl Into<String>, original: Option<String>, corrected: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            original,
            corrected: corrected.into(),
            corrected_at: Utc::now(),
        }
    }
}

/// Lightweight document metadata carried on every training example.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMeta {
    /// Original filename.
    pub filename: String,

    /// Page count of the source page group's document.
    pub page_count: usize,

    /// Size of the original byte stream.
    pub size_bytes: u64,
}

/// A denormalized record bundling an original extraction, its corrections
/// (possibly none), and document metadata. Append-only; never deleted
/// automatically. Older and newer examples are treated uniformly by
/// recency-weighting at read time rather than by mutating history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingExample {
    /// Example identifier.
    pub id: Uuid,

    /// Invoice this example was recorded from.
    pub invoice_id: Uuid,

    /// The original extraction, as it stood before corrections.
    pub extraction: ParsedInvoice,

    /// Field-level corrections applied during review.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub corrections: Vec<Correction>,

    /// Document metadata for structural similarity checks.
    pub metadata: DocumentMeta,

    /// When the example was recorded.
    pub recorded_at: DateTime<Utc>,
}

/// Structural signature of an extraction, used to decide whether a past
/// training example is relevant to a new document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StructuralSignature {
    pub page_count: usize,
    pub line_item_count: usize,
}

impl StructuralSignature {
    pub fn of(invoice: &ParsedInvoice, page_count: usize) -> Self {
        Self {
            page_count,
            line_item_count: invoice.line_items.len(),
        }
    }

    /// Similarity in [0, 1]: ratio agreement on page count and line item
    /// count. Two invoices with the same shape score 1.0.
    pub fn similarity(&self, other: &StructuralSignature) -> f32 {
        let pages = ratio(self.page_count, other.page_count);
        let items = ratio(self.line_item_count, other.line_item_count);
        (pages + items) / 2.0
    }
}

fn ratio(a: usize, b: usize) -> f32 {
    if a == 0 && b == 0 {
        return 1.0;
    }
    let (lo, hi) = if a < b { (a, b) } else { (b, a) };
    if hi == 0 { 1.0 } else { lo as f32 / hi as f32 }
}
