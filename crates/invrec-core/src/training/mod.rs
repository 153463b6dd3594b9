//! Correction capture and training example storage.
//!
//! Corrections are append-only training signal: the store never edits or
//! deletes an example, preserving a full audit trail. Recency weighting
//! happens at read time in the scorer, not by mutating history.

use std::fs::OpenOptions;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::sync::Mutex;

use chrono::Utc;
use rust_decimal::Decimal;
use tracing::info;
use uuid::Uuid;

use crate::error::TrainingError;
use crate::models::invoice::{fields, ParsedInvoice, ReviewStatus};
use crate::models::training::{Correction, DocumentMeta, TrainingExample};

/// Record of a rejected extraction. Rejection indicates the whole extraction
/// was unusable, so it produces no training example, only an audit entry.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Rejection {
    pub invoice_id: Uuid,
    pub reason: String,
    pub rejected_at: chrono::DateTime<Utc>,
}

/// Persistence contract for corrections and training examples.
pub trait TrainingStore: Send + Sync {
    /// Append a training example. Never updates an existing one.
    fn append(&self, example: &TrainingExample) -> Result<(), TrainingError>;

    /// Append a rejection record.
    fn append_rejection(&self, rejection: &Rejection) -> Result<(), TrainingError>;

    /// All training examples, in insertion order.
    fn examples(&self) -> Result<Vec<TrainingExample>, TrainingError>;
}

/// Approve an invoice, applying field corrections and recording a training
/// example. Terminal for the invoice's review lifecycle.
///
/// Every field delta is captured verbatim regardless of magnitude, and each
/// corrected field carries confidence 1.0.
pub fn approve(
    store: &dyn TrainingStore,
    invoice: &mut ParsedInvoice,
    corrected_fields: &[(String, String)],
    metadata: DocumentMeta,
) -> Result<TrainingExample, TrainingError> {
    if invoice.status != ReviewStatus::Unreviewed {
        return Err(TrainingError::AlreadyReviewed(invoice.id));
    }

    let original = invoice.clone();
    let mut corrections = Vec::with_capacity(corrected_fields.len());

    for (field, value) in corrected_fields {
        let before = invoice.field_value(field);
        apply_correction(invoice, field, value)?;
        invoice.field_confidence.insert(field.clone(), 1.0);
        corrections.push(Correction::new(field.clone(), before, value.clone()));
    }

    invoice.status = ReviewStatus::Approved;

    let example = TrainingExample {
        id: Uuid::new_v4(),
        invoice_id: invoice.id,
        extraction: original,
        corrections,
        metadata,
        recorded_at: Utc::now(),
    };
    store.append(&example)?;

    info!(
        invoice_id = %invoice.id,
        corrections = example.corrections.len(),
        "Invoice approved"
    );
    Ok(example)
}

/// Reject an invoice with a free-text reason. Terminal; produces no
/// training example.
pub fn reject(
    store: &dyn TrainingStore,
    invoice: &mut ParsedInvoice,
    reason: &str,
) -> Result<(), TrainingError> {
    if invoice.status != ReviewStatus::Unreviewed {
        return Err(TrainingError::AlreadyReviewed(invoice.id));
    }

    invoice.status = ReviewStatus::Rejected;
    store.append_rejection(&Rejection {
        invoice_id: invoice.id,
        reason: reason.to_string(),
        rejected_at: Utc::now(),
    })?;

    info!(invoice_id = %invoice.id, %reason, "Invoice rejected");
    Ok(())
}

/// Apply one explicit correction to an invoice field. The only path through
/// which extraction fields ever change.
fn apply_correction(
    invoice: &mut ParsedInvoice,
    field: &str,
    value: &str,
) -> Result<(), TrainingError> {
    let parse_amount = |value: &str| -> Result<Decimal, TrainingError> {
        value.parse().map_err(|_| TrainingError::Parse {
            field: field.to_string(),
            value: value.to_string(),
        })
    };

    match field {
        fields::INVOICE_NUMBER => invoice.invoice_number = value.to_string(),
        fields::VENDOR_NAME => invoice.vendor_name = value.to_string(),
        fields::INVOICE_DATE => {
            let date = value.parse().map_err(|_| TrainingError::Parse {
                field: field.to_string(),
                value: value.to_string(),
            })?;
            invoice.invoice_date = Some(date);
        }
        fields::SUBTOTAL => invoice.subtotal = Some(parse_amount(value)?),
        fields::TAX_AMOUNT => invoice.tax_amount = Some(parse_amount(value)?),
        fields::TOTAL_AMOUNT => invoice.total_amount = parse_amount(value)?,
        other => return Err(TrainingError::UnknownField(other.to_string())),
    }
    Ok(())
}

/// In-memory training store, mainly for tests and single-run pipelines.
#[derive(Default)]
pub struct MemoryTrainingStore {
    examples: Mutex<Vec<TrainingExample>>,
    rejections: Mutex<Vec<Rejection>>,
}

impl MemoryTrainingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rejections(&self) -> Result<Vec<Rejection>, TrainingError> {
        Ok(self
            .rejections
            .lock()
            .map_err(|e| TrainingError::Storage(e.to_string()))?
            .clone())
    }
}

impl TrainingStore for MemoryTrainingStore {
    fn append(&self, example: &TrainingExample) -> Result<(), TrainingError> {
        self.examples
            .lock()
            .map_err(|e| TrainingError::Storage(e.to_string()))?
            .push(example.clone());
        Ok(())
    }

    fn append_rejection(&self, rejection: &Rejection) -> Result<(), TrainingError> {
        self.rejections
            .lock()
            .map_err(|e| TrainingError::Storage(e.to_string()))?
            .push(rejection.clone());
        Ok(())
    }

    fn examples(&self) -> Result<Vec<TrainingExample>, TrainingError> {
        Ok(self
            .examples
            .lock()
            .map_err(|e| TrainingError::Storage(e.to_string()))?
            .clone())
    }
}

/// File-backed training store: one JSON record per line, append-only.
pub struct JsonlTrainingStore {
    examples_path: PathBuf,
    rejections_path: PathBuf,
}

impl JsonlTrainingStore {
    /// Store under `dir/training_examples.jsonl` and `dir/rejections.jsonl`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        Self {
            examples_path: dir.join("training_examples.jsonl"),
            rejections_path: dir.join("rejections.jsonl"),
        }
    }

    fn append_line<T: serde::Serialize>(path: &PathBuf, record: &T) -> Result<(), TrainingError> {
        let line = serde_json::to_string(record)
            .map_err(|e| TrainingError::Storage(e.to_string()))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| TrainingError::Storage(e.to_string()))?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| TrainingError::Storage(e.to_string()))?;
        writeln!(file, "{}", line).map_err(|e| TrainingError::Storage(e.to_string()))?;
        Ok(())
    }
}

impl TrainingStore for JsonlTrainingStore {
    fn append(&self, example: &TrainingExample) -> Result<(), TrainingError> {
        Self::append_line(&self.examples_path, example)
    }

    fn append_rejection(&self, rejection: &Rejection) -> Result<(), TrainingError> {
        Self::append_line(&self.rejections_path, rejection)
    }

    fn examples(&self) -> Result<Vec<TrainingExample>, TrainingError> {
        if !self.examples_path.exists() {
            return Ok(Vec::new());
        }
        let file = std::fs::File::open(&self.examples_path)
            .map_err(|e| TrainingError::Storage(e.to_string()))?;
        let mut examples = Vec::new();
        for line in BufReader::new(file).lines() {
            let line = line.map_err(|e| TrainingError::Storage(e.to_string()))?;
            if line.trim().is_empty() {
                continue;
            }
            let example = serde_json::from_str(&line)
                .map_err(|e| TrainingError::Storage(e.to_string()))?;
            examples.push(example);
        }
        Ok(examples)
    }
}
