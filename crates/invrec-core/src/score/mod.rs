//! Confidence scoring over extracted invoice fields.
//!
//! Per-field confidence combines the provider's self-reported confidence
//! (neutral default when absent), structural consistency checks, and a bonus
//! when a structurally similar training example confirms the same field
//! value. The aggregate is the length-weighted mean of field confidences.

use std::collections::HashMap;

use rust_decimal::Decimal;
use tracing::debug;
use uuid::Uuid;

use invrec_providers::{DraftExtraction, RawLineItem};

use crate::models::config::ScoringConfig;
use crate::models::document::{PageGroup, UploadedDocument};
use crate::models::invoice::{
    fields, InvoiceWarning, LineItem, PageGroupRef, ParsedInvoice, ReviewStatus,
};
use crate::models::training::{StructuralSignature, TrainingExample};

/// Annotate a draft extraction with per-field and aggregate confidence,
/// producing a [`ParsedInvoice`]. Deterministic given the same draft and
/// training set.
pub fn score_draft(
    draft: &DraftExtraction,
    document: &UploadedDocument,
    group: &PageGroup,
    examples: &[TrainingExample],
    config: &ScoringConfig,
) -> ParsedInvoice {
    let line_items: Vec<LineItem> = draft.fields.line_items.iter().map(normalize_item).collect();

    let mut warnings = Vec::new();
    for (index, item) in line_items.iter().enumerate() {
        if !item.is_consistent(config.amount_tolerance) {
            warnings.push(InvoiceWarning::InconsistentLineItem { index });
        }
    }

    let total_amount = draft.fields.total_amount.unwrap_or(Decimal::ZERO);
    let items_sum: Decimal = line_items.iter().map(|i| i.total).sum();
    let sum_consistent = !line_items.is_empty()
        && (items_sum - total_amount).abs() <= config.amount_tolerance;
    let sum_inconsistent = !line_items.is_empty() && !sum_consistent;
    if sum_inconsistent {
        warnings.push(InvoiceWarning::TotalMismatch);
    }

    // Subtotal + tax = total, when all three are present.
    let arithmetic = match (draft.fields.subtotal, draft.fields.tax_amount) {
        (Some(sub), Some(tax)) => {
            Some((sub + tax - total_amount).abs() <= config.amount_tolerance)
        }
        _ => None,
    };

    let mut invoice = ParsedInvoice {
        id: Uuid::new_v4(),
        document_id: document.id,
        invoice_number: draft
            .fields
            .invoice_number
            .clone()
            .unwrap_or_else(|| "UNKNOWN".to_string()),
        vendor_name: draft.fields.vendor_name.clone().unwrap_or_default(),
        invoice_date: draft.fields.invoice_date,
        subtotal: draft.fields.subtotal,
        tax_amount: draft.fields.tax_amount,
        total_amount,
        line_items,
        confidence: 0.0,
        field_confidence: HashMap::new(),
        needs_review: false,
        page_group: PageGroupRef {
            index: group.index,
            pages: group.pages.clone(),
        },
        status: ReviewStatus::Unreviewed,
        warnings,
    };

    let signature = StructuralSignature::of(&invoice, group.pages.len());
    let mut field_confidence = HashMap::new();

    for field in fields::SCALARS {
        let mut c = if invoice.field_value(field).is_none() {
            0.0
        } else {
            base_confidence(draft, field, config)
        };

        // Structural consistency adjustments.
        if field == fields::TOTAL_AMOUNT {
            if sum_consistent {
                c += config.consistency_bonus;
            } else if sum_inconsistent {
                c -= config.consistency_penalty;
            }
        }
        if matches!(
            field,
            fields::SUBTOTAL | fields::TAX_AMOUNT | fields::TOTAL_AMOUNT
        ) {
            match arithmetic {
                Some(true) => c += config.consistency_bonus,
                Some(false) => c -= config.consistency_penalty,
                None => {}
            }
        }

        c += training_bonus(&invoice, field, &signature, examples, config);
        field_confidence.insert(field.to_string(), c.clamp(0.0, 1.0));
    }

    let mut items_c = base_confidence(draft, fields::LINE_ITEMS, config);
    if sum_consistent {
        items_c += config.consistency_bonus;
    } else if sum_inconsistent {
        items_c -= config.consistency_penalty;
    }
    if invoice.line_items.is_empty() {
        items_c = 0.0;
    }
    field_confidence.insert(fields::LINE_ITEMS.to_string(), items_c.clamp(0.0, 1.0));

    invoice.confidence = aggregate_confidence(&invoice, &field_confidence);
    invoice.needs_review = invoice.confidence < config.review_threshold;
    invoice.field_confidence = field_confidence;

    debug!(
        invoice_number = %invoice.invoice_number,
        confidence = invoice.confidence,
        needs_review = invoice.needs_review,
        "Scored invoice"
    );

    invoice
}

/// Length-weighted mean of field confidences, clamped to [0, 1]. Each
/// field's weight is the character length of its rendered value (minimum 1),
/// so long, information-dense fields dominate near-empty ones.
pub fn aggregate_confidence(
    invoice: &ParsedInvoice,
    field_confidence: &HashMap<String, f32>,
) -> f32 {
    let mut weighted = 0.0f32;
    let mut total = 0.0f32;

    // Fixed field order keeps float summation deterministic across runs.
    for field in fields::SCALARS
        .into_iter()
        .chain(std::iter::once(fields::LINE_ITEMS))
    {
        let Some(confidence) = field_confidence.get(field) else {
            continue;
        };
        let weight = field_weight(invoice, field) as f32;
        weighted += confidence * weight;
        total += weight;
    }

    if total == 0.0 {
        return 0.0;
    }
    (weighted / total).clamp(0.0, 1.0)
}

/// Weight of a field in the aggregate: rendered value length, minimum 1.
pub fn field_weight(invoice: &ParsedInvoice, field: &str) -> usize {
    let len = match field {
        fields::LINE_ITEMS => invoice
            .line_items
            .iter()
            .map(|i| i.description.len())
            .sum(),
        _ => invoice
            .field_value(field)
            .map(|v| v.len())
            .unwrap_or(0),
    };
    len.max(1)
}

fn base_confidence(draft: &DraftExtraction, field: &str, config: &ScoringConfig) -> f32 {
    draft
        .fields
        .field_confidence
        .get(field)
        .copied()
        .or(draft.confidence)
        .unwrap_or(config.neutral_confidence)
}

/// Bonus when a structurally similar training example's correction confirms
/// the current value of this field. Examples are recency-weighted at read
/// time: the most recent qualifying example counts fully, older ones decay.
fn training_bonus(
    invoice: &ParsedInvoice,
    field: &str,
    signature: &StructuralSignature,
    examples: &[TrainingExample],
    config: &ScoringConfig,
) -> f32 {
    let Some(current) = invoice.field_value(field) else {
        return 0.0;
    };

    let mut newest_first: Vec<&TrainingExample> = examples.iter().collect();
    newest_first.sort_by(|a, b| b.recorded_at.cmp(&a.recorded_at));

    for (age, example) in newest_first.iter().enumerate() {
        let example_signature =
            StructuralSignature::of(&example.extraction, example.metadata.page_count);
        if signature.similarity(&example_signature) < config.training_similarity_threshold {
            continue;
        }
        let confirmed = example
            .corrections
            .iter()
            .any(|c| c.field == field && c.corrected == current);
        if confirmed {
            return config.training_bonus / (1.0 + age as f32);
        }
    }

    0.0
}

fn normalize_item(raw: &RawLineItem) -> LineItem {
    let quantity = raw.quantity.unwrap_or(Decimal::ONE);
    let total = raw
        .total
        .or_else(|| raw.unit_price.map(|p| p * quantity))
        .unwrap_or(Decimal::ZERO);
    let unit_price = raw.unit_price.unwrap_or_else(|| {
        if quantity.is_zero() {
            total
        } else {
            total / quantity
        }
    });

    LineItem {
        description: raw.description.clone(),
        quantity,
        unit_price,
        total,
        category: raw.category.clone(),
    }
}
