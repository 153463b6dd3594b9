//! Parsed invoice and line item models.

use std::collections::HashMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Review lifecycle of a parsed invoice.
///
/// Transitions only via the review step: `Unreviewed -> Approved | Rejected`.
/// Both terminal states end the invoice's review lifecycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewStatus {
    #[default]
    Unreviewed,
    Approved,
    Rejected,
}

/// A single line item on an extracted invoice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    /// Product/service description.
    pub description: String,

    /// Quantity.
    pub quantity: Decimal,

    /// Unit price.
    pub unit_price: Decimal,

    /// Line total as stated on the invoice.
    pub total: Decimal,

    /// Optional category tag.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

impl LineItem {
    /// Whether `quantity * unit_price` agrees with the stated total within
    /// the given tolerance.
    pub fn is_consistent(&self, tolerance: Decimal) -> bool {
        (self.quantity * self.unit_price - self.total).abs() <= tolerance
    }
}

/// Soft warnings attached to a parsed invoice. Surfaced but non-blocking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum InvoiceWarning {
    /// `quantity * unit_price` disagrees with the stated line total beyond
    /// tolerance for the item at this index.
    InconsistentLineItem { index: usize },

    /// Line items do not sum to the stated invoice total.
    TotalMismatch,
}

/// Back-reference from a parsed invoice to the page group it came from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageGroupRef {
    /// Group index within the document.
    pub index: usize,

    /// 1-indexed pages of the group.
    pub pages: Vec<u32>,
}

/// The structured result for one page group.
///
/// Extraction fields are never silently overwritten; they change only via an
/// explicit correction during review.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsedInvoice {
    /// Invoice identifier.
    pub id: Uuid,

    /// Source document identifier.
    pub document_id: Uuid,

    /// Invoice number as extracted.
    pub invoice_number: String,

    /// Vendor name as extracted.
    pub vendor_name: String,

    /// Invoice date, when one could be parsed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invoice_date: Option<NaiveDate>,

    /// Subtotal amount.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtotal: Option<Decimal>,

    /// Tax amount.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tax_amount: Option<Decimal>,

    /// Total amount.
    pub total_amount: Decimal,

    /// Ordered line items.
    pub line_items: Vec<LineItem>,

    /// Aggregate confidence in [0, 1].
    pub confidence: f32,

    /// Per-field confidence scores.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub field_confidence: HashMap<String, f32>,

    /// Advisory flag: aggregate confidence fell below the review threshold.
    /// Never blocks approval.
    pub needs_review: bool,

    /// Back-reference to the source page group.
    pub page_group: PageGroupRef,

    /// Review lifecycle state.
    #[serde(default)]
    pub status: ReviewStatus,

    /// Soft warnings from scoring.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<InvoiceWarning>,
}

/// Field names recognized for corrections and confidence scoring.
pub mod fields {
    pub const INVOICE_NUMBER: &str = "invoice_number";
    pub const VENDOR_NAME: &str = "vendor_name";
    pub const INVOICE_DATE: &str = "invoice_date";
    pub const SUBTOTAL: &str = "subtotal";
    pub const TAX_AMOUNT: &str = "tax_amount";
    pub const TOTAL_AMOUNT: &str = "total_amount";
    pub const LINE_ITEMS: &str = "line_items";

    /// Scalar fields in scoring order.
    pub const SCALARS: [&str; 6] = [
        INVOICE_NUMBER,
        VENDOR_NAME,
        INVOICE_DATE,
        SUBTOTAL,
        TAX_AMOUNT,
        TOTAL_AMOUNT,
    ];
}

impl ParsedInvoice {
    /// Render a field's current value as a string, for correction diffs and
    /// training similarity checks. `None` when the field is absent.
    pub fn field_value(&self, field: &str) -> Option<String> {
        match field {
            fields::INVOICE_NUMBER => Some(self.invoice_number.clone()),
            fields::VENDOR_NAME => Some(self.vendor_name.clone()),
            fields::INVOICE_DATE => self.invoice_date.map(|d| d.to_string()),
            fields::SUBTOTAL => self.subtotal.map(|a| a.to_string()),
            fields::TAX_AMOUNT => self.tax_amount.map(|a| a.to_string()),
            fields::TOTAL_AMOUNT => Some(self.total_amount.to_string()),
            _ => None,
        }
    }
}
