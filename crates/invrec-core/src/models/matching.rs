//! Project estimate and reconciliation result models.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One budgeted category within a project's cost estimate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EstimateCategory {
    /// Category name, e.g. "Structural Steel".
    pub name: String,

    /// Budgeted amount for the category.
    pub budgeted_amount: Decimal,
}

/// A project's current cost estimate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectEstimate {
    /// Project identifier.
    pub project_id: String,

    /// Estimate categories with budgets.
    pub categories: Vec<EstimateCategory>,
}

/// Assignment of one extracted line item to an estimate category.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineItemMatch {
    /// Invoice the item came from.
    pub invoice_id: Uuid,

    /// Index of the item within the invoice.
    pub item_index: usize,

    /// Item description, repeated for reporting.
    pub description: String,

    /// Item total.
    pub amount: Decimal,

    /// Matched category, or `None` when no category scored above the
    /// minimum threshold.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,

    /// Similarity score of the winning category (0.0 when unmatched).
    pub score: f32,
}

/// Direction of a category's variance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VarianceBand {
    /// Actual spend below estimate.
    Under,
    /// Within the symmetric on-target band around zero.
    OnTarget,
    /// Actual spend above estimate.
    Over,
}

/// Variance for one estimate category.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryVariance {
    /// Category name.
    pub category: String,

    /// Budgeted amount.
    pub estimated: Decimal,

    /// Sum of matched actuals.
    pub actual: Decimal,

    /// `actual - estimated`.
    pub variance: Decimal,

    /// Band classification.
    pub band: VarianceBand,
}

/// Totals rollup across all categories.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VarianceTotals {
    /// Sum of budgeted amounts.
    pub estimated: Decimal,

    /// Sum of matched actuals.
    pub actual: Decimal,

    /// `actual - estimated`.
    pub variance: Decimal,

    /// Sum of unmatched item amounts, reported separately so the rollup for
    /// matched items is never blocked by unmatched ones.
    pub unmatched_amount: Decimal,
}

/// Reconciliation outcome for one project.
///
/// Recomputed whenever new approved invoices are available and always
/// replaced wholesale, never merged, to avoid partial-update inconsistency.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchResult {
    /// Project the result belongs to.
    pub project_id: String,

    /// Per-item assignments, in invoice order then item order.
    pub items: Vec<LineItemMatch>,

    /// Per-category variances, in estimate order.
    pub variances: Vec<CategoryVariance>,

    /// Totals rollup.
    pub totals: VarianceTotals,
}

impl MatchResult {
    /// Items that matched no category.
    pub fn unmatched(&self) -> impl Iterator<Item = &LineItemMatch> {
        self.items.iter().filter(|m| m.category.is_none())
    }
}
