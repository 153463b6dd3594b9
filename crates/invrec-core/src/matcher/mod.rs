//! Reconciliation matcher: assign extracted line items to project estimate
//! categories and compute budget variance.
//!
//! Matching is a pure function of its inputs. Rerunning with the same
//! invoices and estimate yields an identical result, so reconciliation can be
//! recomputed wholesale whenever new approved invoices arrive.

pub mod similarity;

use rust_decimal::Decimal;
use tracing::{debug, info};

use crate::models::config::MatchingConfig;
use crate::models::invoice::ParsedInvoice;
use crate::models::matching::{
    CategoryVariance, LineItemMatch, MatchResult, ProjectEstimate, VarianceBand, VarianceTotals,
};

pub use similarity::{budget_proximity, token_overlap};

/// Match every line item of the given invoices against the estimate's
/// categories, then compute per-category and total variance.
///
/// Items are processed in invoice order then item order, drawing down a
/// running remaining budget per category. An item matches the category with
/// the highest combined score at or above `min_score`; ties go to the
/// category with more remaining budget. Items below the threshold stay
/// unmatched and are totalled separately.
pub fn match_invoices(
    invoices: &[ParsedInvoice],
    estimate: &ProjectEstimate,
    config: &MatchingConfig,
) -> MatchResult {
    let mut remaining: Vec<Decimal> = estimate
        .categories
        .iter()
        .map(|c| c.budgeted_amount)
        .collect();
    let mut actuals: Vec<Decimal> = vec![Decimal::ZERO; estimate.categories.len()];
    let mut items = Vec::new();
    let mut unmatched_amount = Decimal::ZERO;

    for invoice in invoices {
        for (item_index, item) in invoice.line_items.iter().enumerate() {
            let best = best_category(&item.description, item.total, estimate, &remaining, config);

            let matched = match best {
                Some((idx, score)) if score >= config.min_score => {
                    remaining[idx] -= item.total;
                    actuals[idx] += item.total;
                    debug!(
                        item = %item.description,
                        category = %estimate.categories[idx].name,
                        score,
                        "Line item matched"
                    );
                    Some((estimate.categories[idx].name.clone(), score))
                }
                _ => {
                    unmatched_amount += item.total;
                    None
                }
            };

            let (category, score) = match matched {
                Some((name, score)) => (Some(name), score),
                None => (None, 0.0),
            };
            items.push(LineItemMatch {
                invoice_id: invoice.id,
                item_index,
                description: item.description.clone(),
                amount: item.total,
                category,
                score,
            });
        }
    }

    let variances: Vec<CategoryVariance> = estimate
        .categories
        .iter()
        .zip(&actuals)
        .map(|(category, &actual)| {
            let variance = actual - category.budgeted_amount;
            CategoryVariance {
                category: category.name.clone(),
                estimated: category.budgeted_amount,
                actual,
                variance,
                band: classify(variance, category.budgeted_amount, config.on_target_band),
            }
        })
        .collect();

    let estimated: Decimal = estimate.categories.iter().map(|c| c.budgeted_amount).sum();
    let actual: Decimal = actuals.iter().copied().sum();

    info!(
        project_id = %estimate.project_id,
        items = items.len(),
        unmatched = items.iter().filter(|m| m.category.is_none()).count(),
        "Reconciliation computed"
    );

    MatchResult {
        project_id: estimate.project_id.clone(),
        items,
        variances,
        totals: VarianceTotals {
            estimated,
            actual,
            variance: actual - estimated,
            unmatched_amount,
        },
    }
}

/// Highest-scoring category for one item, with ties broken toward the
/// category holding more remaining budget.
fn best_category(
    description: &str,
    amount: Decimal,
    estimate: &ProjectEstimate,
    remaining: &[Decimal],
    config: &MatchingConfig,
) -> Option<(usize, f32)> {
    let mut best: Option<(usize, f32)> = None;

    for (idx, category) in estimate.categories.iter().enumerate() {
        let score = config.description_weight * token_overlap(description, &category.name)
            + config.budget_weight * budget_proximity(amount, remaining[idx]);

        let wins = match best {
            None => true,
            Some((best_idx, best_score)) => {
                score > best_score + f32::EPSILON
                    || ((score - best_score).abs() <= f32::EPSILON
                        && remaining[idx] > remaining[best_idx])
            }
        };
        if wins {
            best = Some((idx, score));
        }
    }

    best
}

fn classify(variance: Decimal, estimated: Decimal, band: Decimal) -> VarianceBand {
    let tolerance = (estimated * band).abs();
    if variance.abs() <= tolerance {
        VarianceBand::OnTarget
    } else if variance > Decimal::ZERO {
        VarianceBand::Over
    } else {
        VarianceBand::Under
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use pretty_assertions::assert_eq;
    use uuid::Uuid;

    use super::*;
    use crate::models::invoice::{LineItem, PageGroupRef, ReviewStatus};
    use crate::models::matching::EstimateCategory;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn item(description: &str, total: &str) -> LineItem {
        LineItem {
            description: description.to_string(),
            quantity: Decimal::ONE,
            unit_price: dec(total),
            total: dec(total),
            category: None,
        }
    }

    fn invoice(items: Vec<LineItem>) -> ParsedInvoice {
        let total_amount = items.iter().map(|i| i.total).sum();
        ParsedInvoice {
            id: Uuid::new_v4(),
            document_id: Uuid::new_v4(),
            invoice_number: "A100".to_string(),
            vendor_name: "Acme Supply".to_string(),
            invoice_date: None,
            subtotal: None,
            tax_amount: None,
            total_amount,
            line_items: items,
            confidence: 0.9,
            field_confidence: HashMap::new(),
            needs_review: false,
            page_group: PageGroupRef {
                index: 0,
                pages: vec![1],
            },
            status: ReviewStatus::Approved,
            warnings: vec![],
        }
    }

    fn estimate(categories: &[(&str, &str)]) -> ProjectEstimate {
        ProjectEstimate {
            project_id: "proj-7".to_string(),
            categories: categories
                .iter()
                .map(|(name, budget)| EstimateCategory {
                    name: name.to_string(),
                    budgeted_amount: dec(budget),
                })
                .collect(),
        }
    }

    #[test]
    fn description_overlap_drives_the_match() {
        let invoices = vec![invoice(vec![LineItem {
            description: "Steel beams".to_string(),
            quantity: dec("25"),
            unit_price: dec("120"),
            total: dec("3000"),
            category: None,
        }])];
        let est = estimate(&[("Structural Steel", "5000"), ("Labor", "1000")]);

        let result = match_invoices(&invoices, &est, &MatchingConfig::default());

        // Overlap 1/3 at weight 0.7 plus proximity 0.6 at weight 0.3 = 0.413.
        // Labor has better-than-nothing proximity but zero overlap, so the
        // description term dominates.
        assert_eq!(result.items[0].category.as_deref(), Some("Structural Steel"));
        assert!((result.items[0].score - 0.41333333).abs() < 1e-4);
    }

    #[test]
    fn items_below_threshold_stay_unmatched() {
        let invoices = vec![invoice(vec![item("Catering services", "400")])];
        let est = estimate(&[("Structural Steel", "5000")]);

        let result = match_invoices(&invoices, &est, &MatchingConfig::default());

        assert!(result.items[0].category.is_none());
        assert_eq!(result.items[0].score, 0.0);
        assert_eq!(result.totals.unmatched_amount, dec("400"));
        assert_eq!(result.unmatched().count(), 1);
        // Unmatched amounts never flow into category actuals.
        assert_eq!(result.variances[0].actual, Decimal::ZERO);
    }

    #[test]
    fn ties_break_toward_larger_remaining_budget() {
        // Both categories overlap the item on the single token "gravel"
        // (1 of 2 distinct), and proximity is 0.5 both ways: 100 against 200
        // remaining and 100 against 50 remaining.
        let invoices = vec![invoice(vec![item("gravel", "100")])];
        let est = estimate(&[("Gravel Fill", "50"), ("Gravel Base", "200")]);

        let result = match_invoices(&invoices, &est, &MatchingConfig::default());

        assert_eq!(result.items[0].category.as_deref(), Some("Gravel Base"));
    }

    #[test]
    fn matched_items_draw_down_remaining_budget() {
        // Two identical items: the first draws remaining budget below the
        // item amount, lowering the second's proximity but not below the
        // threshold here.
        let invoices = vec![invoice(vec![
            item("Structural steel delivery", "2000"),
            item("Structural steel delivery", "2000"),
        ])];
        let est = estimate(&[("Structural Steel", "3000")]);

        let result = match_invoices(&invoices, &est, &MatchingConfig::default());

        assert_eq!(result.items[0].category.as_deref(), Some("Structural Steel"));
        assert_eq!(result.items[1].category.as_deref(), Some("Structural Steel"));
        assert!(result.items[1].score < result.items[0].score);
        assert_eq!(result.variances[0].actual, dec("4000"));
    }

    #[test]
    fn variance_bands_classify_against_the_on_target_band() {
        let invoices = vec![
            invoice(vec![item("Structural steel", "1005")]),
            invoice(vec![item("Concrete pour", "900")]),
            invoice(vec![item("Site labor crew", "1100")]),
        ];
        let est = estimate(&[
            ("Structural Steel", "1000"),
            ("Concrete", "1000"),
            ("Labor", "1000"),
        ]);

        let result = match_invoices(&invoices, &est, &MatchingConfig::default());

        // Band is 1% of 1000: +5 is on target, -100 under, +100 over.
        assert_eq!(result.variances[0].band, VarianceBand::OnTarget);
        assert_eq!(result.variances[1].band, VarianceBand::Under);
        assert_eq!(result.variances[2].band, VarianceBand::Over);
        assert_eq!(result.variances[2].variance, dec("100"));
    }

    #[test]
    fn totals_roll_up_matched_and_unmatched_separately() {
        let invoices = vec![invoice(vec![
            item("Structural steel", "3000"),
            item("Miscellaneous sundries", "250"),
        ])];
        let est = estimate(&[("Structural Steel", "5000")]);

        let result = match_invoices(&invoices, &est, &MatchingConfig::default());

        assert_eq!(result.totals.estimated, dec("5000"));
        assert_eq!(result.totals.actual, dec("3000"));
        assert_eq!(result.totals.variance, dec("-2000"));
        assert_eq!(result.totals.unmatched_amount, dec("250"));
    }

    #[test]
    fn matching_is_idempotent() {
        let invoices = vec![invoice(vec![
            item("Steel beams", "3000"),
            item("Concrete pour", "1200"),
            item("Unclassifiable widget", "10"),
        ])];
        let est = estimate(&[("Structural Steel", "5000"), ("Concrete", "2000")]);
        let config = MatchingConfig::default();

        let first = match_invoices(&invoices, &est, &config);
        let second = match_invoices(&invoices, &est, &config);

        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }

    #[test]
    fn empty_inputs_produce_empty_result() {
        let est = estimate(&[("Structural Steel", "5000")]);
        let result = match_invoices(&[], &est, &MatchingConfig::default());

        assert!(result.items.is_empty());
        assert_eq!(result.totals.actual, Decimal::ZERO);
        assert_eq!(result.variances[0].band, VarianceBand::Under);
    }
}
