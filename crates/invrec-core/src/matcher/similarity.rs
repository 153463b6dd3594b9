//! Similarity primitives for line-item-to-category matching.

use std::collections::HashSet;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

/// Lowercase alphanumeric tokens of a description or category name.
fn tokenize(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
        .collect()
}

/// Jaccard overlap of the token sets of two strings, in [0, 1].
pub fn token_overlap(a: &str, b: &str) -> f32 {
    let ta = tokenize(a);
    let tb = tokenize(b);
    if ta.is_empty() || tb.is_empty() {
        return 0.0;
    }
    let intersection = ta.intersection(&tb).count();
    let union = ta.union(&tb).count();
    intersection as f32 / union as f32
}

/// Proximity of an item amount to a category's remaining budget, in [0, 1].
///
/// min/max ratio of the two magnitudes. A category with no remaining budget
/// offers zero proximity, which deprioritizes exhausted categories without
/// hard-excluding them.
pub fn budget_proximity(amount: Decimal, remaining: Decimal) -> f32 {
    if amount <= Decimal::ZERO || remaining <= Decimal::ZERO {
        return 0.0;
    }
    let (lo, hi) = if amount < remaining {
        (amount, remaining)
    } else {
        (remaining, amount)
    };
    (lo / hi).to_f32().unwrap_or(0.0)
}
