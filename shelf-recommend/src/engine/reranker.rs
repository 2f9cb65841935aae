//! Re-ranker
//!
//! `score = base + 0.22 * relatedCount - penalty`, where `base` is the model's
//! confidence (0.5 when absent) and `penalty` is 0.15 when exactly one seed is
//! related. The sort is stable, so equal scores keep the model's order.

use crate::engine::normalize::normalize;
use crate::types::Recommendation;
use std::cmp::Ordering;
use std::collections::HashSet;

const DEFAULT_BASE: f64 = 0.5;
const RELATED_WEIGHT: f64 = 0.22;
const SINGLE_SEED_PENALTY: f64 = 0.15;

/// Number of `related_to` entries naming a seed title
///
/// Every entry counts, so a seed listed twice counts twice.
pub fn related_count(rec: &Recommendation, seed_titles: &HashSet<String>) -> usize {
    rec.related_to
        .iter()
        .filter(|title| seed_titles.contains(&normalize(title)))
        .count()
}

pub fn score(rec: &Recommendation, seed_titles: &HashSet<String>) -> f64 {
    let count = related_count(rec, seed_titles);
    let base = rec.confidence.unwrap_or(DEFAULT_BASE);
    let penalty = if count == 1 { SINGLE_SEED_PENALTY } else { 0.0 };
    base + RELATED_WEIGHT * count as f64 - penalty
}

/// Sort by descending score and keep the first `n`
pub fn rerank(recs: Vec<Recommendation>, seed_titles: &HashSet<String>, n: usize) -> Vec<Recommendation> {
    let mut scored: Vec<(f64, Recommendation)> = recs
        .into_iter()
        .map(|rec| (score(&rec, seed_titles), rec))
        .collect();

    scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(Ordering::Equal));
    scored.truncate(n);
    scored.into_iter().map(|(_, rec)| rec).collect()
}
