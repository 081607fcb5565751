//! Pairwise similarity between two cars.
//!
//! Four dimensions are scored in `[0, 1]` and combined as a weighted sum:
//!
//! | dimension   | measure                                                  |
//! |-------------|----------------------------------------------------------|
//! | performance | `1 / (1 + d)` over top speed and acceleration midpoint    |
//! | price       | intersection / union of the two price ranges             |
//! | brand       | 1 on the same brand, else 0                              |
//! | tags        | Jaccard index of the tag sets                            |
//!
//! A dimension whose inputs are missing on either side contributes 0. That
//! rule lives here and nowhere else.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::catalog_config::ScoringWeights;
use crate::catalog_model::{Car, Performance};

/// Per-dimension scores (unweighted) and the weighted total.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SimilarityBreakdown {
    pub performance: f64,
    pub price: f64,
    pub brand: f64,
    pub tags: f64,
    pub total: f64,
}

pub fn score(target: &Car, candidate: &Car, weights: &ScoringWeights) -> SimilarityBreakdown {
    let performance = performance_similarity(target.performance.as_ref(), candidate.performance.as_ref())
        .unwrap_or(0.0);
    let price = price_overlap(target.price_range(), candidate.price_range()).unwrap_or(0.0);
    let brand = if target.brand.id == candidate.brand.id { 1.0 } else { 0.0 };
    let tags = jaccard(&target.tags, &candidate.tags).unwrap_or(0.0);

    let total = performance * weights.performance
        + price * weights.price
        + brand * weights.brand
        + tags * weights.tags;

    SimilarityBreakdown {
        performance,
        price,
        brand,
        tags,
        total,
    }
}

/// Inverse normalized distance over the performance axes known on both sides.
///
/// Each axis is scaled by the larger of the two values, so a difference is
/// always within `[0, 1]`. `None` when the cars share no known axis.
pub fn performance_similarity(a: Option<&Performance>, b: Option<&Performance>) -> Option<f64> {
    let (a, b) = (a?, b?);

    let speed = match (a.top_speed, b.top_speed) {
        (Some(x), Some(y)) => Some(relative_difference(f64::from(x), f64::from(y))),
        _ => None,
    };
    let acceleration = match (a.acceleration_midpoint(), b.acceleration_midpoint()) {
        (Some(x), Some(y)) => Some(relative_difference(x, y)),
        _ => None,
    };

    let axes: Vec<f64> = [speed, acceleration].into_iter().flatten().collect();
    if axes.is_empty() {
        return None;
    }
    let distance = (axes.iter().map(|d| d * d).sum::<f64>() / axes.len() as f64).sqrt();
    Some(1.0 / (1.0 + distance))
}

fn relative_difference(x: f64, y: f64) -> f64 {
    let scale = x.abs().max(y.abs());
    if scale == 0.0 {
        0.0
    } else {
        ((x - y).abs() / scale).min(1.0)
    }
}

/// Length of the intersection divided by the length of the union.
///
/// Ranges must already be validated (`min <= max`). A zero-length union
/// means both ranges are the same single price, which counts as full overlap.
pub fn price_overlap(a: Option<(i64, i64)>, b: Option<(i64, i64)>) -> Option<f64> {
    let ((min_a, max_a), (min_b, max_b)) = (a?, b?);
    let (min_a, max_a, min_b, max_b) = (
        i128::from(min_a),
        i128::from(max_a),
        i128::from(min_b),
        i128::from(max_b),
    );

    let intersection = (max_a.min(max_b) - min_a.max(min_b)).max(0);
    let union = max_a.max(max_b) - min_a.min(min_b);

    if union == 0 {
        return Some(1.0);
    }
    Some(intersection as f64 / union as f64)
}

/// `|a ∩ b| / |a ∪ b|`, or `None` when either set is empty.
pub fn jaccard<T: Ord>(a: &BTreeSet<T>, b: &BTreeSet<T>) -> Option<f64> {
    if a.is_empty() || b.is_empty() {
        return None;
    }
    let shared = a.intersection(b).count();
    let union = a.len() + b.len() - shared;
    Some(shared as f64 / union as f64)
}
