//! Top-K similar cars for a target car.

use std::cmp::Ordering;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::app_response::AppResponse;
use crate::catalog_config::RecommendConfig;
use crate::catalog_model::Car;
use crate::catalog_reader::CatalogReader;
use crate::similarity::{self, SimilarityBreakdown};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub car: Car,
    pub similarity: SimilarityBreakdown,
}

/// Finds the cars most similar to the car stored under `target_slug`.
///
/// Every other car in the catalog is scored; results are ordered by total
/// score, highest first, with ties broken by ascending car id. At most
/// `config.limit` entries are returned and the target is never among them.
///
/// # Errors
///
/// * [`AppResponse::NotFound`] when no car has `target_slug`.
/// * [`AppResponse::ValidationError`] for invalid weights.
/// * Any error the reader reports while loading cars.
pub fn recommend<R>(
    reader: &R,
    target_slug: &str,
    config: &RecommendConfig,
) -> Result<Vec<Recommendation>, AppResponse>
where
    R: CatalogReader + ?Sized,
{
    config.validate()?;

    let target = reader
        .get_car_by_slug(target_slug)?
        .ok_or_else(|| AppResponse::not_found(format!("No car found with slug: {target_slug}")))?;

    let candidates = reader.list_all_cars_excluding(target.id)?;
    let pool_size = candidates.len();
    let ranked = rank_candidates(&target, candidates, config);

    debug!(
        "Recommended {} of {} candidates for '{}'",
        ranked.len(),
        pool_size,
        target_slug
    );
    Ok(ranked)
}

/// Scores `candidates` against `target` and keeps the best `config.limit`.
///
/// Candidates sharing the target's id are dropped before scoring, whatever
/// the reader returned.
pub fn rank_candidates(
    target: &Car,
    candidates: Vec<Car>,
    config: &RecommendConfig,
) -> Vec<Recommendation> {
    let mut scored: Vec<Recommendation> = candidates
        .into_iter()
        .filter(|car| car.id != target.id)
        .map(|car| {
            let similarity = similarity::score(target, &car, &config.weights);
            Recommendation { car, similarity }
        })
        .collect();

    scored.sort_by(compare_ranked);
    scored.truncate(config.limit);
    scored
}

/// Descending total, then ascending id.
fn compare_ranked(a: &Recommendation, b: &Recommendation) -> Ordering {
    b.similarity
        .total
        .total_cmp(&a.similarity.total)
        .then_with(|| a.car.id.cmp(&b.car.id))
}
