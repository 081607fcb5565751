//! Aggregate metrics and popularity rankings over the cars of one brand.
//!
//! Averages skip cars that lack the underlying data (or carry an inverted
//! range) instead of counting them as zero. Rankings sort by count, highest
//! first, and break ties alphabetically by key.

use std::collections::{BTreeMap, HashMap};

use log::debug;
use serde::{Deserialize, Serialize};

use crate::app_response::AppResponse;
use crate::catalog_config::{EngineGrouping, StatsConfig};
use crate::catalog_model::{Brand, Car, Engine, TagCategory};
use crate::catalog_reader::CatalogReader;
use crate::tag_rules::displacement_class;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PopularEngine {
    pub engine_type: String,
    pub count: usize,
}

/// A tag value counted across every category it appears in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PopularTag {
    pub value: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryLeader {
    pub category: TagCategory,
    pub value: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrandStatistics {
    pub brand: Brand,
    pub total_cars: usize,
    pub average_price: Option<f64>,
    /// km/h
    pub average_top_speed: Option<f64>,
    /// seconds
    pub average_acceleration: Option<f64>,
    pub popular_engines: Vec<PopularEngine>,
    pub popular_tags: Vec<PopularTag>,
    /// Most attached tag of every category except [`TagCategory::Brand`].
    pub category_leaders: Vec<CategoryLeader>,
}

/// Computes [`BrandStatistics`] for the brand stored under `brand_slug`.
///
/// A brand without cars is valid and yields zero counts, `None` averages and
/// empty rankings.
///
/// # Errors
///
/// * [`AppResponse::NotFound`] when no brand has `brand_slug`.
/// * [`AppResponse::ValidationError`] for an invalid configuration.
/// * Any error the reader reports while loading cars.
pub fn stats<R>(
    reader: &R,
    brand_slug: &str,
    config: &StatsConfig,
) -> Result<BrandStatistics, AppResponse>
where
    R: CatalogReader + ?Sized,
{
    config.validate()?;

    let brand = reader
        .get_brand_by_slug(brand_slug)?
        .ok_or_else(|| AppResponse::not_found(format!("No brand found with slug: {brand_slug}")))?;

    let cars = reader.list_cars_for_brand(brand.id)?;
    debug!("Aggregating {} cars for brand '{}'", cars.len(), brand.slug);

    Ok(aggregate(brand, &cars, config))
}

/// Pure aggregation over an already loaded set of cars.
pub fn aggregate(brand: Brand, cars: &[Car], config: &StatsConfig) -> BrandStatistics {
    let places = config.decimal_places;

    let average_price = mean(cars.iter().filter_map(Car::price_midpoint));
    let average_top_speed = mean(
        cars.iter()
            .filter_map(|c| c.performance.as_ref()?.top_speed)
            .map(f64::from),
    );
    let average_acceleration = mean(
        cars.iter()
            .filter_map(|c| c.performance.as_ref()?.acceleration_midpoint()),
    );

    BrandStatistics {
        brand,
        total_cars: cars.len(),
        average_price: average_price.map(|v| round_to(v, places)),
        average_top_speed: average_top_speed.map(|v| round_to(v, places)),
        average_acceleration: average_acceleration.map(|v| round_to(v, places)),
        popular_engines: popular_engines(cars, config.engine_grouping, config.top_engines),
        popular_tags: popular_tags(cars, config.top_tags),
        category_leaders: category_leaders(cars),
    }
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values.fold((0.0_f64, 0_usize), |(sum, count), v| (sum + v, count + 1));
    (count > 0).then(|| sum / count as f64)
}

/// Rounds half away from zero to `places` decimals.
pub fn round_to(value: f64, places: u32) -> f64 {
    let factor = 10_f64.powi(places as i32);
    (value * factor).round() / factor
}

/// Grouping key of an engine, or `None` when it carries nothing to group by.
pub fn engine_group_key(engine: &Engine, grouping: EngineGrouping) -> Option<String> {
    let base = match grouping {
        EngineGrouping::LayoutAspiration => {
            let mut parts = Vec::new();
            if let Some(layout) = engine.cylinder_layout {
                parts.push(layout.display_name());
            }
            if let Some(aspiration) = engine.aspiration {
                parts.push(aspiration.display_name());
            }
            parts.join(" ")
        }
        EngineGrouping::LayoutCylindersAspiration => {
            let mut description = match (engine.cylinder_layout, engine.cylinder_count) {
                (Some(layout), Some(count)) => format!("{}{}", layout.code(), count),
                (Some(layout), None) => format!("Unspecified {} Engine", layout.display_name()),
                (None, Some(count)) => format!("{count}-Cylinder"),
                (None, None) => String::new(),
            };
            if let Some(aspiration) = engine.aspiration {
                if !description.is_empty() {
                    description.push(' ');
                }
                description.push_str(aspiration.display_name());
            }
            description
        }
    };

    if !base.is_empty() {
        return Some(base);
    }

    if let Some(capacity) = engine.engine_capacity.filter(|cc| *cc > 0) {
        return Some(format!("{} Displacement", displacement_class(capacity)));
    }
    if engine.battery_capacity.is_some_and(|kwh| kwh > 0.0) {
        return Some("Electric".to_string());
    }
    None
}

fn popular_engines(cars: &[Car], grouping: EngineGrouping, limit: usize) -> Vec<PopularEngine> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for engine in cars.iter().flat_map(|c| c.engines.iter()) {
        if let Some(key) = engine_group_key(engine, grouping) {
            *counts.entry(key).or_insert(0) += 1;
        }
    }

    let mut ranked: Vec<PopularEngine> = counts
        .into_iter()
        .map(|(engine_type, count)| PopularEngine { engine_type, count })
        .collect();
    ranked.sort_by(|a, b| {
        b.count
            .cmp(&a.count)
            .then_with(|| a.engine_type.cmp(&b.engine_type))
    });
    ranked.truncate(limit);
    ranked
}

fn popular_tags(cars: &[Car], limit: usize) -> Vec<PopularTag> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for tag in cars.iter().flat_map(|c| c.tags.iter()) {
        *counts.entry(tag.value.as_str()).or_insert(0) += 1;
    }

    let mut ranked: Vec<PopularTag> = counts
        .into_iter()
        .map(|(value, count)| PopularTag {
            value: value.to_string(),
            count,
        })
        .collect();
    ranked.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.value.cmp(&b.value)));
    ranked.truncate(limit);
    ranked
}

fn category_leaders(cars: &[Car]) -> Vec<CategoryLeader> {
    let mut counts: HashMap<(TagCategory, &str), usize> = HashMap::new();
    for tag in cars.iter().flat_map(|c| c.tags.iter()) {
        if tag.category != TagCategory::Brand {
            *counts.entry((tag.category, tag.value.as_str())).or_insert(0) += 1;
        }
    }

    let mut leaders: BTreeMap<TagCategory, CategoryLeader> = BTreeMap::new();
    for ((category, value), count) in counts {
        let beats_current = leaders.get(&category).map_or(true, |leader| {
            count > leader.count || (count == leader.count && value < leader.value.as_str())
        });
        if beats_current {
            leaders.insert(
                category,
                CategoryLeader {
                    category,
                    value: value.to_string(),
                    count,
                },
            );
        }
    }
    leaders.into_values().collect()
}
