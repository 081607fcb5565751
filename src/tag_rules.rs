//! Derivation of the discretized tag labels attached to every car.
//!
//! Tags are never authored by hand. The store recomputes them from the car's
//! other fields on each write so that similarity matching can compare
//! bucketed attributes (price band, displacement class, ...) by identity.

use std::collections::BTreeSet;

use crate::catalog_model::{Car, Tag, TagCategory};

/// Upper bound of each price band, inclusive, applied to the price midpoint.
const PRICE_BANDS: [(f64, &str); 4] = [
    (30_000.0, "Economy"),
    (60_000.0, "Mid-Range"),
    (100_000.0, "Premium"),
    (200_000.0, "Luxury"),
];

/// Upper bound of each displacement class in cc, inclusive.
const DISPLACEMENT_CLASSES: [(u32, &str); 5] = [
    (1_000, "Small"),
    (1_600, "Low-Mid"),
    (2_500, "Mid"),
    (4_000, "Large"),
    (6_000, "Very Large"),
];

const HIGH_TORQUE_NM: u32 = 500;
const FAST_ACCELERATION_SECONDS: f64 = 4.0;
const TOP_SPEED_KMH: u32 = 250;

pub fn price_band(midpoint: f64) -> &'static str {
    PRICE_BANDS
        .iter()
        .find(|(limit, _)| midpoint <= *limit)
        .map_or("Ultra Luxury", |(_, band)| *band)
}

pub fn displacement_class(capacity_cc: u32) -> &'static str {
    DISPLACEMENT_CLASSES
        .iter()
        .find(|(limit, _)| capacity_cc <= *limit)
        .map_or("Extreme", |(_, class)| *class)
}

/// Computes the full tag set for `car` from its brand, fuel types, engines,
/// seats, price and performance. Any tags already on the car are ignored.
pub fn derive_tags(car: &Car) -> BTreeSet<Tag> {
    let mut tags = BTreeSet::new();

    tags.insert(Tag::new(TagCategory::Brand, car.brand.name.clone()));

    for fuel in &car.fuel_types {
        tags.insert(Tag::new(TagCategory::FuelType, fuel.display_name()));
    }

    for engine in &car.engines {
        let label = engine.label();
        if !label.is_empty() {
            tags.insert(Tag::new(TagCategory::Engine, label));
        }
    }

    let seats = car.seats.trim();
    if !seats.is_empty() {
        tags.insert(Tag::new(TagCategory::Seats, format!("{seats} seatings")));
    }

    if let Some(midpoint) = car.price_midpoint() {
        tags.insert(Tag::new(TagCategory::PriceRange, price_band(midpoint)));
    }

    for capacity in car.engines.iter().filter_map(|e| e.engine_capacity) {
        if capacity > 0 {
            tags.insert(Tag::new(
                TagCategory::Displacement,
                displacement_class(capacity),
            ));
        }
    }

    if car
        .engines
        .iter()
        .any(|e| e.torque.is_some_and(|nm| nm > HIGH_TORQUE_NM))
    {
        tags.insert(Tag::new(TagCategory::PerformanceMetrics, "High Torque"));
    }

    if let Some(performance) = &car.performance {
        if performance
            .acceleration_min
            .is_some_and(|s| s > 0.0 && s < FAST_ACCELERATION_SECONDS)
        {
            tags.insert(Tag::new(TagCategory::PerformanceMetrics, "Fast Acceleration"));
        }
        if performance.top_speed.is_some_and(|kmh| kmh > TOP_SPEED_KMH) {
            tags.insert(Tag::new(TagCategory::PerformanceMetrics, "Top Speed"));
        }
    }

    tags
}
