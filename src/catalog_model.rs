//! Data model definitions for the car catalog.
//!
//! This module defines the entities stored in the catalog and read by the
//! recommendation and statistics engines. A [`Car`] is always handed out fully
//! materialized: its [`Brand`], [`Performance`], engines, fuel types and tags
//! are owned collections on the struct, so no engine ever has to go back to
//! the store for a related record.
//!
//! # Example
//!
//! ```rust
//! use car_catalog_core::catalog_model::{Aspiration, CylinderLayout, Engine};
//!
//! let engine = Engine {
//!     cylinder_layout: Some(CylinderLayout::V),
//!     cylinder_count: Some(8),
//!     aspiration: Some(Aspiration::TwinTurbo),
//!     ..Engine::default()
//! };
//!
//! assert_eq!(engine.label(), "V8");
//! assert_eq!(engine.to_string(), "V8, Twin Turbo");
//! ```

use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::app_response::AppResponse;

/// Slowest 0-100 km/h time accepted on write, in seconds.
pub const MAX_ACCELERATION_SECONDS: f64 = 30.0;

/// A car manufacturer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Brand {
    pub id: u64,
    pub name: String,
    pub slug: String,
}

/// Fuel classification, many-to-many with [`Car`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum FuelType {
    Petrol,
    Diesel,
    Electric,
    Hydrogen,
    #[serde(rename = "CNG")]
    Cng,
    Hybrid,
}

impl FuelType {
    pub fn display_name(self) -> &'static str {
        match self {
            FuelType::Petrol => "Petrol",
            FuelType::Diesel => "Diesel",
            FuelType::Electric => "Electric",
            FuelType::Hydrogen => "Hydrogen",
            FuelType::Cng => "Compressed Natural Gas",
            FuelType::Hybrid => "Hybrid",
        }
    }
}

impl Display for FuelType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display_name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CylinderLayout {
    Inline,
    V,
    Flat,
    W,
    Rotary,
}

impl CylinderLayout {
    /// Single letter used in compact labels such as `I4` or `V8`.
    pub fn code(self) -> &'static str {
        match self {
            CylinderLayout::Inline => "I",
            CylinderLayout::V => "V",
            CylinderLayout::Flat => "F",
            CylinderLayout::W => "W",
            CylinderLayout::Rotary => "R",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            CylinderLayout::Inline => "Inline/Straight",
            CylinderLayout::V => "V",
            CylinderLayout::Flat => "Flat/Boxer",
            CylinderLayout::W => "W",
            CylinderLayout::Rotary => "Rotary/Wankel",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Aspiration {
    Turbo,
    Supercharged,
    TwinTurbo,
    QuadTurbo,
    NaturallyAspirated,
}

impl Aspiration {
    pub fn display_name(self) -> &'static str {
        match self {
            Aspiration::Turbo => "Turbocharged",
            Aspiration::Supercharged => "Supercharged",
            Aspiration::TwinTurbo => "Twin Turbo",
            Aspiration::QuadTurbo => "Quad Turbo",
            Aspiration::NaturallyAspirated => "Naturally Aspirated",
        }
    }
}

/// One engine configuration (trim) of a car.
///
/// Every field is optional: electric drivetrains have no cylinders and
/// scraped data is frequently partial.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Engine {
    pub cylinder_layout: Option<CylinderLayout>,
    pub cylinder_count: Option<u16>,
    pub aspiration: Option<Aspiration>,
    /// Displacement in cc.
    pub engine_capacity: Option<u32>,
    /// Battery capacity in kWh.
    pub battery_capacity: Option<f64>,
    pub horsepower: Option<u32>,
    /// Torque in Nm.
    pub torque: Option<u32>,
}

impl Engine {
    /// Compact cylinder description: `V8`, `Rotary/Wankel Engine`,
    /// `4-Cylinder`, or an empty string when neither part is known.
    pub fn label(&self) -> String {
        match (self.cylinder_layout, self.cylinder_count) {
            (Some(layout), Some(count)) => format!("{}{}", layout.code(), count),
            (Some(layout), None) => format!("{} Engine", layout.display_name()),
            (None, Some(count)) => format!("{}-Cylinder", count),
            (None, None) => String::new(),
        }
    }

    pub fn validate(&self) -> Result<(), AppResponse> {
        if self.cylinder_count == Some(0) {
            return Err(AppResponse::ValidationError(
                "cylinder_count must be at least 1".to_string(),
            ));
        }
        if let Some(battery) = self.battery_capacity {
            if !battery.is_finite() || battery < 0.0 {
                return Err(AppResponse::ValidationError(format!(
                    "battery_capacity must be a non-negative number, got {battery}"
                )));
            }
        }
        Ok(())
    }
}

impl Display for Engine {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let mut parts = Vec::new();
        let label = self.label();
        if !label.is_empty() {
            parts.push(label);
        }
        if let Some(aspiration) = self.aspiration {
            parts.push(aspiration.display_name().to_string());
        }
        if let Some(cc) = self.engine_capacity.filter(|cc| *cc > 0) {
            parts.push(format!("Displacement: {cc} cc"));
        }
        if let Some(kwh) = self.battery_capacity.filter(|kwh| *kwh > 0.0) {
            parts.push(format!("Battery Capacity: {kwh} kWh"));
        }
        if let Some(hp) = self.horsepower.filter(|hp| *hp > 0) {
            parts.push(format!("Horsepower: {hp} hp"));
        }
        if let Some(nm) = self.torque.filter(|nm| *nm > 0) {
            parts.push(format!("Torque: {nm} Nm"));
        }

        if parts.is_empty() {
            f.write_str("No engine data available")
        } else {
            f.write_str(&parts.join(", "))
        }
    }
}

/// Performance figures of a car. Any field may be unknown.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Performance {
    /// km/h
    pub top_speed: Option<u32>,
    /// 0-100 km/h, seconds
    pub acceleration_min: Option<f64>,
    /// 0-100 km/h, seconds
    pub acceleration_max: Option<f64>,
}

impl Performance {
    /// Midpoint of the acceleration range.
    ///
    /// A single known bound stands for itself. An inverted range
    /// (`min > max`) or a non-finite value yields `None` so callers skip it.
    pub fn acceleration_midpoint(&self) -> Option<f64> {
        let finite = |v: f64| v.is_finite().then_some(v);
        match (
            self.acceleration_min.and_then(finite),
            self.acceleration_max.and_then(finite),
        ) {
            (Some(min), Some(max)) if min <= max => Some((min + max) / 2.0),
            (Some(_), Some(_)) => None,
            (Some(only), None) | (None, Some(only)) => Some(only),
            (None, None) => None,
        }
    }

    pub fn validate(&self) -> Result<(), AppResponse> {
        for (field, value) in [
            ("acceleration_min", self.acceleration_min),
            ("acceleration_max", self.acceleration_max),
        ] {
            if let Some(v) = value {
                if !(0.0..=MAX_ACCELERATION_SECONDS).contains(&v) {
                    return Err(AppResponse::ValidationError(format!(
                        "{field} must be between 0 and {MAX_ACCELERATION_SECONDS} seconds, got {v}"
                    )));
                }
            }
        }
        if let (Some(min), Some(max)) = (self.acceleration_min, self.acceleration_max) {
            if min > max {
                return Err(AppResponse::ValidationError(format!(
                    "acceleration_min ({min}) is greater than acceleration_max ({max})"
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TagCategory {
    Brand,
    FuelType,
    Engine,
    Seats,
    PriceRange,
    Displacement,
    PerformanceMetrics,
}

impl TagCategory {
    pub fn display_name(self) -> &'static str {
        match self {
            TagCategory::Brand => "Brand",
            TagCategory::FuelType => "Fuel Type",
            TagCategory::Engine => "Engine",
            TagCategory::Seats => "Seats",
            TagCategory::PriceRange => "Price Range",
            TagCategory::Displacement => "Displacement",
            TagCategory::PerformanceMetrics => "Performance Metrics",
        }
    }
}

/// A derived label attached to cars. Identity is `(category, value)`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Tag {
    pub category: TagCategory,
    pub value: String,
}

impl Tag {
    pub fn new(category: TagCategory, value: impl Into<String>) -> Self {
        Self {
            category,
            value: value.into(),
        }
    }
}

impl Display for Tag {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.category.display_name(), self.value)
    }
}

/// A fully materialized car record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Car {
    pub id: u64,
    pub slug: String,
    pub name: String,
    pub year: i32,
    /// Free-form seating descriptor, e.g. `"5"` or `"2+2"`.
    pub seats: String,
    pub price_min: Option<i64>,
    pub price_max: Option<i64>,
    pub brand: Brand,
    #[serde(default)]
    pub performance: Option<Performance>,
    #[serde(default)]
    pub engines: Vec<Engine>,
    #[serde(default)]
    pub fuel_types: BTreeSet<FuelType>,
    #[serde(default)]
    pub tags: BTreeSet<Tag>,
}

impl Car {
    /// `(min, max)` when both bounds are set and ordered.
    pub fn price_range(&self) -> Option<(i64, i64)> {
        match (self.price_min, self.price_max) {
            (Some(min), Some(max)) if min <= max => Some((min, max)),
            _ => None,
        }
    }

    pub fn price_midpoint(&self) -> Option<f64> {
        self.price_range()
            .map(|(min, max)| (min as f64 + max as f64) / 2.0)
    }
}

impl Display for Car {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.brand.name, self.name)
    }
}

/// Write-side payload for creating or replacing a car.
///
/// The brand is referenced by name and created on first use; id, slug (when
/// omitted) and tags are assigned by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewCar {
    pub name: String,
    pub brand: String,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default = "default_year")]
    pub year: i32,
    #[serde(default)]
    pub seats: String,
    #[serde(default)]
    pub price_min: Option<i64>,
    #[serde(default)]
    pub price_max: Option<i64>,
    #[serde(default)]
    pub performance: Option<Performance>,
    #[serde(default)]
    pub engines: Vec<Engine>,
    #[serde(default)]
    pub fuel_types: BTreeSet<FuelType>,
}

fn default_year() -> i32 {
    2024
}

impl NewCar {
    pub fn new(name: impl Into<String>, brand: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            brand: brand.into(),
            slug: None,
            year: default_year(),
            seats: String::new(),
            price_min: None,
            price_max: None,
            performance: None,
            engines: Vec::new(),
            fuel_types: BTreeSet::new(),
        }
    }

    /// Slug stored for this car: the explicit one, else derived from the name.
    pub fn resolved_slug(&self) -> String {
        match &self.slug {
            Some(slug) if !slug.trim().is_empty() => slugify(slug),
            _ => slugify(&self.name),
        }
    }

    pub fn validate(&self) -> Result<(), AppResponse> {
        if self.name.trim().is_empty() {
            return Err(AppResponse::ValidationError("Car name is required".to_string()));
        }
        if self.brand.trim().is_empty() {
            return Err(AppResponse::ValidationError("Brand name is required".to_string()));
        }
        if self.resolved_slug().is_empty() {
            return Err(AppResponse::ValidationError(format!(
                "Cannot derive a slug from '{}'",
                self.name
            )));
        }
        for (field, value) in [("price_min", self.price_min), ("price_max", self.price_max)] {
            if let Some(v) = value {
                if v < 0 {
                    return Err(AppResponse::ValidationError(format!(
                        "{field} must not be negative, got {v}"
                    )));
                }
            }
        }
        if let (Some(min), Some(max)) = (self.price_min, self.price_max) {
            if min > max {
                return Err(AppResponse::ValidationError(format!(
                    "price_min ({min}) is greater than price_max ({max})"
                )));
            }
        }
        if let Some(performance) = &self.performance {
            performance.validate()?;
        }
        for engine in &self.engines {
            engine.validate()?;
        }
        Ok(())
    }
}

/// URL-friendly form of a name: lowercase ASCII alphanumerics separated by
/// single dashes.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_dash = false;
    for ch in name.chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(ch.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }
    slug
}

/// Formats a price range as `$50,000` or `$50,000-$60,000`.
///
/// Returns `None` when neither bound is known.
pub fn format_price_range(price_min: Option<i64>, price_max: Option<i64>) -> Option<String> {
    match (price_min, price_max) {
        (None, None) => None,
        (Some(min), Some(max)) if min == max => Some(format!("${}", group_thousands(min))),
        (Some(min), Some(max)) => Some(format!(
            "${}-${}",
            group_thousands(min),
            group_thousands(max)
        )),
        (Some(only), None) | (None, Some(only)) => Some(format!("${}", group_thousands(only))),
    }
}

fn group_thousands(value: i64) -> String {
    let digits = value.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if value < 0 {
        grouped.push('-');
    }
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    grouped
}
