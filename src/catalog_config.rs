//! Tunable parameters of the recommendation and statistics engines.
//!
//! All structs deserialize from partial JSON: omitted fields take their
//! defaults, so `{}` is a valid configuration.
//!
//! ```rust
//! use car_catalog_core::catalog_config::CatalogConfig;
//!
//! let config = CatalogConfig::from_json(r#"{"recommendation":{"limit":3}}"#)?;
//! assert_eq!(config.recommendation.limit, 3);
//! assert_eq!(config.recommendation.weights.brand, 1.0);
//! assert_eq!(config.statistics.top_tags, 5);
//! # Ok::<(), car_catalog_core::app_response::AppResponse>(())
//! ```

use serde::{Deserialize, Serialize};

use crate::app_response::AppResponse;

pub const DEFAULT_RECOMMENDATION_LIMIT: usize = 5;
pub const DEFAULT_TOP_N: usize = 5;
pub const DEFAULT_DECIMAL_PLACES: u32 = 2;

/// Largest accepted rounding precision; beyond this `10^n` stops being exact.
const MAX_DECIMAL_PLACES: u32 = 9;

/// Per-dimension multipliers applied by the similarity scorer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringWeights {
    pub performance: f64,
    pub price: f64,
    pub brand: f64,
    pub tags: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            performance: 1.0,
            price: 1.0,
            brand: 1.0,
            tags: 1.0,
        }
    }
}

impl ScoringWeights {
    /// Weights must be finite and non-negative so totals never go below zero.
    pub fn validate(&self) -> Result<(), AppResponse> {
        for (name, weight) in [
            ("performance", self.performance),
            ("price", self.price),
            ("brand", self.brand),
            ("tags", self.tags),
        ] {
            if !weight.is_finite() || weight < 0.0 {
                return Err(AppResponse::ValidationError(format!(
                    "weight '{name}' must be a finite non-negative number, got {weight}"
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecommendConfig {
    pub weights: ScoringWeights,
    pub limit: usize,
}

impl Default for RecommendConfig {
    fn default() -> Self {
        Self {
            weights: ScoringWeights::default(),
            limit: DEFAULT_RECOMMENDATION_LIMIT,
        }
    }
}

impl RecommendConfig {
    pub fn validate(&self) -> Result<(), AppResponse> {
        self.weights.validate()
    }
}

/// How engines are bucketed for the popularity ranking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EngineGrouping {
    /// `V Turbocharged`, `Inline/Straight Naturally Aspirated`, ...
    #[default]
    LayoutAspiration,
    /// `V8 Turbocharged`, `Unspecified V Engine`, `6-Cylinder`, ...
    LayoutCylindersAspiration,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatsConfig {
    pub top_engines: usize,
    pub top_tags: usize,
    pub engine_grouping: EngineGrouping,
    pub decimal_places: u32,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            top_engines: DEFAULT_TOP_N,
            top_tags: DEFAULT_TOP_N,
            engine_grouping: EngineGrouping::default(),
            decimal_places: DEFAULT_DECIMAL_PLACES,
        }
    }
}

impl StatsConfig {
    pub fn validate(&self) -> Result<(), AppResponse> {
        if self.decimal_places > MAX_DECIMAL_PLACES {
            return Err(AppResponse::ValidationError(format!(
                "decimal_places must be at most {MAX_DECIMAL_PLACES}, got {}",
                self.decimal_places
            )));
        }
        Ok(())
    }
}

/// Combined configuration accepted by the C interface.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    pub recommendation: RecommendConfig,
    pub statistics: StatsConfig,
}

impl CatalogConfig {
    /// Parses and validates a JSON configuration document.
    pub fn from_json(json: &str) -> Result<Self, AppResponse> {
        let config: CatalogConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), AppResponse> {
        self.recommendation.validate()?;
        self.statistics.validate()
    }
}
