//! Read-side contract between the engines and whatever holds the catalog.
//!
//! Implementations return fully materialized [`Car`] values; the engines
//! never issue follow-up lookups for related records.

use crate::app_response::AppResponse;
use crate::catalog_model::{Brand, Car};

pub trait CatalogReader {
    fn get_car_by_slug(&self, slug: &str) -> Result<Option<Car>, AppResponse>;

    /// Every car except the one with `id`, for recommendation candidate pools.
    fn list_all_cars_excluding(&self, id: u64) -> Result<Vec<Car>, AppResponse>;

    fn get_brand_by_slug(&self, slug: &str) -> Result<Option<Brand>, AppResponse>;

    fn list_cars_for_brand(&self, brand_id: u64) -> Result<Vec<Car>, AppResponse>;
}

/// An in-memory, immutable catalog.
///
/// Useful when the caller already holds the data (tests, batch jobs) or wants
/// to pin one consistent view while running many engine calls.
#[derive(Debug, Clone, Default)]
pub struct CatalogSnapshot {
    brands: Vec<Brand>,
    cars: Vec<Car>,
}

impl CatalogSnapshot {
    /// Builds a snapshot, registering the brand of every car as well as the
    /// explicitly listed `brands` (which may include brands without cars).
    pub fn new(brands: Vec<Brand>, cars: Vec<Car>) -> Self {
        let mut all_brands = brands;
        for car in &cars {
            if !all_brands.iter().any(|b| b.id == car.brand.id) {
                all_brands.push(car.brand.clone());
            }
        }
        Self {
            brands: all_brands,
            cars,
        }
    }

    pub fn from_cars(cars: Vec<Car>) -> Self {
        Self::new(Vec::new(), cars)
    }
}

impl CatalogReader for CatalogSnapshot {
    fn get_car_by_slug(&self, slug: &str) -> Result<Option<Car>, AppResponse> {
        Ok(self.cars.iter().find(|c| c.slug == slug).cloned())
    }

    fn list_all_cars_excluding(&self, id: u64) -> Result<Vec<Car>, AppResponse> {
        Ok(self.cars.iter().filter(|c| c.id != id).cloned().collect())
    }

    fn get_brand_by_slug(&self, slug: &str) -> Result<Option<Brand>, AppResponse> {
        Ok(self.brands.iter().find(|b| b.slug == slug).cloned())
    }

    fn list_cars_for_brand(&self, brand_id: u64) -> Result<Vec<Car>, AppResponse> {
        Ok(self
            .cars
            .iter()
            .filter(|c| c.brand.id == brand_id)
            .cloned()
            .collect())
    }
}
