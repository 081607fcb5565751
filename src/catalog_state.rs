//! LMDB-backed catalog store.
//!
//! The environment lives in a `<name>.lmdb` directory with three named
//! databases:
//!
//! * `brands`: brand slug → [`Brand`] JSON
//! * `cars`: car slug → stored car JSON (brand referenced by id)
//! * `meta`: id counters
//!
//! Every read operation runs in a single read-only transaction, so a call
//! sees one consistent snapshot even while writers are active. Every write
//! runs in a single read-write transaction and either fully applies or not
//! at all.

use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use lmdb::{Cursor, Database, DatabaseFlags, Environment, RwTransaction, Transaction, WriteFlags};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::app_response::AppResponse;
use crate::catalog_model::{slugify, Brand, Car, Engine, FuelType, NewCar, Performance, Tag};
use crate::catalog_reader::CatalogReader;
use crate::tag_rules::derive_tags;

/// Maximum size of the memory map. LMDB only reserves address space up front.
const MAP_SIZE: usize = 256 * 1024 * 1024;
const MAX_DBS: u32 = 3;

const BRANDS_DB: &str = "brands";
const CARS_DB: &str = "cars";
const META_DB: &str = "meta";

const NEXT_BRAND_ID: &str = "next_brand_id";
const NEXT_CAR_ID: &str = "next_car_id";

/// On-disk form of a car. The brand is stored once and joined on read.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredCar {
    id: u64,
    slug: String,
    name: String,
    year: i32,
    seats: String,
    price_min: Option<i64>,
    price_max: Option<i64>,
    brand_id: u64,
    #[serde(default)]
    performance: Option<Performance>,
    #[serde(default)]
    engines: Vec<Engine>,
    #[serde(default)]
    fuel_types: BTreeSet<FuelType>,
    #[serde(default)]
    tags: BTreeSet<Tag>,
}

impl StoredCar {
    fn materialize(self, brand: Brand) -> Car {
        Car {
            id: self.id,
            slug: self.slug,
            name: self.name,
            year: self.year,
            seats: self.seats,
            price_min: self.price_min,
            price_max: self.price_max,
            brand,
            performance: self.performance,
            engines: self.engines,
            fuel_types: self.fuel_types,
            tags: self.tags,
        }
    }

    fn from_car(car: &Car) -> Self {
        Self {
            id: car.id,
            slug: car.slug.clone(),
            name: car.name.clone(),
            year: car.year,
            seats: car.seats.clone(),
            price_min: car.price_min,
            price_max: car.price_max,
            brand_id: car.brand.id,
            performance: car.performance.clone(),
            engines: car.engines.clone(),
            fuel_types: car.fuel_types.clone(),
            tags: car.tags.clone(),
        }
    }
}

pub struct CatalogDbState {
    env: Environment,
    brands: Database,
    cars: Database,
    meta: Database,
    path: PathBuf,
}

impl CatalogDbState {
    /// Opens (creating if needed) the catalog stored in `<name>.lmdb`.
    pub fn init(name: String) -> Result<Self, AppResponse> {
        if name.trim().is_empty() {
            return Err(AppResponse::BadRequest("Database name must not be empty".to_string()));
        }

        let path = PathBuf::from(format!("{name}.lmdb"));
        fs::create_dir_all(&path)?;

        let env = Environment::new()
            .set_max_dbs(MAX_DBS)
            .set_map_size(MAP_SIZE)
            .open(&path)?;

        let brands = env.create_db(Some(BRANDS_DB), DatabaseFlags::empty())?;
        let cars = env.create_db(Some(CARS_DB), DatabaseFlags::empty())?;
        let meta = env.create_db(Some(META_DB), DatabaseFlags::empty())?;

        info!("Catalog opened at {}", path.display());

        Ok(Self {
            env,
            brands,
            cars,
            meta,
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Inserts a new car, creating its brand on first use.
    ///
    /// The store assigns the id, derives the slug when none is given and
    /// computes the tag set.
    ///
    /// # Errors
    ///
    /// [`AppResponse::ValidationError`] for invalid input or a slug that is
    /// already taken.
    pub fn push_car(&self, input: NewCar) -> Result<Car, AppResponse> {
        input.validate()?;
        let slug = input.resolved_slug();

        let mut txn = self.env.begin_rw_txn()?;

        if read_key(&txn, self.cars, &slug)?.is_some() {
            return Err(AppResponse::ValidationError(format!(
                "A car with slug '{slug}' already exists"
            )));
        }

        let brand = self.get_or_create_brand(&mut txn, &input.brand)?;
        let id = next_id(&mut txn, self.meta, NEXT_CAR_ID)?;
        let car = build_car(id, slug, brand, input);

        write_json(&mut txn, self.cars, &car.slug, &StoredCar::from_car(&car))?;
        txn.commit()?;

        info!("Stored car '{}' with id {}", car.slug, car.id);
        Ok(car)
    }

    /// Replaces the car stored under `slug`, keeping its id.
    ///
    /// Returns `Ok(None)` when no such car exists. The slug may change as
    /// long as the new one is free.
    pub fn update_car(&self, slug: &str, input: NewCar) -> Result<Option<Car>, AppResponse> {
        input.validate()?;
        let new_slug = input.resolved_slug();

        let mut txn = self.env.begin_rw_txn()?;

        let existing: StoredCar = match read_json(&txn, self.cars, slug)? {
            Some(stored) => stored,
            None => return Ok(None),
        };

        if new_slug != slug && read_key(&txn, self.cars, &new_slug)?.is_some() {
            return Err(AppResponse::ValidationError(format!(
                "A car with slug '{new_slug}' already exists"
            )));
        }

        let brand = self.get_or_create_brand(&mut txn, &input.brand)?;
        let car = build_car(existing.id, new_slug, brand, input);

        if car.slug != slug {
            txn.del(self.cars, &slug, None)?;
        }
        write_json(&mut txn, self.cars, &car.slug, &StoredCar::from_car(&car))?;
        txn.commit()?;

        info!("Updated car '{}' (id {})", car.slug, car.id);
        Ok(Some(car))
    }

    /// Appends an engine to a car and refreshes its tags.
    ///
    /// Unlike reads, writing to a car whose brand record is missing fails
    /// with [`AppResponse::DatabaseError`] rather than skipping it.
    pub fn add_engine(&self, car_slug: &str, engine: Engine) -> Result<Option<Car>, AppResponse> {
        engine.validate()?;

        let mut txn = self.env.begin_rw_txn()?;

        let stored: StoredCar = match read_json(&txn, self.cars, car_slug)? {
            Some(stored) => stored,
            None => return Ok(None),
        };
        let slug = stored.slug.clone();
        let mut car = self.attach_brand(&txn, stored)?.ok_or_else(|| {
            AppResponse::DatabaseError(format!("Car '{slug}' references a missing brand"))
        })?;
        car.engines.push(engine);
        car.tags = derive_tags(&car);

        write_json(&mut txn, self.cars, &car.slug, &StoredCar::from_car(&car))?;
        txn.commit()?;

        debug!("Car '{}' now has {} engines", car.slug, car.engines.len());
        Ok(Some(car))
    }

    pub fn delete_car(&self, slug: &str) -> Result<bool, AppResponse> {
        let mut txn = self.env.begin_rw_txn()?;
        match txn.del(self.cars, &slug, None) {
            Ok(()) => {
                txn.commit()?;
                info!("Deleted car '{}'", slug);
                Ok(true)
            }
            Err(lmdb::Error::NotFound) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// All cars ordered by id.
    pub fn get_all_cars(&self) -> Result<Vec<Car>, AppResponse> {
        let txn = self.env.begin_ro_txn()?;
        let mut cars = self.scan_cars(&txn, |_| true)?;
        cars.sort_by_key(|c| c.id);
        Ok(cars)
    }

    /// All brands ordered by name.
    pub fn get_all_brands(&self) -> Result<Vec<Brand>, AppResponse> {
        let txn = self.env.begin_ro_txn()?;
        let mut brands: Vec<Brand> = self.load_brands(&txn)?.into_values().collect();
        brands.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(brands)
    }

    /// Removes every brand, car and counter while keeping the environment open.
    pub fn clear_all_records(&self) -> Result<(), AppResponse> {
        let mut txn = self.env.begin_rw_txn()?;
        txn.clear_db(self.cars)?;
        txn.clear_db(self.brands)?;
        txn.clear_db(self.meta)?;
        txn.commit()?;
        info!("Cleared all records in {}", self.path.display());
        Ok(())
    }

    /// Empties the catalog and, when `name` differs from the current one,
    /// moves to a fresh `<name>.lmdb` environment and deletes the old
    /// directory.
    pub fn reset_database(&mut self, name: &str) -> Result<(), AppResponse> {
        let target = PathBuf::from(format!("{name}.lmdb"));
        if target == self.path {
            return self.clear_all_records();
        }

        let fresh = CatalogDbState::init(name.to_string())?;
        fresh.clear_all_records()?;
        let old = std::mem::replace(self, fresh);
        let old_path = old.path.clone();
        drop(old);

        if let Err(e) = fs::remove_dir_all(&old_path) {
            warn!("Could not remove old catalog at {}: {e}", old_path.display());
        }
        info!("Catalog reset to {}", self.path.display());
        Ok(())
    }

    /// Flushes everything to disk. The environment itself is released when
    /// the state is dropped.
    pub fn close_database(&mut self) -> Result<(), AppResponse> {
        self.env.sync(true)?;
        info!("Catalog at {} flushed and ready to close", self.path.display());
        Ok(())
    }

    /// Deletes a brand record without touching the cars that reference it.
    #[cfg(test)]
    pub(crate) fn remove_brand_record(&self, slug: &str) -> Result<(), AppResponse> {
        let mut txn = self.env.begin_rw_txn()?;
        txn.del(self.brands, &slug, None)?;
        txn.commit()?;
        Ok(())
    }

    fn get_or_create_brand(&self, txn: &mut RwTransaction, name: &str) -> Result<Brand, AppResponse> {
        let name = name.trim();
        let slug = slugify(name);
        if slug.is_empty() {
            return Err(AppResponse::ValidationError(format!(
                "Cannot derive a slug from brand name '{name}'"
            )));
        }

        if let Some(existing) = read_json::<Brand, _>(&*txn, self.brands, &slug)? {
            if existing.name.eq_ignore_ascii_case(name) {
                return Ok(existing);
            }
            return Err(AppResponse::ValidationError(format!(
                "Brand slug '{slug}' is already used by '{}'",
                existing.name
            )));
        }

        let brand = Brand {
            id: next_id(txn, self.meta, NEXT_BRAND_ID)?,
            name: name.to_string(),
            slug,
        };
        write_json(txn, self.brands, &brand.slug, &brand)?;
        info!("Created brand '{}' with id {}", brand.name, brand.id);
        Ok(brand)
    }

    fn load_brands<T: Transaction>(&self, txn: &T) -> Result<HashMap<u64, Brand>, AppResponse> {
        let mut brands = HashMap::new();
        let mut cursor = txn.open_ro_cursor(self.brands)?;
        for (key, value) in cursor.iter() {
            match serde_json::from_slice::<Brand>(value) {
                Ok(brand) => {
                    brands.insert(brand.id, brand);
                }
                Err(e) => warn!(
                    "Skipping unreadable brand record {:?}: {e}",
                    String::from_utf8_lossy(key)
                ),
            }
        }
        Ok(brands)
    }

    /// Joins a stored car with its brand, or `None` (with a warning) when the
    /// brand record is gone. Scans and single lookups share this rule.
    fn attach_brand<T: Transaction>(&self, txn: &T, stored: StoredCar) -> Result<Option<Car>, AppResponse> {
        match self.load_brands(txn)?.remove(&stored.brand_id) {
            Some(brand) => Ok(Some(stored.materialize(brand))),
            None => {
                warn!(
                    "Skipping car '{}': brand id {} does not exist",
                    stored.slug, stored.brand_id
                );
                Ok(None)
            }
        }
    }

    /// Loads and materializes every stored car accepted by `keep`.
    ///
    /// Unreadable records and cars pointing at a missing brand are skipped
    /// with a warning so one bad row cannot fail a whole scan.
    fn scan_cars<T, F>(&self, txn: &T, keep: F) -> Result<Vec<Car>, AppResponse>
    where
        T: Transaction,
        F: Fn(&StoredCar) -> bool,
    {
        let brands = self.load_brands(txn)?;
        let mut cars = Vec::new();
        let mut cursor = txn.open_ro_cursor(self.cars)?;
        for (key, value) in cursor.iter() {
            let stored: StoredCar = match serde_json::from_slice(value) {
                Ok(stored) => stored,
                Err(e) => {
                    warn!(
                        "Skipping unreadable car record {:?}: {e}",
                        String::from_utf8_lossy(key)
                    );
                    continue;
                }
            };
            if !keep(&stored) {
                continue;
            }
            match brands.get(&stored.brand_id) {
                Some(brand) => {
                    let brand = brand.clone();
                    cars.push(stored.materialize(brand));
                }
                None => warn!(
                    "Skipping car '{}': brand id {} does not exist",
                    stored.slug, stored.brand_id
                ),
            }
        }
        Ok(cars)
    }
}

impl CatalogReader for CatalogDbState {
    fn get_car_by_slug(&self, slug: &str) -> Result<Option<Car>, AppResponse> {
        let txn = self.env.begin_ro_txn()?;
        let stored: StoredCar = match read_json(&txn, self.cars, slug)? {
            Some(stored) => stored,
            None => return Ok(None),
        };
        self.attach_brand(&txn, stored)
    }

    fn list_all_cars_excluding(&self, id: u64) -> Result<Vec<Car>, AppResponse> {
        let txn = self.env.begin_ro_txn()?;
        self.scan_cars(&txn, |stored| stored.id != id)
    }

    fn get_brand_by_slug(&self, slug: &str) -> Result<Option<Brand>, AppResponse> {
        let txn = self.env.begin_ro_txn()?;
        read_json(&txn, self.brands, slug)
    }

    fn list_cars_for_brand(&self, brand_id: u64) -> Result<Vec<Car>, AppResponse> {
        let txn = self.env.begin_ro_txn()?;
        let mut cars = self.scan_cars(&txn, |stored| stored.brand_id == brand_id)?;
        cars.sort_by_key(|c| c.id);
        Ok(cars)
    }
}

fn build_car(id: u64, slug: String, brand: Brand, input: NewCar) -> Car {
    let mut car = Car {
        id,
        slug,
        name: input.name.trim().to_string(),
        year: input.year,
        seats: input.seats.trim().to_string(),
        price_min: input.price_min,
        price_max: input.price_max,
        brand,
        performance: input.performance,
        engines: input.engines,
        fuel_types: input.fuel_types,
        tags: BTreeSet::new(),
    };
    car.tags = derive_tags(&car);
    car
}

fn read_key<T: Transaction>(txn: &T, db: Database, key: &str) -> Result<Option<Vec<u8>>, AppResponse> {
    match txn.get(db, &key) {
        Ok(bytes) => Ok(Some(bytes.to_vec())),
        Err(lmdb::Error::NotFound) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn read_json<V, T>(txn: &T, db: Database, key: &str) -> Result<Option<V>, AppResponse>
where
    V: for<'de> Deserialize<'de>,
    T: Transaction,
{
    match read_key(txn, db, key)? {
        Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        None => Ok(None),
    }
}

fn write_json<V: Serialize>(
    txn: &mut RwTransaction,
    db: Database,
    key: &str,
    value: &V,
) -> Result<(), AppResponse> {
    let json = serde_json::to_vec(value)?;
    txn.put(db, &key, &json, WriteFlags::empty())?;
    Ok(())
}

/// Returns the next value of the counter stored under `key` and advances it.
/// Counters start at 1.
fn next_id(txn: &mut RwTransaction, meta: Database, key: &str) -> Result<u64, AppResponse> {
    let current = match read_key(&*txn, meta, key)? {
        Some(bytes) => {
            let raw: [u8; 8] = bytes.as_slice().try_into().map_err(|_| {
                AppResponse::DatabaseError(format!("Counter '{key}' is not an 8-byte integer"))
            })?;
            u64::from_be_bytes(raw)
        }
        None => 1,
    };
    txn.put(meta, &key, &(current + 1).to_be_bytes(), WriteFlags::empty())?;
    Ok(current)
}
