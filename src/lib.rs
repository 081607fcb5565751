//! # Car Catalog Core
//!
//! An embedded car catalog with two derived-data engines, designed for FFI
//! (Foreign Function Interface) integration as well as direct use from Rust.
//! Built on LMDB (Lightning Memory-Mapped Database) for storage.
//!
//! ## Features
//!
//! - **Similarity recommendations**: the five cars closest to a given car,
//!   scored on performance, price overlap, brand and shared tags
//! - **Brand statistics**: counts, averages and popularity rankings per brand
//! - **Derived tags**: price bands, displacement classes and performance
//!   badges recomputed on every write
//! - **Consistent reads**: each operation runs in one LMDB read transaction
//! - **Safe error handling**: No `unwrap()` calls in production code
//!
//! ## Quick Start
//!
//! ```no_run
//! use car_catalog_core::catalog_config::RecommendConfig;
//! use car_catalog_core::catalog_model::NewCar;
//! use car_catalog_core::catalog_state::CatalogDbState;
//! use car_catalog_core::recommendation::recommend;
//!
//! let catalog = CatalogDbState::init("my_catalog".to_string())?;
//!
//! let mut camry = NewCar::new("Camry", "Toyota");
//! camry.price_min = Some(25_000);
//! camry.price_max = Some(35_000);
//! catalog.push_car(camry)?;
//! catalog.push_car(NewCar::new("Corolla", "Toyota"))?;
//!
//! let similar = recommend(&catalog, "camry", &RecommendConfig::default())?;
//! assert_eq!(similar[0].car.slug, "corolla");
//! # Ok::<(), car_catalog_core::app_response::AppResponse>(())
//! ```
//!
//! ## FFI Functions
//!
//! Every function returns a JSON-encoded [`AppResponse`] C string that must be
//! released with [`free_response`]:
//!
//! - [`create_db`] - Open or create a catalog
//! - [`push_car`] / [`update_car`] / [`add_engine`] - Write cars
//! - [`get_car`] / [`get_all_cars`] / [`get_brand`] / [`get_all_brands`] - Read records
//! - [`delete_car`] - Remove a car by slug
//! - [`recommend_cars`] - Most similar cars for a slug
//! - [`brand_statistics()`] - Aggregates for a brand slug
//! - [`clear_all_records`] / [`reset_database`] / [`close_database`] - Lifecycle

pub mod app_response;
pub mod brand_statistics;
pub mod catalog_config;
pub mod catalog_model;
pub mod catalog_reader;
pub mod catalog_state;
pub mod recommendation;
pub mod similarity;
pub mod tag_rules;

use std::ffi::{CStr, CString};
use std::os::raw::c_char;

use log::{info, warn};
use serde::Serialize;

use crate::app_response::AppResponse;
use crate::catalog_config::CatalogConfig;
use crate::catalog_model::{Engine, NewCar};
use crate::catalog_reader::CatalogReader;
use crate::catalog_state::CatalogDbState;

/// Opens (or creates) the catalog stored in `<name>.lmdb`.
///
/// # Returns
///
/// A pointer to the [`CatalogDbState`] on success, or a null pointer on
/// failure. The caller owns the pointer.
///
/// # Examples
///
/// ```no_run
/// use std::ffi::CString;
/// use car_catalog_core::create_db;
///
/// let name = CString::new("catalog").unwrap();
/// let db_state = create_db(name.as_ptr());
/// assert!(!db_state.is_null());
/// ```
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn create_db(name: *const c_char) -> *mut CatalogDbState {
    if name.is_null() {
        warn!("Null name pointer passed to create_db");
        return std::ptr::null_mut();
    }

    let name_str = match unsafe { CStr::from_ptr(name).to_str() } {
        Ok(s) => s,
        Err(e) => {
            warn!("Invalid UTF-8 in name parameter: {e}");
            return std::ptr::null_mut();
        }
    };

    match CatalogDbState::init(name_str.to_string()) {
        Ok(state) => {
            info!("Catalog '{}' initialized", name_str);
            Box::into_raw(Box::new(state))
        }
        Err(e) => {
            warn!("Failed to initialize catalog '{}': {}", name_str, e);
            std::ptr::null_mut()
        }
    }
}

/// Inserts a new car.
///
/// # JSON Format
///
/// ```json
/// {
///   "name": "Camry",
///   "brand": "Toyota",
///   "seats": "5",
///   "price_min": 25000,
///   "price_max": 35000,
///   "performance": { "top_speed": 210, "acceleration_min": 7.5, "acceleration_max": 8.1 },
///   "engines": [ { "cylinder_layout": "Inline", "cylinder_count": 4, "aspiration": "NaturallyAspirated" } ],
///   "fuel_types": ["Petrol", "Hybrid"]
/// }
/// ```
///
/// On success the `Ok` payload is the stored car, including its id, slug and
/// derived tags.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn push_car(state: *mut CatalogDbState, json_ptr: *const c_char) -> *const c_char {
    let state = match state_ref(state, "push_car") {
        Ok(s) => s,
        Err(err) => return err,
    };

    let input: NewCar = match parse_json(json_ptr, "JSON") {
        Ok(input) => input,
        Err(err) => return err,
    };

    respond(state.push_car(input))
}

/// Replaces the car stored under `slug` with the JSON payload (same format
/// as [`push_car`]).
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn update_car(
    state: *mut CatalogDbState,
    slug: *const c_char,
    json_ptr: *const c_char,
) -> *const c_char {
    let state = match state_ref(state, "update_car") {
        Ok(s) => s,
        Err(err) => return err,
    };

    let slug_str = match c_ptr_to_string(slug, "slug") {
        Ok(s) => s,
        Err(err) => return err,
    };

    let input: NewCar = match parse_json(json_ptr, "JSON") {
        Ok(input) => input,
        Err(err) => return err,
    };

    respond_found(state.update_car(&slug_str, input), || {
        format!("No car found with slug: {slug_str}")
    })
}

/// Appends one engine (JSON object) to the car stored under `car_slug`.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn add_engine(
    state: *mut CatalogDbState,
    car_slug: *const c_char,
    json_ptr: *const c_char,
) -> *const c_char {
    let state = match state_ref(state, "add_engine") {
        Ok(s) => s,
        Err(err) => return err,
    };

    let slug_str = match c_ptr_to_string(car_slug, "car_slug") {
        Ok(s) => s,
        Err(err) => return err,
    };

    let engine: Engine = match parse_json(json_ptr, "JSON") {
        Ok(engine) => engine,
        Err(err) => return err,
    };

    respond_found(state.add_engine(&slug_str, engine), || {
        format!("No car found with slug: {slug_str}")
    })
}

/// Retrieves a fully materialized car by slug.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn get_car(state: *mut CatalogDbState, slug: *const c_char) -> *const c_char {
    let state = match state_ref(state, "get_car") {
        Ok(s) => s,
        Err(err) => return err,
    };

    let slug_str = match c_ptr_to_string(slug, "slug") {
        Ok(s) => s,
        Err(err) => return err,
    };

    respond_found(state.get_car_by_slug(&slug_str), || {
        format!("No car found with slug: {slug_str}")
    })
}

/// Retrieves every car, ordered by id.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn get_all_cars(state: *mut CatalogDbState) -> *const c_char {
    match state_ref(state, "get_all_cars") {
        Ok(state) => respond(state.get_all_cars()),
        Err(err) => err,
    }
}

/// Retrieves a brand by slug.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn get_brand(state: *mut CatalogDbState, slug: *const c_char) -> *const c_char {
    let state = match state_ref(state, "get_brand") {
        Ok(s) => s,
        Err(err) => return err,
    };

    let slug_str = match c_ptr_to_string(slug, "slug") {
        Ok(s) => s,
        Err(err) => return err,
    };

    respond_found(state.get_brand_by_slug(&slug_str), || {
        format!("No brand found with slug: {slug_str}")
    })
}

/// Retrieves every brand, ordered by name.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn get_all_brands(state: *mut CatalogDbState) -> *const c_char {
    match state_ref(state, "get_all_brands") {
        Ok(state) => respond(state.get_all_brands()),
        Err(err) => err,
    }
}

/// Deletes a car by slug.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn delete_car(state: *mut CatalogDbState, slug: *const c_char) -> *const c_char {
    let state = match state_ref(state, "delete_car") {
        Ok(s) => s,
        Err(err) => return err,
    };

    let slug_str = match c_ptr_to_string(slug, "slug") {
        Ok(s) => s,
        Err(err) => return err,
    };

    match state.delete_car(&slug_str) {
        Ok(true) => response_to_c_string(&AppResponse::success("Car deleted successfully")),
        Ok(false) => response_to_c_string(&AppResponse::NotFound(format!(
            "No car found with slug: {slug_str}"
        ))),
        Err(e) => response_to_c_string(&e),
    }
}

/// Returns the cars most similar to the car stored under `slug`.
///
/// `config_ptr` may be null for the defaults, or point to a
/// [`CatalogConfig`] JSON document such as
/// `{"recommendation":{"limit":3,"weights":{"brand":0.5}}}`.
///
/// The `Ok` payload is a JSON array of `{ "car": ..., "similarity": ... }`
/// objects, most similar first.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn recommend_cars(
    state: *mut CatalogDbState,
    slug: *const c_char,
    config_ptr: *const c_char,
) -> *const c_char {
    let state = match state_ref(state, "recommend_cars") {
        Ok(s) => s,
        Err(err) => return err,
    };

    let slug_str = match c_ptr_to_string(slug, "slug") {
        Ok(s) => s,
        Err(err) => return err,
    };

    let config = match optional_config(config_ptr) {
        Ok(config) => config,
        Err(err) => return err,
    };

    respond(recommendation::recommend(
        state,
        &slug_str,
        &config.recommendation,
    ))
}

/// Returns aggregate statistics for the brand stored under `slug`.
///
/// `config_ptr` may be null or a [`CatalogConfig`] JSON document, e.g.
/// `{"statistics":{"top_tags":3,"engine_grouping":"LayoutCylindersAspiration"}}`.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn brand_statistics(
    state: *mut CatalogDbState,
    slug: *const c_char,
    config_ptr: *const c_char,
) -> *const c_char {
    let state = match state_ref(state, "brand_statistics") {
        Ok(s) => s,
        Err(err) => return err,
    };

    let slug_str = match c_ptr_to_string(slug, "slug") {
        Ok(s) => s,
        Err(err) => return err,
    };

    let config = match optional_config(config_ptr) {
        Ok(config) => config,
        Err(err) => return err,
    };

    respond(brand_statistics::stats(state, &slug_str, &config.statistics))
}

/// Removes every brand and car while keeping the catalog open.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn clear_all_records(state: *mut CatalogDbState) -> *const c_char {
    let state = match state_ref(state, "clear_all_records") {
        Ok(s) => s,
        Err(err) => return err,
    };

    match state.clear_all_records() {
        Ok(()) => response_to_c_string(&AppResponse::success("All records cleared successfully")),
        Err(e) => response_to_c_string(&e),
    }
}

/// Resets the catalog to an empty state under `name_ptr`.
///
/// With a new name the old `.lmdb` directory is removed after the new one
/// has been opened.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn reset_database(state: *mut CatalogDbState, name_ptr: *const c_char) -> *const c_char {
    if state.is_null() {
        let error = AppResponse::BadRequest("Null state pointer passed to reset_database".to_string());
        return response_to_c_string(&error);
    }

    let name = match c_ptr_to_string(name_ptr, "name") {
        Ok(name) => name,
        Err(err) => return err,
    };

    let state = unsafe { &mut *state };

    match state.reset_database(&name) {
        Ok(()) => response_to_c_string(&AppResponse::success(format!(
            "Database '{name}' was reset successfully"
        ))),
        Err(e) => response_to_c_string(&AppResponse::DatabaseError(format!(
            "Error resetting database: {e}"
        ))),
    }
}

/// Flushes the catalog to disk before the host drops or reopens it.
///
/// LMDB releases the environment when the state is dropped; this call makes
/// sure nothing is pending before e.g. a Flutter hot restart.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn close_database(state: *mut CatalogDbState) -> *const c_char {
    if state.is_null() {
        let error = AppResponse::BadRequest("Null state pointer passed to close_database".to_string());
        return response_to_c_string(&error);
    }

    let state = unsafe { &mut *state };

    match state.close_database() {
        Ok(()) => response_to_c_string(&AppResponse::success("Database connection closed successfully")),
        Err(e) => response_to_c_string(&e),
    }
}

/// Releases a string returned by any function of this library.
///
/// Passing null is a no-op. Every pointer must be freed exactly once.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn free_response(ptr: *const c_char) {
    if ptr.is_null() {
        return;
    }
    drop(unsafe { CString::from_raw(ptr as *mut c_char) });
}

/// Borrows the state behind `state`, or produces a `BadRequest` response.
fn state_ref<'a>(state: *mut CatalogDbState, caller: &str) -> Result<&'a CatalogDbState, *const c_char> {
    match unsafe { state.as_ref() } {
        Some(s) => Ok(s),
        None => {
            let error = AppResponse::BadRequest(format!("Null state pointer passed to {caller}"));
            Err(response_to_c_string(&error))
        }
    }
}

fn parse_json<T>(ptr: *const c_char, field_name: &str) -> Result<T, *const c_char>
where
    T: for<'de> serde::Deserialize<'de>,
{
    let json_str = c_ptr_to_string(ptr, field_name)?;
    serde_json::from_str(&json_str).map_err(|e| {
        let error = AppResponse::SerializationError(format!("Invalid JSON: {e}"));
        response_to_c_string(&error)
    })
}

/// Null means defaults; anything else must parse and validate.
fn optional_config(ptr: *const c_char) -> Result<CatalogConfig, *const c_char> {
    if ptr.is_null() {
        return Ok(CatalogConfig::default());
    }
    let json = c_ptr_to_string(ptr, "config")?;
    CatalogConfig::from_json(&json).map_err(|e| response_to_c_string(&e))
}

/// Wraps a serializable result in `AppResponse::Ok(<json>)`.
fn respond<T: Serialize>(result: Result<T, AppResponse>) -> *const c_char {
    match result {
        Ok(value) => match serde_json::to_string(&value) {
            Ok(json) => response_to_c_string(&AppResponse::Ok(json)),
            Err(e) => response_to_c_string(&AppResponse::SerializationError(format!(
                "Failed to serialize result: {e}"
            ))),
        },
        Err(e) => response_to_c_string(&e),
    }
}

/// Like [`respond`], mapping `Ok(None)` to `NotFound`.
fn respond_found<T, F>(result: Result<Option<T>, AppResponse>, not_found: F) -> *const c_char
where
    T: Serialize,
    F: FnOnce() -> String,
{
    match result {
        Ok(Some(value)) => respond(Ok(value)),
        Ok(None) => response_to_c_string(&AppResponse::NotFound(not_found())),
        Err(e) => response_to_c_string(&e),
    }
}

/// Serializes an [`AppResponse`] into a C string owned by the caller.
///
/// Returns a null pointer if serialization or C string creation fails.
fn response_to_c_string(response: &AppResponse) -> *const c_char {
    let json = match serde_json::to_string(response) {
        Ok(j) => j,
        Err(e) => {
            warn!("Error serializing response: {e}");
            return std::ptr::null();
        }
    };

    match CString::new(json) {
        Ok(c_str) => c_str.into_raw(),
        Err(e) => {
            warn!("Error creating CString: {e}");
            std::ptr::null()
        }
    }
}

/// Converts a C string pointer to a Rust `String`.
///
/// Null pointers and invalid UTF-8 become a `BadRequest` response naming
/// `field_name`.
fn c_ptr_to_string(ptr: *const c_char, field_name: &str) -> Result<String, *const c_char> {
    if ptr.is_null() {
        let error = AppResponse::BadRequest(format!("Null {field_name} pointer"));
        return Err(response_to_c_string(&error));
    }

    match unsafe { CStr::from_ptr(ptr).to_str() } {
        Ok(s) => Ok(s.to_string()),
        Err(e) => {
            let error = AppResponse::BadRequest(format!("Invalid UTF-8 in {field_name}: {e}"));
            Err(response_to_c_string(&error))
        }
    }
}
