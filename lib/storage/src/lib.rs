//! # vismatch Storage
//!
//! Everything that touches catalog files:
//!
//! - [`CatalogPaths`] - primary/fallback probing for the raw and augmented files
//! - [`load`] / [`load_source`] - read a catalog file into a [`vismatch_core::Catalog`]
//! - [`CatalogStore`] - the serving-time owner of the catalog, with atomic reload
//! - [`CatalogBuilder`] - offline precompute of the augmented catalog

pub mod builder;
pub mod loader;
pub mod manager;
pub mod paths;

pub use builder::{write_augmented, BuildOutcome, BuildReport, CatalogBuilder};
pub use loader::{load, load_source, read_records};
pub use manager::{CatalogReport, CatalogSnapshot, CatalogStore};
pub use paths::{CatalogPaths, CatalogSource, AUGMENTED_CATALOG_FILE, RAW_CATALOG_FILE};
