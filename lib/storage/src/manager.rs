use parking_lot::RwLock;
use serde::Serialize;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::info;
use vismatch_core::{Catalog, CatalogItem, CatalogStats, Result};

use crate::loader;
use crate::paths::{CatalogPaths, CatalogSource};

/// A loaded catalog together with where and when it came from.
#[derive(Debug)]
pub struct CatalogSnapshot {
    pub catalog: Catalog,
    pub source: CatalogSource,
    /// Seconds since the Unix epoch.
    pub loaded_at: u64,
}

impl CatalogSnapshot {
    fn new(catalog: Catalog, source: CatalogSource) -> Self {
        Self {
            catalog,
            source,
            loaded_at: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or(0),
        }
    }

    pub fn report(&self) -> CatalogReport {
        CatalogReport {
            source: self.source.clone(),
            loaded_at: self.loaded_at,
            stats: self.catalog.stats(),
        }
    }
}

/// Operator-facing summary of the current catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CatalogReport {
    pub source: CatalogSource,
    pub loaded_at: u64,
    #[serde(flatten)]
    pub stats: CatalogStats,
}

/// Owns the catalog served to requests.
///
/// Readers take an `Arc` to the current snapshot and keep using it for as long
/// as they need; [`CatalogStore::reload`] builds a complete replacement first
/// and then swaps the pointer, so no reader ever sees a partially loaded catalog.
pub struct CatalogStore {
    paths: CatalogPaths,
    current: RwLock<Arc<CatalogSnapshot>>,
}

impl CatalogStore {
    /// Resolve and load the catalog once at startup.
    pub fn open(paths: CatalogPaths) -> Result<Self> {
        let source = paths.resolve();
        let catalog = loader::load_source(&source)?;
        Ok(Self {
            paths,
            current: RwLock::new(Arc::new(CatalogSnapshot::new(catalog, source))),
        })
    }

    /// Serve an already built catalog. Reloading re-resolves `paths`.
    pub fn from_catalog(catalog: Catalog, paths: CatalogPaths) -> Self {
        Self {
            paths,
            current: RwLock::new(Arc::new(CatalogSnapshot::new(catalog, CatalogSource::Missing))),
        }
    }

    /// The catalog as of now. Later reloads do not affect the returned snapshot.
    #[inline]
    pub fn snapshot(&self) -> Arc<CatalogSnapshot> {
        self.current.read().clone()
    }

    /// All items in file order, embeddings stripped.
    pub fn all_items(&self) -> Vec<CatalogItem> {
        self.snapshot().catalog.all_items()
    }

    pub fn report(&self) -> CatalogReport {
        self.snapshot().report()
    }

    /// Re-resolve the catalog files, load off to the side, then swap.
    ///
    /// On error the current catalog stays in place.
    pub fn reload(&self) -> Result<CatalogReport> {
        let source = self.paths.resolve();
        let catalog = loader::load_source(&source)?;
        Ok(self.replace(catalog, source))
    }

    /// Swap in a new catalog.
    pub fn replace(&self, catalog: Catalog, source: CatalogSource) -> CatalogReport {
        let snapshot = Arc::new(CatalogSnapshot::new(catalog, source));
        let report = snapshot.report();
        *self.current.write() = snapshot;
        info!(
            items = report.stats.total,
            searchable = report.stats.searchable,
            source = ?report.source,
            "Catalog swapped"
        );
        report
    }
}
