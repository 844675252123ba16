use serde_json::Value;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use tracing::{info, warn};
use vismatch_core::{Catalog, Error, Result};

use crate::paths::CatalogSource;

/// Load a catalog file.
///
/// A missing file is not an error: the result is an empty catalog so the
/// service can still answer health checks and listings. With
/// `read_embeddings == false` the file is treated as a raw catalog and no item
/// is searchable.
pub fn load(path: &Path, read_embeddings: bool) -> Result<Catalog> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            warn!(path = %path.display(), "Catalog file not found, starting with an empty catalog");
            return Ok(Catalog::empty());
        }
        Err(e) => return Err(Error::Io(e)),
    };

    let catalog = Catalog::from_json_slice(&bytes, read_embeddings).map_err(|e| {
        Error::Catalog(format!("failed to parse {}: {}", path.display(), e))
    })?;

    let stats = catalog.stats();
    info!(
        path = %path.display(),
        items = stats.total,
        searchable = stats.searchable,
        rejected = stats.rejected,
        skipped = stats.skipped,
        dim = ?stats.dim,
        "Catalog loaded"
    );
    Ok(catalog)
}

/// Load whatever [`CatalogPaths::resolve`](crate::CatalogPaths::resolve) selected.
pub fn load_source(source: &CatalogSource) -> Result<Catalog> {
    match source {
        CatalogSource::Augmented(path) => load(path, true),
        CatalogSource::Raw(path) => {
            info!(path = %path.display(), "No embedding-augmented catalog found, search will return no results");
            load(path, false)
        }
        CatalogSource::Missing => {
            warn!("No catalog file found, starting with an empty catalog");
            Ok(Catalog::empty())
        }
    }
}

/// Read the records of a catalog file as untyped JSON.
pub fn read_records(path: &Path) -> Result<Vec<Value>> {
    let bytes = fs::read(path)?;
    match serde_json::from_slice(&bytes)? {
        Value::Array(records) => Ok(records),
        _ => Err(Error::Catalog(format!(
            "{} must contain a JSON array of items",
            path.display()
        ))),
    }
}
