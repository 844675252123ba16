use serde::Serialize;
use std::path::{Path, PathBuf};

/// Catalog without embeddings.
pub const RAW_CATALOG_FILE: &str = "products.json";

/// Catalog whose records carry an `embedding` field.
pub const AUGMENTED_CATALOG_FILE: &str = "products_with_embeddings.json";

/// Which file a catalog was read from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "path", rename_all = "snake_case")]
pub enum CatalogSource {
    /// Embedding-augmented file; items with embeddings are searchable.
    Augmented(PathBuf),
    /// Raw file; everything is listed, nothing is searchable.
    Raw(PathBuf),
    /// Neither file exists.
    Missing,
}

impl CatalogSource {
    pub fn path(&self) -> Option<&Path> {
        match self {
            CatalogSource::Augmented(p) | CatalogSource::Raw(p) => Some(p),
            CatalogSource::Missing => None,
        }
    }

    pub fn reads_embeddings(&self) -> bool {
        matches!(self, CatalogSource::Augmented(_))
    }
}

/// Where catalog files may live.
///
/// Each file kind is looked up in `data_dirs` in order (primary first, then
/// fallbacks) so the same binary works from a container layout and from a
/// source checkout.
#[derive(Debug, Clone)]
pub struct CatalogPaths {
    pub data_dirs: Vec<PathBuf>,
    pub raw_file: String,
    pub augmented_file: String,
}

impl Default for CatalogPaths {
    fn default() -> Self {
        Self::new(Self::default_dirs())
    }
}

impl CatalogPaths {
    pub fn new(data_dirs: Vec<PathBuf>) -> Self {
        Self {
            data_dirs,
            raw_file: RAW_CATALOG_FILE.to_string(),
            augmented_file: AUGMENTED_CATALOG_FILE.to_string(),
        }
    }

    /// `./data` then `../data`.
    pub fn default_dirs() -> Vec<PathBuf> {
        vec![PathBuf::from("data"), PathBuf::from("..").join("data")]
    }

    #[must_use]
    pub fn with_file_names(mut self, raw: impl Into<String>, augmented: impl Into<String>) -> Self {
        self.raw_file = raw.into();
        self.augmented_file = augmented.into();
        self
    }

    /// First existing copy of `file`, or the candidate in the last directory.
    fn probe(&self, file: &str) -> Option<PathBuf> {
        let candidates: Vec<PathBuf> = self.data_dirs.iter().map(|d| d.join(file)).collect();
        candidates
            .iter()
            .find(|p| p.is_file())
            .cloned()
            .or_else(|| candidates.last().cloned())
    }

    pub fn raw_path(&self) -> Option<PathBuf> {
        self.probe(&self.raw_file)
    }

    pub fn augmented_path(&self) -> Option<PathBuf> {
        self.probe(&self.augmented_file)
    }

    /// Pick the authoritative catalog file: augmented beats raw.
    pub fn resolve(&self) -> CatalogSource {
        if let Some(path) = self.augmented_path().filter(|p| p.is_file()) {
            return CatalogSource::Augmented(path);
        }
        if let Some(path) = self.raw_path().filter(|p| p.is_file()) {
            return CatalogSource::Raw(path);
        }
        CatalogSource::Missing
    }
}
