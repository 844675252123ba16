use ordered_float::OrderedFloat;
use rayon::prelude::*;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use tracing::{debug, warn};

use crate::catalog::{Catalog, ValidEntry};
use crate::error::{Error, Result};
use crate::item::CatalogItem;
use crate::vector::Vector;

/// Number of results returned when the caller does not ask for a specific count.
pub const DEFAULT_TOP_K: usize = 10;

/// Below this many searchable items scoring stays on the calling thread.
pub const DEFAULT_PARALLEL_THRESHOLD: usize = 4096;

/// Resolve a caller-supplied result count; absent or negative means [`DEFAULT_TOP_K`].
#[inline]
pub fn resolve_top_k(requested: Option<i64>) -> usize {
    match requested {
        Some(k) if k >= 0 => usize::try_from(k).unwrap_or(usize::MAX),
        _ => DEFAULT_TOP_K,
    }
}

/// Key carrying the score in a serialized [`SearchResult`].
pub const SIMILARITY_FIELD: &str = "similarity";

/// A ranked catalog item. Serializes as the item's fields plus `similarity`;
/// the score replaces any `similarity` attribute the item already had.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    pub item: CatalogItem,
    pub similarity: f32,
}

impl Serialize for SearchResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let item = &self.item;
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("id", &item.id)?;
        map.serialize_entry("name", &item.name)?;
        map.serialize_entry("image_url", &item.image_url)?;
        for (key, value) in item.attributes.iter().filter(|(k, _)| k.as_str() != SIMILARITY_FIELD) {
            map.serialize_entry(key, value)?;
        }
        map.serialize_entry(SIMILARITY_FIELD, &self.similarity)?;
        map.end()
    }
}

/// Exact brute-force cosine ranking over a [`Catalog`].
///
/// Stateless apart from its tuning knob, so one instance can be shared by any
/// number of concurrent searches.
#[derive(Debug, Clone, Copy)]
pub struct SimilarityRanker {
    parallel_threshold: usize,
}

impl Default for SimilarityRanker {
    fn default() -> Self {
        Self::new()
    }
}

impl SimilarityRanker {
    #[must_use]
    pub fn new() -> Self {
        Self {
            parallel_threshold: DEFAULT_PARALLEL_THRESHOLD,
        }
    }

    #[must_use]
    pub fn with_parallel_threshold(mut self, threshold: usize) -> Self {
        self.parallel_threshold = threshold;
        self
    }

    /// Rank every searchable item against `query` and return at most `top_k`
    /// results by descending similarity. Equal scores keep catalog order.
    ///
    /// A catalog with nothing searchable yields an empty result, not an error.
    pub fn search(&self, catalog: &Catalog, query: &[f32], top_k: usize) -> Result<Vec<SearchResult>> {
        let entries: Vec<ValidEntry<'_>> = catalog.valid_embedding_items().collect();
        let Some(dim) = catalog.dim().filter(|_| !entries.is_empty()) else {
            debug!("Catalog has no searchable items, returning empty result");
            return Ok(Vec::new());
        };

        let query = Vector::from_slice(query);
        let query_norm = validate_query(&query, dim)?;

        if top_k == 0 {
            return Ok(Vec::new());
        }

        let score = |entry: &ValidEntry<'_>| -> Option<(usize, f32)> {
            if entry.norm == 0.0 {
                return None;
            }
            let cosine = query.dot(entry.vector) / (query_norm * entry.norm);
            Some((entry.position, cosine.clamp(-1.0, 1.0)))
        };

        // Indexed collection keeps catalog order in both branches, which the
        // stable sort below relies on for tie-breaking.
        let mut scored: Vec<(usize, f32)> = if entries.len() >= self.parallel_threshold {
            entries.par_iter().filter_map(score).collect()
        } else {
            entries.iter().filter_map(score).collect()
        };

        let skipped = entries.len() - scored.len();
        if skipped > 0 {
            warn!(skipped, "Zero-norm catalog embeddings excluded from scoring");
        }

        scored.sort_by(|a, b| OrderedFloat(b.1).cmp(&OrderedFloat(a.1)));
        scored.truncate(top_k);

        Ok(scored
            .into_iter()
            .filter_map(|(position, similarity)| {
                catalog.get(position).map(|item| SearchResult {
                    item: item.clone(),
                    similarity,
                })
            })
            .collect())
    }
}

fn validate_query(query: &Vector, dim: usize) -> Result<f32> {
    if query.dim() != dim {
        return Err(Error::DimensionMismatch {
            expected: dim,
            actual: query.dim(),
        });
    }
    if !query.is_finite() {
        return Err(Error::InvalidQuery(
            "query contains a non-finite component".to_string(),
        ));
    }
    let norm = query.norm();
    if norm == 0.0 || !norm.is_finite() {
        return Err(Error::ZeroNormQuery);
    }
    Ok(norm)
}
