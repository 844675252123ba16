use serde::Serialize;
use serde_json::Value;
use tracing::{error, warn};

use crate::error::{Error, Result};
use crate::item::{CatalogItem, CatalogRecord, Embedding, EmbeddingDefect};
use crate::vector::Vector;

/// Counters describing a loaded catalog.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CatalogStats {
    /// Items available for listing.
    pub total: usize,
    /// Items holding a well-formed embedding of the catalog dimension.
    pub searchable: usize,
    /// Searchable items whose embedding has zero norm and is never scored.
    pub zero_norm: usize,
    /// Items whose stored embedding was dropped at load time.
    pub rejected: usize,
    /// Records that could not be read as items at all.
    pub skipped: usize,
    /// Embedding dimension shared by all searchable items.
    pub dim: Option<usize>,
}

/// An item with a usable embedding, as handed to the ranker.
#[derive(Debug, Clone, Copy)]
pub struct ValidEntry<'a> {
    /// Position of the item in catalog order.
    pub position: usize,
    pub item: &'a CatalogItem,
    pub vector: &'a Vector,
    pub norm: f32,
}

#[derive(Debug, Clone, Copy)]
struct Searchable {
    position: usize,
    norm: f32,
}

/// Ordered, read-only set of catalog records.
///
/// Built once and never mutated. Every present embedding has the same length;
/// records that would break that are downgraded to [`Embedding::Missing`] when
/// the catalog is constructed, so readers never see a mixed-dimension set.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    records: Vec<CatalogRecord>,
    searchable: Vec<Searchable>,
    dim: Option<usize>,
    rejected: usize,
    skipped: usize,
    wrong_dim: usize,
}

impl Catalog {
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a catalog from records in order.
    ///
    /// The first present embedding fixes the dimension; later ones of a
    /// different length are rejected.
    pub fn from_records<I>(records: I) -> Self
    where
        I: IntoIterator<Item = CatalogRecord>,
    {
        let mut catalog = Self::default();
        for record in records {
            catalog.push(record);
        }
        catalog.check_dimension();
        catalog
    }

    /// Build a catalog from the JSON array stored in a catalog file.
    ///
    /// Records that are not items are skipped and counted; malformed embeddings
    /// are dropped and counted. With `read_embeddings == false` the catalog has
    /// no searchable items.
    pub fn from_json_values(values: Vec<Value>, read_embeddings: bool) -> Self {
        let mut catalog = Self::default();

        for (index, value) in values.into_iter().enumerate() {
            match CatalogRecord::parse(value, read_embeddings) {
                Ok(parsed) => {
                    if let Some(defect) = parsed.defect {
                        warn!(
                            item = %parsed.record.item.id,
                            %defect,
                            "Dropping malformed embedding; item stays listed but is not searchable"
                        );
                        catalog.rejected += 1;
                    }
                    catalog.push(parsed.record);
                }
                Err(e) => {
                    warn!(record = index, error = %e, "Skipping unreadable catalog record");
                    catalog.skipped += 1;
                }
            }
        }

        catalog.check_dimension();
        catalog
    }

    /// Parse the raw bytes of a catalog file. The top level must be a JSON array.
    pub fn from_json_slice(bytes: &[u8], read_embeddings: bool) -> Result<Self> {
        let value: Value = serde_json::from_slice(bytes)?;
        match value {
            Value::Array(values) => Ok(Self::from_json_values(values, read_embeddings)),
            _ => Err(Error::Catalog(
                "catalog file must contain a JSON array of items".to_string(),
            )),
        }
    }

    /// More embeddings rejected for their length than accepted: the first
    /// vector in the file likely has the wrong dimension.
    fn dimension_outvoted(&self) -> bool {
        self.wrong_dim > self.searchable.len()
    }

    fn check_dimension(&self) {
        if self.dimension_outvoted() {
            error!(
                dim = ?self.dim,
                searchable = self.searchable.len(),
                wrong_dimension = self.wrong_dim,
                "Most embeddings disagree with the dimension set by the first one in the file"
            );
        }
    }

    fn push(&mut self, mut record: CatalogRecord) {
        if let Some(actual) = record.embedding.dim() {
            let expected = *self.dim.get_or_insert(actual);
            if actual != expected {
                let defect = EmbeddingDefect::WrongDimension { expected, actual };
                warn!(item = %record.item.id, %defect, "Dropping embedding with inconsistent dimension");
                record.embedding = Embedding::Missing;
                self.rejected += 1;
                self.wrong_dim += 1;
            }
        }

        if let Some(vector) = record.embedding.as_vector() {
            let norm = vector.norm();
            if norm == 0.0 {
                warn!(item = %record.item.id, "Embedding has zero norm and will never match");
            }
            self.searchable.push(Searchable {
                position: self.records.len(),
                norm,
            });
        }

        self.records.push(record);
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Dimension of the searchable embeddings, `None` when nothing is searchable.
    #[inline]
    pub fn dim(&self) -> Option<usize> {
        self.dim.filter(|_| !self.searchable.is_empty())
    }

    #[inline]
    pub fn searchable_count(&self) -> usize {
        self.searchable.len()
    }

    pub fn stats(&self) -> CatalogStats {
        CatalogStats {
            total: self.records.len(),
            searchable: self.searchable.len(),
            zero_norm: self.searchable.iter().filter(|s| s.norm == 0.0).count(),
            rejected: self.rejected,
            skipped: self.skipped,
            dim: self.dim(),
        }
    }

    /// All items in catalog order, embeddings stripped.
    pub fn all_items(&self) -> Vec<CatalogItem> {
        self.records.iter().map(|r| r.item.clone()).collect()
    }

    pub fn records(&self) -> &[CatalogRecord] {
        &self.records
    }

    pub fn get(&self, position: usize) -> Option<&CatalogItem> {
        self.records.get(position).map(|r| &r.item)
    }

    /// Items with a present, flat embedding of the catalog dimension, in catalog order.
    pub fn valid_embedding_items(&self) -> impl Iterator<Item = ValidEntry<'_>> + '_ {
        self.searchable.iter().filter_map(move |s| {
            let record = &self.records[s.position];
            record.embedding.as_vector().map(|vector| ValidEntry {
                position: s.position,
                item: &record.item,
                vector,
                norm: s.norm,
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(id: &str, embedding: Option<Vec<f32>>) -> CatalogRecord {
        CatalogRecord::new(
            CatalogItem::new(id, id.to_uppercase(), format!("https://img.example/{}.jpg", id)),
            embedding.map(Vector::new).into(),
        )
    }

    #[test]
    fn test_empty_catalog() {
        let catalog = Catalog::empty();
        assert!(catalog.is_empty());
        assert_eq!(catalog.dim(), None);
        assert_eq!(catalog.valid_embedding_items().count(), 0);
        assert!(catalog.all_items().is_empty());
    }

    #[test]
    fn test_dimension_fixed_by_first_vector() {
        let catalog = Catalog::from_records(vec![
            record("a", None),
            record("b", Some(vec![1.0, 0.0])),
            record("c", Some(vec![1.0, 0.0, 0.0])),
            record("d", Some(vec![0.0, 1.0])),
        ]);

        assert_eq!(catalog.len(), 4);
        assert_eq!(catalog.dim(), Some(2));

        let positions: Vec<usize> = catalog.valid_embedding_items().map(|e| e.position).collect();
        assert_eq!(positions, vec![1, 3]);

        let stats = catalog.stats();
        assert_eq!(stats.searchable, 2);
        assert_eq!(stats.rejected, 1);
    }

    #[test]
    fn test_bad_first_vector_is_flagged() {
        let healthy = Catalog::from_records(vec![
            record("a", Some(vec![1.0, 0.0])),
            record("b", Some(vec![1.0, 0.0, 0.0])),
        ]);
        assert!(!healthy.dimension_outvoted());

        let outvoted = Catalog::from_json_slice(
            br#"[
                {"id": "a", "name": "A", "image_url": "u", "embedding": [1.0]},
                {"id": "b", "name": "B", "image_url": "u", "embedding": [1.0, 0.0]},
                {"id": "c", "name": "C", "image_url": "u", "embedding": [0.0, 1.0]}
            ]"#,
            true,
        )
        .unwrap();
        assert_eq!(outvoted.dim(), Some(1));
        assert_eq!(outvoted.stats().rejected, 2);
        assert!(outvoted.dimension_outvoted());
    }

    #[test]
    fn test_listing_keeps_unsearchable_items_in_order() {
        let catalog = Catalog::from_records(vec![
            record("x", Some(vec![1.0])),
            record("y", None),
            record("z", Some(vec![2.0])),
        ]);
        let names: Vec<String> = catalog.all_items().into_iter().map(|i| i.name).collect();
        assert_eq!(names, vec!["X", "Y", "Z"]);
    }

    #[test]
    fn test_zero_norm_counted() {
        let catalog = Catalog::from_records(vec![
            record("a", Some(vec![0.0, 0.0])),
            record("b", Some(vec![1.0, 0.0])),
        ]);
        let stats = catalog.stats();
        assert_eq!(stats.searchable, 2);
        assert_eq!(stats.zero_norm, 1);
    }

    #[test]
    fn test_from_json_skips_and_rejects() {
        let values = vec![
            json!({"id": 1, "name": "One", "image_url": "u1", "embedding": [[0.6], [0.8]]}),
            json!({"id": 2, "name": "Two"}),
            json!({"id": 3, "name": "Three", "image_url": "u3", "embedding": "bogus"}),
            json!({"id": 4, "name": "Four", "image_url": "u4", "embedding": null}),
        ];
        let catalog = Catalog::from_json_values(values, true);
        let stats = catalog.stats();
        assert_eq!(stats.total, 3);
        assert_eq!(stats.skipped, 1);
        assert_eq!(stats.rejected, 1);
        assert_eq!(stats.searchable, 1);
        assert_eq!(stats.dim, Some(2));
    }

    #[test]
    fn test_from_json_slice_requires_array() {
        assert!(Catalog::from_json_slice(br#"{"items": []}"#, true).is_err());
        assert!(Catalog::from_json_slice(b"not json", true).is_err());
        let catalog = Catalog::from_json_slice(b"[]", true).unwrap();
        assert!(catalog.is_empty());
    }

    #[test]
    fn test_raw_mode_has_nothing_searchable() {
        let values = vec![json!({"id": 1, "name": "One", "image_url": "u1", "embedding": [1.0]})];
        let catalog = Catalog::from_json_values(values, false);
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.searchable_count(), 0);
        assert_eq!(catalog.dim(), None);
    }
}
