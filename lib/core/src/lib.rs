//! # vismatch Core
//!
//! Core library for the vismatch visual product matcher.
//!
//! This crate provides the catalog data model and the ranking engine:
//!
//! - [`Vector`] - Dense embedding vector with dot product, norm and cosine similarity
//! - [`CatalogItem`] / [`Embedding`] - A product record and its optional embedding
//! - [`Catalog`] - Immutable, ordered set of records with a single embedding dimension
//! - [`SimilarityRanker`] - Exact brute-force cosine top-k over a catalog
//!
//! ## Example
//!
//! ```rust
//! use vismatch_core::{Catalog, CatalogItem, CatalogRecord, Embedding, SimilarityRanker, Vector};
//!
//! let catalog = Catalog::from_records(vec![
//!     CatalogRecord::new(CatalogItem::new("a", "Lamp", "https://img/a.jpg"), Embedding::Vector(Vector::new(vec![1.0, 0.0]))),
//!     CatalogRecord::new(CatalogItem::new("b", "Chair", "https://img/b.jpg"), Embedding::Vector(Vector::new(vec![0.0, 1.0]))),
//! ]);
//!
//! let results = SimilarityRanker::new().search(&catalog, &[1.0, 0.0], 1).unwrap();
//! assert_eq!(results[0].item.name, "Lamp");
//! ```

pub mod catalog;
pub mod error;
pub mod item;
pub mod ranker;
pub mod vector;

pub use catalog::{Catalog, CatalogStats, ValidEntry};
pub use error::{Error, Result};
pub use item::{CatalogItem, CatalogRecord, Embedding, EmbeddingDefect, ItemId, ParsedRecord, EMBEDDING_FIELD};
pub use ranker::{resolve_top_k, SearchResult, SimilarityRanker, DEFAULT_TOP_K, SIMILARITY_FIELD};
pub use vector::Vector;
