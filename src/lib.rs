//! # vismatch
//!
//! Visual product matcher: given an image, find the catalog products that look
//! most like it.
//!
//! Product images are turned into embeddings once, offline, and stored next to
//! the catalog. At query time the uploaded image (or image URL) is embedded
//! with the same model and every catalog embedding is scored by cosine
//! similarity. Ranking is exact and deterministic: ties keep catalog order.
//!
//! ## Quick Start
//!
//! ### As a Server
//!
//! ```bash
//! vismatch precompute --provider-endpoint http://127.0.0.1:9000/embed
//! vismatch serve --port 8000
//! ```
//!
//! ### As a Library
//!
//! ```rust
//! use vismatch::prelude::*;
//!
//! let catalog = Catalog::from_json_slice(br#"[
//!     {"id": 1, "name": "Red Shirt", "image_url": "https://img/1.jpg", "embedding": [1.0, 0.0]},
//!     {"id": 2, "name": "Blue Shirt", "image_url": "https://img/2.jpg", "embedding": [0.0, 1.0]}
//! ]"#, true).unwrap();
//!
//! let results = SimilarityRanker::new().search(&catalog, &[0.9, 0.1], 1).unwrap();
//! assert_eq!(results[0].item.name, "Red Shirt");
//! ```
//!
//! ## Crate Structure
//!
//! - [`vismatch-core`](vismatch_core) - Catalog data model and cosine ranking
//! - [`vismatch-embed`](vismatch_embed) - Embedding provider boundary and image fetching
//! - [`vismatch-storage`](vismatch_storage) - Catalog files, atomic reload, precompute
//! - [`vismatch-api`](vismatch_api) - actix-web HTTP surface

pub use vismatch_core::{
    resolve_top_k, Catalog, CatalogItem, CatalogRecord, CatalogStats, Embedding, Error, ItemId,
    Result, SearchResult, SimilarityRanker, Vector, DEFAULT_TOP_K,
};

pub use vismatch_embed::{EmbeddingProvider, ImageRef, ProviderError, RemoteEmbeddingProvider};

pub use vismatch_storage::{CatalogBuilder, CatalogPaths, CatalogSource, CatalogStore};

pub use vismatch_api::{AppState, RestApi};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        Catalog, CatalogBuilder, CatalogItem, CatalogPaths, CatalogRecord, CatalogStore,
        Embedding, EmbeddingProvider, Error, ImageRef, Result, SearchResult, SimilarityRanker,
        Vector,
    };
}
