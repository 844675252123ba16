//! # vismatch Embed
//!
//! The boundary between vismatch and the vision model that turns images into
//! embeddings. Nothing in here knows about catalogs or ranking.
//!
//! - [`EmbeddingProvider`] - the narrow capability the rest of the system consumes
//! - [`ImageRef`] - an uploaded image or a remote URL
//! - [`RemoteEmbeddingProvider`] - posts images to a CLIP-style model server
//! - [`ImageFetcher`] - downloads remote images with a browser-like identity

pub mod error;
pub mod fetch;
pub mod remote;

use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;
use vismatch_core::Vector;

pub use error::ProviderError;
pub use fetch::{ImageFetcher, BROWSER_USER_AGENT, DEFAULT_MAX_IMAGE_BYTES};
pub use remote::{parse_model_response, RemoteEmbeddingProvider, RemoteProviderConfig};

/// An image to embed.
#[derive(Debug, Clone, PartialEq)]
pub enum ImageRef {
    /// Raw encoded image bytes, e.g. an upload.
    Bytes(Bytes),
    /// A remote image to download first.
    Url(String),
}

impl ImageRef {
    /// Short description for logs; never includes image bytes.
    pub fn describe(&self) -> String {
        match self {
            ImageRef::Bytes(b) => format!("upload ({} bytes)", b.len()),
            ImageRef::Url(u) => u.clone(),
        }
    }
}

/// Maps an image to a unit-normalized embedding of a fixed dimension.
///
/// Implementations own their concurrency policy: a model that is not safe for
/// parallel use must serialize calls internally.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, image: ImageRef) -> Result<Vector, ProviderError>;

    /// Identifies the provider in logs.
    fn name(&self) -> &str;
}

#[async_trait]
impl<P: EmbeddingProvider + ?Sized> EmbeddingProvider for Arc<P> {
    async fn embed(&self, image: ImageRef) -> Result<Vector, ProviderError> {
        (**self).embed(image).await
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}
