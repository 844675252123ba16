use std::time::Duration;
use thiserror::Error;

/// Failure to turn an image into an embedding.
///
/// Callers convert this into "no embedding available" (catalog building) or a
/// request failure (search); it never reaches the catalog or ranking layers.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Failed to fetch image from {url}: {source}")]
    Fetch {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Image request to {url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("Image is empty")]
    EmptyImage,

    #[error("Image is {size} bytes, limit is {limit}")]
    TooLarge { size: usize, limit: usize },

    #[error("Inference request failed: {0}")]
    Inference(String),

    #[error("Could not decode model response: {0}")]
    Decode(String),

    #[error("Embedding provider timed out after {0:?}")]
    Timeout(Duration),
}

impl ProviderError {
    /// True for failures caused by the remote image rather than the model.
    pub fn is_image_error(&self) -> bool {
        matches!(
            self,
            ProviderError::Fetch { .. }
                | ProviderError::Status { .. }
                | ProviderError::EmptyImage
                | ProviderError::TooLarge { .. }
        )
    }
}
