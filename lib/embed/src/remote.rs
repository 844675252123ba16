use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::CONTENT_TYPE;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, info};
use vismatch_core::{Embedding, Vector};

use crate::error::ProviderError;
use crate::fetch::{check_image_size, ImageFetcher, DEFAULT_MAX_IMAGE_BYTES};
use crate::{EmbeddingProvider, ImageRef};

/// Settings for [`RemoteEmbeddingProvider`].
#[derive(Debug, Clone)]
pub struct RemoteProviderConfig {
    /// Model server endpoint receiving raw image bytes.
    pub endpoint: String,
    /// Upper bound for one `embed` call, image download included.
    pub timeout: Duration,
    /// Number of inference calls allowed in flight; 1 serializes the model.
    pub concurrency: usize,
    pub max_image_bytes: usize,
}

impl RemoteProviderConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            timeout: Duration::from_secs(30),
            concurrency: 1,
            max_image_bytes: DEFAULT_MAX_IMAGE_BYTES,
        }
    }
}

/// Embeds images by posting them to a vision-embedding model server.
///
/// The server receives the image as `application/octet-stream` and answers
/// with either `{"embedding": [...]}` or a bare array; nested arrays such as a
/// `[1, D]` batch of one are flattened. The returned vector is L2-normalized.
///
/// Inference is gated by a semaphore sized by `concurrency`, so a model that
/// cannot serve parallel requests is never called concurrently. Image downloads
/// happen before a permit is taken.
pub struct RemoteEmbeddingProvider {
    endpoint: String,
    client: reqwest::Client,
    fetcher: ImageFetcher,
    permits: Arc<Semaphore>,
    timeout: Duration,
    max_image_bytes: usize,
}

impl RemoteEmbeddingProvider {
    pub fn new(config: RemoteProviderConfig) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ProviderError::Inference(format!("failed to build HTTP client: {}", e)))?;
        let fetcher = ImageFetcher::with_limit(config.timeout, config.max_image_bytes)?;
        let concurrency = config.concurrency.max(1);

        info!(
            endpoint = %config.endpoint,
            concurrency,
            timeout = ?config.timeout,
            "Remote embedding provider configured"
        );

        Ok(Self {
            endpoint: config.endpoint,
            client,
            fetcher,
            permits: Arc::new(Semaphore::new(concurrency)),
            timeout: config.timeout,
            max_image_bytes: config.max_image_bytes,
        })
    }

    async fn resolve(&self, image: ImageRef) -> Result<Bytes, ProviderError> {
        match image {
            ImageRef::Bytes(bytes) => {
                check_image_size(&bytes, self.max_image_bytes)?;
                Ok(bytes)
            }
            ImageRef::Url(url) => self.fetcher.fetch(&url).await,
        }
    }

    async fn infer(&self, image: Bytes) -> Result<Vector, ProviderError> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| ProviderError::Inference("provider is shutting down".to_string()))?;

        let response = self
            .client
            .post(&self.endpoint)
            .header(CONTENT_TYPE, "application/octet-stream")
            .body(image)
            .send()
            .await
            .map_err(|e| self.request_error(e, ProviderError::Inference))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::Inference(format!(
                "model server returned HTTP {}",
                status
            )));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| self.request_error(e, ProviderError::Decode))?;

        parse_model_response(&body)
    }

    fn request_error(&self, e: reqwest::Error, other: fn(String) -> ProviderError) -> ProviderError {
        if e.is_timeout() {
            ProviderError::Timeout(self.timeout)
        } else {
            other(e.to_string())
        }
    }
}

#[async_trait]
impl EmbeddingProvider for RemoteEmbeddingProvider {
    async fn embed(&self, image: ImageRef) -> Result<Vector, ProviderError> {
        let source = image.describe();
        let work = async {
            let bytes = self.resolve(image).await?;
            self.infer(bytes).await
        };

        let vector = tokio::time::timeout(self.timeout, work)
            .await
            .map_err(|_| ProviderError::Timeout(self.timeout))??;

        debug!(source = %source, dim = vector.dim(), "Computed image embedding");
        Ok(vector)
    }

    fn name(&self) -> &str {
        &self.endpoint
    }
}

/// Extract, flatten and normalize the vector from a model server response.
pub fn parse_model_response(body: &Value) -> Result<Vector, ProviderError> {
    let raw = match body {
        Value::Object(map) => map
            .get("embedding")
            .or_else(|| map.get("image_embeds"))
            .ok_or_else(|| ProviderError::Decode("response has no embedding field".to_string()))?,
        other => other,
    };

    let embedding =
        Embedding::from_json(Some(raw)).map_err(|defect| ProviderError::Decode(defect.to_string()))?;
    let mut vector = match embedding {
        Embedding::Vector(v) => v,
        Embedding::Missing => {
            return Err(ProviderError::Decode("model returned a null embedding".to_string()))
        }
    };

    if !vector.normalize() {
        return Err(ProviderError::Decode("model returned a zero vector".to_string()));
    }
    Ok(vector)
}
