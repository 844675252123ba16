use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT};
use std::time::Duration;
use tracing::debug;

use crate::error::ProviderError;

/// Browser identification sent with image requests; some CDNs refuse bare clients.
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// Largest image accepted from a remote URL unless configured otherwise.
pub const DEFAULT_MAX_IMAGE_BYTES: usize = 20 * 1024 * 1024;

/// Downloads remote images for embedding.
#[derive(Debug, Clone)]
pub struct ImageFetcher {
    client: reqwest::Client,
    max_bytes: usize,
    timeout: Duration,
}

impl ImageFetcher {
    pub fn new(timeout: Duration) -> Result<Self, ProviderError> {
        Self::with_limit(timeout, DEFAULT_MAX_IMAGE_BYTES)
    }

    pub fn with_limit(timeout: Duration, max_bytes: usize) -> Result<Self, ProviderError> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(BROWSER_USER_AGENT));
        headers.insert(ACCEPT, HeaderValue::from_static("image/*,*/*;q=0.8"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::Inference(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            max_bytes,
            timeout,
        })
    }

    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    /// Fetch the image at `url`, rejecting error statuses, empty bodies and oversized images.
    pub async fn fetch(&self, url: &str) -> Result<Bytes, ProviderError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|source| self.fetch_error(url, source))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        if let Some(len) = response.content_length() {
            let len = usize::try_from(len).unwrap_or(usize::MAX);
            if len > self.max_bytes {
                return Err(ProviderError::TooLarge {
                    size: len,
                    limit: self.max_bytes,
                });
            }
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|source| self.fetch_error(url, source))?;

        check_image_size(&bytes, self.max_bytes)?;
        debug!(url, size = bytes.len(), "Fetched image");
        Ok(bytes)
    }
}

impl ImageFetcher {
    fn fetch_error(&self, url: &str, source: reqwest::Error) -> ProviderError {
        if source.is_timeout() {
            return ProviderError::Timeout(self.timeout);
        }
        ProviderError::Fetch {
            url: url.to_string(),
            source,
        }
    }
}

pub(crate) fn check_image_size(bytes: &[u8], limit: usize) -> Result<(), ProviderError> {
    if bytes.is_empty() {
        return Err(ProviderError::EmptyImage);
    }
    if bytes.len() > limit {
        return Err(ProviderError::TooLarge {
            size: bytes.len(),
            limit,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    #[test]
    fn test_check_image_size() {
        assert!(matches!(check_image_size(&[], 10), Err(ProviderError::EmptyImage)));
        assert!(matches!(
            check_image_size(&[0u8; 11], 10),
            Err(ProviderError::TooLarge { size: 11, limit: 10 })
        ));
        assert!(check_image_size(&[0u8; 10], 10).is_ok());
    }

    #[test]
    fn test_user_agent_is_valid_header() {
        assert!(HeaderValue::from_str(BROWSER_USER_AGENT).is_ok());
    }

    /// Serve one canned response and hand back the request head, lowercased.
    async fn serve_once(response: &'static [u8]) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut head = Vec::new();
            let mut buf = [0u8; 1024];
            while !head.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                head.extend_from_slice(&buf[..n]);
            }
            socket.write_all(response).await.unwrap();
            socket.shutdown().await.ok();
            String::from_utf8_lossy(&head).to_lowercase()
        });
        (format!("http://{}/images/p.jpg", addr), server)
    }

    #[tokio::test]
    async fn test_fetch_sends_browser_user_agent() {
        let (url, server) =
            serve_once(b"HTTP/1.1 200 OK\r\ncontent-length: 3\r\nconnection: close\r\n\r\nimg").await;

        let fetcher = ImageFetcher::new(Duration::from_secs(5)).unwrap();
        let bytes = fetcher.fetch(&url).await.unwrap();
        assert_eq!(&bytes[..], b"img");

        let head = server.await.unwrap();
        assert!(head.starts_with("get /images/p.jpg"));
        assert!(head.contains(&format!("user-agent: {}", BROWSER_USER_AGENT.to_lowercase())));
    }

    #[tokio::test]
    async fn test_fetch_rejects_error_status() {
        let (url, server) =
            serve_once(b"HTTP/1.1 404 Not Found\r\ncontent-length: 0\r\nconnection: close\r\n\r\n").await;

        let fetcher = ImageFetcher::new(Duration::from_secs(5)).unwrap();
        let err = fetcher.fetch(&url).await.unwrap_err();
        assert!(matches!(err, ProviderError::Status { status: 404, .. }));
        server.await.unwrap();
    }
}
