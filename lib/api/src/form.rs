use actix_multipart::Multipart;
use actix_web::http::header::CONTENT_TYPE;
use actix_web::HttpRequest;
use bytes::{Bytes, BytesMut};
use futures_util::StreamExt;
use vismatch_embed::ImageRef;

use crate::error::ApiError;

/// The `/search` form: an uploaded image, an image URL, or both.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct SearchForm {
    pub file: Option<Bytes>,
    pub image_url: Option<String>,
}

impl SearchForm {
    /// Read a multipart body. Unknown fields are drained and ignored; empty
    /// fields count as absent. Any single field larger than `limit` is rejected.
    pub async fn read(mut payload: Multipart, limit: usize) -> Result<Self, ApiError> {
        let mut form = SearchForm::default();

        while let Some(field) = payload.next().await {
            let mut field = field.map_err(|e| ApiError::InvalidForm(e.to_string()))?;
            let name = field.name().unwrap_or_default().to_string();

            let mut buf = BytesMut::new();
            while let Some(chunk) = field.next().await {
                let chunk = chunk.map_err(|e| ApiError::InvalidForm(e.to_string()))?;
                if buf.len() + chunk.len() > limit {
                    return Err(ApiError::PayloadTooLarge(limit));
                }
                buf.extend_from_slice(&chunk);
            }

            match name.as_str() {
                "file" if !buf.is_empty() => form.file = Some(buf.freeze()),
                "image_url" => {
                    let url = std::str::from_utf8(&buf)
                        .map_err(|_| ApiError::InvalidForm("image_url is not valid UTF-8".to_string()))?
                        .trim();
                    if !url.is_empty() {
                        form.image_url = Some(url.to_string());
                    }
                }
                _ => {}
            }
        }

        Ok(form)
    }

    /// The image to embed. An uploaded file wins over a URL.
    pub fn into_image_ref(self) -> Option<ImageRef> {
        match (self.file, self.image_url) {
            (Some(bytes), _) => Some(ImageRef::Bytes(bytes)),
            (None, Some(url)) => Some(ImageRef::Url(url)),
            (None, None) => None,
        }
    }
}

/// Whether the request body is `multipart/form-data`.
pub fn is_multipart(req: &HttpRequest) -> bool {
    req.headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim_start().to_ascii_lowercase().starts_with("multipart/form-data"))
        .unwrap_or(false)
}
