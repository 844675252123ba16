use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use thiserror::Error;
use tracing::{error, warn};
use vismatch_embed::ProviderError;

/// Errors surfaced by the HTTP handlers.
///
/// Client mistakes carry their message to the caller. Everything else is
/// logged in full here and answered with a generic body.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Either file or image_url must be provided")]
    MissingImage,

    #[error("Invalid form data: {0}")]
    InvalidForm(String),

    #[error("Upload exceeds the {0} byte limit")]
    PayloadTooLarge(usize),

    #[error(transparent)]
    Search(#[from] vismatch_core::Error),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    fn public_message(&self) -> String {
        match self {
            ApiError::MissingImage | ApiError::InvalidForm(_) | ApiError::PayloadTooLarge(_) => {
                self.to_string()
            }
            ApiError::Search(e) if e.is_request_error() => e.to_string(),
            ApiError::Provider(ProviderError::Timeout(_)) => {
                "Timed out computing image embedding".to_string()
            }
            ApiError::Provider(e) if e.is_image_error() => format!("Could not load image: {}", e),
            ApiError::Provider(_) => "Failed to compute image embedding".to_string(),
            ApiError::Search(_) | ApiError::Internal(_) => "Internal Server Error".to_string(),
        }
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::MissingImage | ApiError::InvalidForm(_) => StatusCode::BAD_REQUEST,
            ApiError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::Search(e) if e.is_request_error() => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Provider(ProviderError::TooLarge { .. }) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::Provider(ProviderError::Timeout(_)) => StatusCode::GATEWAY_TIMEOUT,
            ApiError::Provider(e) if e.is_image_error() => StatusCode::BAD_REQUEST,
            ApiError::Provider(_) => StatusCode::BAD_GATEWAY,
            ApiError::Search(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if status.is_server_error() {
            error!(error = ?self, "Request failed");
        } else {
            warn!(error = %self, "Rejected request");
        }
        HttpResponse::build(status).json(serde_json::json!({
            "error": self.public_message()
        }))
    }
}
