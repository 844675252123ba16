//! # vismatch API
//!
//! HTTP surface of the matcher, built on actix-web.
//!
//! | Route              | Method | Purpose                                   |
//! |--------------------|--------|-------------------------------------------|
//! | `/health`          | GET    | Liveness                                  |
//! | `/products`        | GET    | Full catalog, embeddings stripped         |
//! | `/search`          | POST   | Multipart `file` or `image_url`, top-k    |
//! | `/catalog`         | GET    | Source, load time and counts              |
//! | `/catalog/reload`  | POST   | Re-read catalog files and swap atomically |

pub mod error;
pub mod form;
pub mod rest;

pub use error::ApiError;
pub use form::SearchForm;
pub use rest::{configure, AppState, RestApi, DEFAULT_MAX_UPLOAD_BYTES};
