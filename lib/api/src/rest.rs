use actix_cors::Cors;
use actix_multipart::Multipart;
use actix_web::middleware::Logger;
use actix_web::{web, App, HttpRequest, HttpResponse, HttpServer};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info};
use vismatch_core::{resolve_top_k, SimilarityRanker};
use vismatch_embed::EmbeddingProvider;
use vismatch_storage::CatalogStore;

use crate::error::ApiError;
use crate::form::{is_multipart, SearchForm};

/// Default cap on an uploaded image.
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Everything a request handler needs, constructed once in `main` and shared.
pub struct AppState {
    pub store: Arc<CatalogStore>,
    pub provider: Arc<dyn EmbeddingProvider>,
    pub ranker: SimilarityRanker,
    pub max_upload_bytes: usize,
}

impl AppState {
    pub fn new(store: Arc<CatalogStore>, provider: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            store,
            provider,
            ranker: SimilarityRanker::new(),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }

    #[must_use]
    pub fn with_max_upload_bytes(mut self, limit: usize) -> Self {
        self.max_upload_bytes = limit;
        self
    }
}

#[derive(Debug, Deserialize)]
struct SearchParams {
    top_k: Option<i64>,
}

pub struct RestApi;

impl RestApi {
    pub async fn start(state: Arc<AppState>, host: &str, port: u16) -> std::io::Result<()> {
        let data = web::Data::from(state);

        HttpServer::new(move || {
            let cors = Cors::default()
                .allow_any_origin()
                .allow_any_method()
                .allow_any_header()
                .max_age(3600);

            App::new()
                .wrap(cors)
                .wrap(Logger::default())
                .app_data(data.clone())
                .configure(configure)
        })
        .bind((host, port))?
        .run()
        .await
    }
}

/// Register all routes; also used to build test apps.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health_check))
        .route("/products", web::get().to(list_products))
        .route("/search", web::post().to(search_products))
        .route("/catalog", web::get().to(catalog_info))
        .route("/catalog/reload", web::post().to(reload_catalog));
}

async fn health_check() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({ "status": "healthy" }))
}

async fn list_products(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(state.store.all_items())
}

async fn search_products(
    state: web::Data<AppState>,
    params: web::Query<SearchParams>,
    req: HttpRequest,
    payload: Multipart,
) -> Result<HttpResponse, ApiError> {
    let form = if is_multipart(&req) {
        SearchForm::read(payload, state.max_upload_bytes).await?
    } else {
        SearchForm::default()
    };
    let image = form.into_image_ref().ok_or(ApiError::MissingImage)?;

    // Pin the catalog this request ranks against before any await on the provider.
    let snapshot = state.store.snapshot();
    let top_k = resolve_top_k(params.top_k);

    debug!(image = %image.describe(), top_k, "Search request");
    let query = state.provider.embed(image).await?;
    let results = state.ranker.search(&snapshot.catalog, query.as_slice(), top_k)?;

    Ok(HttpResponse::Ok().json(serde_json::json!({ "results": results })))
}

async fn catalog_info(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(state.store.report())
}

async fn reload_catalog(state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let store = state.store.clone();
    let report = web::block(move || store.reload())
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))??;
    info!(items = report.stats.total, searchable = report.stats.searchable, "Catalog reloaded via API");
    Ok(HttpResponse::Ok().json(report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::http::header::CONTENT_TYPE;
    use actix_web::http::StatusCode;
    use actix_web::test;
    use async_trait::async_trait;
    use vismatch_core::{Catalog, CatalogItem, CatalogRecord, Embedding, Vector};
    use vismatch_embed::{ImageRef, ProviderError};
    use vismatch_storage::CatalogPaths;

    struct FakeProvider;

    #[async_trait]
    impl EmbeddingProvider for FakeProvider {
        async fn embed(&self, image: ImageRef) -> Result<Vector, ProviderError> {
            match image {
                ImageRef::Url(url) if url.contains("broken") => Err(ProviderError::Status { url, status: 404 }),
                ImageRef::Url(url) if url.contains("model-down") => {
                    Err(ProviderError::Inference("connection refused".into()))
                }
                ImageRef::Url(url) if url.contains("wide") => Ok(Vector::new(vec![1.0, 0.0, 0.0])),
                ImageRef::Url(_) => Ok(Vector::new(vec![1.0, 0.0])),
                ImageRef::Bytes(_) => Ok(Vector::new(vec![0.0, 1.0])),
            }
        }

        fn name(&self) -> &str {
            "fake"
        }
    }

    fn sample_state() -> AppState {
        let record = |id: &str, v: Option<Vec<f32>>| {
            CatalogRecord::new(
                CatalogItem::new(id, format!("Item {}", id), format!("https://img/{}.jpg", id))
                    .with_attribute("category", serde_json::json!("demo")),
                v.map(Vector::new).map_or(Embedding::Missing, Embedding::Vector),
            )
        };
        let catalog = Catalog::from_records(vec![
            record("A", Some(vec![1.0, 0.0])),
            record("B", Some(vec![0.0, 1.0])),
            record("C", Some(vec![0.7071, 0.7071])),
            record("D", None),
        ]);
        let store = CatalogStore::from_catalog(catalog, CatalogPaths::default());
        AppState::new(Arc::new(store), Arc::new(FakeProvider))
    }

    fn multipart_body(fields: &[(&str, &[u8])]) -> (String, Vec<u8>) {
        let boundary = "vismatchboundary";
        let mut body = Vec::new();
        for (name, value) in fields {
            let disposition = if *name == "file" {
                format!("Content-Disposition: form-data; name=\"{}\"; filename=\"q.jpg\"\r\nContent-Type: image/jpeg\r\n\r\n", name)
            } else {
                format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name)
            };
            body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
            body.extend_from_slice(disposition.as_bytes());
            body.extend_from_slice(value);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{}--\r\n", boundary).as_bytes());
        (format!("multipart/form-data; boundary={}", boundary), body)
    }

    macro_rules! app {
        ($state:expr) => {
            test::init_service(App::new().app_data(web::Data::new($state)).configure(configure)).await
        };
    }

    #[actix_web::test]
    async fn test_health() {
        let app = app!(sample_state());
        let resp = test::call_service(&app, test::TestRequest::get().uri("/health").to_request()).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["status"], "healthy");
    }

    #[actix_web::test]
    async fn test_products_strip_embeddings() {
        let app = app!(sample_state());
        let resp = test::call_service(&app, test::TestRequest::get().uri("/products").to_request()).await;
        let body: serde_json::Value = test::read_body_json(resp).await;
        let items = body.as_array().unwrap();
        assert_eq!(items.len(), 4);
        assert_eq!(items[0]["id"], "A");
        assert_eq!(items[0]["category"], "demo");
        assert!(items.iter().all(|i| i.get("embedding").is_none()));
    }

    #[actix_web::test]
    async fn test_search_by_url() {
        let app = app!(sample_state());
        let (content_type, body) = multipart_body(&[("image_url", b"https://shop/red.jpg")]);
        let req = test::TestRequest::post()
            .uri("/search?top_k=2")
            .insert_header((CONTENT_TYPE, content_type))
            .set_payload(body)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let body: serde_json::Value = test::read_body_json(resp).await;
        let results = body["results"].as_array().unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0]["id"], "A");
        assert_eq!(results[1]["id"], "C");
        assert!(results[0]["similarity"].as_f64().unwrap() > 0.999);
        assert!(results[0].get("embedding").is_none());
    }

    #[actix_web::test]
    async fn test_search_file_wins_over_url() {
        let app = app!(sample_state());
        let (content_type, body) =
            multipart_body(&[("image_url", b"https://shop/red.jpg"), ("file", b"\xff\xd8\xff\xe0jpeg")]);
        let req = test::TestRequest::post()
            .uri("/search")
            .insert_header((CONTENT_TYPE, content_type))
            .set_payload(body)
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        let results = body["results"].as_array().unwrap();
        assert_eq!(results.len(), 3);
        assert_eq!(results[0]["id"], "B");
    }

    #[actix_web::test]
    async fn test_search_without_image_is_bad_request() {
        let app = app!(sample_state());
        let resp = test::call_service(&app, test::TestRequest::post().uri("/search").to_request()).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let (content_type, body) = multipart_body(&[("image_url", b"  ")]);
        let req = test::TestRequest::post()
            .uri("/search")
            .insert_header((CONTENT_TYPE, content_type))
            .set_payload(body)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["error"], "Either file or image_url must be provided");
    }

    #[actix_web::test]
    async fn test_search_error_mapping() {
        let app = app!(sample_state());
        for (url, status) in [
            (&b"https://shop/broken.jpg"[..], StatusCode::BAD_REQUEST),
            (&b"https://shop/model-down.jpg"[..], StatusCode::BAD_GATEWAY),
            (&b"https://shop/wide.jpg"[..], StatusCode::UNPROCESSABLE_ENTITY),
        ] {
            let (content_type, body) = multipart_body(&[("image_url", url)]);
            let req = test::TestRequest::post()
                .uri("/search")
                .insert_header((CONTENT_TYPE, content_type))
                .set_payload(body)
                .to_request();
            let resp = test::call_service(&app, req).await;
            assert_eq!(resp.status(), status);
        }
    }

    #[actix_web::test]
    async fn test_upload_limit() {
        let app = app!(sample_state().with_max_upload_bytes(4));
        let (content_type, body) = multipart_body(&[("file", b"0123456789")]);
        let req = test::TestRequest::post()
            .uri("/search")
            .insert_header((CONTENT_TYPE, content_type))
            .set_payload(body)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[actix_web::test]
    async fn test_catalog_reload() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("products_with_embeddings.json"),
            r#"[{"id": 9, "name": "Nine", "image_url": "u9", "embedding": [1.0, 0.0]}]"#,
        )
        .unwrap();
        let store = CatalogStore::from_catalog(Catalog::empty(), CatalogPaths::new(vec![dir.path().to_path_buf()]));
        let app = app!(AppState::new(Arc::new(store), Arc::new(FakeProvider)));

        let resp = test::call_service(&app, test::TestRequest::post().uri("/catalog/reload").to_request()).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let report: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(report["total"], 1);
        assert_eq!(report["searchable"], 1);
        assert_eq!(report["source"]["kind"], "augmented");

        let body: serde_json::Value =
            test::call_and_read_body_json(&app, test::TestRequest::get().uri("/products").to_request()).await;
        assert_eq!(body[0]["id"], 9);
    }
}
