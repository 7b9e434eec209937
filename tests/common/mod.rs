#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{Method, Request, StatusCode},
    Router,
};
use bytes::Bytes;
use hotel_api::{
    config::AppConfig,
    db,
    errors::ServiceError,
    storage::{FileStorage, LocalFileStorage},
    AppState,
};
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

pub const APP_URL: &str = "http://localhost:8080";
pub const STORAGE_URL: &str = "http://localhost:8080/storage";

/// Smallest byte sequences the content sniffer recognizes per format.
pub const PNG: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR\0\0\0\x01\0\0\0\x01\x08\x06\0\0\0";
pub const JPEG: &[u8] = b"\xFF\xD8\xFF\xE0\0\x10JFIF\0\x01\x01\0\0\x01\0\x01\0\0";
pub const WEBP: &[u8] = b"RIFF\x24\0\0\0WEBPVP8 \x18\0\0\0";
pub const PDF: &[u8] = b"%PDF-1.4\n%\xE2\xE3\xCF\xD3\n1 0 obj\n";

const BOUNDARY: &str = "hotel-api-test-boundary";

/// Options for [`TestApp::with_options`].
#[derive(Default)]
pub struct TestOptions {
    /// Replaces the local storage under the temporary root
    pub storage: Option<Arc<dyn FileStorage>>,
    pub max_upload_kb: Option<u64>,
}

/// Helper harness backed by a temporary SQLite file and a temporary storage root.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    dir: TempDir,
}

impl TestApp {
    /// Construct a new test application with fresh database state.
    pub async fn new() -> Self {
        Self::with_options(TestOptions::default()).await
    }

    pub async fn with_options(options: TestOptions) -> Self {
        let dir = TempDir::new().expect("create temp dir");
        let storage_root = dir.path().join("public");
        std::fs::create_dir_all(&storage_root).expect("create storage root");

        let mut cfg = AppConfig::new(
            format!("sqlite://{}?mode=rwc", dir.path().join("hotels.db").display()),
            "127.0.0.1".to_string(),
            18_080,
            "test".to_string(),
            APP_URL.to_string(),
            storage_root.display().to_string(),
        );
        cfg.auto_migrate = true;
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;
        if let Some(kb) = options.max_upload_kb {
            cfg.max_upload_kb = kb;
        }

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let storage = options.storage.unwrap_or_else(|| {
            Arc::new(LocalFileStorage::new(&storage_root, cfg.public_storage_url()))
        });

        let state = AppState::new(Arc::new(pool), cfg, storage);
        let router = hotel_api::build_router(state.clone());

        Self { router, state, dir }
    }

    pub fn storage_root(&self) -> PathBuf {
        self.dir.path().join("public")
    }

    /// Whether a stored path (as returned in `filepath`) exists on disk.
    pub fn stored_file_exists(&self, filepath: &str) -> bool {
        self.storage_root().join(filepath).is_file()
    }

    /// Send a request against the router with an optional JSON body.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> axum::response::Response {
        let mut builder = Request::builder().method(method).uri(uri);

        let body = if let Some(json) = body {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).expect("failed to serialize json request body"))
        } else {
            Body::empty()
        };

        self.send(builder.body(body).expect("failed to build request"))
            .await
    }

    /// Send a request with a raw body and content type.
    pub async fn request_raw(
        &self,
        method: Method,
        uri: &str,
        content_type: &str,
        body: impl Into<Body>,
    ) -> axum::response::Response {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", content_type)
            .body(body.into())
            .expect("failed to build request");
        self.send(request).await
    }

    /// POST a multipart form of `(field, filename, contents)` parts.
    pub async fn upload(&self, uri: &str, files: &[(&str, &str, &[u8])]) -> axum::response::Response {
        let (content_type, body) = multipart_body(files);
        self.request_raw(Method::POST, uri, &content_type, body).await
    }

    pub async fn send(&self, request: Request<Body>) -> axum::response::Response {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    /// Creates a hotel from [`hotel_payload`] merged with `overrides`; returns its `data`.
    pub async fn create_hotel(&self, overrides: Value) -> Value {
        let mut payload = hotel_payload();
        if let (Some(base), Some(extra)) = (payload.as_object_mut(), overrides.as_object()) {
            for (key, value) in extra {
                base.insert(key.clone(), value.clone());
            }
        }

        let response = self.request(Method::POST, "/api/hotels", Some(payload)).await;
        let status = response.status();
        let body = response_json(response).await;
        assert_eq!(status, StatusCode::CREATED, "create hotel failed: {body}");
        body["data"].clone()
    }

    /// Uploads one PNG picture and returns its `data`.
    pub async fn upload_png(&self, hotel_id: i64, filename: &str) -> Value {
        let response = self
            .upload(
                &format!("/api/hotels/{hotel_id}/pictures"),
                &[("picture", filename, PNG)],
            )
            .await;
        let status = response.status();
        let body = response_json(response).await;
        assert_eq!(status, StatusCode::CREATED, "upload failed: {body}");
        body["data"].clone()
    }
}

/// A complete, valid hotel creation payload.
pub fn hotel_payload() -> Value {
    json!({
        "name": "Hotel des Arts",
        "address1": "5 Rue Tholoze",
        "address2": "Batiment B",
        "zipcode": "75018",
        "city": "Paris",
        "country": "France",
        "lat": 48.8848,
        "lng": 2.3366,
        "description": "Quiet rooms at the foot of Montmartre.",
        "max_capacity": 40,
        "price_per_night": "129.50"
    })
}

pub fn multipart_body(files: &[(&str, &str, &[u8])]) -> (String, Vec<u8>) {
    let mut body = Vec::new();
    for (field, filename, contents) in files {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
        body.extend_from_slice(contents);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

    (format!("multipart/form-data; boundary={BOUNDARY}"), body)
}

pub async fn response_json(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read response body");
    serde_json::from_slice(&bytes).unwrap_or_else(|_| {
        panic!(
            "response was not JSON: {}",
            String::from_utf8_lossy(&bytes)
        )
    })
}

/// Local storage that refuses to write any path containing `marker`.
pub struct FailingStorage {
    inner: LocalFileStorage,
    marker: String,
}

impl FailingStorage {
    pub fn new(root: impl AsRef<Path>, marker: &str) -> Self {
        Self {
            inner: LocalFileStorage::new(root.as_ref(), STORAGE_URL),
            marker: marker.to_string(),
        }
    }
}

#[async_trait]
impl FileStorage for FailingStorage {
    async fn put(&self, path: &str, contents: Bytes) -> Result<(), ServiceError> {
        if path.contains(&self.marker) {
            return Err(ServiceError::StorageError(format!("disk full writing {path}")));
        }
        self.inner.put(path, contents).await
    }

    async fn delete(&self, path: &str) -> Result<bool, ServiceError> {
        self.inner.delete(path).await
    }

    fn url(&self, path: &str) -> String {
        self.inner.url(path)
    }
}
