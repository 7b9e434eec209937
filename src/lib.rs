//! Hotel API Library
//!
//! REST backend for hotel listings and their photo galleries.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

// Core modules
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod handlers;
pub mod health;
pub mod middleware_helpers;
pub mod migrator;
pub mod openapi;
pub mod services;
pub mod storage;
pub mod tracing;

use axum::{
    extract::DefaultBodyLimit,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, patch, post},
    Json, Router,
};
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::{catch_panic::CatchPanicLayer, compression::CompressionLayer, services::ServeDir};
use utoipa::ToSchema;

use crate::{
    config::AppConfig, errors::ErrorResponse, handlers::AppServices,
    services::pictures::MAX_PICTURES_PER_BATCH, storage::FileStorage,
};

/// Multipart framing and form fields on top of the pictures themselves.
const BODY_LIMIT_OVERHEAD: usize = 1024 * 1024;

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: Arc<AppConfig>,
    pub services: AppServices,
    pub storage: Arc<dyn FileStorage>,
}

impl AppState {
    pub fn new(db: Arc<DatabaseConnection>, config: AppConfig, storage: Arc<dyn FileStorage>) -> Self {
        let services = AppServices::new(db.clone(), storage.clone(), config.max_upload_bytes());
        Self {
            db,
            config: Arc::new(config),
            services,
            storage,
        }
    }
}

// Common response wrappers
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub message: String,
    pub data: Option<T>,
    pub status_code: u16,
}

impl<T> ApiResponse<T> {
    pub fn new(status: StatusCode, message: impl Into<String>, data: Option<T>) -> Self {
        Self {
            success: status.is_success(),
            message: message.into(),
            data,
            status_code: status.as_u16(),
        }
    }

    pub fn ok(message: impl Into<String>, data: T) -> Self {
        Self::new(StatusCode::OK, message, Some(data))
    }

    pub fn created(message: impl Into<String>, data: T) -> Self {
        Self::new(StatusCode::CREATED, message, Some(data))
    }

    /// Envelope without a payload (`data: null`).
    pub fn message(status: StatusCode, message: impl Into<String>) -> Self {
        Self::new(status, message, None)
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::OK);
        (status, Json(self)).into_response()
    }
}

/// Envelope of operations that return no payload.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "success": true,
    "message": "Hotel deleted successfully",
    "data": null,
    "status_code": 200
}))]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
    #[schema(value_type = Option<Object>)]
    pub data: Option<serde_json::Value>,
    pub status_code: u16,
}

fn route_error(status: StatusCode, message: &str) -> Response {
    let body = ErrorResponse {
        success: false,
        message: message.to_string(),
        status_code: status.as_u16(),
        errors: None,
        request_id: crate::tracing::current_request_id().map(|rid| rid.as_str().to_string()),
        debug: None,
    };
    (status, Json(body)).into_response()
}

async fn route_not_found() -> Response {
    route_error(StatusCode::NOT_FOUND, "Route not found")
}

async fn method_not_allowed() -> Response {
    route_error(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed")
}

/// Renders a panicking handler as the generic 500 envelope.
fn handler_panicked(panic: Box<dyn std::any::Any + Send + 'static>) -> Response {
    let detail = panic
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    ::tracing::error!(panic = detail, "Request handler panicked");
    route_error(
        StatusCode::INTERNAL_SERVER_ERROR,
        "An unexpected error occurred.",
    )
}

/// Hotel and picture routes, mounted under `/api`.
pub fn api_routes() -> Router<AppState> {
    use handlers::{hotels, pictures};

    // Every route names the hotel segment alike so the router can share the prefix.
    Router::new()
        .route(
            "/hotels",
            get(hotels::list_hotels).post(hotels::create_hotel),
        )
        .route(
            "/hotels/:hotel",
            get(hotels::get_hotel)
                .put(hotels::update_hotel)
                .patch(hotels::update_hotel)
                .delete(hotels::delete_hotel),
        )
        .route("/hotels/:hotel/pictures", post(pictures::upload_picture))
        .route(
            "/hotels/:hotel/pictures/multiple",
            post(pictures::upload_pictures),
        )
        .route(
            "/hotels/:hotel/pictures/:picture",
            patch(pictures::reposition_picture).delete(pictures::delete_picture),
        )
}

/// Largest request body accepted: a full batch of pictures at the size limit.
pub fn request_body_limit(config: &AppConfig) -> usize {
    let per_file = usize::try_from(config.max_upload_bytes()).unwrap_or(usize::MAX);
    per_file
        .saturating_mul(MAX_PICTURES_PER_BATCH)
        .saturating_add(BODY_LIMIT_OVERHEAD)
}

/// Assembles the full application: API, health, OpenAPI document and stored files.
///
/// CORS is left to the caller since it depends on deployment configuration.
pub fn build_router(state: AppState) -> Router {
    let health_state = Arc::new(health::HealthState::new(
        state.db.clone(),
        state.config.storage_root.clone(),
    ));
    let debug_errors = state.config.debug;
    let body_limit = request_body_limit(&state.config);
    let storage_root = state.config.storage_root.clone();

    Router::new()
        .nest("/api", api_routes())
        .route("/api-docs/openapi.json", get(openapi::openapi_json))
        .with_state(state)
        .nest("/health", health::health_routes(health_state))
        .nest_service("/storage", ServeDir::new(storage_root))
        .fallback(route_not_found)
        .method_not_allowed_fallback(method_not_allowed)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(axum::middleware::from_fn_with_state(
            debug_errors,
            middleware_helpers::debug_errors_middleware,
        ))
        .layer(CatchPanicLayer::custom(handler_panicked))
        // HTTP tracing layer for consistent request/response telemetry
        .layer(crate::tracing::configure_http_tracing())
        .layer(CompressionLayer::new())
        // Ensure every request carries a request id for traceability
        .layer(axum::middleware::from_fn(
            middleware_helpers::request_id_middleware,
        ))
}

pub mod prelude {
    pub use crate::config::AppConfig;
    pub use crate::errors::*;
    pub use crate::services::*;
    pub use crate::storage::{FileStorage, LocalFileStorage};
    pub use crate::{build_router, ApiResponse, AppState};
}

#[cfg(test)]
mod response_tests {
    use super::*;
    use axum::body::to_bytes;

    #[tokio::test]
    async fn envelope_carries_status_and_payload() {
        let response = ApiResponse::created("Hotel created successfully", 42).into_response();
        assert_eq!(response.status(), StatusCode::CREATED);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["data"], 42);
        assert_eq!(json["status_code"], 201);
        assert_eq!(json["message"], "Hotel created successfully");
    }

    #[tokio::test]
    async fn message_envelope_has_null_data() {
        let response =
            ApiResponse::<()>::message(StatusCode::OK, "Hotel deleted successfully").into_response();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert!(json["data"].is_null());
        assert_eq!(json["status_code"], 200);
    }

    #[tokio::test]
    async fn panicking_handler_renders_error_envelope() {
        use tower::ServiceExt;

        async fn explode() -> &'static str {
            panic!("attempt to add with overflow")
        }

        let app = Router::new()
            .route("/boom", get(explode))
            .layer(CatchPanicLayer::custom(handler_panicked));
        let response = app
            .oneshot(
                axum::http::Request::builder()
                    .uri("/boom")
                    .body(axum::body::Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["status_code"], 500);
        assert_eq!(json["message"], "An unexpected error occurred.");
    }

    #[test]
    fn body_limit_fits_a_full_batch() {
        let config = AppConfig::new(
            "sqlite::memory:".into(),
            "127.0.0.1".into(),
            8080,
            "test".into(),
            "http://localhost:8080".into(),
            "storage".into(),
        );
        assert_eq!(
            request_body_limit(&config),
            5120 * 1024 * MAX_PICTURES_PER_BATCH + BODY_LIMIT_OVERHEAD
        );
    }
}
