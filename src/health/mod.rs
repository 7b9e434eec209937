/*!
 * # Health Check Module
 *
 * - `/health` - database and storage checks; 503 when any check is down
 * - `/health/live` - process liveness and uptime
 * - `/health/version` - build information
 */

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::get,
    Router,
};
use chrono::{DateTime, Utc};
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tracing::{debug, error};
use utoipa::ToSchema;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Up,
    Down,
}

#[derive(Serialize, Deserialize, Debug, Clone, ToSchema)]
pub struct HealthDetail {
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, ToSchema)]
pub struct HealthInfo {
    pub status: HealthStatus,
    pub version: String,
    pub timestamp: DateTime<Utc>,
    pub uptime_seconds: u64,
    pub checks: BTreeMap<String, HealthDetail>,
}

#[derive(Clone)]
pub struct HealthState {
    pub db: Arc<DatabaseConnection>,
    pub storage_root: PathBuf,
    pub start_time: SystemTime,
}

impl HealthState {
    pub fn new(db: Arc<DatabaseConnection>, storage_root: impl Into<PathBuf>) -> Self {
        Self {
            db,
            storage_root: storage_root.into(),
            start_time: SystemTime::now(),
        }
    }

    pub fn uptime(&self) -> u64 {
        SystemTime::now()
            .duration_since(self.start_time)
            .unwrap_or(Duration::from_secs(0))
            .as_secs()
    }

    pub async fn check(&self) -> HealthInfo {
        let mut checks = BTreeMap::new();

        let database = match crate::db::check_connection(&self.db).await {
            Ok(()) => HealthDetail {
                status: HealthStatus::Up,
                message: None,
            },
            Err(_) => {
                HealthDetail {
                    status: HealthStatus::Down,
                    message: Some("database unreachable".to_string()),
                }
            }
        };
        checks.insert("database".to_string(), database);

        let storage = match tokio::fs::metadata(&self.storage_root).await {
            Ok(meta) if meta.is_dir() => HealthDetail {
                status: HealthStatus::Up,
                message: None,
            },
            _ => {
                error!(root = %self.storage_root.display(), "Storage root is not available");
                HealthDetail {
                    status: HealthStatus::Down,
                    message: Some("storage root missing".to_string()),
                }
            }
        };
        checks.insert("storage".to_string(), storage);

        let status = if checks.values().all(|c| c.status == HealthStatus::Up) {
            HealthStatus::Up
        } else {
            HealthStatus::Down
        };

        HealthInfo {
            status,
            version: env!("CARGO_PKG_VERSION").to_string(),
            timestamp: Utc::now(),
            uptime_seconds: self.uptime(),
            checks,
        }
    }
}

/// Returns build and version information
pub async fn version_info() -> impl IntoResponse {
    Json(json!({
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Service health
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "All checks up", body = HealthInfo),
        (status = 503, description = "At least one check down", body = HealthInfo)
    ),
    tag = "Health"
)]
pub async fn health_check(State(state): State<Arc<HealthState>>) -> impl IntoResponse {
    debug!("Health check endpoint called");

    let health = state.check().await;
    let status_code = match health.status {
        HealthStatus::Up => StatusCode::OK,
        HealthStatus::Down => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(health))
}

pub async fn liveness_check(State(state): State<Arc<HealthState>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(json!({
            "alive": true,
            "uptime_seconds": state.uptime(),
            "timestamp": Utc::now(),
        })),
    )
}

/// Health endpoints, mounted under `/health`.
pub fn health_routes(state: Arc<HealthState>) -> Router {
    Router::new()
        .route("/", get(health_check))
        .route("/live", get(liveness_check))
        .route("/version", get(version_info))
        .with_state(state)
}
