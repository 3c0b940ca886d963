//! Health check endpoint
//!
//! ```text
//! GET /health
//! ```
//!
//! ```json
//! { "status": "healthy", "version": "0.1.0", "database": "connected", "redis": "connected" }
//! ```
//!
//! Returns 200 when the database answers and 503 otherwise. Redis is
//! reported but does not affect the status, since rate limiting fails open.

use crate::app::AppState;
use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use storecraft_shared::db::pool::{get_pool_stats, health_check as db_health_check, PoolStats};

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub database: String,

    /// "connected", "disconnected" or "disabled"
    pub redis: String,

    #[serde(skip_deserializing)]
    pub pool: Option<PoolStats>,
}

pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let database_ok = db_health_check(&state.db).await.is_ok();

    let redis = match state.redis.as_ref() {
        None => "disabled",
        Some(client) => match client.ping().await {
            Ok(true) => "connected",
            _ => "disconnected",
        },
    };

    let status = if database_ok {
        StatusCode::OK
    } else {
        tracing::warn!("Health check: database unreachable");
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(HealthResponse {
            status: if database_ok { "healthy" } else { "degraded" }.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            database: if database_ok { "connected" } else { "disconnected" }.to_string(),
            redis: redis.to_string(),
            pool: Some(get_pool_stats(&state.db)),
        }),
    )
}
