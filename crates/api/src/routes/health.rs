//! Liveness endpoint.

use axum::Json;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// GET /health: the process is up and serving requests.
///
/// Does not touch the store, so it stays green while the database is down.
pub async fn check() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}
