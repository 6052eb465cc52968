//! Liveness check for load balancers and orchestrators.

use axum::{Json, Router, routing::get};
use serde::Serialize;

use crate::state::AppState;

const SERVICE_NAME: &str = "goods";

/// Body of `GET /health`.
#[derive(Debug, Serialize)]
pub struct HealthStatus {
    /// Always `"ok"` while the process serves requests.
    pub status: &'static str,
    /// Which service answered.
    pub service: &'static str,
    /// Crate version of the running binary.
    pub version: &'static str,
}

async fn liveness() -> Json<HealthStatus> {
    Json(HealthStatus {
        status: "ok",
        service: SERVICE_NAME,
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// `GET /health`. Does not touch the store, cache or bus.
pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(liveness))
}
