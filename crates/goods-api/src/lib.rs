//! Goods API — HTTP transport, configuration and process wiring for the
//! goods service.

use axum::Router;

pub mod config;
pub mod error;
pub mod routes;
pub mod state;

/// Builds the application router without middleware.
pub fn build_router(state: state::AppState) -> Router {
    Router::new()
        .merge(routes::health::router())
        .merge(routes::goods::router())
        .with_state(state)
}
