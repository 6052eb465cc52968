//! Shared application state.

use goods_catalog::application::service::GoodsService;

/// Application state shared across all request handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    /// The catalog orchestrator.
    pub goods: GoodsService,
}

impl AppState {
    /// Create new application state.
    #[must_use]
    pub fn new(goods: GoodsService) -> Self {
        Self { goods }
    }
}
