//! Goods list cache port.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::DomainError;
use crate::good::GoodsList;

/// Key the most recent list page is stored under.
pub const GOODS_LIST_KEY: &str = "goodsList";

/// Default lifetime of a cached list page.
pub const DEFAULT_TTL: Duration = Duration::from_secs(60);

/// Single-key cache for the last computed [`GoodsList`].
///
/// The cache is a derived artifact: it may be dropped at any time and is
/// never consulted by the store.
#[async_trait]
pub trait GoodsListCache: Send + Sync {
    /// Stores the page with the cache's TTL, replacing any previous page.
    async fn set(&self, list: &GoodsList) -> Result<(), DomainError>;

    /// Returns the cached page, or `None` if absent or expired.
    async fn get(&self) -> Result<Option<GoodsList>, DomainError>;

    /// Drops the cached page. Deleting an absent key succeeds.
    async fn delete(&self) -> Result<(), DomainError>;
}
