//! Query handlers for the goods catalog.
//!
//! Reads always go to the relational store. The cache is written after every
//! read and may be consulted by callers beforehand through
//! [`cached_goods_list`], but a cache failure never fails a read.

use goods_core::cache::GoodsListCache;
use goods_core::command::ListGoods;
use goods_core::error::DomainError;
use goods_core::good::GoodsList;
use goods_core::repository::GoodRepository;
use tracing::{debug, warn};

use crate::domain::validation;

/// Handles `ListGoods`: reads the page from the store and refreshes the
/// cache with it.
///
/// # Errors
///
/// Returns `DomainError::BadRequest` for a negative window or the store
/// error if the read fails. Cache write failures are logged only.
pub async fn handle_list_goods(
    query: &ListGoods,
    repo: &dyn GoodRepository,
    cache: &dyn GoodsListCache,
) -> Result<GoodsList, DomainError> {
    validation::validate_list(query)?;
    let list = repo.list_goods(query).await?;

    if let Err(err) = cache.set(&list).await {
        warn!(error = %err, "failed to refresh goods list cache");
    }

    Ok(list)
}

/// Returns the cached page if it was computed for the same window.
///
/// Misses, expired entries, pages for another window and cache errors all
/// yield `None`.
pub async fn cached_goods_list(query: &ListGoods, cache: &dyn GoodsListCache) -> Option<GoodsList> {
    match cache.get().await {
        Ok(Some(list)) if list.is_page(query.limit, query.offset) => {
            debug!("goods list served from cache");
            Some(list)
        }
        Ok(_) => None,
        Err(err) => {
            warn!(error = %err, "goods list cache read failed; falling back to store");
            None
        }
    }
}
