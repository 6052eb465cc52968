//! Redis implementation of the `GoodsListCache` trait.

use std::time::Duration;

use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use tracing::{debug, instrument};

use goods_core::cache::{DEFAULT_TTL, GOODS_LIST_KEY, GoodsListCache};
use goods_core::error::DomainError;
use goods_core::good::GoodsList;

/// Redis-backed goods list cache.
///
/// The page is stored as JSON under [`GOODS_LIST_KEY`] with a TTL, so an
/// invalidation that never arrives is bounded by expiry.
#[derive(Clone)]
pub struct RedisGoodsListCache {
    connection: ConnectionManager,
    ttl: Duration,
}

impl RedisGoodsListCache {
    /// Creates a cache with the default one-minute TTL.
    #[must_use]
    pub fn new(connection: ConnectionManager) -> Self {
        Self::with_ttl(connection, DEFAULT_TTL)
    }

    /// Creates a cache with a custom TTL. Sub-second TTLs round up to one
    /// second.
    #[must_use]
    pub fn with_ttl(connection: ConnectionManager, ttl: Duration) -> Self {
        Self { connection, ttl }
    }

    /// Opens a managed connection to `url`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if the URL is invalid or the
    /// server cannot be reached.
    pub async fn connect(url: &str) -> Result<ConnectionManager, DomainError> {
        let client = redis::Client::open(url).map_err(|e| DomainError::infra("redis client", e))?;
        ConnectionManager::new(client)
            .await
            .map_err(|e| DomainError::infra("redis connect", e))
    }

    fn ttl_secs(&self) -> u64 {
        self.ttl.as_secs().max(1)
    }
}

impl std::fmt::Debug for RedisGoodsListCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisGoodsListCache")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

pub(crate) fn encode(list: &GoodsList) -> Result<String, DomainError> {
    serde_json::to_string(list).map_err(|e| DomainError::infra("json marshal", e))
}

pub(crate) fn decode(json: &str) -> Result<GoodsList, DomainError> {
    serde_json::from_str(json).map_err(|e| DomainError::infra("json unmarshal", e))
}

#[async_trait]
impl GoodsListCache for RedisGoodsListCache {
    #[instrument(skip(self, list), fields(goods = list.goods.len()))]
    async fn set(&self, list: &GoodsList) -> Result<(), DomainError> {
        let json = encode(list)?;
        let mut connection = self.connection.clone();
        connection
            .set_ex::<_, _, ()>(GOODS_LIST_KEY, json, self.ttl_secs())
            .await
            .map_err(|e| DomainError::infra("set", e))
    }

    async fn get(&self) -> Result<Option<GoodsList>, DomainError> {
        let mut connection = self.connection.clone();
        let json: Option<String> = connection
            .get(GOODS_LIST_KEY)
            .await
            .map_err(|e| DomainError::infra("get", e))?;

        match json {
            Some(json) => decode(&json).map(Some),
            None => {
                debug!("goods list cache miss");
                Ok(None)
            }
        }
    }

    #[instrument(skip(self))]
    async fn delete(&self) -> Result<(), DomainError> {
        let mut connection = self.connection.clone();
        connection
            .del::<_, ()>(GOODS_LIST_KEY)
            .await
            .map_err(|e| DomainError::infra("del", e))
    }
}
