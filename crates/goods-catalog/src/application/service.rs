//! `GoodsService`: the orchestrator handed to transports.

use std::sync::Arc;

use goods_core::cache::GoodsListCache;
use goods_core::command::{CreateGood, DeleteGood, ListGoods, ReprioritizeGood, UpdateGood};
use goods_core::error::DomainError;
use goods_core::good::{Good, GoodPriority, GoodsList};
use goods_core::repository::GoodRepository;

use crate::application::{command_handlers, query_handlers};

/// Bundles the store and the list cache behind the five catalog operations.
///
/// Cheap to clone; every clone shares the same store and cache.
#[derive(Clone)]
pub struct GoodsService {
    repository: Arc<dyn GoodRepository>,
    cache: Arc<dyn GoodsListCache>,
}

impl std::fmt::Debug for GoodsService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GoodsService").finish_non_exhaustive()
    }
}

impl GoodsService {
    /// Creates a service over the given store and cache.
    #[must_use]
    pub fn new(repository: Arc<dyn GoodRepository>, cache: Arc<dyn GoodsListCache>) -> Self {
        Self { repository, cache }
    }

    /// See [`command_handlers::handle_create_good`].
    ///
    /// # Errors
    ///
    /// Propagates the handler's error.
    pub async fn create(&self, command: &CreateGood) -> Result<Good, DomainError> {
        command_handlers::handle_create_good(command, &*self.repository, &*self.cache).await
    }

    /// See [`command_handlers::handle_update_good`].
    ///
    /// # Errors
    ///
    /// Propagates the handler's error.
    pub async fn update(&self, command: &UpdateGood) -> Result<Good, DomainError> {
        command_handlers::handle_update_good(command, &*self.repository, &*self.cache).await
    }

    /// See [`command_handlers::handle_delete_good`].
    ///
    /// # Errors
    ///
    /// Propagates the handler's error.
    pub async fn delete(&self, command: &DeleteGood) -> Result<(), DomainError> {
        command_handlers::handle_delete_good(command, &*self.repository, &*self.cache).await
    }

    /// See [`query_handlers::handle_list_goods`].
    ///
    /// # Errors
    ///
    /// Propagates the handler's error.
    pub async fn list(&self, query: &ListGoods) -> Result<GoodsList, DomainError> {
        query_handlers::handle_list_goods(query, &*self.repository, &*self.cache).await
    }

    /// See [`command_handlers::handle_reprioritize_good`].
    ///
    /// # Errors
    ///
    /// Propagates the handler's error.
    pub async fn reprioritize(
        &self,
        command: &ReprioritizeGood,
    ) -> Result<Vec<GoodPriority>, DomainError> {
        command_handlers::handle_reprioritize_good(command, &*self.repository, &*self.cache).await
    }

    /// Cache lookup for callers that want to try the cache before [`list`].
    ///
    /// [`list`]: Self::list
    pub async fn cached_list(&self, query: &ListGoods) -> Option<GoodsList> {
        query_handlers::cached_goods_list(query, &*self.cache).await
    }
}

#[cfg(test)]
mod tests {
    use goods_test_support::{InMemoryGoodRepository, InMemoryGoodsListCache};

    use super::*;

    fn service() -> (GoodsService, Arc<InMemoryGoodsListCache>) {
        let cache = Arc::new(InMemoryGoodsListCache::new());
        let service = GoodsService::new(Arc::new(InMemoryGoodRepository::new()), cache.clone());
        (service, cache)
    }

    #[tokio::test]
    async fn test_create_then_list_reflects_new_good() {
        // Arrange
        let (service, _) = service();

        // Act
        let good = service
            .create(&CreateGood {
                project_id: 1,
                name: "widget".into(),
            })
            .await
            .unwrap();
        let list = service
            .list(&ListGoods {
                limit: 10,
                offset: 0,
            })
            .await
            .unwrap();

        // Assert
        assert_eq!(good.priority, 0);
        assert!(!good.removed);
        assert!(list.meta.total >= 1);
        assert!(list.goods.iter().any(|g| g.id == good.id));
    }

    #[tokio::test]
    async fn test_delete_keeps_good_enumerable_as_removed() {
        // Arrange
        let (service, _) = service();
        let good = service
            .create(&CreateGood {
                project_id: 1,
                name: "widget".into(),
            })
            .await
            .unwrap();

        // Act
        service
            .delete(&DeleteGood {
                id: good.id,
                project_id: 1,
            })
            .await
            .unwrap();
        let list = service
            .list(&ListGoods {
                limit: 10,
                offset: 0,
            })
            .await
            .unwrap();

        // Assert
        let listed = list.goods.iter().find(|g| g.id == good.id).unwrap();
        assert!(listed.removed);
        assert_eq!(list.meta.removed, 1);
    }

    #[tokio::test]
    async fn test_every_mutation_leaves_no_valid_cached_page() {
        // Arrange
        let (service, cache) = service();
        let query = ListGoods {
            limit: 10,
            offset: 0,
        };
        let good = service
            .create(&CreateGood {
                project_id: 1,
                name: "widget".into(),
            })
            .await
            .unwrap();

        // Act + Assert
        service.list(&query).await.unwrap();
        service
            .update(&UpdateGood {
                id: good.id,
                project_id: 1,
                name: "gadget".into(),
                description: "shiny".into(),
            })
            .await
            .unwrap();
        assert!(service.cached_list(&query).await.is_none());

        service.list(&query).await.unwrap();
        service
            .reprioritize(&ReprioritizeGood {
                id: good.id,
                project_id: 1,
                new_priority: 2,
            })
            .await
            .unwrap();
        assert!(service.cached_list(&query).await.is_none());

        service.list(&query).await.unwrap();
        assert_eq!(
            service.cached_list(&query).await.unwrap().goods[0].priority,
            2
        );
        service
            .delete(&DeleteGood {
                id: good.id,
                project_id: 1,
            })
            .await
            .unwrap();
        assert!(service.cached_list(&query).await.is_none());
        assert_eq!(cache.delete_count(), 4);
    }
}
