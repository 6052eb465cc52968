//! Test cache: in-memory `GoodsListCache` with switchable failures.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use goods_core::cache::{DEFAULT_TTL, GoodsListCache};
use goods_core::error::DomainError;
use goods_core::good::GoodsList;

/// A single-slot cache that honours its TTL and can be told to fail reads,
/// writes or deletes independently.
#[derive(Debug)]
pub struct InMemoryGoodsListCache {
    slot: Mutex<Option<(GoodsList, Instant)>>,
    ttl: Duration,
    fail_set: AtomicBool,
    fail_get: AtomicBool,
    fail_delete: AtomicBool,
    sets: AtomicUsize,
    deletes: AtomicUsize,
}

impl Default for InMemoryGoodsListCache {
    fn default() -> Self {
        Self::with_ttl(DEFAULT_TTL)
    }
}

impl InMemoryGoodsListCache {
    /// Creates an empty cache with the default TTL.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty cache with a custom TTL.
    #[must_use]
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            slot: Mutex::new(None),
            ttl,
            fail_set: AtomicBool::new(false),
            fail_get: AtomicBool::new(false),
            fail_delete: AtomicBool::new(false),
            sets: AtomicUsize::new(0),
            deletes: AtomicUsize::new(0),
        }
    }

    /// Makes `set` fail.
    pub fn fail_sets(&self, fail: bool) {
        self.fail_set.store(fail, Ordering::SeqCst);
    }

    /// Makes `get` fail.
    pub fn fail_gets(&self, fail: bool) {
        self.fail_get.store(fail, Ordering::SeqCst);
    }

    /// Makes `delete` fail.
    pub fn fail_deletes(&self, fail: bool) {
        self.fail_delete.store(fail, Ordering::SeqCst);
    }

    /// Returns the live cached page without going through the trait.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn cached(&self) -> Option<GoodsList> {
        self.slot
            .lock()
            .unwrap()
            .as_ref()
            .filter(|(_, expires_at)| Instant::now() < *expires_at)
            .map(|(list, _)| list.clone())
    }

    /// Number of successful `set` calls.
    pub fn set_count(&self) -> usize {
        self.sets.load(Ordering::SeqCst)
    }

    /// Number of successful `delete` calls.
    pub fn delete_count(&self) -> usize {
        self.deletes.load(Ordering::SeqCst)
    }
}

fn unavailable() -> DomainError {
    DomainError::Infrastructure("cache unavailable".into())
}

#[async_trait]
impl GoodsListCache for InMemoryGoodsListCache {
    async fn set(&self, list: &GoodsList) -> Result<(), DomainError> {
        if self.fail_set.load(Ordering::SeqCst) {
            return Err(unavailable());
        }
        *self.slot.lock().unwrap() = Some((list.clone(), Instant::now() + self.ttl));
        self.sets.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn get(&self) -> Result<Option<GoodsList>, DomainError> {
        if self.fail_get.load(Ordering::SeqCst) {
            return Err(unavailable());
        }
        Ok(self.cached())
    }

    async fn delete(&self) -> Result<(), DomainError> {
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(unavailable());
        }
        self.slot.lock().unwrap().take();
        self.deletes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
