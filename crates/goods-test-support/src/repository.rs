//! Test repositories: in-memory and failing `GoodRepository`
//! implementations.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use goods_core::clock::Clock;
use goods_core::command::{CreateGood, DeleteGood, ListGoods, ReprioritizeGood, UpdateGood};
use goods_core::error::DomainError;
use goods_core::event::{OutboxEvent, PendingEvent};
use goods_core::good::{Good, GoodPriority, GoodsList};
use goods_core::repository::{GoodRepository, OutboxRepository};
use uuid::Uuid;

use crate::clock::FixedClock;

#[derive(Debug, Default)]
struct Tables {
    goods: Vec<Good>,
    outbox: Vec<(OutboxEvent, bool)>,
}

/// A goods repository held in memory with the same transactional contract as
/// the PostgreSQL one: a mutation and its outbox row become visible together
/// or not at all.
///
/// `fail_outbox_inserts(true)` simulates a crash between writing the good and
/// writing its outbox row.
pub struct InMemoryGoodRepository {
    tables: Mutex<Tables>,
    clock: Box<dyn Clock>,
    fail_outbox: AtomicBool,
}

impl std::fmt::Debug for InMemoryGoodRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryGoodRepository")
            .field("tables", &self.tables)
            .field("fail_outbox", &self.fail_outbox)
            .finish_non_exhaustive()
    }
}

impl Default for InMemoryGoodRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryGoodRepository {
    /// Creates an empty repository stamped by a [`FixedClock`].
    #[must_use]
    pub fn new() -> Self {
        Self {
            tables: Mutex::new(Tables::default()),
            clock: Box::new(FixedClock::default()),
            fail_outbox: AtomicBool::new(false),
        }
    }

    /// Makes every subsequent outbox insert fail, aborting its transaction.
    pub fn fail_outbox_inserts(&self, fail: bool) {
        self.fail_outbox.store(fail, Ordering::SeqCst);
    }

    /// Returns a snapshot of all goods.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn goods(&self) -> Vec<Good> {
        self.tables.lock().unwrap().goods.clone()
    }

    /// Returns a snapshot of all outbox rows, published or not.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn outbox_events(&self) -> Vec<OutboxEvent> {
        self.tables
            .lock()
            .unwrap()
            .outbox
            .iter()
            .map(|(event, _)| event.clone())
            .collect()
    }

    /// Runs `mutate` against a copy of the tables and swaps it in only if the
    /// closure and the outbox insert both succeed.
    fn transact<T>(
        &self,
        mutate: impl FnOnce(&mut Tables) -> Result<(T, i64, i64), DomainError>,
    ) -> Result<T, DomainError> {
        let mut tables = self.tables.lock().unwrap();
        let mut staged = Tables {
            goods: tables.goods.clone(),
            outbox: tables.outbox.clone(),
        };

        let (value, good_id, project_id) = mutate(&mut staged)?;

        if self.fail_outbox.load(Ordering::SeqCst) {
            return Err(DomainError::infra("insert event", "outbox unavailable"));
        }
        staged.outbox.push((
            OutboxEvent {
                event_id: Uuid::now_v7(),
                good_id,
                project_id,
                created_at: self.clock.now(),
            },
            false,
        ));

        *tables = staged;
        Ok(value)
    }
}

fn find_scoped(tables: &mut Tables, id: i64, project_id: i64) -> Result<&mut Good, DomainError> {
    tables
        .goods
        .iter_mut()
        .find(|g| g.id == id && g.project_id == project_id)
        .ok_or(DomainError::NotFound { id, project_id })
}

#[async_trait]
impl GoodRepository for InMemoryGoodRepository {
    async fn create_good(&self, command: &CreateGood) -> Result<Good, DomainError> {
        let now = self.clock.now();
        self.transact(|tables| {
            let id = tables.goods.iter().map(|g| g.id).max().unwrap_or(0) + 1;
            let good = Good {
                id,
                project_id: command.project_id,
                name: command.name.clone(),
                description: String::new(),
                priority: 0,
                removed: false,
                created_at: now,
            };
            tables.goods.push(good.clone());
            Ok((good, id, command.project_id))
        })
    }

    async fn update_good(&self, command: &UpdateGood) -> Result<Good, DomainError> {
        self.transact(|tables| {
            let good = find_scoped(tables, command.id, command.project_id)?;
            good.name.clone_from(&command.name);
            good.description.clone_from(&command.description);
            Ok((good.clone(), command.id, command.project_id))
        })
    }

    async fn delete_good(&self, command: &DeleteGood) -> Result<(), DomainError> {
        self.transact(|tables| {
            find_scoped(tables, command.id, command.project_id)?.removed = true;
            Ok(((), command.id, command.project_id))
        })
    }

    async fn list_goods(&self, query: &ListGoods) -> Result<GoodsList, DomainError> {
        let tables = self.tables.lock().unwrap();
        let offset = usize::try_from(query.offset).unwrap_or(usize::MAX);
        let limit = usize::try_from(query.limit).unwrap_or(usize::MAX);
        let goods = tables.goods.iter().skip(offset).take(limit).cloned().collect();
        Ok(GoodsList::from_scanned(goods, query.limit, query.offset))
    }

    async fn reprioritize_good(
        &self,
        command: &ReprioritizeGood,
    ) -> Result<Vec<GoodPriority>, DomainError> {
        self.transact(|tables| {
            let good = find_scoped(tables, command.id, command.project_id)?;
            good.priority = command.new_priority;
            let changed = vec![GoodPriority {
                id: good.id,
                priority: good.priority,
            }];
            Ok((changed, command.id, command.project_id))
        })
    }
}

#[async_trait]
impl OutboxRepository for InMemoryGoodRepository {
    async fn pending_events(&self, limit: i64) -> Result<Vec<PendingEvent>, DomainError> {
        let tables = self.tables.lock().unwrap();
        let limit = usize::try_from(limit).unwrap_or(usize::MAX);
        Ok(tables
            .outbox
            .iter()
            .filter(|(_, published)| !published)
            .filter_map(|(event, _)| {
                tables
                    .goods
                    .iter()
                    .find(|g| g.id == event.good_id && g.project_id == event.project_id)
                    .map(|good| PendingEvent {
                        outbox: event.clone(),
                        good: good.clone(),
                    })
            })
            .take(limit)
            .collect())
    }

    async fn mark_published(&self, event_ids: &[Uuid]) -> Result<(), DomainError> {
        let mut tables = self.tables.lock().unwrap();
        for (event, published) in &mut tables.outbox {
            if event_ids.contains(&event.event_id) {
                *published = true;
            }
        }
        Ok(())
    }
}

/// A goods repository that always returns an infrastructure error. Useful for
/// testing error-handling paths.
#[derive(Debug)]
pub struct FailingGoodRepository;

fn connection_refused() -> DomainError {
    DomainError::Infrastructure("connection refused".into())
}

#[async_trait]
impl GoodRepository for FailingGoodRepository {
    async fn create_good(&self, _command: &CreateGood) -> Result<Good, DomainError> {
        Err(connection_refused())
    }

    async fn update_good(&self, _command: &UpdateGood) -> Result<Good, DomainError> {
        Err(connection_refused())
    }

    async fn delete_good(&self, _command: &DeleteGood) -> Result<(), DomainError> {
        Err(connection_refused())
    }

    async fn list_goods(&self, _query: &ListGoods) -> Result<GoodsList, DomainError> {
        Err(connection_refused())
    }

    async fn reprioritize_good(
        &self,
        _command: &ReprioritizeGood,
    ) -> Result<Vec<GoodPriority>, DomainError> {
        Err(connection_refused())
    }
}

#[async_trait]
impl OutboxRepository for FailingGoodRepository {
    async fn pending_events(&self, _limit: i64) -> Result<Vec<PendingEvent>, DomainError> {
        Err(connection_refused())
    }

    async fn mark_published(&self, _event_ids: &[Uuid]) -> Result<(), DomainError> {
        Err(connection_refused())
    }
}
