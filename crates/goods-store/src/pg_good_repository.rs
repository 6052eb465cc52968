//! `PostgreSQL` implementation of the `GoodRepository` and `OutboxRepository`
//! traits.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool, Postgres, Transaction};
use tracing::{debug, instrument};
use uuid::Uuid;

use goods_core::command::{CreateGood, DeleteGood, ListGoods, ReprioritizeGood, UpdateGood};
use goods_core::error::DomainError;
use goods_core::event::{OutboxEvent, PendingEvent};
use goods_core::good::{Good, GoodPriority, GoodsList};
use goods_core::repository::{GoodRepository, OutboxRepository};

/// Appends the project-scoped identity predicate. Every scoped statement binds
/// `id` as `$1` and `project_id` as `$2`.
macro_rules! scoped {
    ($head:literal) => {
        concat!($head, " WHERE id = $1 AND project_id = $2")
    };
    ($head:literal, $tail:literal) => {
        concat!($head, " WHERE id = $1 AND project_id = $2 ", $tail)
    };
}

const LOCK_GOOD: &str = scoped!("SELECT TRUE FROM goods", "FOR UPDATE");

const INSERT_GOOD: &str = "INSERT INTO goods (project_id, name) VALUES ($1, $2) \
     RETURNING id, project_id, name, description, priority, removed, created_at";

const UPDATE_GOOD: &str = scoped!(
    "UPDATE goods SET name = $3, description = $4",
    "RETURNING id, project_id, name, description, priority, removed, created_at"
);

const REMOVE_GOOD: &str = scoped!("UPDATE goods SET removed = TRUE", "RETURNING id");

const REPRIORITIZE_GOOD: &str = scoped!("UPDATE goods SET priority = $3", "RETURNING id, priority");

const LIST_GOODS: &str = "SELECT id, project_id, name, description, priority, removed, created_at \
     FROM goods ORDER BY id LIMIT $1 OFFSET $2";

const INSERT_OUTBOX: &str =
    "INSERT INTO outbox (event_id, good_id, project_id) VALUES ($1, $2, $3)";

const PENDING_OUTBOX: &str = r"
SELECT o.event_id, o.good_id, o.project_id, o.created_at AS event_time,
       g.name, g.description, g.priority, g.removed, g.created_at
FROM outbox o
JOIN goods g ON g.id = o.good_id AND g.project_id = o.project_id
WHERE o.published_at IS NULL
ORDER BY o.created_at, o.event_id
LIMIT $1
";

const MARK_PUBLISHED: &str =
    "UPDATE outbox SET published_at = NOW() WHERE event_id = ANY($1) AND published_at IS NULL";

#[derive(Debug, sqlx::FromRow)]
struct GoodRow {
    id: i64,
    project_id: i64,
    name: String,
    description: String,
    priority: i32,
    removed: bool,
    created_at: DateTime<Utc>,
}

impl From<GoodRow> for Good {
    fn from(row: GoodRow) -> Self {
        Self {
            id: row.id,
            project_id: row.project_id,
            name: row.name,
            description: row.description,
            priority: row.priority,
            removed: row.removed,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct PendingRow {
    event_id: Uuid,
    good_id: i64,
    project_id: i64,
    event_time: DateTime<Utc>,
    name: String,
    description: String,
    priority: i32,
    removed: bool,
    created_at: DateTime<Utc>,
}

impl From<PendingRow> for PendingEvent {
    fn from(row: PendingRow) -> Self {
        Self {
            outbox: OutboxEvent {
                event_id: row.event_id,
                good_id: row.good_id,
                project_id: row.project_id,
                created_at: row.event_time,
            },
            good: Good {
                id: row.good_id,
                project_id: row.project_id,
                name: row.name,
                description: row.description,
                priority: row.priority,
                removed: row.removed,
                created_at: row.created_at,
            },
        }
    }
}

/// PostgreSQL-backed goods repository.
#[derive(Debug, Clone)]
pub struct PgGoodRepository {
    pool: PgPool,
}

impl PgGoodRepository {
    /// Creates a new `PgGoodRepository`.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn begin(&self) -> Result<Transaction<'static, Postgres>, DomainError> {
        self.pool
            .begin()
            .await
            .map_err(|e| DomainError::infra("begin tx", e))
    }
}

/// Commits on success. On failure rolls back and, if the rollback fails too,
/// keeps both errors.
async fn finish<T>(
    tx: Transaction<'static, Postgres>,
    result: Result<T, DomainError>,
) -> Result<T, DomainError> {
    match result {
        Ok(value) => {
            tx.commit()
                .await
                .map_err(|e| DomainError::infra("tx commit", e))?;
            Ok(value)
        }
        Err(cause) => match tx.rollback().await {
            Ok(()) => Err(cause),
            Err(rollback) => Err(DomainError::TransactionAborted {
                cause: Box::new(cause),
                rollback: rollback.to_string(),
            }),
        },
    }
}

/// Takes the exclusive row lock on `(id, project_id)`, failing with
/// `NotFound` when no such row exists.
async fn lock_good(conn: &mut PgConnection, id: i64, project_id: i64) -> Result<(), DomainError> {
    let locked = sqlx::query_scalar::<_, bool>(LOCK_GOOD)
        .bind(id)
        .bind(project_id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(|e| DomainError::infra("check existence", e))?;

    match locked {
        Some(_) => Ok(()),
        None => Err(DomainError::NotFound { id, project_id }),
    }
}

async fn insert_outbox(
    conn: &mut PgConnection,
    good_id: i64,
    project_id: i64,
) -> Result<Uuid, DomainError> {
    let event_id = Uuid::now_v7();
    sqlx::query(INSERT_OUTBOX)
        .bind(event_id)
        .bind(good_id)
        .bind(project_id)
        .execute(&mut *conn)
        .await
        .map_err(|e| DomainError::infra("insert event", e))?;
    Ok(event_id)
}

async fn create_in_tx(conn: &mut PgConnection, command: &CreateGood) -> Result<Good, DomainError> {
    let good: Good = sqlx::query_as::<_, GoodRow>(INSERT_GOOD)
        .bind(command.project_id)
        .bind(&command.name)
        .fetch_one(&mut *conn)
        .await
        .map_err(|e| DomainError::infra("insert good", e))?
        .into();

    let event_id = insert_outbox(conn, good.id, good.project_id).await?;
    debug!(%event_id, good_id = good.id, "outbox event recorded");
    Ok(good)
}

async fn update_in_tx(conn: &mut PgConnection, command: &UpdateGood) -> Result<Good, DomainError> {
    lock_good(conn, command.id, command.project_id).await?;

    let good: Good = sqlx::query_as::<_, GoodRow>(UPDATE_GOOD)
        .bind(command.id)
        .bind(command.project_id)
        .bind(&command.name)
        .bind(&command.description)
        .fetch_one(&mut *conn)
        .await
        .map_err(|e| DomainError::infra("update good", e))?
        .into();

    let event_id = insert_outbox(conn, good.id, good.project_id).await?;
    debug!(%event_id, good_id = good.id, "outbox event recorded");
    Ok(good)
}

async fn delete_in_tx(conn: &mut PgConnection, command: &DeleteGood) -> Result<(), DomainError> {
    lock_good(conn, command.id, command.project_id).await?;

    let id = sqlx::query_scalar::<_, i64>(REMOVE_GOOD)
        .bind(command.id)
        .bind(command.project_id)
        .fetch_one(&mut *conn)
        .await
        .map_err(|e| DomainError::infra("delete good", e))?;

    let event_id = insert_outbox(conn, id, command.project_id).await?;
    debug!(%event_id, good_id = id, "outbox event recorded");
    Ok(())
}

async fn reprioritize_in_tx(
    conn: &mut PgConnection,
    command: &ReprioritizeGood,
) -> Result<Vec<GoodPriority>, DomainError> {
    lock_good(conn, command.id, command.project_id).await?;

    let rows: Vec<(i64, i32)> = sqlx::query_as(REPRIORITIZE_GOOD)
        .bind(command.id)
        .bind(command.project_id)
        .bind(command.new_priority)
        .fetch_all(&mut *conn)
        .await
        .map_err(|e| DomainError::infra("reprioritize good", e))?;

    let event_id = insert_outbox(conn, command.id, command.project_id).await?;
    debug!(%event_id, good_id = command.id, "outbox event recorded");

    Ok(rows
        .into_iter()
        .map(|(id, priority)| GoodPriority { id, priority })
        .collect())
}

#[async_trait]
impl GoodRepository for PgGoodRepository {
    #[instrument(skip(self, command), fields(project_id = command.project_id))]
    async fn create_good(&self, command: &CreateGood) -> Result<Good, DomainError> {
        let mut tx = self.begin().await?;
        let result = create_in_tx(&mut tx, command).await;
        finish(tx, result).await
    }

    #[instrument(skip(self, command), fields(good_id = command.id, project_id = command.project_id))]
    async fn update_good(&self, command: &UpdateGood) -> Result<Good, DomainError> {
        let mut tx = self.begin().await?;
        let result = update_in_tx(&mut tx, command).await;
        finish(tx, result).await
    }

    #[instrument(skip(self, command), fields(good_id = command.id, project_id = command.project_id))]
    async fn delete_good(&self, command: &DeleteGood) -> Result<(), DomainError> {
        let mut tx = self.begin().await?;
        let result = delete_in_tx(&mut tx, command).await;
        finish(tx, result).await
    }

    #[instrument(skip(self))]
    async fn list_goods(&self, query: &ListGoods) -> Result<GoodsList, DomainError> {
        let rows: Vec<GoodRow> = sqlx::query_as(LIST_GOODS)
            .bind(query.limit)
            .bind(query.offset)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| DomainError::infra("get goods list", e))?;

        let goods = rows.into_iter().map(Good::from).collect();
        Ok(GoodsList::from_scanned(goods, query.limit, query.offset))
    }

    #[instrument(skip(self, command), fields(good_id = command.id, project_id = command.project_id))]
    async fn reprioritize_good(
        &self,
        command: &ReprioritizeGood,
    ) -> Result<Vec<GoodPriority>, DomainError> {
        let mut tx = self.begin().await?;
        let result = reprioritize_in_tx(&mut tx, command).await;
        finish(tx, result).await
    }
}

#[async_trait]
impl OutboxRepository for PgGoodRepository {
    async fn pending_events(&self, limit: i64) -> Result<Vec<PendingEvent>, DomainError> {
        let rows: Vec<PendingRow> = sqlx::query_as(PENDING_OUTBOX)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| DomainError::infra("select pending events", e))?;

        Ok(rows.into_iter().map(PendingEvent::from).collect())
    }

    async fn mark_published(&self, event_ids: &[Uuid]) -> Result<(), DomainError> {
        if event_ids.is_empty() {
            return Ok(());
        }

        sqlx::query(MARK_PUBLISHED)
            .bind(event_ids)
            .execute(&self.pool)
            .await
            .map_err(|e| DomainError::infra("mark published", e))?;
        Ok(())
    }
}
