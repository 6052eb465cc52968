//! Goods records and the paginated list view.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A catalog record owned by the relational store.
///
/// `id` is assigned on creation and never changes. `removed` only ever goes
/// from `false` to `true`; goods are never physically deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Good {
    /// Store-assigned identifier.
    pub id: i64,
    /// Owning project. Every lookup is scoped by `(id, project_id)`.
    pub project_id: i64,
    /// Display name.
    pub name: String,
    /// Free-form description, empty on creation.
    pub description: String,
    /// Ordering priority.
    pub priority: i32,
    /// Soft-delete flag.
    pub removed: bool,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// Pagination and aggregate counters of a [`GoodsList`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Meta {
    /// Number of goods in the page.
    pub total: i64,
    /// Number of removed goods in the page.
    pub removed: i64,
    /// The requested page size.
    pub limit: i64,
    /// The requested offset.
    pub offset: i64,
}

/// One page of goods plus its counters. This is what the list cache holds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoodsList {
    /// Counters for this page.
    pub meta: Meta,
    /// The goods in store order.
    pub goods: Vec<Good>,
}

impl GoodsList {
    /// Builds a page from the rows a query scanned, deriving `total` and
    /// `removed` from those same rows.
    #[must_use]
    pub fn from_scanned(goods: Vec<Good>, limit: i64, offset: i64) -> Self {
        let total = i64::try_from(goods.len()).unwrap_or(i64::MAX);
        let removed = i64::try_from(goods.iter().filter(|g| g.removed).count()).unwrap_or(i64::MAX);
        Self {
            meta: Meta {
                total,
                removed,
                limit,
                offset,
            },
            goods,
        }
    }

    /// Returns `true` if this page was computed for the given window.
    #[must_use]
    pub fn is_page(&self, limit: i64, offset: i64) -> bool {
        self.meta.limit == limit && self.meta.offset == offset
    }
}

/// The priority a good ended up with after a reprioritize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoodPriority {
    /// The good identifier.
    pub id: i64,
    /// Its priority after the update.
    pub priority: i32,
}
