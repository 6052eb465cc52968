//! Time source for stores that stamp records themselves instead of letting
//! the database assign the timestamp.

use chrono::{DateTime, Utc};

/// Supplies the current time to components that stamp records themselves.
pub trait Clock: Send + Sync {
    /// Returns the current time.
    fn now(&self) -> DateTime<Utc>;
}
