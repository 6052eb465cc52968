//! Shared test fakes for the goods service.

mod cache;
mod clock;
mod relay;
mod repository;

pub use cache::InMemoryGoodsListCache;
pub use clock::FixedClock;
pub use relay::{
    JournalEntry, RecordingEventPublisher, RelayJournal, ScriptedBatchSource, ScriptedLogSink,
};
pub use repository::{FailingGoodRepository, InMemoryGoodRepository};
