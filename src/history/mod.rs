//! Snapshot log and the session windows derived from it.

pub mod sessions;
pub mod store;

pub use sessions::SessionGrouping;
pub use store::{HistoryStore, RecordOutcome};
