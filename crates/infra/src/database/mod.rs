//! Database implementations

pub mod event_store;
pub mod manager;
mod rows;
pub mod task_source;

pub use event_store::SqliteEventStore;
pub use manager::{DbManager, SqliteConnection};
pub use task_source::SqliteTaskSource;
