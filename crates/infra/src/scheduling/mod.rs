//! Cron-driven background jobs
//!
//! The calendar scheduler runs periodic sync passes and webhook renewal for
//! the configured users. It follows the usual runtime rules:
//! - Explicit lifecycle management (start/stop)
//! - Join handles for spawned tasks
//! - Cancellation token support
//! - Timeout wrapping on all async operations

pub mod calendar_scheduler;
pub mod error;

pub use calendar_scheduler::{CalendarScheduler, CalendarSchedulerConfig, SyncPassReport};
pub use error::{SchedulerError, SchedulerResult};
