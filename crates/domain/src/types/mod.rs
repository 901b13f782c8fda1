//! Domain data model

pub mod calendar;
pub mod conflict;
pub mod event;
pub mod integration;
pub mod sync_log;
pub mod task;
pub mod time_block;

pub use calendar::{Calendar, CalendarProvider, WebhookSubscription};
pub use conflict::{
    CalendarConflict, ConflictSeverity, ConflictType, DetectedConflict, EventPair,
    ResolutionSuggestion, ResolutionType,
};
pub use event::{
    normalize_location, Attendee, AttendeeResponse, CalendarEvent, EventFields, EventStatus,
    NewEvent, Reminder, ReminderMethod, SyncStatus, TimeRange, UpsertOutcome,
};
pub use integration::{AccessToken, Integration, RefreshedCredentials, SealedSecret};
pub use sync_log::{SyncCounters, SyncLog};
pub use task::{Task, TaskDue};
pub use time_block::{TimeBlock, TimeBlockKind};
