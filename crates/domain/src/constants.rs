//! Domain constants
//!
//! Defaults for sync, conflict detection and slot finding. Runtime values come
//! from [`crate::config::Config`], which falls back to these.

// Sync window
pub const DEFAULT_SYNC_LOOKBACK_DAYS: i64 = 30;
pub const DEFAULT_SYNC_LOOKAHEAD_DAYS: i64 = 365;
pub const DEFAULT_STALE_RUN_AFTER_MINUTES: i64 = 30;

// Task binding
pub const TASK_EVENT_TITLE_PREFIX: &str = "Task: ";
pub const DEFAULT_TASK_DURATION_MINUTES: i64 = 60;
pub const DEFAULT_TASK_START_HOUR: u32 = 9;

// Conflict detection
pub const DEFAULT_CONFLICT_HORIZON_DAYS: i64 = 30;
pub const DEFAULT_SCHEDULING_BUFFER_MINUTES: i64 = 15;
pub const HIGH_SEVERITY_THRESHOLD: f64 = 0.8;
pub const MEDIUM_SEVERITY_THRESHOLD: f64 = 0.4;
pub const RESCHEDULE_HORIZON_DAYS: i64 = 7;
pub const MERGE_TITLE_SIMILARITY_THRESHOLD: f64 = 0.5;
pub const MERGE_OVERLAP_FRACTION_THRESHOLD: f64 = 0.5;
pub const MERGE_DESCRIPTION_SEPARATOR: &str = "\n\n---\n";

// Meeting slots
pub const MAX_MEETING_SLOTS: usize = 10;
pub const MEETING_SLOT_CONFIDENCE: f64 = 0.8;

// Provider calls
pub const DEFAULT_PROVIDER_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_PROVIDER_TIMEOUT_SECS: u64 = 30;
pub const TOKEN_REFRESH_THRESHOLD_SECS: i64 = 300;

// Webhooks
pub const DEFAULT_WEBHOOK_RENEW_BEFORE_HOURS: i64 = 24;
pub const WEBHOOK_TTL_HOURS: i64 = 72;
