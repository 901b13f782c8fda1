//! Append-only audit record of one sync run

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::event::SyncStatus;

/// Aggregated counters of a sync run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncCounters {
    pub processed: usize,
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
    pub exported: usize,
    pub conflicts_detected: usize,
    pub errors: Vec<String>,
}

impl SyncCounters {
    pub fn absorb(&mut self, other: &SyncCounters) {
        self.processed += other.processed;
        self.created += other.created;
        self.updated += other.updated;
        self.deleted += other.deleted;
        self.exported += other.exported;
        self.conflicts_detected += other.conflicts_detected;
        self.errors.extend(other.errors.iter().cloned());
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncLog {
    pub id: Uuid,
    pub calendar_id: Uuid,
    pub user_id: Uuid,
    pub full_sync: bool,
    pub status: SyncStatus,
    pub counters: SyncCounters,
    pub error_message: Option<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub duration_ms: Option<i64>,
}

impl SyncLog {
    pub fn start(calendar_id: Uuid, user_id: Uuid, full_sync: bool, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::now_v7(),
            calendar_id,
            user_id,
            full_sync,
            status: SyncStatus::InProgress,
            counters: SyncCounters::default(),
            error_message: None,
            started_at: now,
            completed_at: None,
            duration_ms: None,
        }
    }

    /// Seal the log as completed. A sealed log is never changed again.
    pub fn complete(mut self, counters: SyncCounters, now: DateTime<Utc>) -> Self {
        self.status = SyncStatus::Completed;
        self.counters = counters;
        self.seal(now)
    }

    pub fn fail(mut self, counters: SyncCounters, message: String, now: DateTime<Utc>) -> Self {
        self.status = SyncStatus::Failed;
        self.counters = counters;
        self.error_message = Some(message);
        self.seal(now)
    }

    fn seal(mut self, now: DateTime<Utc>) -> Self {
        self.completed_at = Some(now);
        self.duration_ms = Some((now - self.started_at).num_milliseconds().max(0));
        self
    }
}
