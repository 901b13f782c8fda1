//! Calendar event model
//!
//! `CalendarEvent` is the reconciled entity shared by local edits, provider
//! imports and task binding. `EventFields` is the provider-independent subset
//! that adapters map to and from.

use chrono::{DateTime, Duration, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::{CadenceError, Result};
use crate::impl_domain_status_conversions;

/// Sync state shared by calendars, integrations and events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
    Conflict,
}

impl_domain_status_conversions!(SyncStatus {
    Pending => "pending",
    InProgress => "in_progress",
    Completed => "completed",
    Failed => "failed",
    Conflict => "conflict",
});

impl SyncStatus {
    /// States from which a new sync run may claim a calendar.
    pub fn can_begin_run(self) -> bool {
        matches!(self, Self::Pending | Self::Failed | Self::Completed)
    }
}

/// Event status as seen by attendees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventStatus {
    Confirmed,
    Tentative,
    Cancelled,
}

impl_domain_status_conversions!(EventStatus {
    Confirmed => "confirmed",
    Tentative => "tentative",
    Cancelled => "cancelled",
});

/// Attendee response state, normalised across providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttendeeResponse {
    NeedsAction,
    Accepted,
    Declined,
    Tentative,
}

impl_domain_status_conversions!(AttendeeResponse {
    NeedsAction => "needs_action",
    Accepted => "accepted",
    Declined => "declined",
    Tentative => "tentative",
});

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attendee {
    pub email: String,
    pub display_name: Option<String>,
    pub response: AttendeeResponse,
    pub optional: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReminderMethod {
    Popup,
    Email,
}

impl_domain_status_conversions!(ReminderMethod {
    Popup => "popup",
    Email => "email",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reminder {
    pub method: ReminderMethod,
    pub minutes_before: i64,
}

/// Half-open time range `[start, end)` with `start < end` enforced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeRange {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl TimeRange {
    /// Build a range, rejecting empty or inverted ones.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self> {
        if start >= end {
            return Err(CadenceError::InvalidInput(format!(
                "start_time ({start}) must be before end_time ({end})"
            )));
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    /// Two ranges overlap iff `a.start < b.end && b.start < a.end`.
    /// Touching ranges (one ends exactly when the other starts) do not.
    pub fn overlaps(&self, other: &TimeRange) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// Length of the intersection, zero when the ranges do not overlap.
    pub fn overlap_with(&self, other: &TimeRange) -> Duration {
        if !self.overlaps(other) {
            return Duration::zero();
        }
        self.end.min(other.end) - self.start.max(other.start)
    }

    /// Clip the range to a window, `None` when nothing is left.
    pub fn clip(&self, window: &TimeRange) -> Option<TimeRange> {
        let start = self.start.max(window.start);
        let end = self.end.min(window.end);
        (start < end).then_some(TimeRange { start, end })
    }
}

/// Provider-independent event payload produced by `to_internal` and consumed
/// by `upsert_event`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventFields {
    pub title: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub all_day: bool,
    pub timezone: String,
    pub status: EventStatus,
    pub attendees: Vec<Attendee>,
    pub reminders: Vec<Reminder>,
    /// RRULE/EXDATE lines, kept verbatim; recurrence is not expanded.
    pub recurrence: Vec<String>,
    /// Provider id of the series master when this is an instance.
    pub external_recurring_id: Option<String>,
    /// Last modification time reported by the provider.
    pub remote_updated_at: Option<DateTime<Utc>>,
}

impl EventFields {
    /// Drop sub-second precision. Stored timestamps are whole seconds, so a
    /// range is only valid if it survives this.
    pub fn truncated_to_seconds(mut self) -> Self {
        self.start_time = self.start_time.trunc_subsecs(0);
        self.end_time = self.end_time.trunc_subsecs(0);
        self.remote_updated_at = self.remote_updated_at.map(|at| at.trunc_subsecs(0));
        self
    }

    /// Reject payloads that would violate the event time invariant.
    pub fn validate(&self) -> Result<()> {
        TimeRange::new(self.start_time, self.end_time).map(|_| ())?;
        if self.timezone.trim().is_empty() {
            return Err(CadenceError::InvalidInput("event timezone must not be empty".into()));
        }
        Ok(())
    }

    pub fn range(&self) -> Result<TimeRange> {
        TimeRange::new(self.start_time, self.end_time)
    }
}

/// The core reconciled entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarEvent {
    pub id: Uuid,
    pub calendar_id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub all_day: bool,
    pub timezone: String,
    pub status: EventStatus,
    pub attendees: Vec<Attendee>,
    pub reminders: Vec<Reminder>,
    pub recurrence: Vec<String>,
    /// Local id of the series master for recurring instances.
    pub recurring_event_id: Option<Uuid>,
    /// Provider id; `None` until the first successful export.
    pub external_event_id: Option<String>,
    pub sync_status: SyncStatus,
    /// Weak back-reference to the task this event was derived from.
    pub task_id: Option<Uuid>,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_synced_at: Option<DateTime<Utc>>,
}

impl CalendarEvent {
    /// Time range of the event. Persisted events always satisfy the invariant,
    /// so this only fails for values built by hand.
    pub fn range(&self) -> Result<TimeRange> {
        TimeRange::new(self.start_time, self.end_time)
    }

    pub fn duration(&self) -> Duration {
        self.end_time - self.start_time
    }

    /// Event still occupies time (not cancelled, not deleted).
    pub fn is_active(&self) -> bool {
        !self.is_deleted && self.status != EventStatus::Cancelled
    }

    /// Trimmed, lowercased location; `None` when blank.
    pub fn normalized_location(&self) -> Option<String> {
        normalize_location(self.location.as_deref())
    }

    /// Copy of the provider-facing fields.
    pub fn fields(&self) -> EventFields {
        EventFields {
            title: self.title.clone(),
            description: self.description.clone(),
            location: self.location.clone(),
            start_time: self.start_time,
            end_time: self.end_time,
            all_day: self.all_day,
            timezone: self.timezone.clone(),
            status: self.status,
            attendees: self.attendees.clone(),
            reminders: self.reminders.clone(),
            recurrence: self.recurrence.clone(),
            external_recurring_id: None,
            remote_updated_at: None,
        }
    }
}

/// Normalise a free-text location for grouping (case-insensitive, trimmed).
pub fn normalize_location(location: Option<&str>) -> Option<String> {
    location.map(str::trim).filter(|l| !l.is_empty()).map(str::to_lowercase)
}

/// New locally-owned event, not yet persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct NewEvent {
    pub calendar_id: Uuid,
    pub user_id: Uuid,
    pub fields: EventFields,
    pub task_id: Option<Uuid>,
    pub sync_status: SyncStatus,
}

/// Outcome of an idempotent upsert keyed by `(calendar_id, external_event_id)`.
#[derive(Debug, Clone, PartialEq)]
pub enum UpsertOutcome {
    Created(CalendarEvent),
    Updated(CalendarEvent),
}

impl UpsertOutcome {
    pub fn event(&self) -> &CalendarEvent {
        match self {
            Self::Created(event) | Self::Updated(event) => event,
        }
    }
}
