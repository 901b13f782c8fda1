//! Task to event derivation
//!
//! Binding is one-directional: tasks produce events, events never produce
//! tasks.

use cadence_domain::constants::TASK_EVENT_TITLE_PREFIX;
use cadence_domain::{CalendarEvent, EventFields, EventStatus, SyncConfig, Task, TaskDue};
use chrono::{DateTime, Duration, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use tracing::warn;

/// Event fields for a task, `None` when the task has no due date.
///
/// Date-only due dates start at the configured hour in the calendar's
/// timezone. Duration comes from `estimated_hours`, falling back to the
/// configured default. Estimates too large to represent also fall back;
/// a task whose end would overflow the calendar range yields `None`.
pub fn task_event_fields(task: &Task, tz: Tz, config: &SyncConfig) -> Option<EventFields> {
    let start = match task.due? {
        TaskDue::DateTime(at) => at,
        TaskDue::Date(date) => {
            let time = NaiveTime::from_hms_opt(config.task_default_start_hour, 0, 0)?;
            local_to_utc(tz, date.and_time(time))?
        }
    };

    let estimate = task
        .estimated_hours
        .filter(|hours| hours.is_finite() && *hours > 0.0)
        .map(|hours| Duration::try_minutes((hours * 60.0).round() as i64));
    let duration = match estimate {
        Some(Some(duration)) if duration > Duration::zero() => duration,
        Some(None) => {
            warn!(
                task_id = %task.id,
                hours = ?task.estimated_hours,
                "Task estimate out of range, using default duration"
            );
            default_duration(config)?
        }
        _ => default_duration(config)?,
    };
    let Some(end_time) = start.checked_add_signed(duration) else {
        warn!(task_id = %task.id, %start, "Task event end out of range, skipping");
        return None;
    };

    Some(EventFields {
        title: format!("{TASK_EVENT_TITLE_PREFIX}{}", task.title),
        description: task.description.clone(),
        location: None,
        start_time: start,
        end_time,
        all_day: false,
        timezone: tz.name().to_string(),
        status: EventStatus::Confirmed,
        attendees: Vec::new(),
        reminders: Vec::new(),
        recurrence: Vec::new(),
        external_recurring_id: None,
        remote_updated_at: None,
    })
}

fn default_duration(config: &SyncConfig) -> Option<Duration> {
    Duration::try_minutes(config.task_default_duration_minutes)
        .filter(|duration| *duration > Duration::zero())
}

/// Resolve a local wall-clock time; the earlier instant wins across a DST
/// fold and a gap shifts forward by an hour.
fn local_to_utc(tz: Tz, local: chrono::NaiveDateTime) -> Option<DateTime<Utc>> {
    tz.from_local_datetime(&local)
        .earliest()
        .or_else(|| {
            let shifted = local.checked_add_signed(Duration::hours(1))?;
            tz.from_local_datetime(&shifted).earliest()
        })
        .map(|at| at.with_timezone(&Utc))
}

/// Bound event predates the last task edit.
pub fn is_stale(event: &CalendarEvent, task: &Task) -> bool {
    event.updated_at < task.updated_at
}

/// Overwrite the task-derived fields of a bound event.
pub fn apply_task_fields(event: &mut CalendarEvent, fields: &EventFields) {
    event.title = fields.title.clone();
    event.description = fields.description.clone();
    event.start_time = fields.start_time;
    event.end_time = fields.end_time;
    event.timezone = fields.timezone.clone();
}
