//! Column codecs and row mappers shared by the SQLite repositories.
//!
//! Timestamps are stored as unix seconds, ids as hyphenated UUID text,
//! status enums by their lowercase names and nested lists as JSON text.

use std::str::FromStr;

use cadence_domain::{
    Calendar, CalendarConflict, CalendarEvent, Integration, SealedSecret, SyncCounters, SyncLog,
    Task, TaskDue, TimeBlock, WebhookSubscription,
};
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use rusqlite::types::Type;
use rusqlite::{Error as SqlError, Row};
use serde::de::DeserializeOwned;
use uuid::Uuid;

pub(crate) fn ts(value: DateTime<Utc>) -> i64 {
    value.timestamp()
}

pub(crate) fn opt_ts(value: Option<DateTime<Utc>>) -> Option<i64> {
    value.map(ts)
}

pub(crate) fn bool_to_int(value: bool) -> i64 {
    i64::from(value)
}

fn conversion_error(
    idx: usize,
    ty: Type,
    err: impl Into<Box<dyn std::error::Error + Send + Sync>>,
) -> SqlError {
    SqlError::FromSqlConversionFailure(idx, ty, err.into())
}

fn parse_ts(idx: usize, secs: i64) -> rusqlite::Result<DateTime<Utc>> {
    Utc.timestamp_opt(secs, 0).single().ok_or_else(|| {
        conversion_error(idx, Type::Integer, format!("timestamp out of range: {secs}"))
    })
}

pub(crate) fn get_ts(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    parse_ts(idx, row.get(idx)?)
}

pub(crate) fn get_opt_ts(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    row.get::<_, Option<i64>>(idx)?.map(|secs| parse_ts(idx, secs)).transpose()
}

pub(crate) fn get_uuid(row: &Row<'_>, idx: usize) -> rusqlite::Result<Uuid> {
    let raw: String = row.get(idx)?;
    Uuid::parse_str(&raw).map_err(|err| conversion_error(idx, Type::Text, err))
}

pub(crate) fn get_opt_uuid(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<Uuid>> {
    row.get::<_, Option<String>>(idx)?
        .map(|raw| Uuid::parse_str(&raw).map_err(|err| conversion_error(idx, Type::Text, err)))
        .transpose()
}

pub(crate) fn get_enum<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr<Err = String>,
{
    let raw: String = row.get(idx)?;
    raw.parse().map_err(|err: String| conversion_error(idx, Type::Text, err))
}

pub(crate) fn get_opt_enum<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<T>>
where
    T: FromStr<Err = String>,
{
    row.get::<_, Option<String>>(idx)?
        .map(|raw| raw.parse().map_err(|err: String| conversion_error(idx, Type::Text, err)))
        .transpose()
}

pub(crate) fn get_json<T: DeserializeOwned>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw).map_err(|err| conversion_error(idx, Type::Text, err))
}

// ============================================================================
// Calendars
// ============================================================================

pub(crate) const CALENDAR_COLUMNS: &str = "id, user_id, name, provider, external_calendar_id,
        integration_id, is_primary, timezone, sync_status, sync_token, last_sync_at,
        sync_started_at, webhook_subscription_id, webhook_resource_id, webhook_channel_token,
        webhook_callback_url, webhook_expires_at, created_at, updated_at";

pub(crate) fn map_calendar_row(row: &Row<'_>) -> rusqlite::Result<Calendar> {
    let subscription_id: Option<String> = row.get(12)?;
    let webhook = match subscription_id {
        Some(subscription_id) => Some(WebhookSubscription {
            subscription_id,
            resource_id: row.get(13)?,
            channel_token: row.get::<_, Option<String>>(14)?.unwrap_or_default(),
            callback_url: row.get::<_, Option<String>>(15)?.unwrap_or_default(),
            expires_at: get_opt_ts(row, 16)?.unwrap_or_else(|| DateTime::<Utc>::UNIX_EPOCH),
        }),
        None => None,
    };

    Ok(Calendar {
        id: get_uuid(row, 0)?,
        user_id: get_uuid(row, 1)?,
        name: row.get(2)?,
        provider: get_enum(row, 3)?,
        external_calendar_id: row.get(4)?,
        integration_id: get_opt_uuid(row, 5)?,
        is_primary: row.get(6)?,
        timezone: row.get(7)?,
        sync_status: get_enum(row, 8)?,
        sync_token: row.get(9)?,
        last_sync_at: get_opt_ts(row, 10)?,
        sync_started_at: get_opt_ts(row, 11)?,
        webhook,
        created_at: get_ts(row, 17)?,
        updated_at: get_ts(row, 18)?,
    })
}

// ============================================================================
// Integrations
// ============================================================================

pub(crate) const INTEGRATION_COLUMNS: &str = "id, user_id, provider, account_email,
        access_token_ref, refresh_token_ref, token_expires_at, is_active, sync_status,
        last_error, created_at, updated_at";

pub(crate) fn map_integration_row(row: &Row<'_>) -> rusqlite::Result<Integration> {
    Ok(Integration {
        id: get_uuid(row, 0)?,
        user_id: get_uuid(row, 1)?,
        provider: get_enum(row, 2)?,
        account_email: row.get(3)?,
        access_token: SealedSecret::new(row.get::<_, String>(4)?),
        refresh_token: row.get::<_, Option<String>>(5)?.map(SealedSecret::new),
        token_expires_at: get_opt_ts(row, 6)?,
        is_active: row.get(7)?,
        sync_status: get_enum(row, 8)?,
        last_error: row.get(9)?,
        created_at: get_ts(row, 10)?,
        updated_at: get_ts(row, 11)?,
    })
}

// ============================================================================
// Events
// ============================================================================

pub(crate) const EVENT_COLUMNS: &str = "id, calendar_id, user_id, title, description, location,
        start_time, end_time, all_day, timezone, status, attendees, reminders, recurrence,
        recurring_event_id, external_event_id, sync_status, task_id, is_deleted, created_at,
        updated_at, last_synced_at";

pub(crate) fn map_event_row(row: &Row<'_>) -> rusqlite::Result<CalendarEvent> {
    Ok(CalendarEvent {
        id: get_uuid(row, 0)?,
        calendar_id: get_uuid(row, 1)?,
        user_id: get_uuid(row, 2)?,
        title: row.get(3)?,
        description: row.get(4)?,
        location: row.get(5)?,
        start_time: get_ts(row, 6)?,
        end_time: get_ts(row, 7)?,
        all_day: row.get(8)?,
        timezone: row.get(9)?,
        status: get_enum(row, 10)?,
        attendees: get_json(row, 11)?,
        reminders: get_json(row, 12)?,
        recurrence: get_json(row, 13)?,
        recurring_event_id: get_opt_uuid(row, 14)?,
        external_event_id: row.get(15)?,
        sync_status: get_enum(row, 16)?,
        task_id: get_opt_uuid(row, 17)?,
        is_deleted: row.get(18)?,
        created_at: get_ts(row, 19)?,
        updated_at: get_ts(row, 20)?,
        last_synced_at: get_opt_ts(row, 21)?,
    })
}

// ============================================================================
// Conflicts
// ============================================================================

pub(crate) const CONFLICT_COLUMNS: &str = "id, user_id, event1_id, event2_id, conflict_type,
        severity, overlap_minutes, is_resolved, resolution_type, resolution_notes, resolved_by,
        resolved_at, detected_at, updated_at";

pub(crate) fn map_conflict_row(row: &Row<'_>) -> rusqlite::Result<CalendarConflict> {
    Ok(CalendarConflict {
        id: get_uuid(row, 0)?,
        user_id: get_uuid(row, 1)?,
        event1_id: get_uuid(row, 2)?,
        event2_id: get_uuid(row, 3)?,
        conflict_type: get_enum(row, 4)?,
        severity: get_enum(row, 5)?,
        overlap_minutes: row.get(6)?,
        is_resolved: row.get(7)?,
        resolution_type: get_opt_enum(row, 8)?,
        resolution_notes: row.get(9)?,
        resolved_by: get_opt_uuid(row, 10)?,
        resolved_at: get_opt_ts(row, 11)?,
        detected_at: get_ts(row, 12)?,
        updated_at: get_ts(row, 13)?,
    })
}

// ============================================================================
// Sync logs, time blocks, tasks
// ============================================================================

pub(crate) const SYNC_LOG_COLUMNS: &str = "id, calendar_id, user_id, full_sync, status,
        processed, created, updated, deleted, exported, conflicts_detected, errors,
        error_message, started_at, completed_at, duration_ms";

fn get_count(row: &Row<'_>, idx: usize) -> rusqlite::Result<usize> {
    let value: i64 = row.get(idx)?;
    usize::try_from(value).map_err(|err| conversion_error(idx, Type::Integer, err))
}

pub(crate) fn map_sync_log_row(row: &Row<'_>) -> rusqlite::Result<SyncLog> {
    Ok(SyncLog {
        id: get_uuid(row, 0)?,
        calendar_id: get_uuid(row, 1)?,
        user_id: get_uuid(row, 2)?,
        full_sync: row.get(3)?,
        status: get_enum(row, 4)?,
        counters: SyncCounters {
            processed: get_count(row, 5)?,
            created: get_count(row, 6)?,
            updated: get_count(row, 7)?,
            deleted: get_count(row, 8)?,
            exported: get_count(row, 9)?,
            conflicts_detected: get_count(row, 10)?,
            errors: get_json(row, 11)?,
        },
        error_message: row.get(12)?,
        started_at: get_ts(row, 13)?,
        completed_at: get_opt_ts(row, 14)?,
        duration_ms: row.get(15)?,
    })
}

pub(crate) const TIME_BLOCK_COLUMNS: &str = "id, user_id, kind, title, start_time, end_time";

pub(crate) fn map_time_block_row(row: &Row<'_>) -> rusqlite::Result<TimeBlock> {
    Ok(TimeBlock {
        id: get_uuid(row, 0)?,
        user_id: get_uuid(row, 1)?,
        kind: get_enum(row, 2)?,
        title: row.get(3)?,
        start_time: get_ts(row, 4)?,
        end_time: get_ts(row, 5)?,
    })
}

pub(crate) const TASK_COLUMNS: &str =
    "id, user_id, title, description, due_date, due_at, estimated_hours, is_completed, updated_at";

/// `due_at` wins over `due_date` when both are set.
pub(crate) fn map_task_row(row: &Row<'_>) -> rusqlite::Result<Task> {
    let due_date: Option<String> = row.get(4)?;
    let due = match get_opt_ts(row, 5)? {
        Some(at) => Some(TaskDue::DateTime(at)),
        None => due_date
            .map(|raw| {
                NaiveDate::parse_from_str(&raw, "%Y-%m-%d")
                    .map(TaskDue::Date)
                    .map_err(|err| conversion_error(4, Type::Text, err))
            })
            .transpose()?,
    };

    Ok(Task {
        id: get_uuid(row, 0)?,
        user_id: get_uuid(row, 1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        due,
        estimated_hours: row.get(6)?,
        is_completed: row.get(7)?,
        updated_at: get_ts(row, 8)?,
    })
}
