//! Fixture builders

use cadence_domain::{
    Calendar, CalendarEvent, CalendarProvider, EventStatus, Integration, SealedSecret,
    SyncStatus,
};
use chrono::{DateTime, Duration, TimeZone, Utc};
use uuid::Uuid;

pub fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 3, 8, 0, 0).unwrap()
}

/// `base_time()` shifted to a wall-clock hour/minute on `day_offset`.
pub fn at(day_offset: i64, hour: u32, minute: u32) -> DateTime<Utc> {
    let day = base_time().date_naive() + Duration::days(day_offset);
    Utc.from_utc_datetime(&day.and_hms_opt(hour, minute, 0).unwrap())
}

pub fn user() -> Uuid {
    Uuid::from_u128(0xA11CE)
}

pub fn integration(user_id: Uuid) -> Integration {
    Integration {
        id: Uuid::now_v7(),
        user_id,
        provider: CalendarProvider::Google,
        account_email: Some("alex@example.com".into()),
        access_token: SealedSecret::new("access-ref"),
        refresh_token: Some(SealedSecret::new("refresh-ref")),
        token_expires_at: Some(base_time() + Duration::hours(1)),
        is_active: true,
        sync_status: SyncStatus::Completed,
        last_error: None,
        created_at: base_time(),
        updated_at: base_time(),
    }
}

pub fn google_calendar(user_id: Uuid, integration_id: Uuid) -> Calendar {
    Calendar {
        id: Uuid::now_v7(),
        user_id,
        name: "Work".into(),
        provider: CalendarProvider::Google,
        external_calendar_id: Some("primary".into()),
        integration_id: Some(integration_id),
        is_primary: true,
        timezone: "UTC".into(),
        sync_status: SyncStatus::Pending,
        sync_token: None,
        last_sync_at: None,
        sync_started_at: None,
        webhook: None,
        created_at: base_time(),
        updated_at: base_time(),
    }
}

pub fn internal_calendar(user_id: Uuid) -> Calendar {
    Calendar {
        id: Uuid::now_v7(),
        user_id,
        name: "Personal".into(),
        provider: CalendarProvider::Internal,
        external_calendar_id: None,
        integration_id: None,
        is_primary: false,
        timezone: "UTC".into(),
        sync_status: SyncStatus::Pending,
        sync_token: None,
        last_sync_at: None,
        sync_started_at: None,
        webhook: None,
        created_at: base_time(),
        updated_at: base_time(),
    }
}

pub fn local_event(
    calendar: &Calendar,
    title: &str,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> CalendarEvent {
    CalendarEvent {
        id: Uuid::now_v7(),
        calendar_id: calendar.id,
        user_id: calendar.user_id,
        title: title.into(),
        description: None,
        location: None,
        start_time: start,
        end_time: end,
        all_day: false,
        timezone: "UTC".into(),
        status: EventStatus::Confirmed,
        attendees: vec![],
        reminders: vec![],
        recurrence: vec![],
        recurring_event_id: None,
        external_event_id: None,
        sync_status: SyncStatus::Completed,
        task_id: None,
        is_deleted: false,
        created_at: base_time(),
        updated_at: base_time(),
        last_synced_at: None,
    }
}
