//! Shared helpers for `cadence-infra` integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use cadence_core::CredentialVault;
use cadence_domain::{
    CadenceError, Calendar, CalendarEvent, CalendarProvider, EventFields, EventStatus,
    Integration, Result, SealedSecret, SyncStatus,
};
use cadence_infra::database::{DbManager, SqliteEventStore};
use cadence_infra::HttpClient;
use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
use parking_lot::Mutex;
use tempfile::TempDir;
use uuid::Uuid;

/// Temporary database wrapper that keeps the underlying file alive for the
/// duration of a test run.
pub struct TestDatabase {
    pub manager: Arc<DbManager>,
    _temp_dir: TempDir,
}

impl TestDatabase {
    /// Create a new temporary database with the schema applied.
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("temp dir should be created");
        let db_path = temp_dir.path().join("cadence-test.db");

        let manager = DbManager::new(&db_path, 4).expect("db manager should be created");
        manager.run_migrations().expect("schema should apply");

        Self { manager: Arc::new(manager), _temp_dir: temp_dir }
    }

    pub fn store(&self) -> Arc<SqliteEventStore> {
        Arc::new(SqliteEventStore::new(Arc::clone(&self.manager)))
    }
}

impl Default for TestDatabase {
    fn default() -> Self {
        Self::new()
    }
}

/// Credential vault keeping plaintext in memory.
#[derive(Default)]
pub struct MemoryVault {
    secrets: Mutex<HashMap<String, String>>,
}

impl MemoryVault {
    pub fn with(entries: &[(&str, &str)]) -> Self {
        let vault = Self::default();
        for (key, value) in entries {
            vault.secrets.lock().insert((*key).to_string(), (*value).to_string());
        }
        vault
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.secrets.lock().get(key).cloned()
    }
}

impl CredentialVault for MemoryVault {
    fn seal(&self, key: &str, plaintext: &str) -> Result<SealedSecret> {
        self.secrets.lock().insert(key.to_string(), plaintext.to_string());
        Ok(SealedSecret::new(key))
    }

    fn open(&self, secret: &SealedSecret) -> Result<String> {
        self.get(secret.reference())
            .ok_or_else(|| CadenceError::NotFound(format!("secret {}", secret.reference())))
    }

    fn remove(&self, secret: &SealedSecret) -> Result<()> {
        self.secrets.lock().remove(secret.reference());
        Ok(())
    }
}

/// Client with a single attempt and a short timeout so failures surface fast.
pub fn fast_http() -> HttpClient {
    HttpClient::builder()
        .timeout(Duration::from_secs(2))
        .max_attempts(1)
        .build()
        .expect("http client should build")
}

/// Client that retries transient failures with millisecond backoff.
pub fn retrying_http(attempts: u32) -> HttpClient {
    HttpClient::builder()
        .timeout(Duration::from_secs(2))
        .max_attempts(attempts)
        .base_backoff(Duration::from_millis(5))
        .max_backoff(Duration::from_millis(20))
        .build()
        .expect("http client should build")
}

pub fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 3, 8, 0, 0).unwrap()
}

pub fn at(day_offset: i64, hour: u32, minute: u32) -> DateTime<Utc> {
    let day = base_time().date_naive() + ChronoDuration::days(day_offset);
    Utc.from_utc_datetime(&day.and_hms_opt(hour, minute, 0).unwrap())
}

pub fn integration(user_id: Uuid, provider: CalendarProvider) -> Integration {
    let id = Uuid::now_v7();
    Integration {
        id,
        user_id,
        provider,
        account_email: Some("alex@example.com".into()),
        access_token: SealedSecret::new(format!("integration/{id}/access_token")),
        refresh_token: Some(SealedSecret::new(format!("integration/{id}/refresh_token"))),
        token_expires_at: Some(Utc::now() + ChronoDuration::hours(1)),
        is_active: true,
        sync_status: SyncStatus::Completed,
        last_error: None,
        created_at: base_time(),
        updated_at: base_time(),
    }
}

pub fn calendar(user_id: Uuid, integration: &Integration, external_id: &str) -> Calendar {
    Calendar {
        id: Uuid::now_v7(),
        user_id,
        name: "Work".into(),
        provider: integration.provider,
        external_calendar_id: Some(external_id.into()),
        integration_id: Some(integration.id),
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

pub fn fields(title: &str, start: DateTime<Utc>, end: DateTime<Utc>) -> EventFields {
    EventFields {
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
        external_recurring_id: None,
        remote_updated_at: None,
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
        sync_status: SyncStatus::Pending,
        task_id: None,
        is_deleted: false,
        created_at: base_time(),
        updated_at: base_time(),
        last_synced_at: None,
    }
}
