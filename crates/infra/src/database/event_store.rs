//! SQLite-backed implementation of the `EventStore` port.
//!
//! Every port call runs on the blocking pool with its own pooled connection.
//! Multi-statement operations (upsert, conflict merge, resolution commit)
//! run inside a single transaction.

use std::sync::Arc;

use async_trait::async_trait;
use cadence_core::sync::ports::{EventStore, ResolutionCommit};
use cadence_domain::{
    CadenceError, Calendar, CalendarConflict, CalendarEvent, CalendarProvider, DetectedConflict,
    EventFields, Integration, NewEvent, RefreshedCredentials, Result as DomainResult, SyncLog,
    SyncStatus, TimeBlock, TimeRange, UpsertOutcome, WebhookSubscription,
};
use chrono::{DateTime, Duration, Utc};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use serde::Serialize;
use tokio::task;
use tracing::{debug, instrument};
use uuid::Uuid;

use super::manager::DbManager;
use super::rows::{
    bool_to_int, map_calendar_row, map_conflict_row, map_event_row, map_integration_row,
    map_sync_log_row, map_time_block_row, opt_ts, ts, CALENDAR_COLUMNS, CONFLICT_COLUMNS,
    EVENT_COLUMNS, INTEGRATION_COLUMNS, SYNC_LOG_COLUMNS, TIME_BLOCK_COLUMNS,
};
use crate::errors::InfraError;

/// SQLite event store shared by the sync, conflict and availability services.
pub struct SqliteEventStore {
    db: Arc<DbManager>,
}

impl SqliteEventStore {
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }

    async fn with_conn<T, F>(&self, op: F) -> DomainResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> DomainResult<T> + Send + 'static,
    {
        let db = Arc::clone(&self.db);
        task::spawn_blocking(move || -> DomainResult<T> {
            let mut conn = db.get_connection()?;
            op(&mut conn)
        })
        .await
        .map_err(map_join_error)?
    }

    // ------------------------------------------------------------------------
    // Provisioning helpers (not part of the port)
    // ------------------------------------------------------------------------

    pub async fn insert_calendar(&self, calendar: &Calendar) -> DomainResult<()> {
        let calendar = calendar.clone();
        self.with_conn(move |conn| {
            let webhook = calendar.webhook.as_ref();
            conn.execute(
                "INSERT INTO calendars (
                    id, user_id, name, provider, external_calendar_id, integration_id,
                    is_primary, timezone, sync_status, sync_token, last_sync_at,
                    sync_started_at, webhook_subscription_id, webhook_resource_id,
                    webhook_channel_token, webhook_callback_url, webhook_expires_at,
                    created_at, updated_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15,
                          ?16, ?17, ?18, ?19)",
                params![
                    calendar.id.to_string(),
                    calendar.user_id.to_string(),
                    calendar.name,
                    calendar.provider.as_str(),
                    calendar.external_calendar_id,
                    calendar.integration_id.map(|id| id.to_string()),
                    bool_to_int(calendar.is_primary),
                    calendar.timezone,
                    calendar.sync_status.as_str(),
                    calendar.sync_token,
                    opt_ts(calendar.last_sync_at),
                    opt_ts(calendar.sync_started_at),
                    webhook.map(|w| w.subscription_id.clone()),
                    webhook.and_then(|w| w.resource_id.clone()),
                    webhook.map(|w| w.channel_token.clone()),
                    webhook.map(|w| w.callback_url.clone()),
                    webhook.map(|w| ts(w.expires_at)),
                    ts(calendar.created_at),
                    ts(calendar.updated_at),
                ],
            )
            .map_err(map_sql_error)?;
            Ok(())
        })
        .await
    }

    pub async fn insert_integration(&self, integration: &Integration) -> DomainResult<()> {
        let integration = integration.clone();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO integrations (
                    id, user_id, provider, account_email, access_token_ref, refresh_token_ref,
                    token_expires_at, is_active, sync_status, last_error, created_at, updated_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                params![
                    integration.id.to_string(),
                    integration.user_id.to_string(),
                    integration.provider.as_str(),
                    integration.account_email,
                    integration.access_token.reference(),
                    integration.refresh_token.as_ref().map(|r| r.reference().to_string()),
                    opt_ts(integration.token_expires_at),
                    bool_to_int(integration.is_active),
                    integration.sync_status.as_str(),
                    integration.last_error,
                    ts(integration.created_at),
                    ts(integration.updated_at),
                ],
            )
            .map_err(map_sql_error)?;
            Ok(())
        })
        .await
    }

    pub async fn insert_time_block(&self, block: &TimeBlock) -> DomainResult<()> {
        block.range()?;
        let block = block.clone();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO time_blocks (id, user_id, kind, title, start_time, end_time)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    block.id.to_string(),
                    block.user_id.to_string(),
                    block.kind.as_str(),
                    block.title,
                    ts(block.start_time),
                    ts(block.end_time),
                ],
            )
            .map_err(map_sql_error)?;
            Ok(())
        })
        .await
    }

    /// Sync logs of one calendar, newest first.
    pub async fn get_sync_logs(&self, calendar_id: Uuid) -> DomainResult<Vec<SyncLog>> {
        self.with_conn(move |conn| {
            let sql = format!(
                "SELECT {SYNC_LOG_COLUMNS} FROM sync_logs WHERE calendar_id = ?1
                 ORDER BY started_at DESC, id DESC"
            );
            let mut stmt = conn.prepare(&sql).map_err(map_sql_error)?;
            let logs = stmt
                .query_map([calendar_id.to_string()], map_sync_log_row)
                .map_err(map_sql_error)?
                .collect::<rusqlite::Result<Vec<_>>>()
                .map_err(map_sql_error)?;
            Ok(logs)
        })
        .await
    }
}

#[async_trait]
impl EventStore for SqliteEventStore {
    // ------------------------------------------------------------------------
    // Calendars
    // ------------------------------------------------------------------------

    async fn get_calendar(&self, calendar_id: Uuid) -> DomainResult<Option<Calendar>> {
        self.with_conn(move |conn| fetch_calendar(conn, calendar_id)).await
    }

    async fn get_calendars_by_user(&self, user_id: Uuid) -> DomainResult<Vec<Calendar>> {
        self.with_conn(move |conn| {
            let sql = format!(
                "SELECT {CALENDAR_COLUMNS} FROM calendars WHERE user_id = ?1
                 ORDER BY is_primary DESC, created_at, id"
            );
            query_all(conn, &sql, [user_id.to_string()], map_calendar_row)
        })
        .await
    }

    async fn find_calendar_by_webhook(
        &self,
        provider: CalendarProvider,
        subscription_id: &str,
    ) -> DomainResult<Option<Calendar>> {
        let subscription_id = subscription_id.to_string();
        self.with_conn(move |conn| {
            let sql = format!(
                "SELECT {CALENDAR_COLUMNS} FROM calendars
                 WHERE provider = ?1 AND webhook_subscription_id = ?2 LIMIT 1"
            );
            conn.query_row(&sql, params![provider.as_str(), subscription_id], map_calendar_row)
                .optional()
                .map_err(map_sql_error)
        })
        .await
    }

    #[instrument(skip(self))]
    async fn begin_sync(
        &self,
        calendar_id: Uuid,
        now: DateTime<Utc>,
        stale_after: Duration,
    ) -> DomainResult<bool> {
        self.with_conn(move |conn| {
            let changed = conn
                .execute(
                    "UPDATE calendars
                     SET sync_status = 'in_progress', sync_started_at = ?2, updated_at = ?2
                     WHERE id = ?1
                       AND (sync_status IN ('pending', 'failed', 'completed')
                            OR (sync_status = 'in_progress' AND sync_started_at <= ?3))",
                    params![calendar_id.to_string(), ts(now), ts(now - stale_after)],
                )
                .map_err(map_sql_error)?;

            if changed == 0 {
                ensure_calendar_exists(conn, calendar_id)?;
                debug!(%calendar_id, "calendar already claimed by another run");
            }
            Ok(changed == 1)
        })
        .await
    }

    async fn update_calendar_sync_state(
        &self,
        calendar_id: Uuid,
        sync_token: Option<&str>,
        synced_at: DateTime<Utc>,
    ) -> DomainResult<()> {
        let sync_token = sync_token.map(str::to_string);
        self.with_conn(move |conn| {
            let changed = conn
                .execute(
                    "UPDATE calendars
                     SET sync_token = COALESCE(?2, sync_token), last_sync_at = ?3,
                         sync_status = 'completed', sync_started_at = NULL, updated_at = ?3
                     WHERE id = ?1",
                    params![calendar_id.to_string(), sync_token, ts(synced_at)],
                )
                .map_err(map_sql_error)?;
            require_changed(changed, || format!("Calendar {calendar_id}"))
        })
        .await
    }

    async fn fail_calendar_sync(&self, calendar_id: Uuid) -> DomainResult<()> {
        self.with_conn(move |conn| {
            conn.execute(
                "UPDATE calendars
                 SET sync_status = 'failed', sync_started_at = NULL, updated_at = ?2
                 WHERE id = ?1",
                params![calendar_id.to_string(), ts(Utc::now())],
            )
            .map_err(map_sql_error)?;
            Ok(())
        })
        .await
    }

    async fn clear_sync_token(&self, calendar_id: Uuid) -> DomainResult<()> {
        self.with_conn(move |conn| {
            conn.execute(
                "UPDATE calendars SET sync_token = NULL, updated_at = ?2 WHERE id = ?1",
                params![calendar_id.to_string(), ts(Utc::now())],
            )
            .map_err(map_sql_error)?;
            Ok(())
        })
        .await
    }

    async fn save_webhook(
        &self,
        calendar_id: Uuid,
        subscription: Option<&WebhookSubscription>,
    ) -> DomainResult<()> {
        let subscription = subscription.cloned();
        self.with_conn(move |conn| {
            let sub = subscription.as_ref();
            conn.execute(
                "UPDATE calendars
                 SET webhook_subscription_id = ?2, webhook_resource_id = ?3,
                     webhook_channel_token = ?4, webhook_callback_url = ?5,
                     webhook_expires_at = ?6, updated_at = ?7
                 WHERE id = ?1",
                params![
                    calendar_id.to_string(),
                    sub.map(|s| s.subscription_id.clone()),
                    sub.and_then(|s| s.resource_id.clone()),
                    sub.map(|s| s.channel_token.clone()),
                    sub.map(|s| s.callback_url.clone()),
                    sub.map(|s| ts(s.expires_at)),
                    ts(Utc::now()),
                ],
            )
            .map_err(map_sql_error)?;
            Ok(())
        })
        .await
    }

    // ------------------------------------------------------------------------
    // Integrations
    // ------------------------------------------------------------------------

    async fn get_integration(&self, integration_id: Uuid) -> DomainResult<Option<Integration>> {
        self.with_conn(move |conn| {
            let sql = format!("SELECT {INTEGRATION_COLUMNS} FROM integrations WHERE id = ?1");
            conn.query_row(&sql, [integration_id.to_string()], map_integration_row)
                .optional()
                .map_err(map_sql_error)
        })
        .await
    }

    async fn get_active_integrations(&self, user_id: Uuid) -> DomainResult<Vec<Integration>> {
        self.with_conn(move |conn| {
            let sql = format!(
                "SELECT {INTEGRATION_COLUMNS} FROM integrations
                 WHERE user_id = ?1 AND is_active = 1 ORDER BY created_at, id"
            );
            query_all(conn, &sql, [user_id.to_string()], map_integration_row)
        })
        .await
    }

    async fn update_integration_credentials(
        &self,
        integration_id: Uuid,
        credentials: &RefreshedCredentials,
    ) -> DomainResult<()> {
        let credentials = credentials.clone();
        self.with_conn(move |conn| {
            let changed = conn
                .execute(
                    "UPDATE integrations
                     SET access_token_ref = ?2,
                         refresh_token_ref = COALESCE(?3, refresh_token_ref),
                         token_expires_at = ?4, last_error = NULL, updated_at = ?5
                     WHERE id = ?1",
                    params![
                        integration_id.to_string(),
                        credentials.access_token.reference(),
                        credentials.refresh_token.as_ref().map(|r| r.reference().to_string()),
                        ts(credentials.expires_at),
                        ts(Utc::now()),
                    ],
                )
                .map_err(map_sql_error)?;
            require_changed(changed, || format!("Integration {integration_id}"))
        })
        .await
    }

    #[instrument(skip(self))]
    async fn deactivate_integration(&self, integration_id: Uuid, reason: &str) -> DomainResult<()> {
        let reason = reason.to_string();
        self.with_conn(move |conn| {
            conn.execute(
                "UPDATE integrations
                 SET is_active = 0, sync_status = 'failed', last_error = ?2, updated_at = ?3
                 WHERE id = ?1",
                params![integration_id.to_string(), reason, ts(Utc::now())],
            )
            .map_err(map_sql_error)?;
            Ok(())
        })
        .await
    }

    // ------------------------------------------------------------------------
    // Events
    // ------------------------------------------------------------------------

    async fn get_event(&self, event_id: Uuid) -> DomainResult<Option<CalendarEvent>> {
        self.with_conn(move |conn| fetch_event(conn, event_id)).await
    }

    async fn find_event_by_external_id(
        &self,
        calendar_id: Uuid,
        external_event_id: &str,
    ) -> DomainResult<Option<CalendarEvent>> {
        let external_event_id = external_event_id.to_string();
        self.with_conn(move |conn| {
            fetch_event_by_external_id(conn, calendar_id, &external_event_id)
        })
        .await
    }

    async fn upsert_event(
        &self,
        calendar_id: Uuid,
        external_event_id: &str,
        fields: &EventFields,
        synced_at: DateTime<Utc>,
    ) -> DomainResult<UpsertOutcome> {
        fields.validate()?;
        let external_event_id = external_event_id.to_string();
        let fields = fields.clone();

        self.with_conn(move |conn| {
            let tx = conn.transaction().map_err(map_sql_error)?;

            let user_id: String = tx
                .query_row(
                    "SELECT user_id FROM calendars WHERE id = ?1",
                    [calendar_id.to_string()],
                    |row| row.get(0),
                )
                .optional()
                .map_err(map_sql_error)?
                .ok_or_else(|| CadenceError::NotFound(format!("Calendar {calendar_id}")))?;
            let user_id = Uuid::parse_str(&user_id)
                .map_err(|err| CadenceError::Database(format!("corrupt calendar user id: {err}")))?;

            let series_id = match fields.external_recurring_id.as_deref() {
                Some(master) => fetch_event_by_external_id(&tx, calendar_id, master)?.map(|e| e.id),
                None => None,
            };

            let outcome = match fetch_event_by_external_id(&tx, calendar_id, &external_event_id)? {
                Some(mut event) => {
                    let keep_series = fields.external_recurring_id.is_some();
                    apply_fields(&mut event, &fields);
                    event.recurring_event_id =
                        series_id.or(if keep_series { event.recurring_event_id } else { None });
                    event.is_deleted = false;
                    event.sync_status = SyncStatus::Completed;
                    event.updated_at = synced_at;
                    event.last_synced_at = Some(synced_at);
                    write_event(&tx, &event)?;
                    UpsertOutcome::Updated(reload_event(&tx, event.id)?)
                }
                None => {
                    let mut event = blank_event(calendar_id, user_id, &fields, synced_at);
                    event.recurring_event_id = series_id;
                    event.external_event_id = Some(external_event_id.clone());
                    event.sync_status = SyncStatus::Completed;
                    event.last_synced_at = Some(synced_at);
                    insert_event_row(&tx, &event)?;
                    UpsertOutcome::Created(reload_event(&tx, event.id)?)
                }
            };

            tx.commit().map_err(map_sql_error)?;
            Ok(outcome)
        })
        .await
    }

    async fn mark_deleted_by_external_id(
        &self,
        calendar_id: Uuid,
        external_event_id: &str,
        at: DateTime<Utc>,
    ) -> DomainResult<bool> {
        let external_event_id = external_event_id.to_string();
        self.with_conn(move |conn| {
            let changed = conn
                .execute(
                    "UPDATE calendar_events
                     SET is_deleted = 1, sync_status = 'completed', updated_at = ?3,
                         last_synced_at = ?3
                     WHERE calendar_id = ?1 AND external_event_id = ?2 AND is_deleted = 0",
                    params![calendar_id.to_string(), external_event_id, ts(at)],
                )
                .map_err(map_sql_error)?;
            Ok(changed > 0)
        })
        .await
    }

    async fn insert_event(&self, new: NewEvent) -> DomainResult<CalendarEvent> {
        new.fields.validate()?;
        self.with_conn(move |conn| {
            let mut event = blank_event(new.calendar_id, new.user_id, &new.fields, Utc::now());
            event.task_id = new.task_id;
            event.sync_status = new.sync_status;
            insert_event_row(conn, &event)?;
            reload_event(conn, event.id)
        })
        .await
    }

    async fn update_event(&self, event: &CalendarEvent) -> DomainResult<()> {
        event.range()?;
        let event = event.clone();
        self.with_conn(move |conn| {
            let changed = write_event(conn, &event)?;
            require_changed(changed, || format!("Event {}", event.id))
        })
        .await
    }

    async fn get_events_in_window(
        &self,
        user_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> DomainResult<Vec<CalendarEvent>> {
        self.with_conn(move |conn| {
            let sql = format!(
                "SELECT {EVENT_COLUMNS} FROM calendar_events
                 WHERE user_id = ?1 AND is_deleted = 0 AND start_time < ?3 AND end_time > ?2
                 ORDER BY start_time, id"
            );
            query_all(conn, &sql, params![user_id.to_string(), ts(start), ts(end)], map_event_row)
        })
        .await
    }

    async fn get_calendar_events_in_window(
        &self,
        calendar_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> DomainResult<Vec<CalendarEvent>> {
        self.with_conn(move |conn| {
            let sql = format!(
                "SELECT {EVENT_COLUMNS} FROM calendar_events
                 WHERE calendar_id = ?1 AND is_deleted = 0 AND start_time < ?3 AND end_time > ?2
                 ORDER BY start_time, id"
            );
            query_all(
                conn,
                &sql,
                params![calendar_id.to_string(), ts(start), ts(end)],
                map_event_row,
            )
        })
        .await
    }

    async fn get_events_pending_export(
        &self,
        calendar_id: Uuid,
    ) -> DomainResult<Vec<CalendarEvent>> {
        self.with_conn(move |conn| {
            let sql = format!(
                "SELECT {EVENT_COLUMNS} FROM calendar_events
                 WHERE calendar_id = ?1
                   AND sync_status IN ('pending', 'failed')
                   AND (is_deleted = 0 OR external_event_id IS NOT NULL)
                 ORDER BY start_time, id"
            );
            query_all(conn, &sql, [calendar_id.to_string()], map_event_row)
        })
        .await
    }

    async fn get_task_events(&self, calendar_id: Uuid) -> DomainResult<Vec<CalendarEvent>> {
        self.with_conn(move |conn| {
            let sql = format!(
                "SELECT {EVENT_COLUMNS} FROM calendar_events
                 WHERE calendar_id = ?1 AND task_id IS NOT NULL
                 ORDER BY start_time, id"
            );
            query_all(conn, &sql, [calendar_id.to_string()], map_event_row)
        })
        .await
    }

    async fn mark_event_exported(
        &self,
        event_id: Uuid,
        external_event_id: &str,
        at: DateTime<Utc>,
    ) -> DomainResult<()> {
        let external_event_id = external_event_id.to_string();
        self.with_conn(move |conn| {
            let changed = conn
                .execute(
                    "UPDATE calendar_events
                     SET external_event_id = ?2, sync_status = 'completed', last_synced_at = ?3
                     WHERE id = ?1",
                    params![event_id.to_string(), external_event_id, ts(at)],
                )
                .map_err(map_sql_error)?;
            require_changed(changed, || format!("Event {event_id}"))
        })
        .await
    }

    async fn set_event_sync_status(&self, event_id: Uuid, status: SyncStatus) -> DomainResult<()> {
        self.with_conn(move |conn| {
            conn.execute(
                "UPDATE calendar_events SET sync_status = ?2 WHERE id = ?1",
                params![event_id.to_string(), status.as_str()],
            )
            .map_err(map_sql_error)?;
            Ok(())
        })
        .await
    }

    // ------------------------------------------------------------------------
    // Conflicts
    // ------------------------------------------------------------------------

    async fn insert_or_update_conflict(
        &self,
        user_id: Uuid,
        conflict: &DetectedConflict,
        now: DateTime<Utc>,
    ) -> DomainResult<CalendarConflict> {
        let conflict = conflict.clone();
        self.with_conn(move |conn| {
            let tx = conn.transaction().map_err(map_sql_error)?;
            let first = conflict.pair.first().to_string();
            let second = conflict.pair.second().to_string();
            let overlap_minutes = conflict.overlap.num_minutes();

            let open: Option<String> = tx
                .query_row(
                    "SELECT id FROM calendar_conflicts
                     WHERE event1_id = ?1 AND event2_id = ?2 AND is_resolved = 0",
                    params![first, second],
                    |row| row.get(0),
                )
                .optional()
                .map_err(map_sql_error)?;

            let id = match open {
                Some(id) => {
                    tx.execute(
                        "UPDATE calendar_conflicts
                         SET conflict_type = ?2, severity = ?3, overlap_minutes = ?4,
                             updated_at = ?5
                         WHERE id = ?1",
                        params![
                            id,
                            conflict.conflict_type.as_str(),
                            conflict.severity.as_str(),
                            overlap_minutes,
                            ts(now),
                        ],
                    )
                    .map_err(map_sql_error)?;
                    id
                }
                None => {
                    let id = Uuid::now_v7().to_string();
                    tx.execute(
                        "INSERT INTO calendar_conflicts (
                            id, user_id, event1_id, event2_id, conflict_type, severity,
                            overlap_minutes, is_resolved, detected_at, updated_at
                        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 0, ?8, ?8)",
                        params![
                            id,
                            user_id.to_string(),
                            first,
                            second,
                            conflict.conflict_type.as_str(),
                            conflict.severity.as_str(),
                            overlap_minutes,
                            ts(now),
                        ],
                    )
                    .map_err(map_sql_error)?;
                    id
                }
            };

            let sql = format!("SELECT {CONFLICT_COLUMNS} FROM calendar_conflicts WHERE id = ?1");
            let stored = tx.query_row(&sql, [id], map_conflict_row).map_err(map_sql_error)?;
            tx.commit().map_err(map_sql_error)?;
            Ok(stored)
        })
        .await
    }

    async fn get_conflict(&self, conflict_id: Uuid) -> DomainResult<Option<CalendarConflict>> {
        self.with_conn(move |conn| {
            let sql = format!("SELECT {CONFLICT_COLUMNS} FROM calendar_conflicts WHERE id = ?1");
            conn.query_row(&sql, [conflict_id.to_string()], map_conflict_row)
                .optional()
                .map_err(map_sql_error)
        })
        .await
    }

    async fn get_unresolved_conflicts(
        &self,
        user_id: Uuid,
    ) -> DomainResult<Vec<CalendarConflict>> {
        self.with_conn(move |conn| {
            let sql = format!(
                "SELECT {CONFLICT_COLUMNS} FROM calendar_conflicts
                 WHERE user_id = ?1 AND is_resolved = 0
                 ORDER BY detected_at, id"
            );
            query_all(conn, &sql, [user_id.to_string()], map_conflict_row)
        })
        .await
    }

    #[instrument(skip(self, commit), fields(conflict_id = %commit.conflict_id))]
    async fn save_resolution(&self, commit: &ResolutionCommit) -> DomainResult<bool> {
        for event in &commit.events {
            event.range()?;
        }
        let commit = commit.clone();

        self.with_conn(move |conn| {
            let tx = conn.transaction().map_err(map_sql_error)?;

            let resolved: Option<bool> = tx
                .query_row(
                    "SELECT is_resolved FROM calendar_conflicts WHERE id = ?1",
                    [commit.conflict_id.to_string()],
                    |row| row.get(0),
                )
                .optional()
                .map_err(map_sql_error)?;
            if resolved != Some(false) {
                debug!("conflict missing or already resolved; nothing applied");
                return Ok(false);
            }

            for event in &commit.events {
                if write_event(&tx, event)? == 0 {
                    insert_event_row(&tx, event)?;
                }
            }

            tx.execute(
                "UPDATE calendar_conflicts
                 SET is_resolved = 1, resolution_type = ?2, resolution_notes = ?3,
                     resolved_by = ?4, resolved_at = ?5, updated_at = ?5
                 WHERE id = ?1",
                params![
                    commit.conflict_id.to_string(),
                    commit.resolution_type.as_str(),
                    commit.notes,
                    commit.resolved_by.to_string(),
                    ts(commit.resolved_at),
                ],
            )
            .map_err(map_sql_error)?;

            tx.commit().map_err(map_sql_error)?;
            Ok(true)
        })
        .await
    }

    // ------------------------------------------------------------------------
    // Audit and time blocks
    // ------------------------------------------------------------------------

    async fn append_sync_log(&self, log: &SyncLog) -> DomainResult<()> {
        let log = log.clone();
        self.with_conn(move |conn| {
            let counters = &log.counters;
            conn.execute(
                "INSERT INTO sync_logs (
                    id, calendar_id, user_id, full_sync, status, processed, created, updated,
                    deleted, exported, conflicts_detected, errors, error_message, started_at,
                    completed_at, duration_ms
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
                params![
                    log.id.to_string(),
                    log.calendar_id.to_string(),
                    log.user_id.to_string(),
                    bool_to_int(log.full_sync),
                    log.status.as_str(),
                    count(counters.processed),
                    count(counters.created),
                    count(counters.updated),
                    count(counters.deleted),
                    count(counters.exported),
                    count(counters.conflicts_detected),
                    to_json(&counters.errors)?,
                    log.error_message,
                    ts(log.started_at),
                    opt_ts(log.completed_at),
                    log.duration_ms,
                ],
            )
            .map_err(map_sql_error)?;
            Ok(())
        })
        .await
    }

    async fn get_time_blocks(
        &self,
        user_ids: &[Uuid],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> DomainResult<Vec<TimeBlock>> {
        let window = TimeRange::new(start, end)?;
        if user_ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut values: Vec<Value> =
            user_ids.iter().map(|id| Value::Text(id.to_string())).collect();
        let placeholders = vec!["?"; values.len()].join(", ");
        values.push(Value::Integer(ts(window.start())));
        values.push(Value::Integer(ts(window.end())));

        self.with_conn(move |conn| {
            let n = values.len();
            let sql = format!(
                "SELECT {TIME_BLOCK_COLUMNS} FROM time_blocks
                 WHERE user_id IN ({placeholders}) AND end_time > ?{} AND start_time < ?{}
                 ORDER BY start_time, id",
                n - 1,
                n
            );
            query_all(conn, &sql, params_from_iter(values), map_time_block_row)
        })
        .await
    }
}

// ============================================================================
// Statement helpers
// ============================================================================

const EVENT_INSERT_SQL: &str = "INSERT INTO calendar_events (
        id, calendar_id, user_id, title, description, location, start_time, end_time, all_day,
        timezone, status, attendees, reminders, recurrence, recurring_event_id,
        external_event_id, sync_status, task_id, is_deleted, created_at, updated_at,
        last_synced_at
    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18,
              ?19, ?20, ?21, ?22)";

const EVENT_UPDATE_SQL: &str = "UPDATE calendar_events SET
        calendar_id = ?2, user_id = ?3, title = ?4, description = ?5, location = ?6,
        start_time = ?7, end_time = ?8, all_day = ?9, timezone = ?10, status = ?11,
        attendees = ?12, reminders = ?13, recurrence = ?14, recurring_event_id = ?15,
        external_event_id = ?16, sync_status = ?17, task_id = ?18, is_deleted = ?19,
        created_at = ?20, updated_at = ?21, last_synced_at = ?22
    WHERE id = ?1";

fn event_params(event: &CalendarEvent) -> DomainResult<Vec<Value>> {
    fn text(value: Option<String>) -> Value {
        value.map(Value::Text).unwrap_or(Value::Null)
    }
    fn int(value: Option<i64>) -> Value {
        value.map(Value::Integer).unwrap_or(Value::Null)
    }

    Ok(vec![
        Value::Text(event.id.to_string()),
        Value::Text(event.calendar_id.to_string()),
        Value::Text(event.user_id.to_string()),
        Value::Text(event.title.clone()),
        text(event.description.clone()),
        text(event.location.clone()),
        Value::Integer(ts(event.start_time)),
        Value::Integer(ts(event.end_time)),
        Value::Integer(bool_to_int(event.all_day)),
        Value::Text(event.timezone.clone()),
        Value::Text(event.status.as_str().to_string()),
        Value::Text(to_json(&event.attendees)?),
        Value::Text(to_json(&event.reminders)?),
        Value::Text(to_json(&event.recurrence)?),
        text(event.recurring_event_id.map(|id| id.to_string())),
        text(event.external_event_id.clone()),
        Value::Text(event.sync_status.as_str().to_string()),
        text(event.task_id.map(|id| id.to_string())),
        Value::Integer(bool_to_int(event.is_deleted)),
        Value::Integer(ts(event.created_at)),
        Value::Integer(ts(event.updated_at)),
        int(opt_ts(event.last_synced_at)),
    ])
}

fn insert_event_row(conn: &Connection, event: &CalendarEvent) -> DomainResult<()> {
    conn.execute(EVENT_INSERT_SQL, params_from_iter(event_params(event)?))
        .map_err(map_sql_error)?;
    Ok(())
}

/// Full-row update; returns the number of rows touched.
fn write_event(conn: &Connection, event: &CalendarEvent) -> DomainResult<usize> {
    conn.execute(EVENT_UPDATE_SQL, params_from_iter(event_params(event)?)).map_err(map_sql_error)
}

fn fetch_event(conn: &Connection, event_id: Uuid) -> DomainResult<Option<CalendarEvent>> {
    let sql = format!("SELECT {EVENT_COLUMNS} FROM calendar_events WHERE id = ?1");
    conn.query_row(&sql, [event_id.to_string()], map_event_row).optional().map_err(map_sql_error)
}

fn reload_event(conn: &Connection, event_id: Uuid) -> DomainResult<CalendarEvent> {
    fetch_event(conn, event_id)?
        .ok_or_else(|| CadenceError::Internal(format!("event {event_id} vanished after write")))
}

fn fetch_event_by_external_id(
    conn: &Connection,
    calendar_id: Uuid,
    external_event_id: &str,
) -> DomainResult<Option<CalendarEvent>> {
    let sql = format!(
        "SELECT {EVENT_COLUMNS} FROM calendar_events
         WHERE calendar_id = ?1 AND external_event_id = ?2"
    );
    conn.query_row(&sql, params![calendar_id.to_string(), external_event_id], map_event_row)
        .optional()
        .map_err(map_sql_error)
}

fn fetch_calendar(conn: &Connection, calendar_id: Uuid) -> DomainResult<Option<Calendar>> {
    let sql = format!("SELECT {CALENDAR_COLUMNS} FROM calendars WHERE id = ?1");
    conn.query_row(&sql, [calendar_id.to_string()], map_calendar_row)
        .optional()
        .map_err(map_sql_error)
}

fn ensure_calendar_exists(conn: &Connection, calendar_id: Uuid) -> DomainResult<()> {
    let found: Option<i64> = conn
        .query_row("SELECT 1 FROM calendars WHERE id = ?1", [calendar_id.to_string()], |row| {
            row.get(0)
        })
        .optional()
        .map_err(map_sql_error)?;
    match found {
        Some(_) => Ok(()),
        None => Err(CadenceError::NotFound(format!("Calendar {calendar_id}"))),
    }
}

fn query_all<T, P, F>(conn: &Connection, sql: &str, params: P, map: F) -> DomainResult<Vec<T>>
where
    P: rusqlite::Params,
    F: FnMut(&rusqlite::Row<'_>) -> rusqlite::Result<T>,
{
    let mut stmt = conn.prepare(sql).map_err(map_sql_error)?;
    let rows = stmt.query_map(params, map).map_err(map_sql_error)?;
    rows.collect::<rusqlite::Result<Vec<_>>>().map_err(map_sql_error)
}

fn require_changed(changed: usize, what: impl FnOnce() -> String) -> DomainResult<()> {
    if changed == 0 {
        return Err(CadenceError::NotFound(what()));
    }
    Ok(())
}

fn blank_event(
    calendar_id: Uuid,
    user_id: Uuid,
    fields: &EventFields,
    now: DateTime<Utc>,
) -> CalendarEvent {
    let mut event = CalendarEvent {
        id: Uuid::now_v7(),
        calendar_id,
        user_id,
        title: String::new(),
        description: None,
        location: None,
        start_time: fields.start_time,
        end_time: fields.end_time,
        all_day: false,
        timezone: String::new(),
        status: fields.status,
        attendees: Vec::new(),
        reminders: Vec::new(),
        recurrence: Vec::new(),
        recurring_event_id: None,
        external_event_id: None,
        sync_status: SyncStatus::Pending,
        task_id: None,
        is_deleted: false,
        created_at: now,
        updated_at: now,
        last_synced_at: None,
    };
    apply_fields(&mut event, fields);
    event
}

fn apply_fields(event: &mut CalendarEvent, fields: &EventFields) {
    event.title = fields.title.clone();
    event.description = fields.description.clone();
    event.location = fields.location.clone();
    event.start_time = fields.start_time;
    event.end_time = fields.end_time;
    event.all_day = fields.all_day;
    event.timezone = fields.timezone.clone();
    event.status = fields.status;
    event.attendees = fields.attendees.clone();
    event.reminders = fields.reminders.clone();
    event.recurrence = fields.recurrence.clone();
}

fn count(value: usize) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> DomainResult<String> {
    serde_json::to_string(value)
        .map_err(|err| CadenceError::Internal(format!("failed to encode column: {err}")))
}

fn map_sql_error(err: rusqlite::Error) -> CadenceError {
    InfraError::from(err).into()
}

fn map_join_error(err: task::JoinError) -> CadenceError {
    if err.is_cancelled() {
        CadenceError::Internal("blocking event store task cancelled".into())
    } else {
        CadenceError::Internal(format!("blocking event store task failed: {err}"))
    }
}
