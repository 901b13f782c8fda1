//! Port interfaces consumed by the sync, conflict and availability services
//!
//! Every call is its own transaction; no transaction spans a whole pass.

use async_trait::async_trait;
use cadence_domain::{
    AccessToken, Calendar, CalendarConflict, CalendarEvent, CalendarProvider, DetectedConflict,
    EventFields, Integration, NewEvent, RefreshedCredentials, ResolutionType, Result,
    SealedSecret, SyncLog, SyncStatus, Task, TimeBlock, UpsertOutcome, WebhookSubscription,
};
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

/// Event mutations and conflict closure applied in one transaction.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolutionCommit {
    pub conflict_id: Uuid,
    pub resolution_type: ResolutionType,
    pub notes: Option<String>,
    pub resolved_by: Uuid,
    pub resolved_at: DateTime<Utc>,
    /// Full replacement rows for every touched event.
    pub events: Vec<CalendarEvent>,
}

/// Transactional persistence of calendars, events, integrations, conflicts,
/// sync logs and time blocks.
#[async_trait]
pub trait EventStore: Send + Sync {
    // Calendars
    async fn get_calendar(&self, calendar_id: Uuid) -> Result<Option<Calendar>>;

    async fn get_calendars_by_user(&self, user_id: Uuid) -> Result<Vec<Calendar>>;

    async fn find_calendar_by_webhook(
        &self,
        provider: CalendarProvider,
        subscription_id: &str,
    ) -> Result<Option<Calendar>>;

    /// Atomically move the calendar to `in_progress`.
    ///
    /// Succeeds from `pending`, `failed` or `completed`, or from an
    /// `in_progress` claim older than `stale_after`. Returns `false` when
    /// another run holds the calendar.
    async fn begin_sync(
        &self,
        calendar_id: Uuid,
        now: DateTime<Utc>,
        stale_after: Duration,
    ) -> Result<bool>;

    /// Mark the run completed, storing the new token when one was issued.
    async fn update_calendar_sync_state(
        &self,
        calendar_id: Uuid,
        sync_token: Option<&str>,
        synced_at: DateTime<Utc>,
    ) -> Result<()>;

    /// Mark the run failed, leaving the stored token untouched.
    async fn fail_calendar_sync(&self, calendar_id: Uuid) -> Result<()>;

    async fn clear_sync_token(&self, calendar_id: Uuid) -> Result<()>;

    async fn save_webhook(
        &self,
        calendar_id: Uuid,
        subscription: Option<&WebhookSubscription>,
    ) -> Result<()>;

    // Integrations
    async fn get_integration(&self, integration_id: Uuid) -> Result<Option<Integration>>;

    async fn get_active_integrations(&self, user_id: Uuid) -> Result<Vec<Integration>>;

    async fn update_integration_credentials(
        &self,
        integration_id: Uuid,
        credentials: &RefreshedCredentials,
    ) -> Result<()>;

    async fn deactivate_integration(&self, integration_id: Uuid, reason: &str) -> Result<()>;

    // Events
    async fn get_event(&self, event_id: Uuid) -> Result<Option<CalendarEvent>>;

    async fn find_event_by_external_id(
        &self,
        calendar_id: Uuid,
        external_event_id: &str,
    ) -> Result<Option<CalendarEvent>>;

    /// Idempotent import keyed by `(calendar_id, external_event_id)`.
    ///
    /// Creates the event when absent, otherwise overwrites the mapped fields
    /// and clears any soft deletion. Imported rows end `completed`.
    async fn upsert_event(
        &self,
        calendar_id: Uuid,
        external_event_id: &str,
        fields: &EventFields,
        synced_at: DateTime<Utc>,
    ) -> Result<UpsertOutcome>;

    /// Soft-delete by provider id. Returns `false` when nothing matched.
    async fn mark_deleted_by_external_id(
        &self,
        calendar_id: Uuid,
        external_event_id: &str,
        at: DateTime<Utc>,
    ) -> Result<bool>;

    async fn insert_event(&self, event: NewEvent) -> Result<CalendarEvent>;

    async fn update_event(&self, event: &CalendarEvent) -> Result<()>;

    /// Non-deleted events of all the user's calendars overlapping the window,
    /// ascending by start time.
    async fn get_events_in_window(
        &self,
        user_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<CalendarEvent>>;

    /// Non-deleted events of one calendar overlapping the window, ascending
    /// by start time.
    async fn get_calendar_events_in_window(
        &self,
        calendar_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<CalendarEvent>>;

    /// Events in `pending`/`failed`, including cancelled or deleted rows that
    /// still carry a provider id. Ascending by start time.
    async fn get_events_pending_export(&self, calendar_id: Uuid) -> Result<Vec<CalendarEvent>>;

    /// Events of the calendar that carry a task back-reference.
    async fn get_task_events(&self, calendar_id: Uuid) -> Result<Vec<CalendarEvent>>;

    /// Record a successful push: store the provider id, set `completed`.
    async fn mark_event_exported(
        &self,
        event_id: Uuid,
        external_event_id: &str,
        at: DateTime<Utc>,
    ) -> Result<()>;

    async fn set_event_sync_status(&self, event_id: Uuid, status: SyncStatus) -> Result<()>;

    // Conflicts
    /// Insert, or update type/severity of the unresolved record for the same
    /// unordered pair.
    async fn insert_or_update_conflict(
        &self,
        user_id: Uuid,
        conflict: &DetectedConflict,
        now: DateTime<Utc>,
    ) -> Result<CalendarConflict>;

    async fn get_conflict(&self, conflict_id: Uuid) -> Result<Option<CalendarConflict>>;

    async fn get_unresolved_conflicts(&self, user_id: Uuid) -> Result<Vec<CalendarConflict>>;

    /// Apply the commit if the conflict is still unresolved. Returns `false`
    /// and changes nothing otherwise.
    async fn save_resolution(&self, commit: &ResolutionCommit) -> Result<bool>;

    // Audit
    async fn append_sync_log(&self, log: &SyncLog) -> Result<()>;

    // Time blocks
    async fn get_time_blocks(
        &self,
        user_ids: &[Uuid],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<TimeBlock>>;
}

/// Returns a bearer credential that is valid right now.
#[async_trait]
pub trait TokenSupplier: Send + Sync {
    /// Refreshes first when the stored token is expired or about to expire.
    async fn get_valid_token(&self, integration: &Integration) -> Result<AccessToken>;

    /// Force a refresh after the provider rejected the current token.
    /// Deactivates the integration when the refresh itself is rejected.
    async fn refresh(&self, integration: &Integration) -> Result<AccessToken>;
}

/// Narrow secret store for provider credentials.
pub trait CredentialVault: Send + Sync {
    fn seal(&self, key: &str, plaintext: &str) -> Result<SealedSecret>;

    fn open(&self, secret: &SealedSecret) -> Result<String>;

    fn remove(&self, secret: &SealedSecret) -> Result<()>;
}

/// Read access to the task subsystem.
#[async_trait]
pub trait TaskSource: Send + Sync {
    /// Open tasks of the user that have a due date.
    async fn get_open_tasks_with_due(&self, user_id: Uuid) -> Result<Vec<Task>>;
}
