//! In-memory `EventStore`
//!
//! Mirrors the SQLite store's semantics: the `(calendar_id,
//! external_event_id)` upsert key, one unresolved conflict per unordered
//! pair, and the sync-run claim.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use cadence_core::{EventStore, ResolutionCommit};
use cadence_domain::{
    CadenceError, Calendar, CalendarConflict, CalendarEvent, CalendarProvider, DetectedConflict,
    EventFields, Integration, NewEvent, RefreshedCredentials, Result, SyncLog, SyncStatus,
    TimeBlock, TimeRange, UpsertOutcome, WebhookSubscription,
};
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

#[derive(Default)]
struct State {
    calendars: HashMap<Uuid, Calendar>,
    integrations: HashMap<Uuid, Integration>,
    events: HashMap<Uuid, CalendarEvent>,
    conflicts: HashMap<Uuid, CalendarConflict>,
    logs: Vec<SyncLog>,
    blocks: Vec<TimeBlock>,
    fail_upserts: bool,
}

#[derive(Default)]
pub struct InMemoryEventStore {
    state: Mutex<State>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put_calendar(&self, calendar: Calendar) {
        self.state.lock().unwrap().calendars.insert(calendar.id, calendar);
    }

    pub fn put_integration(&self, integration: Integration) {
        self.state.lock().unwrap().integrations.insert(integration.id, integration);
    }

    pub fn put_event(&self, event: CalendarEvent) {
        self.state.lock().unwrap().events.insert(event.id, event);
    }

    pub fn put_time_block(&self, block: TimeBlock) {
        self.state.lock().unwrap().blocks.push(block);
    }

    pub fn calendar(&self, id: Uuid) -> Calendar {
        self.state.lock().unwrap().calendars[&id].clone()
    }

    pub fn integration(&self, id: Uuid) -> Integration {
        self.state.lock().unwrap().integrations[&id].clone()
    }

    pub fn event(&self, id: Uuid) -> CalendarEvent {
        self.state.lock().unwrap().events[&id].clone()
    }

    pub fn events(&self, calendar_id: Uuid) -> Vec<CalendarEvent> {
        let mut events: Vec<_> = self
            .state
            .lock()
            .unwrap()
            .events
            .values()
            .filter(|event| event.calendar_id == calendar_id)
            .cloned()
            .collect();
        events.sort_by_key(|event| event.start_time);
        events
    }

    pub fn conflict(&self, id: Uuid) -> CalendarConflict {
        self.state.lock().unwrap().conflicts[&id].clone()
    }

    pub fn conflicts(&self) -> Vec<CalendarConflict> {
        self.state.lock().unwrap().conflicts.values().cloned().collect()
    }

    pub fn logs(&self) -> Vec<SyncLog> {
        self.state.lock().unwrap().logs.clone()
    }

    /// Every subsequent upsert fails as if the database were gone.
    pub fn fail_upserts(&self) {
        self.state.lock().unwrap().fail_upserts = true;
    }
}

fn overlaps(event: &CalendarEvent, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
    event.start_time < end && start < event.end_time
}

fn sorted(mut events: Vec<CalendarEvent>) -> Vec<CalendarEvent> {
    events.sort_by_key(|event| (event.start_time, event.id));
    events
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

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn get_calendar(&self, calendar_id: Uuid) -> Result<Option<Calendar>> {
        Ok(self.state.lock().unwrap().calendars.get(&calendar_id).cloned())
    }

    async fn get_calendars_by_user(&self, user_id: Uuid) -> Result<Vec<Calendar>> {
        let mut calendars: Vec<_> = self
            .state
            .lock()
            .unwrap()
            .calendars
            .values()
            .filter(|calendar| calendar.user_id == user_id)
            .cloned()
            .collect();
        calendars.sort_by_key(|calendar| calendar.id);
        Ok(calendars)
    }

    async fn find_calendar_by_webhook(
        &self,
        provider: CalendarProvider,
        subscription_id: &str,
    ) -> Result<Option<Calendar>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .calendars
            .values()
            .find(|calendar| {
                calendar.provider == provider
                    && calendar
                        .webhook
                        .as_ref()
                        .is_some_and(|sub| sub.subscription_id == subscription_id)
            })
            .cloned())
    }

    async fn begin_sync(
        &self,
        calendar_id: Uuid,
        now: DateTime<Utc>,
        stale_after: Duration,
    ) -> Result<bool> {
        let mut state = self.state.lock().unwrap();
        let calendar = state
            .calendars
            .get_mut(&calendar_id)
            .ok_or_else(|| CadenceError::NotFound(format!("Calendar {calendar_id}")))?;
        let stale = calendar.sync_status == SyncStatus::InProgress
            && calendar.sync_started_at.is_some_and(|started| started + stale_after <= now);
        if !calendar.sync_status.can_begin_run() && !stale {
            return Ok(false);
        }
        calendar.sync_status = SyncStatus::InProgress;
        calendar.sync_started_at = Some(now);
        Ok(true)
    }

    async fn update_calendar_sync_state(
        &self,
        calendar_id: Uuid,
        sync_token: Option<&str>,
        synced_at: DateTime<Utc>,
    ) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let calendar = state
            .calendars
            .get_mut(&calendar_id)
            .ok_or_else(|| CadenceError::NotFound(format!("Calendar {calendar_id}")))?;
        if let Some(token) = sync_token {
            calendar.sync_token = Some(token.to_string());
        }
        calendar.last_sync_at = Some(synced_at);
        calendar.sync_status = SyncStatus::Completed;
        calendar.sync_started_at = None;
        Ok(())
    }

    async fn fail_calendar_sync(&self, calendar_id: Uuid) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if let Some(calendar) = state.calendars.get_mut(&calendar_id) {
            calendar.sync_status = SyncStatus::Failed;
            calendar.sync_started_at = None;
        }
        Ok(())
    }

    async fn clear_sync_token(&self, calendar_id: Uuid) -> Result<()> {
        if let Some(calendar) = self.state.lock().unwrap().calendars.get_mut(&calendar_id) {
            calendar.sync_token = None;
        }
        Ok(())
    }

    async fn save_webhook(
        &self,
        calendar_id: Uuid,
        subscription: Option<&WebhookSubscription>,
    ) -> Result<()> {
        if let Some(calendar) = self.state.lock().unwrap().calendars.get_mut(&calendar_id) {
            calendar.webhook = subscription.cloned();
        }
        Ok(())
    }

    async fn get_integration(&self, integration_id: Uuid) -> Result<Option<Integration>> {
        Ok(self.state.lock().unwrap().integrations.get(&integration_id).cloned())
    }

    async fn get_active_integrations(&self, user_id: Uuid) -> Result<Vec<Integration>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .integrations
            .values()
            .filter(|integration| integration.user_id == user_id && integration.is_active)
            .cloned()
            .collect())
    }

    async fn update_integration_credentials(
        &self,
        integration_id: Uuid,
        credentials: &RefreshedCredentials,
    ) -> Result<()> {
        if let Some(integration) = self.state.lock().unwrap().integrations.get_mut(&integration_id)
        {
            integration.access_token = credentials.access_token.clone();
            if let Some(refresh) = &credentials.refresh_token {
                integration.refresh_token = Some(refresh.clone());
            }
            integration.token_expires_at = Some(credentials.expires_at);
        }
        Ok(())
    }

    async fn deactivate_integration(&self, integration_id: Uuid, reason: &str) -> Result<()> {
        if let Some(integration) = self.state.lock().unwrap().integrations.get_mut(&integration_id)
        {
            integration.is_active = false;
            integration.sync_status = SyncStatus::Failed;
            integration.last_error = Some(reason.to_string());
        }
        Ok(())
    }

    async fn get_event(&self, event_id: Uuid) -> Result<Option<CalendarEvent>> {
        Ok(self.state.lock().unwrap().events.get(&event_id).cloned())
    }

    async fn find_event_by_external_id(
        &self,
        calendar_id: Uuid,
        external_event_id: &str,
    ) -> Result<Option<CalendarEvent>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .events
            .values()
            .find(|event| {
                event.calendar_id == calendar_id
                    && event.external_event_id.as_deref() == Some(external_event_id)
            })
            .cloned())
    }

    async fn upsert_event(
        &self,
        calendar_id: Uuid,
        external_event_id: &str,
        fields: &EventFields,
        synced_at: DateTime<Utc>,
    ) -> Result<UpsertOutcome> {
        fields.validate()?;
        let mut state = self.state.lock().unwrap();
        if state.fail_upserts {
            return Err(CadenceError::Database("database is locked".into()));
        }
        let user_id = state
            .calendars
            .get(&calendar_id)
            .map(|calendar| calendar.user_id)
            .ok_or_else(|| CadenceError::NotFound(format!("Calendar {calendar_id}")))?;

        let existing = state.events.values_mut().find(|event| {
            event.calendar_id == calendar_id
                && event.external_event_id.as_deref() == Some(external_event_id)
        });
        if let Some(event) = existing {
            apply_fields(event, fields);
            event.is_deleted = false;
            event.sync_status = SyncStatus::Completed;
            event.updated_at = synced_at;
            event.last_synced_at = Some(synced_at);
            return Ok(UpsertOutcome::Updated(event.clone()));
        }

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
            attendees: vec![],
            reminders: vec![],
            recurrence: vec![],
            recurring_event_id: None,
            external_event_id: Some(external_event_id.to_string()),
            sync_status: SyncStatus::Completed,
            task_id: None,
            is_deleted: false,
            created_at: synced_at,
            updated_at: synced_at,
            last_synced_at: Some(synced_at),
        };
        apply_fields(&mut event, fields);
        state.events.insert(event.id, event.clone());
        Ok(UpsertOutcome::Created(event))
    }

    async fn mark_deleted_by_external_id(
        &self,
        calendar_id: Uuid,
        external_event_id: &str,
        at: DateTime<Utc>,
    ) -> Result<bool> {
        let mut state = self.state.lock().unwrap();
        let Some(event) = state.events.values_mut().find(|event| {
            event.calendar_id == calendar_id
                && event.external_event_id.as_deref() == Some(external_event_id)
                && !event.is_deleted
        }) else {
            return Ok(false);
        };
        event.is_deleted = true;
        event.sync_status = SyncStatus::Completed;
        event.updated_at = at;
        Ok(true)
    }

    async fn insert_event(&self, new: NewEvent) -> Result<CalendarEvent> {
        new.fields.validate()?;
        let now = Utc::now();
        let mut event = CalendarEvent {
            id: Uuid::now_v7(),
            calendar_id: new.calendar_id,
            user_id: new.user_id,
            title: String::new(),
            description: None,
            location: None,
            start_time: new.fields.start_time,
            end_time: new.fields.end_time,
            all_day: false,
            timezone: String::new(),
            status: new.fields.status,
            attendees: vec![],
            reminders: vec![],
            recurrence: vec![],
            recurring_event_id: None,
            external_event_id: None,
            sync_status: new.sync_status,
            task_id: new.task_id,
            is_deleted: false,
            created_at: now,
            updated_at: now,
            last_synced_at: None,
        };
        apply_fields(&mut event, &new.fields);
        self.state.lock().unwrap().events.insert(event.id, event.clone());
        Ok(event)
    }

    async fn update_event(&self, event: &CalendarEvent) -> Result<()> {
        event.range()?;
        let mut state = self.state.lock().unwrap();
        if !state.events.contains_key(&event.id) {
            return Err(CadenceError::NotFound(format!("Event {}", event.id)));
        }
        state.events.insert(event.id, event.clone());
        Ok(())
    }

    async fn get_events_in_window(
        &self,
        user_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<CalendarEvent>> {
        let events = self
            .state
            .lock()
            .unwrap()
            .events
            .values()
            .filter(|e| e.user_id == user_id && !e.is_deleted && overlaps(e, start, end))
            .cloned()
            .collect();
        Ok(sorted(events))
    }

    async fn get_calendar_events_in_window(
        &self,
        calendar_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<CalendarEvent>> {
        let events = self
            .state
            .lock()
            .unwrap()
            .events
            .values()
            .filter(|e| e.calendar_id == calendar_id && !e.is_deleted && overlaps(e, start, end))
            .cloned()
            .collect();
        Ok(sorted(events))
    }

    async fn get_events_pending_export(&self, calendar_id: Uuid) -> Result<Vec<CalendarEvent>> {
        let events = self
            .state
            .lock()
            .unwrap()
            .events
            .values()
            .filter(|e| {
                e.calendar_id == calendar_id
                    && matches!(e.sync_status, SyncStatus::Pending | SyncStatus::Failed)
                    && (!e.is_deleted || e.external_event_id.is_some())
            })
            .cloned()
            .collect();
        Ok(sorted(events))
    }

    async fn get_task_events(&self, calendar_id: Uuid) -> Result<Vec<CalendarEvent>> {
        let events = self
            .state
            .lock()
            .unwrap()
            .events
            .values()
            .filter(|e| e.calendar_id == calendar_id && e.task_id.is_some())
            .cloned()
            .collect();
        Ok(sorted(events))
    }

    async fn mark_event_exported(
        &self,
        event_id: Uuid,
        external_event_id: &str,
        at: DateTime<Utc>,
    ) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let event = state
            .events
            .get_mut(&event_id)
            .ok_or_else(|| CadenceError::NotFound(format!("Event {event_id}")))?;
        event.external_event_id = Some(external_event_id.to_string());
        event.sync_status = SyncStatus::Completed;
        event.last_synced_at = Some(at);
        Ok(())
    }

    async fn set_event_sync_status(&self, event_id: Uuid, status: SyncStatus) -> Result<()> {
        if let Some(event) = self.state.lock().unwrap().events.get_mut(&event_id) {
            event.sync_status = status;
        }
        Ok(())
    }

    async fn insert_or_update_conflict(
        &self,
        user_id: Uuid,
        detected: &DetectedConflict,
        now: DateTime<Utc>,
    ) -> Result<CalendarConflict> {
        let mut state = self.state.lock().unwrap();
        if let Some(existing) = state
            .conflicts
            .values_mut()
            .find(|conflict| !conflict.is_resolved && conflict.pair() == detected.pair)
        {
            existing.conflict_type = detected.conflict_type;
            existing.severity = detected.severity;
            existing.overlap_minutes = detected.overlap.num_minutes();
            existing.updated_at = now;
            return Ok(existing.clone());
        }

        let conflict = CalendarConflict {
            id: Uuid::now_v7(),
            user_id,
            event1_id: detected.pair.first(),
            event2_id: detected.pair.second(),
            conflict_type: detected.conflict_type,
            severity: detected.severity,
            overlap_minutes: detected.overlap.num_minutes(),
            is_resolved: false,
            resolution_type: None,
            resolution_notes: None,
            resolved_by: None,
            resolved_at: None,
            detected_at: now,
            updated_at: now,
        };
        state.conflicts.insert(conflict.id, conflict.clone());
        Ok(conflict)
    }

    async fn get_conflict(&self, conflict_id: Uuid) -> Result<Option<CalendarConflict>> {
        Ok(self.state.lock().unwrap().conflicts.get(&conflict_id).cloned())
    }

    async fn get_unresolved_conflicts(&self, user_id: Uuid) -> Result<Vec<CalendarConflict>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .conflicts
            .values()
            .filter(|conflict| conflict.user_id == user_id && !conflict.is_resolved)
            .cloned()
            .collect())
    }

    async fn save_resolution(&self, commit: &ResolutionCommit) -> Result<bool> {
        for event in &commit.events {
            event.range()?;
        }
        let mut state = self.state.lock().unwrap();
        match state.conflicts.get(&commit.conflict_id) {
            Some(conflict) if !conflict.is_resolved => {}
            _ => return Ok(false),
        }
        for event in &commit.events {
            state.events.insert(event.id, event.clone());
        }
        if let Some(conflict) = state.conflicts.get_mut(&commit.conflict_id) {
            conflict.is_resolved = true;
            conflict.resolution_type = Some(commit.resolution_type);
            conflict.resolution_notes = commit.notes.clone();
            conflict.resolved_by = Some(commit.resolved_by);
            conflict.resolved_at = Some(commit.resolved_at);
            conflict.updated_at = commit.resolved_at;
        }
        Ok(true)
    }

    async fn append_sync_log(&self, log: &SyncLog) -> Result<()> {
        self.state.lock().unwrap().logs.push(log.clone());
        Ok(())
    }

    async fn get_time_blocks(
        &self,
        user_ids: &[Uuid],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<TimeBlock>> {
        let window = TimeRange::new(start, end)?;
        Ok(self
            .state
            .lock()
            .unwrap()
            .blocks
            .iter()
            .filter(|block| user_ids.contains(&block.user_id))
            .filter(|block| block.range().is_ok_and(|range| range.overlaps(&window)))
            .cloned()
            .collect())
    }
}
