//! Per-calendar reconciliation
//!
//! A run claims the calendar (`pending|failed|completed -> in_progress`), then
//! executes import, export and task binding strictly in that order, runs
//! conflict detection and records a [`SyncLog`]. Each pass commits per event,
//! so an aborted run leaves a state the next run can resume from.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use cadence_common::time::Clock;
use cadence_domain::{
    CadenceError, Calendar, CalendarEvent, ConflictConfig, EventFields, Integration, NewEvent,
    ProviderError, Result, SyncConfig, SyncCounters, SyncLog, SyncStatus, TaskBindingScope,
    TimeRange, UpsertOutcome, WebhookSubscription,
};
use chrono::Duration;
use futures::future::join_all;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use super::binder::{apply_task_fields, is_stale, task_event_fields};
use super::ports::{EventStore, TaskSource, TokenSupplier};
use crate::conflict::ConflictService;
use crate::provider::{call_with_auth_retry, CallFailure, ProviderAdapter, ProviderRegistry};

/// Collaborators of a [`SyncOrchestrator`].
#[derive(Clone)]
pub struct SyncDependencies {
    pub store: Arc<dyn EventStore>,
    pub tokens: Arc<dyn TokenSupplier>,
    pub tasks: Arc<dyn TaskSource>,
    pub providers: ProviderRegistry,
    pub clock: Arc<dyn Clock>,
}

pub struct SyncOrchestrator {
    store: Arc<dyn EventStore>,
    tokens: Arc<dyn TokenSupplier>,
    tasks: Arc<dyn TaskSource>,
    providers: ProviderRegistry,
    clock: Arc<dyn Clock>,
    conflicts: ConflictService,
    config: SyncConfig,
}

impl SyncOrchestrator {
    pub fn new(deps: SyncDependencies, config: SyncConfig, conflicts: ConflictConfig) -> Self {
        let conflicts = ConflictService::new(deps.store.clone(), deps.clock.clone(), conflicts);
        Self {
            store: deps.store,
            tokens: deps.tokens,
            tasks: deps.tasks,
            providers: deps.providers,
            clock: deps.clock,
            conflicts,
            config,
        }
    }

    pub fn conflicts(&self) -> &ConflictService {
        &self.conflicts
    }

    /// Sync one calendar. Fails fast with `SyncInProgress` when another run
    /// holds it.
    #[instrument(skip(self))]
    pub async fn sync_calendar(
        &self,
        calendar_id: Uuid,
        force_full_sync: bool,
    ) -> Result<SyncCounters> {
        let calendar = self.load_calendar(calendar_id).await?;
        let started = self.clock.now();
        let lease = Duration::minutes(self.config.stale_run_after_minutes);

        if !self.store.begin_sync(calendar_id, started, lease).await? {
            info!(calendar_id = %calendar_id, "Sync already running, not starting another");
            return Err(CadenceError::SyncInProgress(calendar_id));
        }

        let full_sync = force_full_sync || calendar.sync_token.is_none();
        let log = SyncLog::start(calendar.id, calendar.user_id, full_sync, started);
        let mut counters = SyncCounters::default();

        let outcome = async {
            let next_token = self.run_passes(&calendar, force_full_sync, &mut counters).await?;
            self.store
                .update_calendar_sync_state(calendar_id, next_token.as_deref(), self.clock.now())
                .await
        }
        .await;

        let finished = self.clock.now();
        match outcome {
            Ok(()) => {
                info!(
                    calendar_id = %calendar_id,
                    processed = counters.processed,
                    created = counters.created,
                    updated = counters.updated,
                    deleted = counters.deleted,
                    exported = counters.exported,
                    conflicts = counters.conflicts_detected,
                    errors = counters.errors.len(),
                    "Calendar sync completed"
                );
                self.append_log(log.complete(counters.clone(), finished)).await;
                Ok(counters)
            }
            Err(err) => {
                error!(calendar_id = %calendar_id, error = %err, "Calendar sync failed");
                if let Err(state_err) = self.store.fail_calendar_sync(calendar_id).await {
                    warn!(
                        calendar_id = %calendar_id,
                        error = %state_err,
                        "Could not mark sync failed"
                    );
                }
                self.append_log(log.fail(counters, err.to_string(), finished)).await;
                Err(err)
            }
        }
    }

    /// Sync every calendar of the user concurrently. Calendars bound to an
    /// inactive integration are skipped; per-calendar failures are reported
    /// in `errors`.
    #[instrument(skip(self))]
    pub async fn sync_all_user_calendars(
        &self,
        user_id: Uuid,
        force_full_sync: bool,
    ) -> Result<SyncCounters> {
        let calendars = self.store.get_calendars_by_user(user_id).await?;
        let active: HashSet<Uuid> = self
            .store
            .get_active_integrations(user_id)
            .await?
            .into_iter()
            .map(|integration| integration.id)
            .collect();

        let runnable: Vec<&Calendar> = calendars
            .iter()
            .filter(|calendar| {
                !calendar.is_external()
                    || calendar.integration_id.is_some_and(|id| active.contains(&id))
            })
            .collect();
        debug!(
            user_id = %user_id,
            calendars = calendars.len(),
            runnable = runnable.len(),
            "Starting user sync"
        );

        let runs = runnable.iter().map(|calendar| self.sync_calendar(calendar.id, force_full_sync));
        let results = join_all(runs).await;

        let mut total = SyncCounters::default();
        for (calendar, result) in runnable.iter().zip(results) {
            match result {
                Ok(counters) => total.absorb(&counters),
                Err(err) => {
                    total.errors.push(format!("{} ({}): {err}", calendar.name, calendar.id))
                }
            }
        }
        Ok(total)
    }

    async fn run_passes(
        &self,
        calendar: &Calendar,
        force_full_sync: bool,
        counters: &mut SyncCounters,
    ) -> Result<Option<String>> {
        let mut next_token = None;

        if let Some(external_id) = external_binding(calendar) {
            let adapter = self.providers.get(calendar.provider)?;
            let integration = self.active_integration(calendar).await?;
            let adapter = adapter.as_ref();
            next_token = self
                .import(calendar, external_id, adapter, &integration, force_full_sync, counters)
                .await?;
            self.export(calendar, external_id, adapter, &integration, counters).await?;
        }

        self.bind_tasks(calendar, counters).await?;

        let conflicts = self.conflicts.detect_conflicts(calendar.user_id, Some(calendar.id)).await?;
        counters.conflicts_detected = conflicts.len();

        Ok(next_token)
    }

    #[instrument(skip_all, fields(calendar_id = %calendar.id))]
    async fn import(
        &self,
        calendar: &Calendar,
        external_id: &str,
        adapter: &dyn ProviderAdapter,
        integration: &Integration,
        force_full_sync: bool,
        counters: &mut SyncCounters,
    ) -> Result<Option<String>> {
        let now = self.clock.now();
        let window = TimeRange::new(
            now - Duration::days(self.config.lookback_days),
            now + Duration::days(self.config.lookahead_days),
        )?;
        let sync_token = if force_full_sync { None } else { calendar.sync_token.as_deref() };

        let page = call_with_auth_retry(
            self.store.as_ref(),
            self.tokens.as_ref(),
            integration,
            |token| async move {
                adapter.list_events(&token, external_id, window, sync_token).await
            },
        )
        .await?;

        if page.full_resync {
            info!(calendar_id = %calendar.id, "Stored sync token expired, full window re-listed");
            self.store.clear_sync_token(calendar.id).await?;
        }

        let mut removed = Vec::new();
        let mut changed: Vec<(&str, EventFields)> = Vec::new();
        for external in &page.events {
            counters.processed += 1;
            if external.removed {
                removed.push(external.id.as_str());
                continue;
            }
            let fields = match adapter.to_internal(external) {
                Ok(fields) => fields.truncated_to_seconds(),
                Err(err) => {
                    warn!(
                        external_event_id = %external.id,
                        error = %err,
                        "Skipping malformed event"
                    );
                    counters.errors.push(format!("{}: {err}", external.id));
                    continue;
                }
            };
            if let Err(err) = fields.validate() {
                warn!(external_event_id = %external.id, error = %err, "Skipping invalid event");
                counters.errors.push(format!("{}: {err}", external.id));
                continue;
            }
            changed.push((external.id.as_str(), fields));
        }
        changed.sort_by_key(|(_, fields)| fields.start_time);

        for external_event_id in removed {
            if self.store.mark_deleted_by_external_id(calendar.id, external_event_id, now).await? {
                counters.deleted += 1;
            }
        }

        for (external_event_id, fields) in changed {
            if let Some(local) =
                self.store.find_event_by_external_id(calendar.id, external_event_id).await?
            {
                if has_unpushed_changes(&local, &fields) {
                    debug!(
                        event_id = %local.id,
                        external_event_id,
                        "Keeping newer local changes over provider copy"
                    );
                    continue;
                }
            }
            match self.store.upsert_event(calendar.id, external_event_id, &fields, now).await? {
                UpsertOutcome::Created(_) => counters.created += 1,
                UpsertOutcome::Updated(_) => counters.updated += 1,
            }
        }

        Ok(page.next_sync_token)
    }

    #[instrument(skip_all, fields(calendar_id = %calendar.id))]
    async fn export(
        &self,
        calendar: &Calendar,
        external_id: &str,
        adapter: &dyn ProviderAdapter,
        integration: &Integration,
        counters: &mut SyncCounters,
    ) -> Result<()> {
        let store = self.store.as_ref();
        let tokens = self.tokens.as_ref();

        for event in self.store.get_events_pending_export(calendar.id).await? {
            let outcome: std::result::Result<String, CallFailure> =
                match (event.external_event_id.as_deref(), event.is_active()) {
                    (None, false) => {
                        // Never created remotely, nothing to withdraw.
                        self.store.set_event_sync_status(event.id, SyncStatus::Completed).await?;
                        continue;
                    }
                    (None, true) => {
                        let payload = adapter.to_external(&event);
                        let payload = &payload;
                        call_with_auth_retry(store, tokens, integration, |token| async move {
                            adapter.create_event(&token, external_id, payload).await
                        })
                        .await
                        .map(|created| created.id)
                    }
                    (Some(remote_id), true) => {
                        let payload = adapter.to_external(&event);
                        let payload = &payload;
                        call_with_auth_retry(store, tokens, integration, |token| async move {
                            adapter.update_event(&token, external_id, remote_id, payload).await
                        })
                        .await
                        .map(|_| remote_id.to_string())
                    }
                    (Some(remote_id), false) => {
                        call_with_auth_retry(store, tokens, integration, |token| async move {
                            adapter.delete_event(&token, external_id, remote_id).await
                        })
                        .await
                        .map(|_| remote_id.to_string())
                    }
                };

            match outcome {
                Ok(remote_id) => {
                    self.store.mark_event_exported(event.id, &remote_id, self.clock.now()).await?;
                    counters.exported += 1;
                }
                Err(CallFailure::Provider(err)) => {
                    warn!(event_id = %event.id, error = %err, "Export failed, retrying next run");
                    self.store.set_event_sync_status(event.id, SyncStatus::Failed).await?;
                    counters.errors.push(format!("{}: {err}", event.id));
                }
                Err(CallFailure::Aborted(err)) => return Err(err),
            }
        }
        Ok(())
    }

    #[instrument(skip_all, fields(calendar_id = %calendar.id))]
    async fn bind_tasks(&self, calendar: &Calendar, counters: &mut SyncCounters) -> Result<()> {
        if self.config.task_binding == TaskBindingScope::PrimaryOnly && !calendar.is_primary {
            return Ok(());
        }

        let tasks = self.tasks.get_open_tasks_with_due(calendar.user_id).await?;
        if tasks.is_empty() {
            return Ok(());
        }

        let bound: HashMap<Uuid, CalendarEvent> = self
            .store
            .get_task_events(calendar.id)
            .await?
            .into_iter()
            .filter_map(|event| event.task_id.map(|task_id| (task_id, event)))
            .collect();

        let tz = calendar.tz();
        let mut derived: Vec<_> = tasks
            .iter()
            .filter(|task| !task.is_completed)
            .filter_map(|task| task_event_fields(task, tz, &self.config).map(|f| (task, f)))
            .collect();
        derived.sort_by_key(|(_, fields)| fields.start_time);

        for (task, fields) in derived {
            match bound.get(&task.id) {
                None => {
                    let event = self
                        .store
                        .insert_event(NewEvent {
                            calendar_id: calendar.id,
                            user_id: calendar.user_id,
                            fields,
                            task_id: Some(task.id),
                            sync_status: SyncStatus::Pending,
                        })
                        .await?;
                    debug!(task_id = %task.id, event_id = %event.id, "Created task event");
                    counters.created += 1;
                }
                Some(event) if !event.is_deleted && is_stale(event, task) => {
                    let mut event = event.clone();
                    apply_task_fields(&mut event, &fields);
                    event.sync_status = SyncStatus::Pending;
                    event.updated_at = self.clock.now();
                    self.store.update_event(&event).await?;
                    debug!(task_id = %task.id, event_id = %event.id, "Re-derived task event");
                    counters.updated += 1;
                }
                Some(_) => {}
            }
        }
        Ok(())
    }

    /// Register a push channel for the calendar, or renew the existing one
    /// when it expires soon. `None` for internal calendars or when no
    /// callback base URL is configured.
    #[instrument(skip(self))]
    pub async fn ensure_webhook(&self, calendar_id: Uuid) -> Result<Option<WebhookSubscription>> {
        let calendar = self.load_calendar(calendar_id).await?;
        let (Some(external_id), Some(base_url)) =
            (external_binding(&calendar), self.config.webhook_base_url.as_deref())
        else {
            return Ok(None);
        };

        let now = self.clock.now();
        let renew_before = Duration::hours(self.config.webhook_renew_before_hours);
        if let Some(existing) = &calendar.webhook {
            if !existing.needs_renewal(now, renew_before) {
                return Ok(Some(existing.clone()));
            }
        }

        let adapter = self.providers.get(calendar.provider)?;
        let adapter = adapter.as_ref();
        let integration = self.active_integration(&calendar).await?;
        let store = self.store.as_ref();
        let tokens = self.tokens.as_ref();

        let renewed = match &calendar.webhook {
            Some(existing) => {
                let result = call_with_auth_retry(store, tokens, &integration, |token| async move {
                    adapter.renew_webhook(&token, external_id, existing).await
                })
                .await;
                match result {
                    Ok(subscription) => Some(subscription),
                    Err(CallFailure::Provider(err)) => {
                        warn!(
                            calendar_id = %calendar_id,
                            error = %err,
                            "Renewal rejected, registering a new channel"
                        );
                        None
                    }
                    Err(CallFailure::Aborted(err)) => return Err(err),
                }
            }
            None => None,
        };

        let subscription = match renewed {
            Some(subscription) => subscription,
            None => {
                let callback =
                    format!("{}/webhooks/{}", base_url.trim_end_matches('/'), calendar.provider);
                let channel_token = Uuid::new_v4().simple().to_string();
                let (callback, channel_token) = (callback.as_str(), channel_token.as_str());
                call_with_auth_retry(store, tokens, &integration, |token| async move {
                    adapter.setup_webhook(&token, external_id, callback, channel_token).await
                })
                .await?
            }
        };

        self.store.save_webhook(calendar_id, Some(&subscription)).await?;
        info!(
            calendar_id = %calendar_id,
            subscription_id = %subscription.subscription_id,
            expires_at = %subscription.expires_at,
            "Webhook subscription active"
        );
        Ok(Some(subscription))
    }

    /// Stop the calendar's push channel. Returns `false` when none was set.
    #[instrument(skip(self))]
    pub async fn stop_webhook(&self, calendar_id: Uuid) -> Result<bool> {
        let calendar = self.load_calendar(calendar_id).await?;
        let Some(subscription) = &calendar.webhook else {
            return Ok(false);
        };

        if calendar.provider.is_external() {
            let adapter = self.providers.get(calendar.provider)?;
            let adapter = adapter.as_ref();
            let integration = self.active_integration(&calendar).await?;
            let result = call_with_auth_retry(
                self.store.as_ref(),
                self.tokens.as_ref(),
                &integration,
                |token| async move { adapter.stop_webhook(&token, subscription).await },
            )
            .await;
            match result {
                Ok(()) | Err(CallFailure::Provider(ProviderError::NotFound(_))) => {}
                Err(failure) => return Err(failure.into()),
            }
        }

        self.store.save_webhook(calendar_id, None).await?;
        Ok(true)
    }

    /// Ensure channels for all of the user's external calendars. Returns how
    /// many are active afterwards; individual failures are logged.
    #[instrument(skip(self))]
    pub async fn renew_user_webhooks(&self, user_id: Uuid) -> Result<usize> {
        let mut active = 0;
        for calendar in self.store.get_calendars_by_user(user_id).await? {
            if !calendar.is_external() {
                continue;
            }
            match self.ensure_webhook(calendar.id).await {
                Ok(Some(_)) => active += 1,
                Ok(None) => {}
                Err(err) => {
                    warn!(calendar_id = %calendar.id, error = %err, "Webhook renewal failed")
                }
            }
        }
        Ok(active)
    }

    async fn load_calendar(&self, calendar_id: Uuid) -> Result<Calendar> {
        self.store
            .get_calendar(calendar_id)
            .await?
            .ok_or_else(|| CadenceError::NotFound(format!("Calendar {calendar_id}")))
    }

    async fn active_integration(&self, calendar: &Calendar) -> Result<Integration> {
        let integration_id = calendar.integration_id.ok_or_else(|| {
            CadenceError::Config(format!("Calendar {} has no integration", calendar.id))
        })?;
        let integration = self
            .store
            .get_integration(integration_id)
            .await?
            .ok_or_else(|| CadenceError::NotFound(format!("Integration {integration_id}")))?;
        if !integration.is_active {
            return Err(CadenceError::Auth(format!("Integration {integration_id} is inactive")));
        }
        Ok(integration)
    }

    async fn append_log(&self, log: SyncLog) {
        if let Err(err) = self.store.append_sync_log(&log).await {
            warn!(calendar_id = %log.calendar_id, error = %err, "Failed to append sync log");
        }
    }
}

/// External calendar id when the calendar is bound to a provider.
fn external_binding(calendar: &Calendar) -> Option<&str> {
    if calendar.provider.is_external() {
        calendar.external_calendar_id.as_deref()
    } else {
        None
    }
}

/// Local copy carries edits not yet pushed and the provider copy is not newer.
fn has_unpushed_changes(local: &CalendarEvent, remote: &EventFields) -> bool {
    matches!(local.sync_status, SyncStatus::Pending | SyncStatus::Failed)
        && !local.is_deleted
        && remote.remote_updated_at.map_or(true, |remote_at| remote_at <= local.updated_at)
}
