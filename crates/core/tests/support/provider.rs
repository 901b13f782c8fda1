//! Scripted provider adapter
//!
//! Listing results and write failures are queued up front; every call is
//! recorded for later assertions. Wire payloads use a minimal JSON shape:
//! `{"title", "start", "end", "location", "status", "updated"}`.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use cadence_core::{EventPage, ExternalEvent, ProviderAdapter};
use cadence_domain::{
    AccessToken, CalendarEvent, CalendarProvider, EventFields, EventStatus, ProviderError,
    TimeRange, WebhookSubscription,
};
use chrono::{DateTime, Duration, Utc};
use serde_json::{json, Value};

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    List { sync_token: Option<String>, token: String },
    Create { title: String },
    Update { id: String },
    Delete { id: String },
    SetupWebhook { callback_url: String },
    RenewWebhook { subscription_id: String },
    StopWebhook { subscription_id: String },
}

pub struct ScriptedAdapter {
    provider: CalendarProvider,
    pages: Mutex<VecDeque<Result<EventPage, ProviderError>>>,
    write_failures: Mutex<VecDeque<ProviderError>>,
    calls: Mutex<Vec<Call>>,
    next_id: AtomicU32,
}

impl ScriptedAdapter {
    pub fn google() -> Self {
        Self {
            provider: CalendarProvider::Google,
            pages: Mutex::new(VecDeque::new()),
            write_failures: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
            next_id: AtomicU32::new(1),
        }
    }

    pub fn push_page(&self, page: EventPage) {
        self.pages.lock().unwrap().push_back(Ok(page));
    }

    pub fn push_list_error(&self, err: ProviderError) {
        self.pages.lock().unwrap().push_back(Err(err));
    }

    /// The next write call (create/update/delete/webhook) fails with `err`.
    pub fn fail_next_write(&self, err: ProviderError) {
        self.write_failures.lock().unwrap().push_back(err);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn take_write_failure(&self) -> Result<(), ProviderError> {
        match self.write_failures.lock().unwrap().pop_front() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

/// Wire-shaped event for scripted pages.
pub fn remote_event(
    id: &str,
    title: &str,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    updated: DateTime<Utc>,
) -> ExternalEvent {
    ExternalEvent {
        id: id.into(),
        removed: false,
        updated_at: Some(updated),
        payload: json!({
            "title": title,
            "start": start.to_rfc3339(),
            "end": end.to_rfc3339(),
            "status": "confirmed",
            "updated": updated.to_rfc3339(),
        }),
    }
}

pub fn removed_event(id: &str) -> ExternalEvent {
    ExternalEvent { id: id.into(), removed: true, updated_at: None, payload: Value::Null }
}

pub fn page(events: Vec<ExternalEvent>, next_sync_token: &str) -> EventPage {
    EventPage { events, next_sync_token: Some(next_sync_token.into()), full_resync: false }
}

fn parse_time(payload: &Value, key: &str) -> Result<DateTime<Utc>, ProviderError> {
    payload
        .get(key)
        .and_then(Value::as_str)
        .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
        .map(|at| at.with_timezone(&Utc))
        .ok_or_else(|| ProviderError::Malformed(format!("missing {key}")))
}

#[async_trait]
impl ProviderAdapter for ScriptedAdapter {
    fn provider(&self) -> CalendarProvider {
        self.provider
    }

    async fn list_events(
        &self,
        token: &AccessToken,
        _external_calendar_id: &str,
        _window: TimeRange,
        sync_token: Option<&str>,
    ) -> Result<EventPage, ProviderError> {
        self.record(Call::List {
            sync_token: sync_token.map(str::to_string),
            token: token.secret().to_string(),
        });
        self.pages.lock().unwrap().pop_front().unwrap_or_else(|| Ok(EventPage::default()))
    }

    async fn create_event(
        &self,
        _token: &AccessToken,
        _external_calendar_id: &str,
        payload: &Value,
    ) -> Result<ExternalEvent, ProviderError> {
        let title = payload["title"].as_str().unwrap_or_default().to_string();
        self.record(Call::Create { title });
        self.take_write_failure()?;
        let id = format!("remote-{}", self.next_id.fetch_add(1, Ordering::SeqCst));
        Ok(ExternalEvent { id, removed: false, updated_at: None, payload: payload.clone() })
    }

    async fn update_event(
        &self,
        _token: &AccessToken,
        _external_calendar_id: &str,
        external_event_id: &str,
        payload: &Value,
    ) -> Result<ExternalEvent, ProviderError> {
        self.record(Call::Update { id: external_event_id.into() });
        self.take_write_failure()?;
        Ok(ExternalEvent {
            id: external_event_id.into(),
            removed: false,
            updated_at: None,
            payload: payload.clone(),
        })
    }

    async fn delete_event(
        &self,
        _token: &AccessToken,
        _external_calendar_id: &str,
        external_event_id: &str,
    ) -> Result<bool, ProviderError> {
        self.record(Call::Delete { id: external_event_id.into() });
        self.take_write_failure()?;
        Ok(true)
    }

    fn to_internal(&self, event: &ExternalEvent) -> Result<EventFields, ProviderError> {
        let payload = &event.payload;
        let title = payload
            .get("title")
            .and_then(Value::as_str)
            .ok_or_else(|| ProviderError::Malformed("missing title".into()))?;
        let status = match payload.get("status").and_then(Value::as_str) {
            Some("cancelled") => EventStatus::Cancelled,
            Some("tentative") => EventStatus::Tentative,
            _ => EventStatus::Confirmed,
        };
        Ok(EventFields {
            title: title.to_string(),
            description: payload.get("description").and_then(Value::as_str).map(str::to_string),
            location: payload.get("location").and_then(Value::as_str).map(str::to_string),
            start_time: parse_time(payload, "start")?,
            end_time: parse_time(payload, "end")?,
            all_day: false,
            timezone: "UTC".into(),
            status,
            attendees: vec![],
            reminders: vec![],
            recurrence: vec![],
            external_recurring_id: None,
            remote_updated_at: event.updated_at,
        })
    }

    fn to_external(&self, event: &CalendarEvent) -> Value {
        json!({
            "title": event.title,
            "start": event.start_time.to_rfc3339(),
            "end": event.end_time.to_rfc3339(),
            "location": event.location,
            "status": event.status.as_str(),
        })
    }

    async fn setup_webhook(
        &self,
        _token: &AccessToken,
        _external_calendar_id: &str,
        callback_url: &str,
        channel_token: &str,
    ) -> Result<WebhookSubscription, ProviderError> {
        self.record(Call::SetupWebhook { callback_url: callback_url.into() });
        self.take_write_failure()?;
        Ok(WebhookSubscription {
            subscription_id: format!("channel-{}", self.next_id.fetch_add(1, Ordering::SeqCst)),
            resource_id: Some("resource-1".into()),
            channel_token: channel_token.into(),
            callback_url: callback_url.into(),
            expires_at: super::base_time() + Duration::days(7),
        })
    }

    async fn renew_webhook(
        &self,
        _token: &AccessToken,
        _external_calendar_id: &str,
        subscription: &WebhookSubscription,
    ) -> Result<WebhookSubscription, ProviderError> {
        self.record(Call::RenewWebhook { subscription_id: subscription.subscription_id.clone() });
        self.take_write_failure()?;
        let mut renewed = subscription.clone();
        renewed.expires_at = subscription.expires_at + Duration::days(7);
        Ok(renewed)
    }

    async fn stop_webhook(
        &self,
        _token: &AccessToken,
        subscription: &WebhookSubscription,
    ) -> Result<(), ProviderError> {
        self.record(Call::StopWebhook { subscription_id: subscription.subscription_id.clone() });
        self.take_write_failure()
    }
}
