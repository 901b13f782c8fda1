//! Google Calendar API v3 adapter

use async_trait::async_trait;
use cadence_core::{EventPage, ExternalEvent, ProviderAdapter};
use cadence_domain::constants::WEBHOOK_TTL_HOURS;
use cadence_domain::{
    AccessToken, Attendee, AttendeeResponse, CadenceError, CalendarEvent, CalendarProvider,
    EventFields, EventStatus, ProviderConfig, ProviderError, Reminder, ReminderMethod, TimeRange,
    WebhookSubscription,
};
use chrono::{DateTime, Duration, NaiveDate, SecondsFormat, TimeZone, Utc};
use reqwest::Method;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::{debug, info, instrument};
use url::Url;
use uuid::Uuid;

use super::{
    endpoint, http_client_for, parse_rfc3339, title_or_placeholder, validate_and_log_email,
};
use crate::http::HttpClient;

const PAGE_SIZE: u32 = 250;

/// Google Calendar adapter.
#[derive(Debug, Clone)]
pub struct GoogleCalendarAdapter {
    http: HttpClient,
    base_url: String,
}

impl GoogleCalendarAdapter {
    pub fn new(http: HttpClient, base_url: impl Into<String>) -> Self {
        Self { http, base_url: base_url.into() }
    }

    pub fn from_config(config: &ProviderConfig) -> Result<Self, CadenceError> {
        Ok(Self::new(http_client_for(config)?, config.api_base_url.clone()))
    }

    fn events_url(&self, calendar_id: &str, tail: &[&str]) -> Result<Url, ProviderError> {
        let mut segments = vec!["calendars", calendar_id, "events"];
        segments.extend_from_slice(tail);
        endpoint(&self.base_url, &segments)
    }

    async fn list_pages(
        &self,
        token: &AccessToken,
        calendar_id: &str,
        window: TimeRange,
        sync_token: Option<&str>,
    ) -> Result<EventPage, ProviderError> {
        let url = self.events_url(calendar_id, &[])?;
        let mut events = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut query: Vec<(&str, String)> = vec![
                ("maxResults", PAGE_SIZE.to_string()),
                ("singleEvents", "true".to_string()),
            ];
            match sync_token {
                Some(sync_token) => query.push(("syncToken", sync_token.to_string())),
                None => {
                    query.push(("timeMin", rfc3339(window.start())));
                    query.push(("timeMax", rfc3339(window.end())));
                }
            }
            if let Some(page_token) = &page_token {
                query.push(("pageToken", page_token.clone()));
            }

            let request = self
                .http
                .request(Method::GET, url.clone())
                .bearer_auth(token.secret())
                .query(&query);
            let page: GoogleEventList = self.http.send_json(request).await?;

            for item in page.items {
                events.push(external_event(item)?);
            }

            match page.next_page_token {
                Some(next) => page_token = Some(next),
                None => {
                    debug!(
                        calendar_id,
                        events = events.len(),
                        incremental = sync_token.is_some(),
                        "google listing complete"
                    );
                    return Ok(EventPage {
                        events,
                        next_sync_token: page.next_sync_token,
                        full_resync: false,
                    });
                }
            }
        }
    }
}

#[async_trait]
impl ProviderAdapter for GoogleCalendarAdapter {
    fn provider(&self) -> CalendarProvider {
        CalendarProvider::Google
    }

    #[instrument(skip(self, token, sync_token))]
    async fn list_events(
        &self,
        token: &AccessToken,
        external_calendar_id: &str,
        window: TimeRange,
        sync_token: Option<&str>,
    ) -> Result<EventPage, ProviderError> {
        let Some(sync_token) = sync_token else {
            return self.list_pages(token, external_calendar_id, window, None).await;
        };

        match self.list_pages(token, external_calendar_id, window, Some(sync_token)).await {
            Err(ProviderError::SyncTokenExpired) => {
                info!(external_calendar_id, "google sync token expired, listing full window");
                let mut page = self.list_pages(token, external_calendar_id, window, None).await?;
                page.full_resync = true;
                Ok(page)
            }
            other => other,
        }
    }

    async fn create_event(
        &self,
        token: &AccessToken,
        external_calendar_id: &str,
        payload: &Value,
    ) -> Result<ExternalEvent, ProviderError> {
        let url = self.events_url(external_calendar_id, &[])?;
        let request = self.http.request(Method::POST, url).bearer_auth(token.secret()).json(payload);
        external_event(self.http.send_json(request).await?)
    }

    async fn update_event(
        &self,
        token: &AccessToken,
        external_calendar_id: &str,
        external_event_id: &str,
        payload: &Value,
    ) -> Result<ExternalEvent, ProviderError> {
        let url = self.events_url(external_calendar_id, &[external_event_id])?;
        let request = self.http.request(Method::PUT, url).bearer_auth(token.secret()).json(payload);
        external_event(self.http.send_json(request).await?)
    }

    async fn delete_event(
        &self,
        token: &AccessToken,
        external_calendar_id: &str,
        external_event_id: &str,
    ) -> Result<bool, ProviderError> {
        let url = self.events_url(external_calendar_id, &[external_event_id])?;
        let request = self.http.request(Method::DELETE, url).bearer_auth(token.secret());
        match self.http.send(request).await {
            Ok(_) => Ok(true),
            // 410 Gone: already deleted
            Err(ProviderError::NotFound(_) | ProviderError::SyncTokenExpired) => Ok(false),
            Err(err) => Err(err),
        }
    }

    fn to_internal(&self, event: &ExternalEvent) -> Result<EventFields, ProviderError> {
        let wire: GoogleEvent = serde_json::from_value(event.payload.clone()).map_err(|err| {
            ProviderError::Malformed(format!("google event {}: {err}", event.id))
        })?;

        let (start_time, all_day) = wire.start.resolve("start")?;
        let (end_time, _) = wire.end.resolve("end")?;

        let attendees = wire
            .attendees
            .into_iter()
            .filter_map(|a| {
                let email = validate_and_log_email(&a.email, &event.id)?;
                Some(Attendee {
                    email,
                    display_name: a.display_name,
                    response: match a.response_status.as_deref() {
                        Some("accepted") => AttendeeResponse::Accepted,
                        Some("declined") => AttendeeResponse::Declined,
                        Some("tentative") => AttendeeResponse::Tentative,
                        _ => AttendeeResponse::NeedsAction,
                    },
                    optional: a.optional,
                })
            })
            .collect();

        let reminders = wire
            .reminders
            .map(|r| r.overrides)
            .unwrap_or_default()
            .into_iter()
            .map(|o| Reminder {
                method: if o.method.eq_ignore_ascii_case("email") {
                    ReminderMethod::Email
                } else {
                    ReminderMethod::Popup
                },
                minutes_before: o.minutes,
            })
            .collect();

        Ok(EventFields {
            title: title_or_placeholder(wire.summary),
            description: wire.description,
            location: wire.location.filter(|l| !l.trim().is_empty()),
            start_time,
            end_time,
            all_day,
            timezone: wire.start.time_zone.unwrap_or_else(|| "UTC".to_string()),
            status: match wire.status.as_deref() {
                Some("tentative") => EventStatus::Tentative,
                Some("cancelled") => EventStatus::Cancelled,
                _ => EventStatus::Confirmed,
            },
            attendees,
            reminders,
            recurrence: wire.recurrence,
            external_recurring_id: wire.recurring_event_id,
            remote_updated_at: event.updated_at,
        })
    }

    fn to_external(&self, event: &CalendarEvent) -> Value {
        let mut body = Map::new();
        body.insert("summary".into(), json!(event.title));
        if let Some(description) = &event.description {
            body.insert("description".into(), json!(description));
        }
        if let Some(location) = &event.location {
            body.insert("location".into(), json!(location));
        }
        body.insert("start".into(), wire_time(event.start_time, event.all_day, &event.timezone));
        body.insert("end".into(), wire_time(event.end_time, event.all_day, &event.timezone));
        body.insert("status".into(), json!(event.status.as_str()));

        if !event.attendees.is_empty() {
            let attendees: Vec<Value> = event
                .attendees
                .iter()
                .map(|a| {
                    let mut attendee = Map::new();
                    attendee.insert("email".into(), json!(a.email));
                    if let Some(name) = &a.display_name {
                        attendee.insert("displayName".into(), json!(name));
                    }
                    attendee.insert("optional".into(), json!(a.optional));
                    attendee.insert("responseStatus".into(), json!(response_status(a.response)));
                    Value::Object(attendee)
                })
                .collect();
            body.insert("attendees".into(), Value::Array(attendees));
        }

        let overrides: Vec<Value> = event
            .reminders
            .iter()
            .map(|r| json!({ "method": r.method.as_str(), "minutes": r.minutes_before }))
            .collect();
        body.insert(
            "reminders".into(),
            json!({ "useDefault": overrides.is_empty(), "overrides": overrides }),
        );

        if !event.recurrence.is_empty() {
            body.insert("recurrence".into(), json!(event.recurrence));
        }
        Value::Object(body)
    }

    #[instrument(skip(self, token, channel_token))]
    async fn setup_webhook(
        &self,
        token: &AccessToken,
        external_calendar_id: &str,
        callback_url: &str,
        channel_token: &str,
    ) -> Result<WebhookSubscription, ProviderError> {
        let url = self.events_url(external_calendar_id, &["watch"])?;
        let ttl_secs = Duration::hours(WEBHOOK_TTL_HOURS).num_seconds();
        let body = json!({
            "id": Uuid::new_v4().to_string(),
            "type": "web_hook",
            "address": callback_url,
            "token": channel_token,
            "params": { "ttl": ttl_secs.to_string() },
        });

        let request = self.http.request(Method::POST, url).bearer_auth(token.secret()).json(&body);
        let channel: GoogleChannel = self.http.send_json(request).await?;

        let expires_at = match channel.expiration.as_deref() {
            Some(ms) => parse_epoch_millis(ms)?,
            None => Utc::now() + Duration::hours(WEBHOOK_TTL_HOURS),
        };
        info!(channel_id = %channel.id, %expires_at, "google watch channel created");

        Ok(WebhookSubscription {
            subscription_id: channel.id,
            resource_id: channel.resource_id,
            channel_token: channel_token.to_string(),
            callback_url: callback_url.to_string(),
            expires_at,
        })
    }

    /// Google channels cannot be extended; stop the old one and open a new
    /// channel with the same token and callback.
    async fn renew_webhook(
        &self,
        token: &AccessToken,
        external_calendar_id: &str,
        subscription: &WebhookSubscription,
    ) -> Result<WebhookSubscription, ProviderError> {
        match self.stop_webhook(token, subscription).await {
            Ok(()) | Err(ProviderError::NotFound(_)) => {}
            Err(err) => return Err(err),
        }
        self.setup_webhook(
            token,
            external_calendar_id,
            &subscription.callback_url,
            &subscription.channel_token,
        )
        .await
    }

    async fn stop_webhook(
        &self,
        token: &AccessToken,
        subscription: &WebhookSubscription,
    ) -> Result<(), ProviderError> {
        let url = endpoint(&self.base_url, &["channels", "stop"])?;
        let body = json!({
            "id": subscription.subscription_id,
            "resourceId": subscription.resource_id,
        });
        let request = self.http.request(Method::POST, url).bearer_auth(token.secret()).json(&body);
        self.http.send(request).await?;
        Ok(())
    }
}

fn rfc3339(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn wire_time(value: DateTime<Utc>, all_day: bool, timezone: &str) -> Value {
    if all_day {
        json!({ "date": value.date_naive().format("%Y-%m-%d").to_string() })
    } else {
        json!({ "dateTime": rfc3339(value), "timeZone": timezone })
    }
}

fn response_status(response: AttendeeResponse) -> &'static str {
    match response {
        AttendeeResponse::NeedsAction => "needsAction",
        AttendeeResponse::Accepted => "accepted",
        AttendeeResponse::Declined => "declined",
        AttendeeResponse::Tentative => "tentative",
    }
}

fn parse_epoch_millis(raw: &str) -> Result<DateTime<Utc>, ProviderError> {
    raw.trim()
        .parse::<i64>()
        .ok()
        .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
        .ok_or_else(|| ProviderError::Malformed(format!("invalid channel expiration '{raw}'")))
}

/// Wrap a raw item, keeping the payload for `to_internal`.
fn external_event(item: Value) -> Result<ExternalEvent, ProviderError> {
    let id = item
        .get("id")
        .and_then(Value::as_str)
        .ok_or_else(|| ProviderError::Malformed("google event without id".into()))?
        .to_string();
    let removed = item.get("status").and_then(Value::as_str) == Some("cancelled");
    let updated_at = match item.get("updated").and_then(Value::as_str) {
        Some(raw) => Some(parse_rfc3339("updated", raw)?),
        None => None,
    };
    Ok(ExternalEvent { id, removed, updated_at, payload: item })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GoogleEventList {
    #[serde(default)]
    items: Vec<Value>,
    next_page_token: Option<String>,
    next_sync_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GoogleEvent {
    status: Option<String>,
    summary: Option<String>,
    description: Option<String>,
    location: Option<String>,
    start: GoogleDateTime,
    end: GoogleDateTime,
    #[serde(default)]
    attendees: Vec<GoogleAttendee>,
    reminders: Option<GoogleReminders>,
    #[serde(default)]
    recurrence: Vec<String>,
    recurring_event_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GoogleDateTime {
    date_time: Option<String>,
    date: Option<String>,
    time_zone: Option<String>,
}

impl GoogleDateTime {
    /// Timed events carry `dateTime`; all-day events carry `date` and are
    /// anchored at midnight UTC.
    fn resolve(&self, field: &str) -> Result<(DateTime<Utc>, bool), ProviderError> {
        if let Some(date_time) = &self.date_time {
            return Ok((parse_rfc3339(field, date_time)?, false));
        }
        let date = self.date.as_deref().ok_or_else(|| {
            ProviderError::Malformed(format!("{field} has neither dateTime nor date"))
        })?;
        let day = NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d").map_err(|err| {
            ProviderError::Malformed(format!("invalid {field} date '{date}': {err}"))
        })?;
        Ok((day.and_time(chrono::NaiveTime::MIN).and_utc(), true))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GoogleAttendee {
    #[serde(default)]
    email: String,
    display_name: Option<String>,
    response_status: Option<String>,
    #[serde(default)]
    optional: bool,
}

#[derive(Debug, Deserialize)]
struct GoogleReminders {
    #[serde(default)]
    overrides: Vec<GoogleReminderOverride>,
}

#[derive(Debug, Deserialize)]
struct GoogleReminderOverride {
    method: String,
    minutes: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GoogleChannel {
    id: String,
    resource_id: Option<String>,
    expiration: Option<String>,
}
