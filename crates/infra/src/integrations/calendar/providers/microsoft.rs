//! Microsoft Graph calendar adapter
//!
//! Listing uses `calendarView/delta`; the returned `@odata.deltaLink` is the
//! opaque sync token. Recurrence patterns are translated to and from RRULE
//! lines so the internal model stays provider-neutral.

use async_trait::async_trait;
use cadence_core::{EventPage, ExternalEvent, ProviderAdapter};
use cadence_domain::constants::WEBHOOK_TTL_HOURS;
use cadence_domain::{
    AccessToken, Attendee, AttendeeResponse, CadenceError, CalendarEvent, CalendarProvider,
    EventFields, EventStatus, ProviderConfig, ProviderError, Reminder, ReminderMethod, TimeRange,
    WebhookSubscription,
};
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, TimeZone, Utc};
use reqwest::{Method, RequestBuilder};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::{debug, info, instrument, warn};
use url::Url;

use super::{
    endpoint, http_client_for, parse_rfc3339, title_or_placeholder, validate_and_log_email,
};
use crate::http::HttpClient;

const OUTLOOK_TIMEZONE_HEADER: &str = r#"outlook.timezone="UTC""#;
const OUTLOOK_MAX_PAGE_SIZE_HEADER: &str = r#"odata.maxpagesize=50"#;
const OUTLOOK_ID_TYPE_HEADER: &str = r#"IdType="ImmutableId""#;
/// Graph caps calendar subscriptions at just under three days.
const MAX_SUBSCRIPTION_MINUTES: i64 = 4230;
const GRAPH_DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

/// Microsoft Graph (Outlook / 365) calendar adapter.
#[derive(Debug, Clone)]
pub struct MicrosoftCalendarAdapter {
    http: HttpClient,
    base_url: String,
}

impl MicrosoftCalendarAdapter {
    pub fn new(http: HttpClient, base_url: impl Into<String>) -> Self {
        Self { http, base_url: base_url.into() }
    }

    pub fn from_config(config: &ProviderConfig) -> Result<Self, CadenceError> {
        Ok(Self::new(http_client_for(config)?, config.api_base_url.clone()))
    }

    fn calendar_url(&self, calendar_id: &str, tail: &[&str]) -> Result<Url, ProviderError> {
        let mut segments = calendar_segments(calendar_id);
        segments.extend_from_slice(tail);
        endpoint(&self.base_url, &segments)
    }

    fn authorized(&self, method: Method, url: Url, token: &AccessToken) -> RequestBuilder {
        self.http
            .request(method, url)
            .bearer_auth(token.secret())
            .header("Prefer", OUTLOOK_TIMEZONE_HEADER)
            .header("Prefer", OUTLOOK_ID_TYPE_HEADER)
    }

    async fn list_pages(
        &self,
        token: &AccessToken,
        calendar_id: &str,
        window: TimeRange,
        delta_link: Option<&str>,
    ) -> Result<EventPage, ProviderError> {
        let mut next = match delta_link {
            Some(link) => Url::parse(link)
                .map_err(|_| ProviderError::SyncTokenExpired)?,
            None => {
                let mut url = self.calendar_url(calendar_id, &["calendarView", "delta"])?;
                url.query_pairs_mut()
                    .append_pair("startDateTime", &graph_query_time(window.start()))
                    .append_pair("endDateTime", &graph_query_time(window.end()));
                url
            }
        };
        let mut events = Vec::new();

        loop {
            let request = self
                .authorized(Method::GET, next.clone(), token)
                .header("Prefer", OUTLOOK_MAX_PAGE_SIZE_HEADER);
            let page: GraphEventList = self.http.send_json(request).await.map_err(delta_error)?;

            for item in page.value {
                events.push(external_event(item)?);
            }

            if let Some(link) = page.next_link {
                next = Url::parse(&link).map_err(|err| {
                    ProviderError::Malformed(format!("invalid @odata.nextLink: {err}"))
                })?;
                continue;
            }

            debug!(
                calendar_id,
                events = events.len(),
                incremental = delta_link.is_some(),
                "graph delta listing complete"
            );
            return Ok(EventPage {
                events,
                next_sync_token: page.delta_link,
                full_resync: false,
            });
        }
    }
}

#[async_trait]
impl ProviderAdapter for MicrosoftCalendarAdapter {
    fn provider(&self) -> CalendarProvider {
        CalendarProvider::Microsoft
    }

    #[instrument(skip(self, token, sync_token))]
    async fn list_events(
        &self,
        token: &AccessToken,
        external_calendar_id: &str,
        window: TimeRange,
        sync_token: Option<&str>,
    ) -> Result<EventPage, ProviderError> {
        let Some(delta_link) = sync_token else {
            return self.list_pages(token, external_calendar_id, window, None).await;
        };

        match self.list_pages(token, external_calendar_id, window, Some(delta_link)).await {
            Err(ProviderError::SyncTokenExpired) => {
                info!(external_calendar_id, "graph delta token rejected, listing full window");
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
        let url = self.calendar_url(external_calendar_id, &["events"])?;
        let request = self.authorized(Method::POST, url, token).json(payload);
        external_event(self.http.send_json(request).await?)
    }

    async fn update_event(
        &self,
        token: &AccessToken,
        _external_calendar_id: &str,
        external_event_id: &str,
        payload: &Value,
    ) -> Result<ExternalEvent, ProviderError> {
        let url = endpoint(&self.base_url, &["me", "events", external_event_id])?;
        let request = self.authorized(Method::PATCH, url, token).json(payload);
        external_event(self.http.send_json(request).await?)
    }

    async fn delete_event(
        &self,
        token: &AccessToken,
        _external_calendar_id: &str,
        external_event_id: &str,
    ) -> Result<bool, ProviderError> {
        let url = endpoint(&self.base_url, &["me", "events", external_event_id])?;
        match self.http.send(self.authorized(Method::DELETE, url, token)).await {
            Ok(_) => Ok(true),
            Err(ProviderError::NotFound(_)) => Ok(false),
            Err(err) => Err(err),
        }
    }

    fn to_internal(&self, event: &ExternalEvent) -> Result<EventFields, ProviderError> {
        let wire: GraphEvent = serde_json::from_value(event.payload.clone()).map_err(|err| {
            ProviderError::Malformed(format!("graph event {}: {err}", event.id))
        })?;

        let start_time = wire.start.resolve("start")?;
        let end_time = wire.end.resolve("end")?;

        let attendees = wire
            .attendees
            .into_iter()
            .filter_map(|a| {
                let email = validate_and_log_email(&a.email_address.address, &event.id)?;
                Some(Attendee {
                    email,
                    display_name: a.email_address.name.filter(|n| !n.trim().is_empty()),
                    response: match a.status.and_then(|s| s.response).as_deref() {
                        Some("accepted" | "organizer") => AttendeeResponse::Accepted,
                        Some("tentativelyAccepted") => AttendeeResponse::Tentative,
                        Some("declined") => AttendeeResponse::Declined,
                        _ => AttendeeResponse::NeedsAction,
                    },
                    optional: a.kind.as_deref() == Some("optional"),
                })
            })
            .collect();

        let reminders = match (wire.is_reminder_on, wire.reminder_minutes_before_start) {
            (true, Some(minutes)) => {
                vec![Reminder { method: ReminderMethod::Popup, minutes_before: minutes }]
            }
            _ => Vec::new(),
        };

        let status = if wire.is_cancelled {
            EventStatus::Cancelled
        } else if wire.show_as.as_deref() == Some("tentative") {
            EventStatus::Tentative
        } else {
            EventStatus::Confirmed
        };

        let description = match wire.body {
            Some(body) if body.content_type.eq_ignore_ascii_case("text") => Some(body.content),
            _ => wire.body_preview,
        }
        .filter(|d| !d.trim().is_empty());

        Ok(EventFields {
            title: title_or_placeholder(wire.subject),
            description,
            location: wire.location.and_then(|l| l.display_name).filter(|l| !l.trim().is_empty()),
            start_time,
            end_time,
            all_day: wire.is_all_day,
            timezone: wire
                .original_start_time_zone
                .filter(|tz| tz.parse::<chrono_tz::Tz>().is_ok())
                .unwrap_or_else(|| "UTC".to_string()),
            status,
            attendees,
            reminders,
            recurrence: wire.recurrence.as_ref().map(graph_to_rrule).into_iter().flatten().collect(),
            external_recurring_id: wire.series_master_id,
            remote_updated_at: event.updated_at,
        })
    }

    fn to_external(&self, event: &CalendarEvent) -> Value {
        let mut body = Map::new();
        body.insert("subject".into(), json!(event.title));
        body.insert(
            "body".into(),
            json!({ "contentType": "text", "content": event.description.clone().unwrap_or_default() }),
        );
        if let Some(location) = &event.location {
            body.insert("location".into(), json!({ "displayName": location }));
        }
        body.insert("start".into(), graph_time(event.start_time));
        body.insert("end".into(), graph_time(event.end_time));
        body.insert("isAllDay".into(), json!(event.all_day));
        body.insert(
            "showAs".into(),
            json!(if event.status == EventStatus::Tentative { "tentative" } else { "busy" }),
        );

        let attendees: Vec<Value> = event
            .attendees
            .iter()
            .map(|a| {
                let mut address = Map::new();
                address.insert("address".into(), json!(a.email));
                if let Some(name) = &a.display_name {
                    address.insert("name".into(), json!(name));
                }
                json!({
                    "emailAddress": Value::Object(address),
                    "type": if a.optional { "optional" } else { "required" },
                })
            })
            .collect();
        body.insert("attendees".into(), Value::Array(attendees));

        match event.reminders.iter().map(|r| r.minutes_before).max() {
            Some(minutes) => {
                body.insert("isReminderOn".into(), json!(true));
                body.insert("reminderMinutesBeforeStart".into(), json!(minutes));
            }
            None => {
                body.insert("isReminderOn".into(), json!(false));
            }
        }

        if let Some(recurrence) =
            event.recurrence.iter().find_map(|line| rrule_to_graph(line, event.start_time))
        {
            body.insert("recurrence".into(), recurrence);
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
        let url = endpoint(&self.base_url, &["subscriptions"])?;
        let mut resource = calendar_segments(external_calendar_id);
        resource.push("events");
        let body = json!({
            "changeType": "created,updated,deleted",
            "notificationUrl": callback_url,
            "resource": resource.join("/"),
            "expirationDateTime": graph_query_time(subscription_expiry()),
            "clientState": channel_token,
        });

        let request = self.authorized(Method::POST, url, token).json(&body);
        let created: GraphSubscription = self.http.send_json(request).await?;
        let expires_at = parse_rfc3339("expirationDateTime", &created.expiration_date_time)?;
        info!(subscription_id = %created.id, %expires_at, "graph subscription created");

        Ok(WebhookSubscription {
            subscription_id: created.id,
            resource_id: None,
            channel_token: channel_token.to_string(),
            callback_url: callback_url.to_string(),
            expires_at,
        })
    }

    async fn renew_webhook(
        &self,
        token: &AccessToken,
        _external_calendar_id: &str,
        subscription: &WebhookSubscription,
    ) -> Result<WebhookSubscription, ProviderError> {
        let url = endpoint(&self.base_url, &["subscriptions", &subscription.subscription_id])?;
        let body = json!({ "expirationDateTime": graph_query_time(subscription_expiry()) });
        let request = self.authorized(Method::PATCH, url, token).json(&body);
        let renewed: GraphSubscription = self.http.send_json(request).await?;

        Ok(WebhookSubscription {
            expires_at: parse_rfc3339("expirationDateTime", &renewed.expiration_date_time)?,
            ..subscription.clone()
        })
    }

    async fn stop_webhook(
        &self,
        token: &AccessToken,
        subscription: &WebhookSubscription,
    ) -> Result<(), ProviderError> {
        let url = endpoint(&self.base_url, &["subscriptions", &subscription.subscription_id])?;
        match self.http.send(self.authorized(Method::DELETE, url, token)).await {
            Ok(_) | Err(ProviderError::NotFound(_)) => Ok(()),
            Err(err) => Err(err),
        }
    }
}

/// `primary` addresses the default calendar.
fn calendar_segments(calendar_id: &str) -> Vec<&str> {
    if calendar_id.eq_ignore_ascii_case("primary") {
        vec!["me", "calendar"]
    } else {
        vec!["me", "calendars", calendar_id]
    }
}

/// Graph signals an unusable delta token with 410 or with a 400 carrying
/// `syncStateNotFound` / `resyncRequired`.
fn delta_error(err: ProviderError) -> ProviderError {
    match err {
        ProviderError::Client { status: 400, ref message }
            if message.contains("syncStateNotFound") || message.contains("resyncRequired") =>
        {
            ProviderError::SyncTokenExpired
        }
        other => other,
    }
}

fn subscription_expiry() -> DateTime<Utc> {
    let minutes = (WEBHOOK_TTL_HOURS * 60).min(MAX_SUBSCRIPTION_MINUTES);
    Utc::now() + Duration::minutes(minutes)
}

fn graph_query_time(value: DateTime<Utc>) -> String {
    value.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

fn graph_time(value: DateTime<Utc>) -> Value {
    json!({ "dateTime": value.format("%Y-%m-%dT%H:%M:%S").to_string(), "timeZone": "UTC" })
}

fn external_event(item: Value) -> Result<ExternalEvent, ProviderError> {
    let id = item
        .get("id")
        .and_then(Value::as_str)
        .ok_or_else(|| ProviderError::Malformed("graph event without id".into()))?
        .to_string();
    let removed = item.get("@removed").is_some();
    let updated_at = match item.get("lastModifiedDateTime").and_then(Value::as_str) {
        Some(raw) => Some(parse_rfc3339("lastModifiedDateTime", raw)?),
        None => None,
    };
    Ok(ExternalEvent { id, removed, updated_at, payload: item })
}

// ============================================================================
// Recurrence translation
// ============================================================================

const WEEKDAYS: [(&str, &str); 7] = [
    ("monday", "MO"),
    ("tuesday", "TU"),
    ("wednesday", "WE"),
    ("thursday", "TH"),
    ("friday", "FR"),
    ("saturday", "SA"),
    ("sunday", "SU"),
];

const WEEK_INDEX: [(&str, &str); 5] =
    [("first", "1"), ("second", "2"), ("third", "3"), ("fourth", "4"), ("last", "-1")];

fn lookup<'a>(table: &'a [(&'a str, &'a str)], key: &str, forward: bool) -> Option<&'a str> {
    table.iter().find_map(|(graph, ical)| {
        if forward {
            graph.eq_ignore_ascii_case(key).then_some(*ical)
        } else {
            ical.eq_ignore_ascii_case(key).then_some(*graph)
        }
    })
}

/// Graph `patternedRecurrence` to a single RRULE line. Unknown pattern types
/// yield nothing rather than a wrong rule.
fn graph_to_rrule(recurrence: &GraphRecurrence) -> Option<String> {
    let pattern = &recurrence.pattern;
    let (freq, relative) = match pattern.kind.as_str() {
        "daily" => ("DAILY", false),
        "weekly" => ("WEEKLY", false),
        "absoluteMonthly" => ("MONTHLY", false),
        "relativeMonthly" => ("MONTHLY", true),
        "absoluteYearly" => ("YEARLY", false),
        "relativeYearly" => ("YEARLY", true),
        other => {
            warn!(pattern = other, "unsupported graph recurrence pattern");
            return None;
        }
    };

    let mut parts = vec![format!("FREQ={freq}")];
    if pattern.interval > 1 {
        parts.push(format!("INTERVAL={}", pattern.interval));
    }

    let days: Vec<&str> =
        pattern.days_of_week.iter().filter_map(|d| lookup(&WEEKDAYS, d, true)).collect();
    if !days.is_empty() && (freq == "WEEKLY" || relative) {
        let prefix = if relative {
            lookup(&WEEK_INDEX, pattern.index.as_deref().unwrap_or("first"), true).unwrap_or("1")
        } else {
            ""
        };
        let by_day: Vec<String> = days.iter().map(|d| format!("{prefix}{d}")).collect();
        parts.push(format!("BYDAY={}", by_day.join(",")));
    }
    if !relative {
        if let Some(day) = pattern.day_of_month.filter(|d| *d > 0) {
            if freq == "MONTHLY" || freq == "YEARLY" {
                parts.push(format!("BYMONTHDAY={day}"));
            }
        }
    }
    if freq == "YEARLY" {
        if let Some(month) = pattern.month.filter(|m| *m > 0) {
            parts.push(format!("BYMONTH={month}"));
        }
    }

    if let Some(range) = &recurrence.range {
        match range.kind.as_str() {
            "numbered" => {
                if let Some(count) = range.number_of_occurrences.filter(|n| *n > 0) {
                    parts.push(format!("COUNT={count}"));
                }
            }
            "endDate" => {
                if let Some(end) = range
                    .end_date
                    .as_deref()
                    .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
                {
                    parts.push(format!("UNTIL={}", end.format("%Y%m%d")));
                }
            }
            _ => {}
        }
    }

    Some(format!("RRULE:{}", parts.join(";")))
}

/// RRULE line to a Graph `patternedRecurrence`. Returns `None` for lines
/// that are not RRULEs (EXDATE, RDATE) or use unsupported frequencies.
fn rrule_to_graph(line: &str, start: DateTime<Utc>) -> Option<Value> {
    let rule = line.trim().strip_prefix("RRULE:")?;
    let mut freq = None;
    let mut interval = 1_i64;
    let mut by_day: Vec<String> = Vec::new();
    let mut by_month_day = None;
    let mut by_month = None;
    let mut count = None;
    let mut until = None;

    for part in rule.split(';') {
        let (key, value) = part.split_once('=')?;
        match key.to_ascii_uppercase().as_str() {
            "FREQ" => freq = Some(value.to_ascii_uppercase()),
            "INTERVAL" => interval = value.parse().ok()?,
            "BYDAY" => by_day = value.split(',').map(str::to_string).collect(),
            "BYMONTHDAY" => by_month_day = value.parse::<i64>().ok(),
            "BYMONTH" => by_month = value.parse::<i64>().ok(),
            "COUNT" => count = value.parse::<i64>().ok(),
            "UNTIL" => until = value.get(..8).and_then(|d| NaiveDate::parse_from_str(d, "%Y%m%d").ok()),
            _ => {}
        }
    }

    // Split "2MO" / "-1FR" into week index and weekday.
    let mut index = None;
    let mut days = Vec::new();
    for entry in &by_day {
        let split = entry.find(|c: char| c.is_ascii_alphabetic())?;
        let (ordinal, day) = entry.split_at(split);
        days.push(lookup(&WEEKDAYS, day, false)?);
        if !ordinal.is_empty() {
            index = lookup(&WEEK_INDEX, ordinal.trim_start_matches('+'), false);
        }
    }

    let kind = match (freq?.as_str(), index.is_some()) {
        ("DAILY", _) => "daily",
        ("WEEKLY", _) => "weekly",
        ("MONTHLY", false) => "absoluteMonthly",
        ("MONTHLY", true) => "relativeMonthly",
        ("YEARLY", false) => "absoluteYearly",
        ("YEARLY", true) => "relativeYearly",
        _ => return None,
    };

    let start_date = start.date_naive();
    let mut pattern = Map::new();
    pattern.insert("type".into(), json!(kind));
    pattern.insert("interval".into(), json!(interval));
    if !days.is_empty() {
        pattern.insert("daysOfWeek".into(), json!(days));
    }
    if let Some(index) = index {
        pattern.insert("index".into(), json!(index));
    }
    if kind == "absoluteMonthly" || kind == "absoluteYearly" {
        let day = by_month_day.unwrap_or_else(|| i64::from(chrono::Datelike::day(&start_date)));
        pattern.insert("dayOfMonth".into(), json!(day));
    }
    if kind.ends_with("Yearly") {
        let month = by_month.unwrap_or_else(|| i64::from(chrono::Datelike::month(&start_date)));
        pattern.insert("month".into(), json!(month));
    }

    let mut range = Map::new();
    range.insert("startDate".into(), json!(start_date.format("%Y-%m-%d").to_string()));
    match (count, until) {
        (Some(count), _) => {
            range.insert("type".into(), json!("numbered"));
            range.insert("numberOfOccurrences".into(), json!(count));
        }
        (None, Some(until)) => {
            range.insert("type".into(), json!("endDate"));
            range.insert("endDate".into(), json!(until.format("%Y-%m-%d").to_string()));
        }
        (None, None) => {
            range.insert("type".into(), json!("noEnd"));
        }
    }

    Some(json!({ "pattern": Value::Object(pattern), "range": Value::Object(range) }))
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Deserialize)]
struct GraphEventList {
    #[serde(default)]
    value: Vec<Value>,
    #[serde(rename = "@odata.nextLink")]
    next_link: Option<String>,
    #[serde(rename = "@odata.deltaLink")]
    delta_link: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GraphEvent {
    subject: Option<String>,
    body: Option<GraphBody>,
    body_preview: Option<String>,
    location: Option<GraphLocation>,
    start: GraphDateTime,
    end: GraphDateTime,
    #[serde(default)]
    is_all_day: bool,
    #[serde(default)]
    is_cancelled: bool,
    show_as: Option<String>,
    #[serde(default)]
    attendees: Vec<GraphAttendee>,
    #[serde(default)]
    is_reminder_on: bool,
    reminder_minutes_before_start: Option<i64>,
    recurrence: Option<GraphRecurrence>,
    series_master_id: Option<String>,
    original_start_time_zone: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GraphBody {
    #[serde(default)]
    content_type: String,
    #[serde(default)]
    content: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GraphLocation {
    display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GraphDateTime {
    date_time: String,
    time_zone: Option<String>,
}

impl GraphDateTime {
    /// Graph returns zone-less local times plus a `timeZone`; with the
    /// `outlook.timezone="UTC"` preference that zone is UTC.
    fn resolve(&self, field: &str) -> Result<DateTime<Utc>, ProviderError> {
        let raw = self.date_time.trim();
        if raw.ends_with('Z') || raw.contains('+') {
            return parse_rfc3339(field, raw);
        }
        let naive = NaiveDateTime::parse_from_str(raw, GRAPH_DATETIME_FORMAT).map_err(|err| {
            ProviderError::Malformed(format!("invalid {field} '{raw}': {err}"))
        })?;

        match self.time_zone.as_deref().map(str::trim) {
            None | Some("") => Ok(naive.and_utc()),
            Some(zone) if zone.eq_ignore_ascii_case("utc") => Ok(naive.and_utc()),
            Some(zone) => match zone.parse::<chrono_tz::Tz>() {
                Ok(tz) => tz.from_local_datetime(&naive).earliest().map(|dt| dt.with_timezone(&Utc)).ok_or_else(
                    || ProviderError::Malformed(format!("{field} '{raw}' does not exist in {zone}")),
                ),
                Err(_) => {
                    warn!(zone, "unknown graph time zone, assuming UTC");
                    Ok(naive.and_utc())
                }
            },
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GraphAttendee {
    email_address: GraphEmailAddress,
    #[serde(rename = "type")]
    kind: Option<String>,
    status: Option<GraphResponseStatus>,
}

#[derive(Debug, Deserialize)]
struct GraphEmailAddress {
    #[serde(default)]
    address: String,
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GraphResponseStatus {
    response: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GraphRecurrence {
    pattern: GraphPattern,
    range: Option<GraphRange>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GraphPattern {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default = "default_interval")]
    interval: i64,
    #[serde(default)]
    days_of_week: Vec<String>,
    day_of_month: Option<i64>,
    month: Option<i64>,
    index: Option<String>,
}

fn default_interval() -> i64 {
    1
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GraphRange {
    #[serde(rename = "type")]
    kind: String,
    end_date: Option<String>,
    number_of_occurrences: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GraphSubscription {
    id: String,
    expiration_date_time: String,
}
