//! Calendars, providers and webhook subscriptions

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::event::SyncStatus;
use crate::impl_domain_status_conversions;

/// External calendar system a calendar is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalendarProvider {
    Internal,
    Google,
    Microsoft,
}

impl_domain_status_conversions!(CalendarProvider {
    Internal => "internal",
    Google => "google",
    Microsoft => "microsoft",
});

impl CalendarProvider {
    pub fn is_external(self) -> bool {
        !matches!(self, Self::Internal)
    }
}

/// Push-notification channel registered with a provider for one calendar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookSubscription {
    /// Google channel id / Microsoft subscription id.
    pub subscription_id: String,
    /// Google `resourceId`; Microsoft has no separate resource id.
    pub resource_id: Option<String>,
    /// Shared secret echoed back by the provider (`X-Goog-Channel-Token` /
    /// `clientState`).
    pub channel_token: String,
    pub callback_url: String,
    pub expires_at: DateTime<Utc>,
}

impl WebhookSubscription {
    /// True when the subscription expires within `renew_before` of `now`.
    pub fn needs_renewal(&self, now: DateTime<Utc>, renew_before: Duration) -> bool {
        self.expires_at - renew_before <= now
    }
}

/// A container of events, either internal or bound to an external calendar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Calendar {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub provider: CalendarProvider,
    pub external_calendar_id: Option<String>,
    pub integration_id: Option<Uuid>,
    pub is_primary: bool,
    /// IANA timezone name used for date-only task scheduling.
    pub timezone: String,
    pub sync_status: SyncStatus,
    /// Opaque provider cursor for incremental sync.
    pub sync_token: Option<String>,
    pub last_sync_at: Option<DateTime<Utc>>,
    /// When the current run claimed the calendar; used to detect abandoned runs.
    pub sync_started_at: Option<DateTime<Utc>>,
    pub webhook: Option<WebhookSubscription>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Calendar {
    /// True for calendars bound to an external provider calendar.
    pub fn is_external(&self) -> bool {
        self.provider.is_external() && self.external_calendar_id.is_some()
    }

    /// Timezone parsed as `chrono_tz::Tz`, falling back to UTC.
    pub fn tz(&self) -> chrono_tz::Tz {
        self.timezone.parse().unwrap_or(chrono_tz::UTC)
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn webhook_renewal_window() {
        let expires = Utc.with_ymd_and_hms(2025, 5, 2, 12, 0, 0).unwrap();
        let sub = WebhookSubscription {
            subscription_id: "chan-1".into(),
            resource_id: None,
            channel_token: "secret".into(),
            callback_url: "https://hooks.example.com/google".into(),
            expires_at: expires,
        };
        let renew_before = Duration::hours(12);
        assert!(!sub.needs_renewal(expires - Duration::hours(13), renew_before));
        assert!(sub.needs_renewal(expires - Duration::hours(12), renew_before));
        assert!(sub.needs_renewal(expires + Duration::hours(1), renew_before));
    }

    #[test]
    fn provider_names() {
        assert_eq!(CalendarProvider::Microsoft.to_string(), "microsoft");
        assert_eq!("Google".parse::<CalendarProvider>().unwrap(), CalendarProvider::Google);
        assert!(!CalendarProvider::Internal.is_external());
    }
}
