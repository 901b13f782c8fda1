//! Provider adapter contract
//!
//! One implementation per external calendar system, registered against its
//! [`CalendarProvider`] tag. Adapters hold no per-calendar state.

use async_trait::async_trait;
use cadence_domain::{
    AccessToken, CalendarEvent, CalendarProvider, EventFields, ProviderError, TimeRange,
    WebhookSubscription,
};
use chrono::{DateTime, Utc};

/// Event as returned by a provider, still in wire shape.
#[derive(Debug, Clone, PartialEq)]
pub struct ExternalEvent {
    pub id: String,
    /// Provider reported the event as deleted.
    pub removed: bool,
    pub updated_at: Option<DateTime<Utc>>,
    pub payload: serde_json::Value,
}

/// Result of a (possibly paginated) listing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventPage {
    pub events: Vec<ExternalEvent>,
    pub next_sync_token: Option<String>,
    /// The stored token was rejected and the adapter re-listed the full
    /// window; the caller must drop its old token.
    pub full_resync: bool,
}

#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    fn provider(&self) -> CalendarProvider;

    /// Changes since `sync_token`, or the whole window when the token is
    /// absent. An expired token is handled internally by re-listing.
    async fn list_events(
        &self,
        token: &AccessToken,
        external_calendar_id: &str,
        window: TimeRange,
        sync_token: Option<&str>,
    ) -> Result<EventPage, ProviderError>;

    async fn create_event(
        &self,
        token: &AccessToken,
        external_calendar_id: &str,
        payload: &serde_json::Value,
    ) -> Result<ExternalEvent, ProviderError>;

    async fn update_event(
        &self,
        token: &AccessToken,
        external_calendar_id: &str,
        external_event_id: &str,
        payload: &serde_json::Value,
    ) -> Result<ExternalEvent, ProviderError>;

    /// Returns `false` when the event was already gone.
    async fn delete_event(
        &self,
        token: &AccessToken,
        external_calendar_id: &str,
        external_event_id: &str,
    ) -> Result<bool, ProviderError>;

    /// Pure wire-to-internal mapping.
    fn to_internal(&self, event: &ExternalEvent) -> Result<EventFields, ProviderError>;

    /// Pure internal-to-wire mapping.
    fn to_external(&self, event: &CalendarEvent) -> serde_json::Value;

    async fn setup_webhook(
        &self,
        token: &AccessToken,
        external_calendar_id: &str,
        callback_url: &str,
        channel_token: &str,
    ) -> Result<WebhookSubscription, ProviderError>;

    async fn renew_webhook(
        &self,
        token: &AccessToken,
        external_calendar_id: &str,
        subscription: &WebhookSubscription,
    ) -> Result<WebhookSubscription, ProviderError>;

    async fn stop_webhook(
        &self,
        token: &AccessToken,
        subscription: &WebhookSubscription,
    ) -> Result<(), ProviderError>;
}
