//! Inbound push notifications
//!
//! Providers deliver at least once, so a notification only ever triggers an
//! incremental sync; duplicates are absorbed by the upsert key.

use std::sync::Arc;

use cadence_domain::{CadenceError, CalendarProvider, Result, SyncCounters};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::orchestrator::SyncOrchestrator;
use super::ports::EventStore;

/// Provider-independent view of one notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookNotification {
    pub provider: CalendarProvider,
    /// Google channel id / Microsoft subscription id.
    pub subscription_id: String,
    pub resource_id: Option<String>,
    /// Google channel token / Microsoft `clientState`.
    pub channel_token: Option<String>,
    /// Google `X-Goog-Resource-State`; `sync` marks the handshake.
    pub resource_state: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookDisposition {
    Synced { calendar_id: Uuid, counters: SyncCounters },
    /// Channel creation handshake, acknowledged without syncing.
    Handshake,
    /// Unknown or superseded channel.
    Ignored,
    /// A run for the calendar was already in flight and will pick up the
    /// change.
    AlreadyRunning { calendar_id: Uuid },
}

pub struct WebhookIntake {
    store: Arc<dyn EventStore>,
    orchestrator: Arc<SyncOrchestrator>,
}

impl WebhookIntake {
    pub fn new(store: Arc<dyn EventStore>, orchestrator: Arc<SyncOrchestrator>) -> Self {
        Self { store, orchestrator }
    }

    /// Verify the notification against the stored subscription and trigger
    /// one incremental sync. A token mismatch is an `Auth` error.
    #[instrument(skip(self, notification), fields(provider = %notification.provider))]
    pub async fn handle(&self, notification: WebhookNotification) -> Result<WebhookDisposition> {
        let Some(calendar) = self
            .store
            .find_calendar_by_webhook(notification.provider, &notification.subscription_id)
            .await?
        else {
            debug!(
                subscription_id = %notification.subscription_id,
                "Notification for unknown channel"
            );
            return Ok(WebhookDisposition::Ignored);
        };
        let Some(subscription) = calendar.webhook.as_ref() else {
            return Ok(WebhookDisposition::Ignored);
        };

        if notification.channel_token.as_deref() != Some(subscription.channel_token.as_str()) {
            warn!(calendar_id = %calendar.id, "Webhook channel token mismatch");
            return Err(CadenceError::Auth("Webhook channel token mismatch".to_string()));
        }

        if let (Some(expected), Some(received)) =
            (subscription.resource_id.as_deref(), notification.resource_id.as_deref())
        {
            if expected != received {
                debug!(calendar_id = %calendar.id, "Notification for a superseded resource");
                return Ok(WebhookDisposition::Ignored);
            }
        }

        if notification.resource_state.as_deref() == Some("sync") {
            debug!(calendar_id = %calendar.id, "Channel handshake acknowledged");
            return Ok(WebhookDisposition::Handshake);
        }

        match self.orchestrator.sync_calendar(calendar.id, false).await {
            Ok(counters) => {
                info!(calendar_id = %calendar.id, "Webhook-triggered sync finished");
                Ok(WebhookDisposition::Synced { calendar_id: calendar.id, counters })
            }
            Err(CadenceError::SyncInProgress(calendar_id)) => {
                Ok(WebhookDisposition::AlreadyRunning { calendar_id })
            }
            Err(err) => Err(err),
        }
    }
}
