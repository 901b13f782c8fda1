//! HTTP intake for provider push notifications
//!
//! - `POST /webhooks/google`: channel notifications carried in `X-Goog-*`
//!   headers, answered with 200
//! - `POST /webhooks/microsoft`: Graph change notifications, answered with
//!   202; a `validationToken` query parameter is echoed back as plain text

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::Router;
use cadence_core::{WebhookDisposition, WebhookIntake, WebhookNotification};
use cadence_domain::{CadenceError, CalendarProvider};
use serde::Deserialize;
use tracing::{debug, error, warn};

const GOOG_CHANNEL_ID: &str = "x-goog-channel-id";
const GOOG_RESOURCE_ID: &str = "x-goog-resource-id";
const GOOG_CHANNEL_TOKEN: &str = "x-goog-channel-token";
const GOOG_RESOURCE_STATE: &str = "x-goog-resource-state";

/// Routes for both providers, sharing one intake.
pub fn webhook_router(intake: Arc<WebhookIntake>) -> Router {
    Router::new()
        .route("/webhooks/google", post(google_notification))
        .route("/webhooks/microsoft", post(microsoft_notification))
        .with_state(intake)
}

async fn google_notification(
    State(intake): State<Arc<WebhookIntake>>,
    headers: HeaderMap,
) -> StatusCode {
    let Some(subscription_id) = header_value(&headers, GOOG_CHANNEL_ID) else {
        return StatusCode::BAD_REQUEST;
    };

    let notification = WebhookNotification {
        provider: CalendarProvider::Google,
        subscription_id,
        resource_id: header_value(&headers, GOOG_RESOURCE_ID),
        channel_token: header_value(&headers, GOOG_CHANNEL_TOKEN),
        resource_state: header_value(&headers, GOOG_RESOURCE_STATE),
    };

    match dispatch(&intake, notification).await {
        Ok(()) => StatusCode::OK,
        Err(status) => status,
    }
}

async fn microsoft_notification(
    State(intake): State<Arc<WebhookIntake>>,
    Query(params): Query<HashMap<String, String>>,
    body: Bytes,
) -> Response {
    if let Some(token) = params.get("validationToken") {
        debug!("answering graph subscription validation");
        return (StatusCode::OK, [(header::CONTENT_TYPE, "text/plain")], token.clone())
            .into_response();
    }

    let batch: GraphNotificationBatch = match serde_json::from_slice(&body) {
        Ok(batch) => batch,
        Err(err) => {
            warn!(error = %err, "malformed graph notification body");
            return StatusCode::BAD_REQUEST.into_response();
        }
    };

    // Graph batches several changes for one subscription into one delivery.
    let mut seen = HashSet::new();
    let mut outcome = StatusCode::ACCEPTED;
    for item in batch.value {
        if !seen.insert(item.subscription_id.clone()) {
            continue;
        }
        let notification = WebhookNotification {
            provider: CalendarProvider::Microsoft,
            subscription_id: item.subscription_id,
            resource_id: None,
            channel_token: item.client_state,
            resource_state: item.change_type,
        };
        if let Err(status) = dispatch(&intake, notification).await {
            outcome = match (outcome, status) {
                (StatusCode::UNAUTHORIZED, _) | (_, StatusCode::UNAUTHORIZED) => {
                    StatusCode::UNAUTHORIZED
                }
                _ => status,
            };
        }
    }
    outcome.into_response()
}

async fn dispatch(
    intake: &WebhookIntake,
    notification: WebhookNotification,
) -> Result<(), StatusCode> {
    match intake.handle(notification).await {
        Ok(WebhookDisposition::Synced { calendar_id, counters }) => {
            debug!(%calendar_id, ?counters, "notification synced");
            Ok(())
        }
        Ok(disposition) => {
            debug!(?disposition, "notification acknowledged");
            Ok(())
        }
        Err(CadenceError::Auth(message)) => {
            warn!(%message, "rejected webhook notification");
            Err(StatusCode::UNAUTHORIZED)
        }
        Err(err) => {
            error!(error = %err, "webhook-triggered sync failed");
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

#[derive(Debug, Deserialize)]
struct GraphNotificationBatch {
    #[serde(default)]
    value: Vec<GraphNotification>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GraphNotification {
    subscription_id: String,
    client_state: Option<String>,
    change_type: Option<String>,
}
