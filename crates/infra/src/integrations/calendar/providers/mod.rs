//! Provider adapters for Google Calendar and Microsoft Graph
//!
//! Both implement [`cadence_core::ProviderAdapter`] on top of the shared
//! retrying [`HttpClient`](crate::http::HttpClient).

pub mod google;
pub mod microsoft;

use std::time::Duration;

use cadence_domain::{CadenceError, ProviderConfig, ProviderError};
use chrono::{DateTime, Utc};
use tracing::warn;
use url::Url;

pub use google::GoogleCalendarAdapter;
pub use microsoft::MicrosoftCalendarAdapter;

use crate::http::HttpClient;

const USER_AGENT: &str = concat!("cadence/", env!("CARGO_PKG_VERSION"));

/// Build the HTTP client for one provider from its config section.
pub(crate) fn http_client_for(config: &ProviderConfig) -> Result<HttpClient, CadenceError> {
    HttpClient::builder()
        .timeout(Duration::from_secs(config.request_timeout_secs))
        .max_attempts(config.max_attempts)
        .user_agent(USER_AGENT)
        .build()
}

/// Append percent-encoded path segments to `base`.
pub(crate) fn endpoint(base: &str, segments: &[&str]) -> Result<Url, ProviderError> {
    let mut url = Url::parse(base)
        .map_err(|err| ProviderError::Malformed(format!("invalid API base url {base}: {err}")))?;
    {
        let mut path = url.path_segments_mut().map_err(|()| {
            ProviderError::Malformed(format!("API base url cannot carry a path: {base}"))
        })?;
        path.pop_if_empty().extend(segments);
    }
    Ok(url)
}

pub(crate) fn parse_rfc3339(field: &str, value: &str) -> Result<DateTime<Utc>, ProviderError> {
    DateTime::parse_from_rfc3339(value.trim())
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|err| ProviderError::Malformed(format!("invalid {field} '{value}': {err}")))
}

/// Returns None only for empty emails. Malformed emails (missing @) are
/// logged but kept, as provider data is canonical.
pub(crate) fn validate_and_log_email(email: &str, event_id: &str) -> Option<String> {
    let trimmed = email.trim();
    if trimmed.is_empty() {
        warn!(event_id, email, "empty attendee email");
        return None;
    }
    if !trimmed.contains('@') {
        warn!(event_id, email, "attendee email missing @ symbol");
    }
    Some(trimmed.to_string())
}

/// Blank or missing titles become a placeholder.
pub(crate) fn title_or_placeholder(title: Option<String>) -> String {
    title.filter(|t| !t.trim().is_empty()).unwrap_or_else(|| "(No title)".to_string())
}
