//! Provider integrations and credentials

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::calendar::CalendarProvider;
use super::event::SyncStatus;

/// Opaque handle to a secret held by a credential vault. The plaintext never
/// lives in the event store.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SealedSecret(String);

impl SealedSecret {
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    pub fn reference(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for SealedSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SealedSecret(..)")
    }
}

/// Bearer credential handed to provider adapters.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn secret(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AccessToken(..)")
    }
}

/// One connection between a user and a provider (unique per pair).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Integration {
    pub id: Uuid,
    pub user_id: Uuid,
    pub provider: CalendarProvider,
    pub account_email: Option<String>,
    pub access_token: SealedSecret,
    pub refresh_token: Option<SealedSecret>,
    pub token_expires_at: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub sync_status: SyncStatus,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Integration {
    /// Access token is missing an expiry or expires within `threshold_secs`.
    pub fn token_expiring(&self, now: DateTime<Utc>, threshold_secs: i64) -> bool {
        match self.token_expires_at {
            Some(expires_at) => (expires_at - now).num_seconds() <= threshold_secs,
            None => false,
        }
    }
}

/// Fresh credentials returned by a refresh.
#[derive(Debug, Clone, PartialEq)]
pub struct RefreshedCredentials {
    pub access_token: SealedSecret,
    pub refresh_token: Option<SealedSecret>,
    pub expires_at: DateTime<Utc>,
}
