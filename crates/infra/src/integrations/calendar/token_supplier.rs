//! OAuth2 refresh-token flow behind the [`TokenSupplier`] port.
//!
//! Refreshes are serialized per integration. A caller that waited on the
//! lock re-reads the integration and reuses a token another caller already
//! refreshed instead of spending the refresh token twice.

use std::sync::Arc;

use async_trait::async_trait;
use cadence_common::time::{Clock, SystemClock};
use cadence_core::{CredentialVault, EventStore, TokenSupplier};
use cadence_domain::constants::TOKEN_REFRESH_THRESHOLD_SECS;
use cadence_domain::{
    AccessToken, CadenceError, CalendarProvider, Integration, ProviderConfig, ProviderError,
    ProvidersConfig, RefreshedCredentials, Result,
};
use chrono::Duration;
use dashmap::DashMap;
use reqwest::Method;
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::http::HttpClient;

/// Lifetime assumed when the token endpoint omits `expires_in`.
const DEFAULT_EXPIRES_IN_SECS: i64 = 3600;

pub struct OAuthTokenSupplier {
    store: Arc<dyn EventStore>,
    vault: Arc<dyn CredentialVault>,
    http: HttpClient,
    providers: ProvidersConfig,
    clock: Arc<dyn Clock>,
    locks: DashMap<Uuid, Arc<Mutex<()>>>,
    threshold_secs: i64,
}

impl OAuthTokenSupplier {
    pub fn new(
        store: Arc<dyn EventStore>,
        vault: Arc<dyn CredentialVault>,
        http: HttpClient,
        providers: ProvidersConfig,
    ) -> Self {
        Self {
            store,
            vault,
            http,
            providers,
            clock: Arc::new(SystemClock),
            locks: DashMap::new(),
            threshold_secs: TOKEN_REFRESH_THRESHOLD_SECS,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    fn provider_config(&self, provider: CalendarProvider) -> Result<&ProviderConfig> {
        match provider {
            CalendarProvider::Google => Ok(&self.providers.google),
            CalendarProvider::Microsoft => Ok(&self.providers.microsoft),
            CalendarProvider::Internal => Err(CadenceError::InvalidInput(
                "internal calendars have no OAuth credentials".into(),
            )),
        }
    }

    fn lock_for(&self, integration_id: Uuid) -> Arc<Mutex<()>> {
        self.locks.entry(integration_id).or_insert_with(|| Arc::new(Mutex::new(()))).clone()
    }

    fn open_access_token(&self, integration: &Integration) -> Result<AccessToken> {
        self.vault.open(&integration.access_token).map(AccessToken::new)
    }

    /// Refresh under the per-integration lock. With `only_if_expiring`, a
    /// token that is no longer near expiry after the re-read is returned as is.
    async fn refresh_serialized(
        &self,
        integration: &Integration,
        only_if_expiring: bool,
    ) -> Result<AccessToken> {
        let lock = self.lock_for(integration.id);
        let _guard = lock.lock().await;

        let current = self
            .store
            .get_integration(integration.id)
            .await?
            .unwrap_or_else(|| integration.clone());

        if !current.is_active {
            return Err(CadenceError::Auth(format!(
                "integration {} is inactive; reconnect required",
                current.id
            )));
        }

        if current.token_expires_at != integration.token_expires_at {
            debug!(integration_id = %current.id, "token refreshed concurrently, reusing it");
            return self.open_access_token(&current);
        }
        if only_if_expiring && !current.token_expiring(self.clock.now(), self.threshold_secs) {
            return self.open_access_token(&current);
        }

        self.exchange_refresh_token(&current).await
    }

    #[instrument(skip(self, integration), fields(integration_id = %integration.id, provider = %integration.provider))]
    async fn exchange_refresh_token(&self, integration: &Integration) -> Result<AccessToken> {
        let Some(refresh_ref) = integration.refresh_token.as_ref() else {
            return Err(self.deactivate(integration, "no refresh token stored").await);
        };
        let refresh_token = self.vault.open(refresh_ref)?;
        let config = self.provider_config(integration.provider)?;

        let mut form = vec![
            ("grant_type", "refresh_token".to_string()),
            ("refresh_token", refresh_token),
            ("client_id", config.client_id.clone()),
        ];
        if let Some(secret) = &config.client_secret {
            form.push(("client_secret", secret.clone()));
        }

        let request = self.http.request(Method::POST, &config.token_url).form(&form);
        let response: TokenResponse = match self.http.send_json(request).await {
            Ok(response) => response,
            Err(err) if is_grant_rejection(&err) => {
                return Err(self.deactivate(integration, &format!("refresh rejected: {err}")).await);
            }
            Err(err) => {
                warn!(error = %err, "token refresh failed transiently");
                return Err(if err.is_transient() {
                    CadenceError::Network(format!("token refresh failed: {err}"))
                } else {
                    err.into()
                });
            }
        };

        let key_prefix = format!("integration/{}", integration.id);
        let access_token = self
            .vault
            .seal(&format!("{key_prefix}/access_token"), &response.access_token)?;
        let refresh_token = match response.refresh_token.as_deref() {
            Some(rotated) => Some(self.vault.seal(&format!("{key_prefix}/refresh_token"), rotated)?),
            None => None,
        };
        let expires_in = response.expires_in.unwrap_or(DEFAULT_EXPIRES_IN_SECS);
        let expires_at = self.clock.now() + Duration::seconds(expires_in);

        self.store
            .update_integration_credentials(
                integration.id,
                &RefreshedCredentials { access_token, refresh_token, expires_at },
            )
            .await?;

        info!(%expires_at, "access token refreshed");
        Ok(AccessToken::new(response.access_token))
    }

    /// Mark the integration unusable and build the error handed to callers.
    async fn deactivate(&self, integration: &Integration, reason: &str) -> CadenceError {
        warn!(integration_id = %integration.id, reason, "deactivating integration");
        if let Err(err) = self.store.deactivate_integration(integration.id, reason).await {
            warn!(integration_id = %integration.id, error = %err, "failed to deactivate integration");
        }
        CadenceError::Auth(format!("integration {} requires reconnection: {reason}", integration.id))
    }
}

#[async_trait]
impl TokenSupplier for OAuthTokenSupplier {
    async fn get_valid_token(&self, integration: &Integration) -> Result<AccessToken> {
        if !integration.is_active {
            return Err(CadenceError::Auth(format!(
                "integration {} is inactive; reconnect required",
                integration.id
            )));
        }
        if integration.token_expiring(self.clock.now(), self.threshold_secs) {
            return self.refresh_serialized(integration, true).await;
        }
        self.open_access_token(integration)
    }

    async fn refresh(&self, integration: &Integration) -> Result<AccessToken> {
        self.refresh_serialized(integration, false).await
    }
}

/// `invalid_grant` and plain 400/401 answers mean the refresh token is dead.
fn is_grant_rejection(err: &ProviderError) -> bool {
    match err {
        ProviderError::Unauthorized(_) => true,
        ProviderError::Client { status, message } => {
            *status == 400 || *status == 401 || message.contains("invalid_grant")
        }
        _ => false,
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: Option<String>,
    expires_in: Option<i64>,
}
