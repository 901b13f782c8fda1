//! Refresh-and-retry-once wrapper around provider calls

use std::future::Future;

use cadence_domain::{AccessToken, CadenceError, Integration, ProviderError};
use thiserror::Error;
use tracing::{info, warn};

use crate::sync::ports::{EventStore, TokenSupplier};

/// Outcome of a failed authenticated call.
#[derive(Debug, Error)]
pub enum CallFailure {
    /// The provider rejected the request; the failure is scoped to it.
    #[error(transparent)]
    Provider(ProviderError),

    /// Credentials are unusable or the store failed; the run must stop.
    #[error(transparent)]
    Aborted(CadenceError),
}

impl From<CallFailure> for CadenceError {
    fn from(failure: CallFailure) -> Self {
        match failure {
            CallFailure::Provider(err) => err.into(),
            CallFailure::Aborted(err) => err,
        }
    }
}

/// Run `op` with a valid token. A 401 triggers exactly one forced refresh and
/// retry; a second 401 deactivates the integration.
pub async fn call_with_auth_retry<T, F, Fut>(
    store: &dyn EventStore,
    tokens: &dyn TokenSupplier,
    integration: &Integration,
    mut op: F,
) -> Result<T, CallFailure>
where
    F: FnMut(AccessToken) -> Fut,
    Fut: Future<Output = Result<T, ProviderError>>,
{
    let token = tokens.get_valid_token(integration).await.map_err(CallFailure::Aborted)?;

    let err = match op(token).await {
        Ok(value) => return Ok(value),
        Err(err) if err.is_auth() => err,
        Err(err) => return Err(CallFailure::Provider(err)),
    };

    info!(integration_id = %integration.id, error = %err, "Provider rejected token, refreshing");
    let fresh = tokens.refresh(integration).await.map_err(CallFailure::Aborted)?;

    match op(fresh).await {
        Ok(value) => Ok(value),
        Err(err) if err.is_auth() => {
            warn!(
                integration_id = %integration.id,
                error = %err,
                "Token rejected after refresh, deactivating integration"
            );
            let reason = format!("Authentication failed after refresh: {err}");
            store
                .deactivate_integration(integration.id, &reason)
                .await
                .map_err(CallFailure::Aborted)?;
            Err(CallFailure::Aborted(CadenceError::Auth(reason)))
        }
        Err(err) => Err(CallFailure::Provider(err)),
    }
}
