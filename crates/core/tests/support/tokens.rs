//! Token supplier double

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use cadence_core::TokenSupplier;
use cadence_domain::{AccessToken, CadenceError, Integration, Result};

/// Hands out `token-<n>` where `n` counts refreshes.
#[derive(Default)]
pub struct StaticTokenSupplier {
    refreshes: AtomicU32,
    reject_refresh: Mutex<bool>,
}

impl StaticTokenSupplier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn refresh_count(&self) -> u32 {
        self.refreshes.load(Ordering::SeqCst)
    }

    pub fn reject_refresh(&self) {
        *self.reject_refresh.lock().unwrap() = true;
    }
}

#[async_trait]
impl TokenSupplier for StaticTokenSupplier {
    async fn get_valid_token(&self, _integration: &Integration) -> Result<AccessToken> {
        Ok(AccessToken::new(format!("token-{}", self.refresh_count())))
    }

    async fn refresh(&self, _integration: &Integration) -> Result<AccessToken> {
        if *self.reject_refresh.lock().unwrap() {
            return Err(CadenceError::Auth("invalid_grant".into()));
        }
        let n = self.refreshes.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(AccessToken::new(format!("token-{n}")))
    }
}
