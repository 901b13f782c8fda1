//! Provider credential storage in the system keyring
use std::sync::Arc;

use cadence_core::CredentialVault;
use cadence_domain::{CadenceError, Result, SealedSecret};
use dashmap::DashMap;
use keyring::Entry;
use tracing::debug;

use crate::errors::InfraError;

const SERVICE_NAME: &str = "com.cadence.calendar";

/// [`CredentialVault`] backed by the OS keychain.
///
/// A sealed secret's reference is the keyring account name under the
/// configured service. Entries are cached so repeated lookups reuse the
/// same platform handle.
pub struct KeyringCredentialVault {
    service: String,
    entries: DashMap<String, Arc<Entry>>,
}

impl KeyringCredentialVault {
    pub fn new(service: impl Into<String>) -> Self {
        Self { service: service.into(), entries: DashMap::new() }
    }

    fn entry(&self, key: &str) -> Result<Arc<Entry>> {
        if let Some(entry) = self.entries.get(key) {
            return Ok(Arc::clone(entry.value()));
        }
        let entry = Arc::new(Entry::new(&self.service, key).map_err(keyring_error)?);
        let entry = self.entries.entry(key.to_string()).or_insert(entry);
        Ok(Arc::clone(entry.value()))
    }
}

impl Default for KeyringCredentialVault {
    fn default() -> Self {
        Self::new(SERVICE_NAME)
    }
}

impl CredentialVault for KeyringCredentialVault {
    fn seal(&self, key: &str, plaintext: &str) -> Result<SealedSecret> {
        if key.trim().is_empty() {
            return Err(CadenceError::InvalidInput("credential key must not be empty".into()));
        }
        self.entry(key)?.set_password(plaintext).map_err(keyring_error)?;
        debug!(key, "credential stored in keychain");
        Ok(SealedSecret::new(key))
    }

    fn open(&self, secret: &SealedSecret) -> Result<String> {
        self.entry(secret.reference())?.get_password().map_err(keyring_error)
    }

    fn remove(&self, secret: &SealedSecret) -> Result<()> {
        let result = self.entry(secret.reference())?.delete_credential();
        self.entries.remove(secret.reference());
        match result {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(err) => Err(keyring_error(err)),
        }
    }
}

fn keyring_error(err: keyring::Error) -> CadenceError {
    InfraError::from(err).into()
}
