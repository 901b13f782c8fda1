//! Provider lookup by tag

use std::collections::HashMap;
use std::sync::Arc;

use cadence_domain::{CadenceError, CalendarProvider, Result};

use super::ports::ProviderAdapter;

/// Adapters keyed by provider, built once at startup.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    adapters: HashMap<CalendarProvider, Arc<dyn ProviderAdapter>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an adapter under its own tag, replacing any previous one.
    pub fn register(mut self, adapter: Arc<dyn ProviderAdapter>) -> Self {
        self.adapters.insert(adapter.provider(), adapter);
        self
    }

    pub fn get(&self, provider: CalendarProvider) -> Result<Arc<dyn ProviderAdapter>> {
        self.adapters
            .get(&provider)
            .cloned()
            .ok_or_else(|| CadenceError::Config(format!("No adapter registered for {provider}")))
    }

    pub fn providers(&self) -> impl Iterator<Item = CalendarProvider> + '_ {
        self.adapters.keys().copied()
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.adapters.keys().collect::<Vec<_>>())
            .finish()
    }
}
