//! Shared test helpers for `cadence-core` integration tests.
//!
//! In-memory implementations of every port plus fixture builders, so tests
//! can focus on behaviour instead of wiring.

#![allow(dead_code)]

pub mod fixtures;
pub mod provider;
pub mod store;
pub mod tasks;
pub mod tokens;

use std::sync::Arc;

use cadence_common::time::MockClock;
use cadence_core::{ProviderRegistry, SyncDependencies, SyncOrchestrator};
use cadence_domain::{ConflictConfig, SyncConfig};

pub use fixtures::*;
pub use provider::ScriptedAdapter;
pub use store::InMemoryEventStore;
pub use tasks::InMemoryTaskSource;
pub use tokens::StaticTokenSupplier;

/// Everything a sync test needs, wired together.
pub struct Harness {
    pub store: Arc<InMemoryEventStore>,
    pub tokens: Arc<StaticTokenSupplier>,
    pub tasks: Arc<InMemoryTaskSource>,
    pub google: Arc<ScriptedAdapter>,
    pub clock: MockClock,
    pub orchestrator: Arc<SyncOrchestrator>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(SyncConfig::default())
    }

    pub fn with_config(config: SyncConfig) -> Self {
        let store = Arc::new(InMemoryEventStore::new());
        let tokens = Arc::new(StaticTokenSupplier::new());
        let tasks = Arc::new(InMemoryTaskSource::default());
        let google = Arc::new(ScriptedAdapter::google());
        let clock = MockClock::at(base_time());

        let deps = SyncDependencies {
            store: store.clone(),
            tokens: tokens.clone(),
            tasks: tasks.clone(),
            providers: ProviderRegistry::new().register(google.clone()),
            clock: Arc::new(clock.clone()),
        };
        let orchestrator =
            Arc::new(SyncOrchestrator::new(deps, config, ConflictConfig::default()));

        Self { store, tokens, tasks, google, clock, orchestrator }
    }
}
