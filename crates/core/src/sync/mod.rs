//! Calendar synchronisation: orchestrator, task binding, webhook intake

pub mod binder;
pub mod orchestrator;
pub mod ports;
pub mod webhook;

pub use orchestrator::{SyncDependencies, SyncOrchestrator};
pub use ports::{CredentialVault, EventStore, ResolutionCommit, TaskSource, TokenSupplier};
pub use webhook::{WebhookDisposition, WebhookIntake, WebhookNotification};
