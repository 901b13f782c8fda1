//! # Cadence Core
//!
//! Calendar reconciliation and conflict logic. No I/O of its own.
//!
//! This crate contains:
//! - Ports: event store, token supplier, task source, credential vault,
//!   provider adapters
//! - Sync orchestrator with import, export and task-binding passes
//! - Conflict detection, resolution and suggestions
//! - Free/busy and meeting-slot search
//!
//! ## Architecture Principles
//! - Depends only on `cadence-domain` and `cadence-common`
//! - Every external effect goes through a trait
//! - Services are constructed with their collaborators; no globals

pub mod conflict;
pub mod provider;
pub mod scheduling;
pub mod sync;

pub use conflict::{ConflictService, Resolution};
pub use provider::{EventPage, ExternalEvent, ProviderAdapter, ProviderRegistry};
pub use scheduling::{AvailabilityService, CalendarBusy, MeetingSlot};
pub use sync::{
    CredentialVault, EventStore, ResolutionCommit, SyncDependencies, SyncOrchestrator,
    TaskSource, TokenSupplier, WebhookDisposition, WebhookIntake, WebhookNotification,
};
