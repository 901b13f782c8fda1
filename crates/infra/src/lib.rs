//! # Cadence Infrastructure
//!
//! Infrastructure implementations of the `cadence-core` ports.
//!
//! This crate contains:
//! - SQLite event store and task source (rusqlite + r2d2)
//! - Google Calendar and Microsoft Graph provider adapters
//! - OAuth token supplier and keyring-backed credential vault
//! - Config loading, tracing bootstrap, webhook HTTP router, cron scheduler
//!
//! ## Architecture
//! - Implements traits defined in `cadence-core`
//! - Contains all "impure" code (I/O, network, OS keychain)

pub mod config;
pub mod database;
pub mod errors;
pub mod http;
pub mod integrations;
pub mod key_manager;
pub mod observability;
pub mod scheduling;

pub use database::{DbManager, SqliteEventStore, SqliteTaskSource};
pub use errors::InfraError;
pub use http::HttpClient;
pub use integrations::calendar::{
    webhook_router, GoogleCalendarAdapter, MicrosoftCalendarAdapter, OAuthTokenSupplier,
};
pub use key_manager::KeyringCredentialVault;
pub use scheduling::{CalendarScheduler, CalendarSchedulerConfig, SchedulerError};
