//! # Cadence Domain
//!
//! Data model for calendar synchronisation and conflict handling.
//!
//! This crate contains:
//! - Calendars, events, integrations, conflicts, sync logs, time blocks, tasks
//! - `CadenceError` and the `Result` alias
//! - Configuration structures and their defaults
//!
//! ## Architecture
//! - No dependencies on other Cadence crates
//! - No I/O

pub mod config;
pub mod constants;
pub mod errors;
pub mod macros;
pub mod types;

pub use config::*;
pub use errors::*;
pub use types::*;
