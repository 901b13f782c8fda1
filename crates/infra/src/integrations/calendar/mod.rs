//! Calendar provider integrations
//!
//! - Google Calendar and Microsoft Graph adapters
//! - OAuth refresh-token supplier
//! - Push-notification HTTP router

pub mod providers;
pub mod token_supplier;
pub mod webhook;

pub use providers::{GoogleCalendarAdapter, MicrosoftCalendarAdapter};
pub use token_supplier::OAuthTokenSupplier;
pub use webhook::webhook_router;
