//! Outbound HTTP with retry, backoff and per-attempt timeouts

pub mod client;

pub use client::{HttpClient, HttpClientBuilder};
