//! Shared runtime utilities for Cadence crates.
//!
//! - [`resilience`]: async retry executor with pluggable backoff and policies
//! - [`time`]: wall-clock abstraction with a controllable test clock

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

pub mod resilience;
pub mod time;

pub use resilience::{
    BackoffStrategy, Jitter, RetryConfig, RetryConfigBuilder, RetryDecision, RetryError,
    RetryExecutor, RetryPolicy, RetryResult,
};
pub use time::{Clock, MockClock, SystemClock};
