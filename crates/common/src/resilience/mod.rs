//! Resilience primitives
//!
//! Provider calls go through [`RetryExecutor`]; the policy decides which
//! failures are worth another attempt.

pub mod retry;

pub use retry::{
    policies, BackoffStrategy, Jitter, RetryConfig, RetryConfigBuilder, RetryDecision,
    RetryError, RetryExecutor, RetryPolicy, RetryResult,
};
