//! Generic async retry executor
//!
//! Runs an operation until it succeeds, the policy says stop, the attempt
//! budget is spent, or the total time budget runs out. The last error is
//! always handed back to the caller so it can be classified further up.

use std::fmt;
use std::future::Future;
use std::time::{Duration, Instant};

use rand::Rng;
use thiserror::Error;
use tracing::{debug, instrument, warn};

/// Errors returned by [`RetryExecutor::execute`]
#[derive(Debug, Error)]
pub enum RetryError<E> {
    /// All attempts failed; `source` is the error of the final attempt
    #[error("All retry attempts exhausted after {attempts} tries: {source:?}")]
    AttemptsExhausted { attempts: u32, source: E },

    /// The policy refused to retry this error
    #[error("Operation failed with non-retryable error: {source:?}")]
    NonRetryable { source: E },

    /// The configuration is unusable
    #[error("Invalid retry configuration: {message}")]
    InvalidConfiguration { message: String },

    /// The total time budget ran out before another attempt could start
    #[error("Retry timeout exceeded after {elapsed:?}")]
    TimeoutExceeded { elapsed: Duration, last: Option<E> },
}

impl<E> RetryError<E> {
    /// The underlying operation error, when there is one.
    pub fn into_source(self) -> Option<E> {
        match self {
            Self::AttemptsExhausted { source, .. } | Self::NonRetryable { source } => Some(source),
            Self::TimeoutExceeded { last, .. } => last,
            Self::InvalidConfiguration { .. } => None,
        }
    }
}

pub type RetryResult<T, E> = Result<T, RetryError<E>>;

/// Decides whether a failed attempt is retried
pub trait RetryPolicy<E> {
    /// `attempt` is zero-based: 0 is the first failure.
    fn should_retry(&self, error: &E, attempt: u32) -> RetryDecision;
}

impl<E, F> RetryPolicy<E> for F
where
    F: Fn(&E, u32) -> RetryDecision,
{
    fn should_retry(&self, error: &E, attempt: u32) -> RetryDecision {
        self(error, attempt)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RetryDecision {
    /// Retry after the configured backoff
    Retry,
    /// Retry after a delay dictated by the error (e.g. `Retry-After`)
    RetryAfter(Duration),
    Stop,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BackoffStrategy {
    Fixed(Duration),
    /// `initial_delay * base^attempt`, capped at `max_delay`
    Exponential { initial_delay: Duration, base: f64, max_delay: Duration },
}

impl BackoffStrategy {
    pub fn calculate_delay(&self, attempt: u32) -> Duration {
        match self {
            BackoffStrategy::Fixed(delay) => *delay,
            BackoffStrategy::Exponential { initial_delay, base, max_delay } => {
                let delay = initial_delay.as_millis() as f64 * base.powi(attempt as i32);
                let delay_ms = delay.min(max_delay.as_millis() as f64) as u64;
                Duration::from_millis(delay_ms)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Jitter {
    None,
    /// Uniform in `[0, delay]`
    Full,
    /// Uniform in `[delay/2, delay]`
    Equal,
}

impl Jitter {
    pub fn apply(&self, delay: Duration) -> Duration {
        let millis = delay.as_millis() as u64;
        match self {
            Jitter::None => delay,
            Jitter::Full => Duration::from_millis(random_up_to(millis)),
            Jitter::Equal => {
                let half = millis / 2;
                Duration::from_millis(half + random_up_to(millis - half))
            }
        }
    }
}

fn random_up_to(max: u64) -> u64 {
    if max == 0 {
        return 0;
    }
    rand::thread_rng().gen_range(0..=max)
}

#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total attempts including the first one
    pub max_attempts: u32,
    pub backoff: BackoffStrategy,
    pub jitter: Jitter,
    pub max_total_time: Option<Duration>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: BackoffStrategy::Exponential {
                initial_delay: Duration::from_millis(200),
                base: 2.0,
                max_delay: Duration::from_secs(10),
            },
            jitter: Jitter::Equal,
            max_total_time: Some(Duration::from_secs(120)),
        }
    }
}

impl RetryConfig {
    pub fn builder() -> RetryConfigBuilder {
        RetryConfigBuilder::new()
    }

    pub fn validate(&self) -> Result<(), RetryError<()>> {
        if self.max_attempts == 0 {
            return Err(RetryError::InvalidConfiguration {
                message: "max_attempts must be greater than 0".to_string(),
            });
        }

        match &self.backoff {
            BackoffStrategy::Exponential { base, .. } if *base <= 0.0 => {
                return Err(RetryError::InvalidConfiguration {
                    message: "exponential base must be greater than 0".to_string(),
                });
            }
            _ => {}
        }

        Ok(())
    }
}

/// Fluent builder for [`RetryConfig`]
#[derive(Debug, Default)]
pub struct RetryConfigBuilder {
    config: RetryConfig,
}

impl RetryConfigBuilder {
    pub fn new() -> Self {
        Self { config: RetryConfig::default() }
    }

    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.config.max_attempts = attempts;
        self
    }

    pub fn fixed_backoff(mut self, delay: Duration) -> Self {
        self.config.backoff = BackoffStrategy::Fixed(delay);
        self
    }

    pub fn exponential_backoff(
        mut self,
        initial_delay: Duration,
        base: f64,
        max_delay: Duration,
    ) -> Self {
        self.config.backoff = BackoffStrategy::Exponential { initial_delay, base, max_delay };
        self
    }

    pub fn no_jitter(mut self) -> Self {
        self.config.jitter = Jitter::None;
        self
    }

    pub fn equal_jitter(mut self) -> Self {
        self.config.jitter = Jitter::Equal;
        self
    }

    pub fn max_total_time(mut self, duration: Duration) -> Self {
        self.config.max_total_time = Some(duration);
        self
    }

    pub fn unlimited_time(mut self) -> Self {
        self.config.max_total_time = None;
        self
    }

    pub fn build(self) -> Result<RetryConfig, RetryError<()>> {
        self.config.validate()?;
        Ok(self.config)
    }
}

pub struct RetryExecutor<P> {
    config: RetryConfig,
    policy: P,
}

impl<P> RetryExecutor<P> {
    pub fn new(config: RetryConfig, policy: P) -> Self {
        Self { config, policy }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Execute `operation`, retrying per policy and configuration.
    #[instrument(
        level = "debug",
        skip(self, operation),
        fields(max_attempts = self.config.max_attempts)
    )]
    pub async fn execute<F, Fut, T, E>(&self, mut operation: F) -> RetryResult<T, E>
    where
        P: RetryPolicy<E>,
        E: fmt::Debug,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let started = Instant::now();
        let mut attempt: u32 = 0;
        let mut last: Option<E> = None;

        loop {
            if let Some(max_time) = self.config.max_total_time {
                let elapsed = started.elapsed();
                if elapsed >= max_time {
                    warn!(?elapsed, attempts = attempt, "Retry time budget exhausted");
                    return Err(RetryError::TimeoutExceeded { elapsed, last });
                }
            }

            debug!(attempt = attempt + 1, "Executing operation");

            let error = match operation().await {
                Ok(value) => {
                    if attempt > 0 {
                        debug!(retries = attempt, "Operation succeeded after retries");
                    }
                    return Ok(value);
                }
                Err(error) => error,
            };

            let decision = self.policy.should_retry(&error, attempt);
            if decision == RetryDecision::Stop {
                debug!(?error, "Retry policy declined to retry");
                return Err(RetryError::NonRetryable { source: error });
            }

            if attempt + 1 >= self.config.max_attempts {
                warn!(attempts = attempt + 1, ?error, "All retry attempts exhausted");
                return Err(RetryError::AttemptsExhausted { attempts: attempt + 1, source: error });
            }

            let delay = match decision {
                RetryDecision::RetryAfter(delay) => delay,
                _ => self.config.jitter.apply(self.config.backoff.calculate_delay(attempt)),
            };
            warn!(attempt = attempt + 1, ?delay, ?error, "Operation failed, retrying");
            last = Some(error);
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}

/// Ready-made policies
pub mod policies {
    use super::*;

    /// Retries any error
    #[derive(Debug, Clone)]
    pub struct AlwaysRetry;

    impl<E> RetryPolicy<E> for AlwaysRetry {
        fn should_retry(&self, _error: &E, _attempt: u32) -> RetryDecision {
            RetryDecision::Retry
        }
    }

    /// Never retries
    #[derive(Debug, Clone)]
    pub struct NeverRetry;

    impl<E> RetryPolicy<E> for NeverRetry {
        fn should_retry(&self, _error: &E, _attempt: u32) -> RetryDecision {
            RetryDecision::Stop
        }
    }
}
