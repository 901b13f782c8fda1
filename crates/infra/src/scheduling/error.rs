//! Scheduler error types

use cadence_domain::CadenceError;
use thiserror::Error;

use crate::errors::InfraError;

/// Scheduler-specific errors
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("Scheduler already running")]
    AlreadyRunning,

    #[error("Scheduler not running")]
    NotRunning,

    #[error("Failed to create scheduler: {0}")]
    CreationFailed(String),

    #[error("Failed to start scheduler: {0}")]
    StartFailed(String),

    #[error("Failed to stop scheduler: {0}")]
    StopFailed(String),

    /// Cron expression rejected or job could not be added
    #[error("Failed to register job: {0}")]
    JobRegistrationFailed(String),

    #[error("Operation timed out after {seconds}s")]
    Timeout { seconds: u64 },

    #[error("Task join failed: {0}")]
    TaskJoinFailed(String),
}

impl From<SchedulerError> for InfraError {
    fn from(err: SchedulerError) -> Self {
        let cadence_err = match err {
            SchedulerError::AlreadyRunning | SchedulerError::NotRunning => {
                CadenceError::InvalidInput(err.to_string())
            }
            SchedulerError::JobRegistrationFailed(_) => CadenceError::Config(err.to_string()),
            _ => CadenceError::Internal(err.to_string()),
        };
        InfraError(cadence_err)
    }
}

impl From<SchedulerError> for CadenceError {
    fn from(err: SchedulerError) -> Self {
        InfraError::from(err).into()
    }
}

/// Convenience type alias for scheduler operations
pub type SchedulerResult<T> = Result<T, SchedulerError>;
