//! Conversions from external infrastructure errors into domain errors.

use cadence_domain::{CadenceError, ProviderError};
use keyring::Error as KeyringError;
use reqwest::Error as HttpError;
use rusqlite::Error as SqlError;

/// Error newtype that keeps conversions on the infrastructure side and can be
/// converted back into the domain error.
#[derive(Debug)]
pub struct InfraError(pub CadenceError);

impl From<InfraError> for CadenceError {
    fn from(value: InfraError) -> Self {
        value.0
    }
}

impl From<CadenceError> for InfraError {
    fn from(value: CadenceError) -> Self {
        InfraError(value)
    }
}

trait IntoCadenceError {
    fn into_cadence(self) -> CadenceError;
}

/* -------------------------------------------------------------------------- */
/* rusqlite::Error → CadenceError */
/* -------------------------------------------------------------------------- */

impl IntoCadenceError for SqlError {
    fn into_cadence(self) -> CadenceError {
        use rusqlite::ffi::ErrorCode;
        use rusqlite::Error as RE;

        match self {
            RE::SqliteFailure(err, maybe_message) => {
                let message = maybe_message.unwrap_or_default();
                match (err.code, err.extended_code) {
                    (ErrorCode::DatabaseBusy, _) => {
                        CadenceError::Database("database is busy".into())
                    }
                    (ErrorCode::DatabaseLocked, _) => {
                        CadenceError::Database("database is locked".into())
                    }
                    // SQLITE_CONSTRAINT_UNIQUE / SQLITE_CONSTRAINT_PRIMARYKEY
                    (ErrorCode::ConstraintViolation, 2067 | 1555) => {
                        CadenceError::Conflict(format!("unique constraint violation: {message}"))
                    }
                    // SQLITE_CONSTRAINT_CHECK
                    (ErrorCode::ConstraintViolation, 275) => {
                        CadenceError::InvalidInput(format!("check constraint failed: {message}"))
                    }
                    (ErrorCode::ConstraintViolation, 787) => {
                        CadenceError::Database("foreign key constraint violation".into())
                    }
                    _ => CadenceError::Database(format!(
                        "sqlite failure {:?} (code {}): {}",
                        err.code, err.extended_code, message
                    )),
                }
            }
            RE::QueryReturnedNoRows => CadenceError::NotFound("no rows returned by query".into()),
            RE::FromSqlConversionFailure(_, _, cause) => {
                CadenceError::Database(format!("failed to convert sqlite value: {cause}"))
            }
            RE::InvalidColumnType(_, name, ty) => {
                CadenceError::Database(format!("invalid column type for {name}: {ty}"))
            }
            RE::Utf8Error(_) => CadenceError::Database("invalid UTF-8 returned from sqlite".into()),
            RE::InvalidPath(path) => CadenceError::Database(format!(
                "invalid database path: {}",
                path.to_string_lossy()
            )),
            other => CadenceError::Database(other.to_string()),
        }
    }
}

impl From<SqlError> for InfraError {
    fn from(value: SqlError) -> Self {
        InfraError(value.into_cadence())
    }
}

/* -------------------------------------------------------------------------- */
/* r2d2::Error → CadenceError */
/* -------------------------------------------------------------------------- */

impl From<r2d2::Error> for InfraError {
    fn from(value: r2d2::Error) -> Self {
        InfraError(CadenceError::Database(format!("connection pool error: {value}")))
    }
}

/* -------------------------------------------------------------------------- */
/* keyring::Error → CadenceError */
/* -------------------------------------------------------------------------- */

impl IntoCadenceError for KeyringError {
    fn into_cadence(self) -> CadenceError {
        use KeyringError::*;

        let description = self.to_string();

        match self {
            NoEntry => CadenceError::NotFound("keychain entry not found".into()),
            BadEncoding(_) => CadenceError::Auth("credential in keychain is not valid UTF-8".into()),
            TooLong(name, limit) => CadenceError::InvalidInput(format!(
                "keychain attribute '{name}' exceeds platform limit ({limit})"
            )),
            Invalid(attr, reason) => CadenceError::InvalidInput(format!(
                "keychain attribute '{attr}' is invalid: {reason}"
            )),
            PlatformFailure(err) => CadenceError::Internal(format!("keychain platform error: {err}")),
            NoStorageAccess(err) => {
                CadenceError::Internal(format!("unable to access secure storage: {err}"))
            }
            _ => CadenceError::Internal(description),
        }
    }
}

impl From<KeyringError> for InfraError {
    fn from(value: KeyringError) -> Self {
        InfraError(value.into_cadence())
    }
}

/* -------------------------------------------------------------------------- */
/* reqwest::Error → ProviderError / CadenceError */
/* -------------------------------------------------------------------------- */

/// Classify a transport-level failure for the retry policy.
pub(crate) fn provider_error_from_http(err: &HttpError) -> ProviderError {
    if err.is_timeout() {
        return ProviderError::Timeout;
    }
    if let Some(status) = err.status() {
        return ProviderError::from_status(status.as_u16(), err.to_string());
    }
    if err.is_decode() {
        return ProviderError::Malformed(err.to_string());
    }
    ProviderError::Network(err.to_string())
}

impl From<HttpError> for InfraError {
    fn from(value: HttpError) -> Self {
        InfraError(provider_error_from_http(&value).into())
    }
}

/* -------------------------------------------------------------------------- */
/* Tests */
/* -------------------------------------------------------------------------- */
