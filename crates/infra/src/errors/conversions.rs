//! Conversions from external infrastructure errors into domain errors.

use reqwest::Error as HttpError;
use rusqlite::Error as SqlError;
use shiftsync_common::storage::StorageError;
use shiftsync_domain::ShiftSyncError;
use tokio::task::JoinError;

/// Error newtype that keeps conversions on the infrastructure side and can be
/// converted back into the domain error.
#[derive(Debug, thiserror::Error)]
#[error(transparent)]
pub struct InfraError(pub ShiftSyncError);

impl From<InfraError> for ShiftSyncError {
    fn from(value: InfraError) -> Self {
        value.0
    }
}

impl From<ShiftSyncError> for InfraError {
    fn from(value: ShiftSyncError) -> Self {
        InfraError(value)
    }
}

/// Extension trait to make the conversion logic explicit in tests and within
/// this module.
trait IntoShiftSyncError {
    fn into_shiftsync(self) -> ShiftSyncError;
}

/* -------------------------------------------------------------------------- */
/* rusqlite::Error → ShiftSyncError */
/* -------------------------------------------------------------------------- */

impl IntoShiftSyncError for SqlError {
    fn into_shiftsync(self) -> ShiftSyncError {
        use rusqlite::ffi::ErrorCode;
        use rusqlite::Error as RE;

        fn looks_like_wrong_key(message: &str) -> bool {
            let lower = message.to_ascii_lowercase();
            lower.contains("not a database") || lower.contains("encrypted")
        }

        match self {
            RE::SqliteFailure(err, maybe_message) => {
                let message = maybe_message.unwrap_or_default();
                match (err.code, err.extended_code) {
                    (ErrorCode::DatabaseBusy, _) => {
                        ShiftSyncError::Database("database is busy".into())
                    }
                    (ErrorCode::DatabaseLocked, _) => {
                        ShiftSyncError::Database("database is locked".into())
                    }
                    (ErrorCode::ConstraintViolation, 2067 | 1555) => {
                        ShiftSyncError::Database("unique constraint violation".into())
                    }
                    (_, _) if looks_like_wrong_key(&message) => ShiftSyncError::Config(
                        "SQLCipher key rejected or database not encrypted".into(),
                    ),
                    _ => ShiftSyncError::Database(format!(
                        "sqlite failure {:?} (code {}): {}",
                        err.code, err.extended_code, message
                    )),
                }
            }
            RE::QueryReturnedNoRows => ShiftSyncError::NotFound("no rows returned by query".into()),
            RE::FromSqlConversionFailure(_, _, cause) => {
                ShiftSyncError::Database(format!("failed to convert sqlite value: {cause}"))
            }
            RE::InvalidColumnType(_, _, ty) => {
                ShiftSyncError::Database(format!("invalid column type: {ty}"))
            }
            RE::Utf8Error(_) => {
                ShiftSyncError::Database("invalid UTF-8 returned from sqlite".into())
            }
            RE::InvalidPath(path) => ShiftSyncError::Database(format!(
                "invalid database path: {}",
                path.to_string_lossy()
            )),
            other => ShiftSyncError::Database(other.to_string()),
        }
    }
}

impl From<SqlError> for InfraError {
    fn from(value: SqlError) -> Self {
        InfraError(value.into_shiftsync())
    }
}

/* -------------------------------------------------------------------------- */
/* StorageError → ShiftSyncError */
/* -------------------------------------------------------------------------- */

impl IntoShiftSyncError for StorageError {
    fn into_shiftsync(self) -> ShiftSyncError {
        match self {
            StorageError::Rusqlite(sql_err) => sql_err.into_shiftsync(),
            StorageError::WrongKeyOrNotEncrypted | StorageError::Encryption(_) => {
                ShiftSyncError::Config(self.to_string())
            }
            other => ShiftSyncError::Database(other.to_string()),
        }
    }
}

impl From<StorageError> for InfraError {
    fn from(value: StorageError) -> Self {
        InfraError(value.into_shiftsync())
    }
}

/* -------------------------------------------------------------------------- */
/* reqwest::Error → ShiftSyncError */
/* -------------------------------------------------------------------------- */

impl IntoShiftSyncError for HttpError {
    fn into_shiftsync(self) -> ShiftSyncError {
        if self.is_timeout() {
            return ShiftSyncError::Network("HTTP request timed out".into());
        }

        if self.is_connect() {
            return ShiftSyncError::Network("HTTP connection failure".into());
        }

        if let Some(status) = self.status() {
            let code = status.as_u16();
            let message =
                format!("HTTP {} {}", code, status.canonical_reason().unwrap_or("unknown status"));

            return match code {
                404 => ShiftSyncError::NotFound(message),
                429 => ShiftSyncError::Network(message),
                400..=499 => ShiftSyncError::InvalidInput(message),
                _ => ShiftSyncError::Network(message),
            };
        }

        if self.is_decode() {
            return ShiftSyncError::Serialization(self.to_string());
        }

        ShiftSyncError::Network(self.to_string())
    }
}

impl From<HttpError> for InfraError {
    fn from(value: HttpError) -> Self {
        InfraError(value.into_shiftsync())
    }
}

/* -------------------------------------------------------------------------- */
/* Helpers */
/* -------------------------------------------------------------------------- */

pub fn map_sql_error(err: SqlError) -> ShiftSyncError {
    ShiftSyncError::from(InfraError::from(err))
}

pub fn map_storage_error(err: StorageError) -> ShiftSyncError {
    ShiftSyncError::from(InfraError::from(err))
}

pub fn map_join_error(err: JoinError) -> ShiftSyncError {
    if err.is_cancelled() {
        ShiftSyncError::Internal("blocking task cancelled".into())
    } else {
        ShiftSyncError::Internal(format!("blocking task panicked: {err}"))
    }
}

/* -------------------------------------------------------------------------- */
/* Tests */
/* -------------------------------------------------------------------------- */
