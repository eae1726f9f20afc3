//! Error taxonomy for the data-access layer.
//!
//! Every operation either resolves with a typed result or fails with exactly
//! one [`DataError`] variant; there is no error-swallowing path. Callers are
//! expected to branch on [`ErrorCode`] for `Known` failures (e.g. show
//! "already exists" on a unique violation), treat `Validation` as a
//! programming bug, and treat `Initialization`/`EnginePanic` as operational
//! alerts.

use std::borrow::Cow;

use crate::config::ErrorFormat;

/// Stable machine-readable codes for recognized database rejections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// A unique or composite-unique constraint was violated.
    UniqueConstraintViolation,
    /// A referenced row does not exist (foreign key rejected the write).
    ForeignKeyViolation,
    /// A required column received NULL.
    NotNullViolation,
    /// A required lookup matched no row.
    NotFound,
    /// The pool did not hand out a connection within `max_wait`.
    PoolTimeout,
    /// An interactive transaction body exceeded its `timeout`.
    TransactionTimeout,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::UniqueConstraintViolation => "UNIQUE_CONSTRAINT_VIOLATION",
            ErrorCode::ForeignKeyViolation => "FOREIGN_KEY_VIOLATION",
            ErrorCode::NotNullViolation => "NOT_NULL_VIOLATION",
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::PoolTimeout => "POOL_TIMEOUT",
            ErrorCode::TransactionTimeout => "TRANSACTION_TIMEOUT",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error type surfaced by every operation of this crate.
#[derive(Debug, thiserror::Error)]
pub enum DataError {
    /// The database rejected the operation for a recognized reason.
    #[error("{code}: {message}")]
    Known { code: ErrorCode, message: String },

    /// The driver returned a failure that doesn't map to a recognized code.
    #[error("unknown database error: {0}")]
    Unknown(#[source] sqlx::Error),

    /// The call's shape itself is invalid; raised before any database
    /// round-trip.
    #[error("validation error: {0}")]
    Validation(String),

    /// The client failed to establish its connection/configuration.
    #[error("initialization error: {0}")]
    Initialization(String),

    /// Catastrophic failure of the underlying engine (e.g. the pool was
    /// closed underneath us). Callers should not retry.
    #[error("engine panic: {0}")]
    EnginePanic(String),
}

impl DataError {
    /// Classify a sqlx error into the taxonomy. Constraint violations are
    /// recognized via the driver's error kind, with the SQLite extended
    /// result codes (1555/2067 unique, 787 foreign key, 1299 not null) as a
    /// fallback.
    pub fn from_sqlx(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DataError::Known {
                code: ErrorCode::NotFound,
                message: "no rows returned by a query that expected at least one".into(),
            },
            sqlx::Error::PoolClosed => {
                DataError::EnginePanic("connection pool is closed".into())
            }
            sqlx::Error::PoolTimedOut => DataError::Known {
                code: ErrorCode::PoolTimeout,
                message: "timed out waiting for a pool connection".into(),
            },
            sqlx::Error::Database(db) => {
                let message = db.message().to_string();
                let code = match db.kind() {
                    sqlx::error::ErrorKind::UniqueViolation => {
                        Some(ErrorCode::UniqueConstraintViolation)
                    }
                    sqlx::error::ErrorKind::ForeignKeyViolation => {
                        Some(ErrorCode::ForeignKeyViolation)
                    }
                    sqlx::error::ErrorKind::NotNullViolation => {
                        Some(ErrorCode::NotNullViolation)
                    }
                    _ => match db.code().as_deref() {
                        Some("1555") | Some("2067") => {
                            Some(ErrorCode::UniqueConstraintViolation)
                        }
                        Some("787") => Some(ErrorCode::ForeignKeyViolation),
                        Some("1299") => Some(ErrorCode::NotNullViolation),
                        _ => None,
                    },
                };
                match code {
                    Some(code) => DataError::Known { code, message },
                    None => DataError::Unknown(sqlx::Error::Database(db)),
                }
            }
            other => DataError::Unknown(other),
        }
    }

    /// A `NotFound` rejection for a required lookup on `entity`.
    pub fn not_found(entity: &str) -> Self {
        DataError::Known {
            code: ErrorCode::NotFound,
            message: format!("no {entity} found for the given unique filter"),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        DataError::Validation(message.into())
    }

    /// The code of a `Known` error, if this is one.
    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            DataError::Known { code, .. } => Some(*code),
            _ => None,
        }
    }

    pub fn is_unique_violation(&self) -> bool {
        self.code() == Some(ErrorCode::UniqueConstraintViolation)
    }

    pub fn is_foreign_key_violation(&self) -> bool {
        self.code() == Some(ErrorCode::ForeignKeyViolation)
    }

    pub fn is_not_found(&self) -> bool {
        self.code() == Some(ErrorCode::NotFound)
    }

    /// Render the error according to the client's configured
    /// [`ErrorFormat`]. `Pretty` adds an ANSI-highlighted code prefix,
    /// `Colorless` the same without escapes, `Minimal` just the message.
    pub fn render(&self, format: ErrorFormat) -> String {
        let label: Cow<'_, str> = match self {
            DataError::Known { code, .. } => Cow::Borrowed(code.as_str()),
            DataError::Unknown(_) => Cow::Borrowed("UNKNOWN"),
            DataError::Validation(_) => Cow::Borrowed("VALIDATION"),
            DataError::Initialization(_) => Cow::Borrowed("INITIALIZATION"),
            DataError::EnginePanic(_) => Cow::Borrowed("ENGINE_PANIC"),
        };
        match format {
            ErrorFormat::Pretty => format!("\x1b[1;31m[{label}]\x1b[0m {self}"),
            ErrorFormat::Colorless => format!("[{label}] {self}"),
            ErrorFormat::Minimal => self.to_string(),
        }
    }
}

/// Crate-wide result alias.
pub type Result<T, E = DataError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_error_renders_code() {
        let err = DataError::not_found("User");
        assert_eq!(err.code(), Some(ErrorCode::NotFound));
        assert!(err.to_string().starts_with("NOT_FOUND"));
    }

    #[test]
    fn render_minimal_has_no_label() {
        let err = DataError::validation("both `select` and `include` given");
        let rendered = err.render(ErrorFormat::Minimal);
        assert!(!rendered.contains("[VALIDATION]"));
        assert!(rendered.contains("select"));
    }
}
