//! Client configuration.
//!
//! Options are passed explicitly to [`Client::connect`](crate::Client::connect);
//! there is no implicit global configuration. `from_env` mirrors the usual
//! deployment setup (a `.env` file plus `DATABASE_PATH`/`DATABASE_URL`).

use std::collections::BTreeMap;
use std::env;
use std::time::Duration;

use crate::error::{DataError, Result};

/// Log levels the client can be asked to report on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Every executed SQL statement, with bound parameters and duration.
    Query,
    Info,
    Warn,
    Error,
}

/// Where a configured log level goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogEmit {
    /// Forward to the `tracing` subscriber (stdout in a default setup).
    #[default]
    Stdout,
    /// Dispatch to callbacks registered with
    /// [`on_query`](crate::Client::on_query) / [`on_log`](crate::Client::on_log).
    Event,
}

/// A single log subscription entry.
#[derive(Debug, Clone, Copy)]
pub struct LogDefinition {
    pub level: LogLevel,
    pub emit: LogEmit,
}

impl LogDefinition {
    pub fn new(level: LogLevel, emit: LogEmit) -> Self {
        Self { level, emit }
    }
}

/// How errors are rendered by [`DataError::render`](crate::DataError::render).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorFormat {
    Pretty,
    #[default]
    Colorless,
    Minimal,
}

/// Isolation level requested for interactive transactions.
///
/// SQLite executes `ReadUncommitted` via `PRAGMA read_uncommitted`; the other
/// three map to SQLite's serializable default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IsolationLevel {
    ReadUncommitted,
    ReadCommitted,
    RepeatableRead,
    #[default]
    Serializable,
}

/// Defaults for batch and interactive transactions.
#[derive(Debug, Clone)]
pub struct TransactionOptions {
    /// Time allowed waiting to acquire the transaction connection.
    pub max_wait: Duration,
    /// Time allowed for the transaction body before forced rollback.
    pub timeout: Duration,
    pub isolation_level: IsolationLevel,
}

impl Default for TransactionOptions {
    fn default() -> Self {
        Self {
            max_wait: Duration::from_secs(2),
            timeout: Duration::from_secs(5),
            isolation_level: IsolationLevel::default(),
        }
    }
}

/// Configuration for a [`Client`](crate::Client).
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// SQLite connection URL (e.g. `sqlite://data/gmao.db` or `sqlite::memory:`).
    pub datasource_url: String,
    /// Maximum pool size. In-memory databases are forced to a single
    /// connection, since every new `:memory:` connection is a fresh database.
    pub max_connections: u32,
    pub log: Vec<LogDefinition>,
    pub error_format: ErrorFormat,
    pub transaction_options: TransactionOptions,
    /// Default field omission per entity (table name -> column names),
    /// applied by scalar projection on top of any per-call `omit`.
    pub omit: BTreeMap<String, Vec<String>>,
}

impl ClientOptions {
    pub fn new(datasource_url: impl Into<String>) -> Self {
        Self {
            datasource_url: datasource_url.into(),
            max_connections: 10,
            log: Vec::new(),
            error_format: ErrorFormat::default(),
            transaction_options: TransactionOptions::default(),
            omit: BTreeMap::new(),
        }
    }

    /// Load options from environment variables, reading a `.env` file first
    /// if present. `DATABASE_PATH` takes precedence over `DATABASE_URL`.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();
        let url = env::var("DATABASE_PATH")
            .or_else(|_| env::var("DATABASE_URL"))
            .map_err(|_| {
                DataError::Initialization(
                    "DATABASE_PATH or DATABASE_URL must be set".into(),
                )
            })?;
        let mut options = Self::new(url);
        if let Ok(max) = env::var("DATABASE_MAX_CONNECTIONS") {
            options.max_connections = max.parse().map_err(|_| {
                DataError::Initialization(format!(
                    "DATABASE_MAX_CONNECTIONS is not a number: {max}"
                ))
            })?;
        }
        Ok(options)
    }

    pub fn with_log(mut self, log: Vec<LogDefinition>) -> Self {
        self.log = log;
        self
    }

    pub fn with_error_format(mut self, format: ErrorFormat) -> Self {
        self.error_format = format;
        self
    }

    pub fn with_transaction_options(mut self, options: TransactionOptions) -> Self {
        self.transaction_options = options;
        self
    }

    pub fn with_max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    /// Add a default omission for one entity (table name + column names).
    pub fn with_omit(
        mut self,
        table: impl Into<String>,
        columns: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.omit
            .insert(table.into(), columns.into_iter().map(Into::into).collect());
        self
    }

    /// Whether `level` is configured with the given emit target.
    pub fn log_enabled(&self, level: LogLevel, emit: LogEmit) -> bool {
        self.log
            .iter()
            .any(|def| def.level == level && def.emit == emit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_enabled_matches_level_and_emit() {
        let options = ClientOptions::new("sqlite::memory:").with_log(vec![
            LogDefinition::new(LogLevel::Query, LogEmit::Event),
            LogDefinition::new(LogLevel::Warn, LogEmit::Stdout),
        ]);
        assert!(options.log_enabled(LogLevel::Query, LogEmit::Event));
        assert!(!options.log_enabled(LogLevel::Query, LogEmit::Stdout));
        assert!(!options.log_enabled(LogLevel::Info, LogEmit::Stdout));
    }
}
