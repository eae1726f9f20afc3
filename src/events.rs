//! Query and log event dispatch.
//!
//! When the client is configured with a `Query`/`Event` log definition,
//! every executed statement is reported to registered callbacks, carrying
//! the raw SQL, the serialized parameters, the duration and the target
//! table. Generic log events follow the same pattern.

use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use crate::config::{ClientOptions, LogEmit, LogLevel};

/// One executed statement.
#[derive(Debug, Clone)]
pub struct QueryEvent {
    pub timestamp: DateTime<Utc>,
    /// Raw SQL text with `?` placeholders
    pub query: String,
    /// Debug-serialized bind parameters, in placeholder order
    pub params: String,
    pub duration: Duration,
    /// Target table, or "raw" for escape-hatch queries
    pub target: &'static str,
}

/// A generic log line.
#[derive(Debug, Clone)]
pub struct LogEvent {
    pub timestamp: DateTime<Utc>,
    pub message: String,
    pub target: String,
}

type QueryListener = Box<dyn Fn(&QueryEvent) + Send + Sync>;
type LogListener = Box<dyn Fn(&LogEvent) + Send + Sync>;

/// Listener registry plus the log-routing flags derived from
/// [`ClientOptions::log`]. One sink per client, shared by every repository
/// handle and transaction.
pub struct EventSink {
    query_to_event: bool,
    query_to_stdout: bool,
    query_listeners: RwLock<Vec<QueryListener>>,
    log_listeners: RwLock<Vec<LogListener>>,
}

impl EventSink {
    pub fn from_options(options: &ClientOptions) -> Self {
        Self {
            query_to_event: options.log_enabled(LogLevel::Query, LogEmit::Event),
            query_to_stdout: options.log_enabled(LogLevel::Query, LogEmit::Stdout),
            query_listeners: RwLock::new(Vec::new()),
            log_listeners: RwLock::new(Vec::new()),
        }
    }

    pub fn on_query(&self, listener: impl Fn(&QueryEvent) + Send + Sync + 'static) {
        self.query_listeners.write().push(Box::new(listener));
    }

    pub fn on_log(&self, listener: impl Fn(&LogEvent) + Send + Sync + 'static) {
        self.log_listeners.write().push(Box::new(listener));
    }

    /// Report one executed statement. Always traced at debug level; bumped
    /// to info when query/stdout logging is configured; dispatched to
    /// callbacks when query/event logging is configured.
    pub fn emit_query(&self, query: &str, params: String, duration: Duration, target: &'static str) {
        if self.query_to_stdout {
            tracing::info!(sql = %query, params = %params, duration_us = duration.as_micros() as u64, target = %target, "query");
        } else {
            tracing::debug!(sql = %query, params = %params, duration_us = duration.as_micros() as u64, target = %target, "query");
        }
        if self.query_to_event {
            let event = QueryEvent {
                timestamp: Utc::now(),
                query: query.to_string(),
                params,
                duration,
                target,
            };
            for listener in self.query_listeners.read().iter() {
                listener(&event);
            }
        }
    }

    pub fn emit_log(&self, target: impl Into<String>, message: impl Into<String>) {
        let event = LogEvent {
            timestamp: Utc::now(),
            message: message.into(),
            target: target.into(),
        };
        tracing::info!(target_component = %event.target, "{}", event.message);
        for listener in self.log_listeners.read().iter() {
            listener(&event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LogDefinition;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn query_events_only_fire_when_configured() {
        let silent = EventSink::from_options(&ClientOptions::new("sqlite::memory:"));
        let counted = EventSink::from_options(
            &ClientOptions::new("sqlite::memory:")
                .with_log(vec![LogDefinition::new(LogLevel::Query, LogEmit::Event)]),
        );
        let hits = Arc::new(AtomicUsize::new(0));
        for sink in [&silent, &counted] {
            let hits = hits.clone();
            sink.on_query(move |_| {
                hits.fetch_add(1, Ordering::SeqCst);
            });
        }
        silent.emit_query("SELECT 1", "[]".into(), Duration::ZERO, "raw");
        counted.emit_query("SELECT 1", "[]".into(), Duration::ZERO, "raw");
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
