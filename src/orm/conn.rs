//! Execution handle shared by pool-backed calls and transactions.
//!
//! Every operation in [`ops`](super::ops) runs against a [`Conn`], which is
//! a borrowed `SqliteConnection` plus an optional event sink. Repository
//! handles wrap pool connections in one; transaction closures receive one
//! scoped to the transaction connection, so the whole operation family is
//! available in both contexts.

use std::time::Instant;

use sqlx::SqliteConnection;
use sqlx::sqlite::{SqliteQueryResult, SqliteRow};

use crate::error::{DataError, Result};
use crate::events::EventSink;

use super::traits::SqlValue;

pub struct Conn<'c> {
    conn: &'c mut SqliteConnection,
    sink: Option<&'c EventSink>,
}

impl<'c> Conn<'c> {
    /// Wrap a bare connection (no event dispatch).
    pub fn new(conn: &'c mut SqliteConnection) -> Self {
        Self { conn, sink: None }
    }

    pub(crate) fn with_sink(conn: &'c mut SqliteConnection, sink: &'c EventSink) -> Self {
        Self {
            conn,
            sink: Some(sink),
        }
    }

    /// Reborrow for a nested call without giving up the handle.
    pub fn reborrow(&mut self) -> Conn<'_> {
        Conn {
            conn: &mut *self.conn,
            sink: self.sink,
        }
    }

    fn report(&self, sql: &str, values: &[SqlValue], started: Instant, target: &'static str) {
        if let Some(sink) = self.sink {
            sink.emit_query(sql, format!("{values:?}"), started.elapsed(), target);
        } else {
            tracing::debug!(sql = %sql, "query");
        }
    }

    pub(crate) async fn fetch_all_rows(
        &mut self,
        sql: &str,
        values: &[SqlValue],
        target: &'static str,
    ) -> Result<Vec<SqliteRow>> {
        let started = Instant::now();
        let mut query = sqlx::query(sql);
        for value in values {
            query = value.bind_to_query(query);
        }
        let rows = query
            .fetch_all(&mut *self.conn)
            .await
            .map_err(DataError::from_sqlx);
        self.report(sql, values, started, target);
        rows
    }

    pub(crate) async fn fetch_optional_row(
        &mut self,
        sql: &str,
        values: &[SqlValue],
        target: &'static str,
    ) -> Result<Option<SqliteRow>> {
        let started = Instant::now();
        let mut query = sqlx::query(sql);
        for value in values {
            query = value.bind_to_query(query);
        }
        let row = query
            .fetch_optional(&mut *self.conn)
            .await
            .map_err(DataError::from_sqlx);
        self.report(sql, values, started, target);
        row
    }

    pub(crate) async fn execute(
        &mut self,
        sql: &str,
        values: &[SqlValue],
        target: &'static str,
    ) -> Result<SqliteQueryResult> {
        let started = Instant::now();
        let mut query = sqlx::query(sql);
        for value in values {
            query = value.bind_to_query(query);
        }
        let result = query
            .execute(&mut *self.conn)
            .await
            .map_err(DataError::from_sqlx);
        self.report(sql, values, started, target);
        result
    }
}
