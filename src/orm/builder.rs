//! SQL query builder for entity types.
//!
//! Builds parameterized SELECT/UPDATE/DELETE statements from the typed
//! filter, ordering and pagination inputs. All user data travels through
//! `?` placeholders bound in order; only column names and operators (which
//! come from `&'static` entity metadata) are interpolated.

use std::marker::PhantomData;

use sqlx::Row;

use crate::error::{DataError, Result};

use super::conn::Conn;
use super::traits::{DatabaseEntity, DatabaseFilter, OrderBy, SqlValue, UniqueWhere};

pub struct EntityQuery<E: DatabaseEntity> {
    where_clauses: Vec<String>,
    values: Vec<SqlValue>,
    order_clauses: Vec<String>,
    limit: Option<i64>,
    offset: Option<i64>,
    _phantom: PhantomData<E>,
}

impl<E: DatabaseEntity> EntityQuery<E> {
    pub fn new() -> Self {
        Self {
            where_clauses: Vec::new(),
            values: Vec::new(),
            order_clauses: Vec::new(),
            limit: None,
            offset: None,
            _phantom: PhantomData,
        }
    }

    /// Add a filter tree to the query.
    pub fn filter(mut self, filter: &E::Where) -> Self {
        if !filter.is_empty() {
            filter.push_conditions(&mut self.where_clauses, &mut self.values);
        }
        self
    }

    /// Constrain to the row identified by a unique filter.
    pub fn unique(mut self, unique: &E::WhereUnique) -> Self {
        let (condition, values) = unique.condition();
        self.where_clauses.push(condition);
        self.values.extend(values);
        self
    }

    /// Add a raw WHERE condition with its bind values.
    pub fn raw_condition(mut self, condition: impl Into<String>, values: Vec<SqlValue>) -> Self {
        self.where_clauses.push(condition.into());
        self.values.extend(values);
        self
    }

    /// Append ordering keys.
    pub fn order_by(mut self, order: &[OrderBy<E::Field>]) -> Self {
        for key in order {
            self.order_clauses.push(key.to_sql());
        }
        self
    }

    /// Append a pre-rendered ordering clause.
    pub fn order_raw(mut self, clause: impl Into<String>) -> Self {
        self.order_clauses.push(clause.into());
        self
    }

    /// Apply the entity's default sort if no ordering was given.
    pub fn default_order(mut self) -> Self {
        if self.order_clauses.is_empty() {
            self.order_clauses
                .push(format!("{} {}", E::DEFAULT_SORT, E::DEFAULT_SORT_DIR));
        }
        self
    }

    /// Append the unique tiebreaker column so the total order is stable.
    pub fn tiebreaker(mut self) -> Self {
        let pk = E::PRIMARY_KEY;
        if !self
            .order_clauses
            .iter()
            .any(|c| c.starts_with(pk) && c.as_bytes().get(pk.len()) == Some(&b' '))
        {
            self.order_clauses.push(format!("{pk} ASC"));
        }
        self
    }

    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: i64) -> Self {
        self.offset = Some(offset);
        self
    }

    fn where_sql(&self) -> String {
        if self.where_clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.where_clauses.join(" AND "))
        }
    }

    fn order_sql(&self) -> String {
        if self.order_clauses.is_empty() {
            format!("{} {}", E::DEFAULT_SORT, E::DEFAULT_SORT_DIR)
        } else {
            self.order_clauses.join(", ")
        }
    }

    /// The WHERE fragment and its bind values, for callers composing their
    /// own statement (aggregates, group-by).
    pub fn where_parts(&self) -> (String, &[SqlValue]) {
        (self.where_sql(), &self.values)
    }

    fn build_select_sql(&self) -> String {
        let mut sql = E::select_sql();
        sql.push_str(&self.where_sql());
        if !self.order_clauses.is_empty() {
            sql.push_str(" ORDER BY ");
            sql.push_str(&self.order_clauses.join(", "));
        }
        match (self.limit, self.offset) {
            (Some(limit), Some(offset)) if offset > 0 => {
                sql.push_str(&format!(" LIMIT {limit} OFFSET {offset}"));
            }
            (Some(limit), _) => sql.push_str(&format!(" LIMIT {limit}")),
            // OFFSET needs a LIMIT in SQLite; -1 means unbounded
            (None, Some(offset)) if offset > 0 => {
                sql.push_str(&format!(" LIMIT -1 OFFSET {offset}"));
            }
            _ => {}
        }
        sql
    }

    /// Execute and decode all matching entities.
    pub async fn fetch_all(self, cx: &mut Conn<'_>) -> Result<Vec<E>> {
        let sql = self.build_select_sql();
        let rows = cx.fetch_all_rows(&sql, &self.values, E::TABLE_NAME).await?;
        rows.iter()
            .map(|row| E::from_row(row).map_err(DataError::from_sqlx))
            .collect()
    }

    /// Execute and decode at most one entity.
    pub async fn fetch_optional(self, cx: &mut Conn<'_>) -> Result<Option<E>> {
        let sql = self.build_select_sql();
        let row = cx
            .fetch_optional_row(&sql, &self.values, E::TABLE_NAME)
            .await?;
        row.map(|row| E::from_row(&row).map_err(DataError::from_sqlx))
            .transpose()
    }

    /// Execute a COUNT(*) over the filtered set.
    pub async fn count(&self, cx: &mut Conn<'_>) -> Result<i64> {
        let sql = format!(
            "SELECT COUNT(*) FROM {}{}",
            E::TABLE_NAME,
            self.where_sql()
        );
        let row = cx
            .fetch_optional_row(&sql, &self.values, E::TABLE_NAME)
            .await?
            .ok_or_else(|| DataError::EnginePanic("COUNT returned no row".into()))?;
        row.try_get::<i64, _>(0).map_err(DataError::from_sqlx)
    }

    /// 1-based position of the row matched by `unique` within the filtered,
    /// ordered set, or `None` if it is not part of the set.
    pub async fn cursor_position(
        &self,
        cx: &mut Conn<'_>,
        unique: &E::WhereUnique,
    ) -> Result<Option<i64>> {
        let (condition, unique_values) = unique.condition();
        let sql = format!(
            "SELECT rn FROM (SELECT *, ROW_NUMBER() OVER (ORDER BY {}) AS rn FROM {}{}) WHERE {}",
            self.order_sql(),
            E::TABLE_NAME,
            self.where_sql(),
            condition
        );
        let mut values = self.values.clone();
        values.extend(unique_values);
        let row = cx.fetch_optional_row(&sql, &values, E::TABLE_NAME).await?;
        row.map(|row| row.try_get::<i64, _>(0))
            .transpose()
            .map_err(DataError::from_sqlx)
    }

    /// Build an UPDATE over the filtered set. With a `limit`, the affected
    /// rows are picked through a `rowid IN (... LIMIT ?)` subquery since
    /// stock SQLite builds lack `UPDATE ... LIMIT`.
    pub fn build_update(
        &self,
        set_fragments: &[String],
        set_values: Vec<SqlValue>,
        limit: Option<i64>,
        returning: bool,
    ) -> (String, Vec<SqlValue>) {
        let mut sql = format!("UPDATE {} SET {}", E::TABLE_NAME, set_fragments.join(", "));
        let mut values = set_values;
        match limit {
            Some(limit) => {
                sql.push_str(&format!(
                    " WHERE rowid IN (SELECT rowid FROM {}{} LIMIT ?)",
                    E::TABLE_NAME,
                    self.where_sql()
                ));
                values.extend(self.values.iter().cloned());
                values.push(SqlValue::Int(limit));
            }
            None => {
                sql.push_str(&self.where_sql());
                values.extend(self.values.iter().cloned());
            }
        }
        if returning {
            sql.push_str(&format!(" RETURNING {}", E::column_names().join(", ")));
        }
        (sql, values)
    }

    /// Build a DELETE over the filtered set, with the same `limit` strategy
    /// as [`build_update`](Self::build_update).
    pub fn build_delete(&self, limit: Option<i64>, returning: bool) -> (String, Vec<SqlValue>) {
        let mut sql = format!("DELETE FROM {}", E::TABLE_NAME);
        let mut values = Vec::new();
        match limit {
            Some(limit) => {
                sql.push_str(&format!(
                    " WHERE rowid IN (SELECT rowid FROM {}{} LIMIT ?)",
                    E::TABLE_NAME,
                    self.where_sql()
                ));
                values.extend(self.values.iter().cloned());
                values.push(SqlValue::Int(limit));
            }
            None => {
                sql.push_str(&self.where_sql());
                values.extend(self.values.iter().cloned());
            }
        }
        if returning {
            sql.push_str(&format!(" RETURNING {}", E::column_names().join(", ")));
        }
        (sql, values)
    }
}

impl<E: DatabaseEntity> Default for EntityQuery<E> {
    fn default() -> Self {
        Self::new()
    }
}
