//! The generic operation family.
//!
//! Every entity gets the same operations, implemented once over the
//! [`DatabaseEntity`] metadata: lookups, list queries with cursor
//! pagination, writes with RETURNING, batch writes, upsert, counts,
//! aggregation and grouping. All of them run against a [`Conn`], so they
//! work identically on pool connections and inside transactions.

use std::collections::{BTreeMap, HashSet};

use chrono::Utc;
use serde_json::Value;

use crate::error::{DataError, Result};

use super::builder::EntityQuery;
use super::codec::{datetime_value, value_at};
use super::conn::Conn;
use super::include::IncludeLoader;
use super::traits::{
    CreateInput, DatabaseEntity, FieldSet, OrderBy, SqlValue, UniqueWhere, UpdateInput,
};

/// SQLite's default bind-parameter ceiling is 999; chunked inserts stay
/// safely under it.
const MAX_BIND_PARAMS: usize = 900;

/// Arguments for `find_many`/`find_first`.
#[derive(Debug, Clone)]
pub struct FindManyArgs<E: DatabaseEntity> {
    pub r#where: Option<E::Where>,
    pub order_by: Vec<OrderBy<E::Field>>,
    /// Unique row the result window is anchored on
    pub cursor: Option<E::WhereUnique>,
    /// Window size; negative values page backward from the anchor
    pub take: Option<i64>,
    pub skip: Option<i64>,
    pub distinct: Vec<E::Field>,
    pub include: Option<E::Include>,
    pub select: Option<Vec<E::Field>>,
    pub omit: Option<Vec<E::Field>>,
}

impl<E: DatabaseEntity> Default for FindManyArgs<E> {
    fn default() -> Self {
        Self {
            r#where: None,
            order_by: Vec::new(),
            cursor: None,
            take: None,
            skip: None,
            distinct: Vec::new(),
            include: None,
            select: None,
            omit: None,
        }
    }
}

impl<E: DatabaseEntity> FindManyArgs<E> {
    pub fn filtered(filter: E::Where) -> Self {
        Self {
            r#where: Some(filter),
            ..Self::default()
        }
    }

    fn validate(&self) -> Result<()> {
        if self.select.is_some() && self.include.is_some() {
            return Err(DataError::validation(
                "select and include cannot be combined",
            ));
        }
        if self.select.is_some() && self.omit.is_some() {
            return Err(DataError::validation("select and omit cannot be combined"));
        }
        if self.cursor.is_some() && !self.distinct.is_empty() {
            return Err(DataError::validation(
                "cursor cannot be combined with distinct",
            ));
        }
        if let Some(skip) = self.skip
            && skip < 0
        {
            return Err(DataError::validation("skip must not be negative"));
        }
        Ok(())
    }
}

/// Result window relative to a cursor position (1-based). Returns the
/// 0-based offset and the limit, or `None` when the window is empty.
fn cursor_window(position: i64, skip: i64, take: Option<i64>) -> Option<(i64, Option<i64>)> {
    match take {
        Some(take) if take < 0 => {
            // Backward paging: skip moves away from the anchor, then the
            // window covers the |take| rows ending at that point.
            let end = position - skip;
            if end <= 0 {
                return None;
            }
            let start = (end - take.abs()).max(0);
            Some((start, Some(end - start)))
        }
        take => Some((position - 1 + skip, take)),
    }
}

async fn load_include<E: DatabaseEntity>(
    cx: &mut Conn<'_>,
    records: &mut [E],
    include: Option<&E::Include>,
) -> Result<()> {
    if let Some(include) = include
        && !include.is_empty()
    {
        include.load(records, cx).await?;
    }
    Ok(())
}

pub async fn find_unique<E: DatabaseEntity>(
    cx: &mut Conn<'_>,
    unique: &E::WhereUnique,
    include: Option<&E::Include>,
) -> Result<Option<E>> {
    let record = EntityQuery::<E>::new()
        .unique(unique)
        .limit(1)
        .fetch_optional(cx)
        .await?;
    match record {
        Some(mut record) => {
            load_include(cx, std::slice::from_mut(&mut record), include).await?;
            Ok(Some(record))
        }
        None => Ok(None),
    }
}

pub async fn find_unique_or_throw<E: DatabaseEntity>(
    cx: &mut Conn<'_>,
    unique: &E::WhereUnique,
    include: Option<&E::Include>,
) -> Result<E> {
    find_unique(cx, unique, include)
        .await?
        .ok_or_else(|| DataError::not_found(E::TABLE_NAME))
}

pub async fn find_first<E: DatabaseEntity>(
    cx: &mut Conn<'_>,
    mut args: FindManyArgs<E>,
) -> Result<Option<E>> {
    // The window is fixed at one row; distinct still needs the full set
    // before deduplication picks it.
    args.take = if args.distinct.is_empty() { Some(1) } else { None };
    Ok(find_many(cx, args).await?.into_iter().next())
}

pub async fn find_first_or_throw<E: DatabaseEntity>(
    cx: &mut Conn<'_>,
    args: FindManyArgs<E>,
) -> Result<E> {
    find_first(cx, args)
        .await?
        .ok_or_else(|| DataError::not_found(E::TABLE_NAME))
}

pub async fn find_many<E: DatabaseEntity>(
    cx: &mut Conn<'_>,
    args: FindManyArgs<E>,
) -> Result<Vec<E>> {
    args.validate()?;

    let filter = args.r#where.clone().unwrap_or_default();
    let skip = args.skip.unwrap_or(0);

    // Without an anchor, a negative take means "the last |take| rows": run
    // the query in reversed order and restore the requested order in memory.
    let reverse_in_memory =
        args.cursor.is_none() && args.distinct.is_empty() && matches!(args.take, Some(t) if t < 0);

    // Ordering keys as rendered clauses, with the unique tiebreaker
    // appended so the total order is stable; in reversed mode every key
    // flips, the tiebreaker included.
    let mut order: Vec<String> = if args.order_by.is_empty() {
        let direction = match (E::DEFAULT_SORT_DIR, reverse_in_memory) {
            (dir, false) => dir,
            ("DESC", true) => "ASC",
            (_, true) => "DESC",
        };
        vec![format!("{} {}", E::DEFAULT_SORT, direction)]
    } else if reverse_in_memory {
        args.order_by.iter().map(|key| key.reversed().to_sql()).collect()
    } else {
        args.order_by.iter().map(OrderBy::to_sql).collect()
    };
    let pk = E::PRIMARY_KEY;
    if !order
        .iter()
        .any(|c| c.starts_with(pk) && c.as_bytes().get(pk.len()) == Some(&b' '))
    {
        order.push(format!(
            "{pk} {}",
            if reverse_in_memory { "DESC" } else { "ASC" }
        ));
    }

    let base = || {
        let mut query = EntityQuery::<E>::new().filter(&filter);
        for clause in &order {
            query = query.order_raw(clause.clone());
        }
        query
    };

    let mut records = if !args.distinct.is_empty() {
        // Deduplication by field tuple happens in memory, keeping the first
        // row per tuple in result order; the window applies afterwards.
        let full = base().fetch_all(cx).await?;
        let mut seen = HashSet::new();
        let mut kept = Vec::new();
        for record in full {
            let json = serde_json::to_value(&record)
                .map_err(|e| DataError::EnginePanic(format!("serialization failed: {e}")))?;
            let key: Vec<String> = args
                .distinct
                .iter()
                .map(|f| json.get(f.column()).map(Value::to_string).unwrap_or_default())
                .collect();
            if seen.insert(key) {
                kept.push(record);
            }
        }
        let skip = skip.max(0) as usize;
        let mut kept: Vec<E> = kept.into_iter().skip(skip).collect();
        match args.take {
            Some(take) if take >= 0 => kept.truncate(take as usize),
            Some(take) => {
                // Negative take keeps the tail of the deduplicated set.
                let keep = take.unsigned_abs() as usize;
                if kept.len() > keep {
                    kept.drain(..kept.len() - keep);
                }
            }
            None => {}
        }
        kept
    } else if let Some(cursor) = &args.cursor {
        let position = base()
            .cursor_position(cx, cursor)
            .await?
            .ok_or_else(|| DataError::not_found(E::TABLE_NAME))?;
        match cursor_window(position, skip, args.take) {
            None => Vec::new(),
            Some((offset, limit)) => {
                let mut query = base().offset(offset);
                if let Some(limit) = limit {
                    query = query.limit(limit);
                }
                query.fetch_all(cx).await?
            }
        }
    } else {
        let mut query = base().offset(skip);
        if let Some(take) = args.take {
            query = query.limit(take.abs());
        }
        let mut fetched = query.fetch_all(cx).await?;
        if reverse_in_memory {
            fetched.reverse();
        }
        fetched
    };

    load_include(cx, &mut records, args.include.as_ref()).await?;
    Ok(records)
}

/// `find_many` with `select`/`omit` applied; the result is JSON because the
/// row shape no longer matches the record type.
pub async fn find_many_projected<E: DatabaseEntity>(
    cx: &mut Conn<'_>,
    args: FindManyArgs<E>,
    global_omit: &[String],
) -> Result<Vec<Value>> {
    let select = args.select.clone();
    let omit = args.omit.clone();
    let records = find_many(cx, args).await?;
    super::projection::project::<E>(&records, select.as_deref(), omit.as_deref(), global_omit)
}

pub async fn create<E: DatabaseEntity>(
    cx: &mut Conn<'_>,
    data: &E::Create,
    include: Option<&E::Include>,
) -> Result<E> {
    let columns = E::Create::columns();
    let values = data.values();
    let sql = format!(
        "INSERT INTO {} ({}) VALUES ({}) RETURNING {}",
        E::TABLE_NAME,
        columns.join(", "),
        vec!["?"; columns.len()].join(", "),
        E::column_names().join(", ")
    );
    let row = cx
        .fetch_optional_row(&sql, &values, E::TABLE_NAME)
        .await?
        .ok_or_else(|| DataError::EnginePanic("INSERT returned no row".into()))?;
    let mut record = E::from_row(&row).map_err(DataError::from_sqlx)?;
    load_include(cx, std::slice::from_mut(&mut record), include).await?;
    Ok(record)
}

fn rows_per_chunk(columns: usize) -> usize {
    (MAX_BIND_PARAMS / columns.max(1)).max(1)
}

fn insert_many_sql<E: DatabaseEntity>(rows: usize, skip_duplicates: bool, returning: bool) -> String {
    let columns = E::Create::columns();
    let row_placeholders = format!("({})", vec!["?"; columns.len()].join(", "));
    let mut sql = format!(
        "INSERT {}INTO {} ({}) VALUES {}",
        if skip_duplicates { "OR IGNORE " } else { "" },
        E::TABLE_NAME,
        columns.join(", "),
        vec![row_placeholders; rows].join(", ")
    );
    if returning {
        sql.push_str(&format!(" RETURNING {}", E::column_names().join(", ")));
    }
    sql
}

/// Batch insert. Returns the number of rows actually written, which with
/// `skip_duplicates` can be less than the input length.
pub async fn create_many<E: DatabaseEntity>(
    cx: &mut Conn<'_>,
    data: &[E::Create],
    skip_duplicates: bool,
) -> Result<u64> {
    let mut written = 0;
    for chunk in data.chunks(rows_per_chunk(E::Create::columns().len())) {
        let sql = insert_many_sql::<E>(chunk.len(), skip_duplicates, false);
        let values: Vec<SqlValue> = chunk.iter().flat_map(CreateInput::values).collect();
        written += cx.execute(&sql, &values, E::TABLE_NAME).await?.rows_affected();
    }
    Ok(written)
}

pub async fn create_many_and_return<E: DatabaseEntity>(
    cx: &mut Conn<'_>,
    data: &[E::Create],
    skip_duplicates: bool,
) -> Result<Vec<E>> {
    let mut records = Vec::with_capacity(data.len());
    for chunk in data.chunks(rows_per_chunk(E::Create::columns().len())) {
        let sql = insert_many_sql::<E>(chunk.len(), skip_duplicates, true);
        let values: Vec<SqlValue> = chunk.iter().flat_map(CreateInput::values).collect();
        for row in cx.fetch_all_rows(&sql, &values, E::TABLE_NAME).await? {
            records.push(E::from_row(&row).map_err(DataError::from_sqlx)?);
        }
    }
    Ok(records)
}

fn assignments_with_touch<E: DatabaseEntity>(data: &E::Update) -> (Vec<String>, Vec<SqlValue>) {
    let (mut fragments, mut values) = data.assignments();
    if E::HAS_UPDATED_AT && !fragments.iter().any(|f| f.starts_with("updated_at ")) {
        fragments.push("updated_at = ?".to_string());
        values.push(datetime_value(&Utc::now()));
    }
    (fragments, values)
}

pub async fn update<E: DatabaseEntity>(
    cx: &mut Conn<'_>,
    unique: &E::WhereUnique,
    data: &E::Update,
    include: Option<&E::Include>,
) -> Result<E> {
    if data.is_empty() {
        // Nothing to write; behave like a strict lookup.
        return find_unique_or_throw(cx, unique, include).await;
    }
    let (fragments, mut values) = assignments_with_touch::<E>(data);
    let (condition, unique_values) = unique.condition();
    values.extend(unique_values);
    let sql = format!(
        "UPDATE {} SET {} WHERE {} RETURNING {}",
        E::TABLE_NAME,
        fragments.join(", "),
        condition,
        E::column_names().join(", ")
    );
    let row = cx
        .fetch_optional_row(&sql, &values, E::TABLE_NAME)
        .await?
        .ok_or_else(|| DataError::not_found(E::TABLE_NAME))?;
    let mut record = E::from_row(&row).map_err(DataError::from_sqlx)?;
    load_include(cx, std::slice::from_mut(&mut record), include).await?;
    Ok(record)
}

fn validate_limit(limit: Option<i64>) -> Result<()> {
    if let Some(limit) = limit
        && limit < 0
    {
        return Err(DataError::validation("limit must not be negative"));
    }
    Ok(())
}

/// Update every row matching the filter, optionally capped at `limit` rows.
/// Returns the affected-row count.
pub async fn update_many<E: DatabaseEntity>(
    cx: &mut Conn<'_>,
    filter: &E::Where,
    data: &E::Update,
    limit: Option<i64>,
) -> Result<u64> {
    validate_limit(limit)?;
    if data.is_empty() {
        return Ok(0);
    }
    let (fragments, values) = assignments_with_touch::<E>(data);
    let query = EntityQuery::<E>::new().filter(filter);
    let (sql, values) = query.build_update(&fragments, values, limit, false);
    Ok(cx.execute(&sql, &values, E::TABLE_NAME).await?.rows_affected())
}

pub async fn update_many_and_return<E: DatabaseEntity>(
    cx: &mut Conn<'_>,
    filter: &E::Where,
    data: &E::Update,
    limit: Option<i64>,
) -> Result<Vec<E>> {
    validate_limit(limit)?;
    if data.is_empty() {
        return Ok(Vec::new());
    }
    let (fragments, values) = assignments_with_touch::<E>(data);
    let query = EntityQuery::<E>::new().filter(filter);
    let (sql, values) = query.build_update(&fragments, values, limit, true);
    let rows = cx.fetch_all_rows(&sql, &values, E::TABLE_NAME).await?;
    rows.iter()
        .map(|row| E::from_row(row).map_err(DataError::from_sqlx))
        .collect()
}

async fn upsert_inner<E: DatabaseEntity>(
    cx: &mut Conn<'_>,
    unique: &E::WhereUnique,
    create_data: &E::Create,
    update_data: &E::Update,
    include: Option<&E::Include>,
) -> Result<E> {
    match find_unique::<E>(cx, unique, None).await? {
        Some(_) => update(cx, unique, update_data, include).await,
        None => create(cx, create_data, include).await,
    }
}

/// Update the row matched by `unique`, or create it if absent. Runs inside
/// a savepoint so it nests in outer transactions and stays atomic on its
/// own connection.
pub async fn upsert<E: DatabaseEntity>(
    cx: &mut Conn<'_>,
    unique: &E::WhereUnique,
    create_data: &E::Create,
    update_data: &E::Update,
    include: Option<&E::Include>,
) -> Result<E> {
    cx.execute("SAVEPOINT gmao_upsert", &[], E::TABLE_NAME).await?;
    match upsert_inner(cx, unique, create_data, update_data, include).await {
        Ok(record) => {
            cx.execute("RELEASE gmao_upsert", &[], E::TABLE_NAME).await?;
            Ok(record)
        }
        Err(e) => {
            let _ = cx.execute("ROLLBACK TO gmao_upsert", &[], E::TABLE_NAME).await;
            let _ = cx.execute("RELEASE gmao_upsert", &[], E::TABLE_NAME).await;
            Err(e)
        }
    }
}

pub async fn delete<E: DatabaseEntity>(
    cx: &mut Conn<'_>,
    unique: &E::WhereUnique,
    include: Option<&E::Include>,
) -> Result<E> {
    let (condition, values) = unique.condition();
    let sql = format!(
        "DELETE FROM {} WHERE {} RETURNING {}",
        E::TABLE_NAME,
        condition,
        E::column_names().join(", ")
    );
    let row = cx
        .fetch_optional_row(&sql, &values, E::TABLE_NAME)
        .await?
        .ok_or_else(|| DataError::not_found(E::TABLE_NAME))?;
    let mut record = E::from_row(&row).map_err(DataError::from_sqlx)?;
    load_include(cx, std::slice::from_mut(&mut record), include).await?;
    Ok(record)
}

pub async fn delete_many<E: DatabaseEntity>(
    cx: &mut Conn<'_>,
    filter: &E::Where,
    limit: Option<i64>,
) -> Result<u64> {
    validate_limit(limit)?;
    let query = EntityQuery::<E>::new().filter(filter);
    let (sql, values) = query.build_delete(limit, false);
    Ok(cx.execute(&sql, &values, E::TABLE_NAME).await?.rows_affected())
}

pub async fn count<E: DatabaseEntity>(
    cx: &mut Conn<'_>,
    filter: Option<&E::Where>,
) -> Result<i64> {
    let mut query = EntityQuery::<E>::new();
    if let Some(filter) = filter {
        query = query.filter(filter);
    }
    query.count(cx).await
}

/// Row count plus per-field non-NULL counts.
#[derive(Debug, Clone, Default)]
pub struct CountResult {
    pub all: i64,
    pub fields: BTreeMap<&'static str, i64>,
}

pub async fn count_select<E: DatabaseEntity>(
    cx: &mut Conn<'_>,
    filter: Option<&E::Where>,
    fields: &[E::Field],
) -> Result<CountResult> {
    let mut query = EntityQuery::<E>::new();
    if let Some(filter) = filter {
        query = query.filter(filter);
    }
    let (where_sql, where_values) = query.where_parts();
    let mut expressions = vec!["COUNT(*)".to_string()];
    for field in fields {
        expressions.push(format!("COUNT({})", field.column()));
    }
    let sql = format!(
        "SELECT {} FROM {}{}",
        expressions.join(", "),
        E::TABLE_NAME,
        where_sql
    );
    let row = cx
        .fetch_optional_row(&sql, where_values, E::TABLE_NAME)
        .await?
        .ok_or_else(|| DataError::EnginePanic("COUNT returned no row".into()))?;
    use sqlx::Row;
    let mut result = CountResult {
        all: row.try_get::<i64, _>(0).map_err(DataError::from_sqlx)?,
        fields: BTreeMap::new(),
    };
    for (idx, field) in fields.iter().enumerate() {
        let value = row
            .try_get::<i64, _>(idx + 1)
            .map_err(DataError::from_sqlx)?;
        result.fields.insert(field.column(), value);
    }
    Ok(result)
}

/// What `_count` should compute in an aggregation.
#[derive(Debug, Clone)]
pub enum CountSelect<F> {
    All,
    Fields(Vec<F>),
}

/// Aggregate selections over a filtered set.
#[derive(Debug, Clone)]
pub struct AggregateArgs<E: DatabaseEntity> {
    pub r#where: Option<E::Where>,
    pub count: Option<CountSelect<E::Field>>,
    pub avg: Vec<E::Field>,
    pub sum: Vec<E::Field>,
    pub min: Vec<E::Field>,
    pub max: Vec<E::Field>,
}

impl<E: DatabaseEntity> Default for AggregateArgs<E> {
    fn default() -> Self {
        Self {
            r#where: None,
            count: None,
            avg: Vec::new(),
            sum: Vec::new(),
            min: Vec::new(),
            max: Vec::new(),
        }
    }
}

impl<E: DatabaseEntity> AggregateArgs<E> {
    fn validate(&self) -> Result<()> {
        if self.count.is_none()
            && self.avg.is_empty()
            && self.sum.is_empty()
            && self.min.is_empty()
            && self.max.is_empty()
        {
            return Err(DataError::validation(
                "aggregate requires at least one selection",
            ));
        }
        for field in self.avg.iter().chain(self.sum.iter()) {
            if !field.is_numeric() {
                return Err(DataError::validation(format!(
                    "avg/sum require a numeric field, got {}",
                    field.column()
                )));
            }
        }
        Ok(())
    }

    /// SELECT expressions in a fixed order the decoder mirrors.
    fn expressions(&self) -> Vec<String> {
        let mut expressions = Vec::new();
        match &self.count {
            Some(CountSelect::All) => expressions.push("COUNT(*)".to_string()),
            Some(CountSelect::Fields(fields)) => {
                for field in fields {
                    expressions.push(format!("COUNT({})", field.column()));
                }
            }
            None => {}
        }
        for field in &self.avg {
            expressions.push(format!("AVG({})", field.column()));
        }
        for field in &self.sum {
            expressions.push(format!("SUM({})", field.column()));
        }
        for field in &self.min {
            expressions.push(format!("MIN({})", field.column()));
        }
        for field in &self.max {
            expressions.push(format!("MAX({})", field.column()));
        }
        expressions
    }

    fn decode(&self, row: &sqlx::sqlite::SqliteRow, mut idx: usize) -> Result<AggregateResult> {
        use sqlx::Row;

        let mut result = AggregateResult::default();
        match &self.count {
            Some(CountSelect::All) => {
                result.count_all = Some(row.try_get::<i64, _>(idx).map_err(DataError::from_sqlx)?);
                idx += 1;
            }
            Some(CountSelect::Fields(fields)) => {
                for field in fields {
                    let value = row.try_get::<i64, _>(idx).map_err(DataError::from_sqlx)?;
                    result.count_fields.insert(field.column(), value);
                    idx += 1;
                }
            }
            None => {}
        }
        for field in &self.avg {
            let value = value_at(row, idx).map_err(DataError::from_sqlx)?;
            result.avg.insert(field.column(), value.as_f64());
            idx += 1;
        }
        for field in &self.sum {
            result
                .sum
                .insert(field.column(), value_at(row, idx).map_err(DataError::from_sqlx)?);
            idx += 1;
        }
        for field in &self.min {
            result
                .min
                .insert(field.column(), value_at(row, idx).map_err(DataError::from_sqlx)?);
            idx += 1;
        }
        for field in &self.max {
            result
                .max
                .insert(field.column(), value_at(row, idx).map_err(DataError::from_sqlx)?);
            idx += 1;
        }
        Ok(result)
    }
}

/// Aggregate values keyed by column. `sum`/`min`/`max` keep the column's
/// own type (JSON-encoded), `avg` is always a float, and any of them is
/// NULL over an empty set.
#[derive(Debug, Clone, Default)]
pub struct AggregateResult {
    pub count_all: Option<i64>,
    pub count_fields: BTreeMap<&'static str, i64>,
    pub avg: BTreeMap<&'static str, Option<f64>>,
    pub sum: BTreeMap<&'static str, Value>,
    pub min: BTreeMap<&'static str, Value>,
    pub max: BTreeMap<&'static str, Value>,
}

pub async fn aggregate<E: DatabaseEntity>(
    cx: &mut Conn<'_>,
    args: AggregateArgs<E>,
) -> Result<AggregateResult> {
    args.validate()?;
    let mut query = EntityQuery::<E>::new();
    if let Some(filter) = &args.r#where {
        query = query.filter(filter);
    }
    let (where_sql, where_values) = query.where_parts();
    let sql = format!(
        "SELECT {} FROM {}{}",
        args.expressions().join(", "),
        E::TABLE_NAME,
        where_sql
    );
    let row = cx
        .fetch_optional_row(&sql, where_values, E::TABLE_NAME)
        .await?
        .ok_or_else(|| DataError::EnginePanic("aggregate returned no row".into()))?;
    args.decode(&row, 0)
}

#[derive(Debug, Clone, Copy)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Lte,
    Gt,
    Gte,
}

impl CmpOp {
    fn to_sql(self) -> &'static str {
        match self {
            CmpOp::Eq => "=",
            CmpOp::Ne => "<>",
            CmpOp::Lt => "<",
            CmpOp::Lte => "<=",
            CmpOp::Gt => ">",
            CmpOp::Gte => ">=",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub enum AggregateFunc {
    Count,
    Avg,
    Sum,
    Min,
    Max,
}

impl AggregateFunc {
    fn to_sql(self) -> &'static str {
        match self {
            AggregateFunc::Count => "COUNT",
            AggregateFunc::Avg => "AVG",
            AggregateFunc::Sum => "SUM",
            AggregateFunc::Min => "MIN",
            AggregateFunc::Max => "MAX",
        }
    }
}

/// One HAVING condition: either a plain grouped-field comparison (the field
/// must be part of `by`) or an aggregate comparison.
#[derive(Debug, Clone)]
pub enum HavingExpr<F> {
    Field {
        field: F,
        op: CmpOp,
        value: SqlValue,
    },
    Aggregate {
        func: AggregateFunc,
        /// `None` means `COUNT(*)`
        field: Option<F>,
        op: CmpOp,
        value: SqlValue,
    },
}

/// Arguments for `group_by`.
#[derive(Debug, Clone)]
pub struct GroupByArgs<E: DatabaseEntity> {
    pub by: Vec<E::Field>,
    pub r#where: Option<E::Where>,
    pub having: Vec<HavingExpr<E::Field>>,
    pub order_by: Vec<OrderBy<E::Field>>,
    pub take: Option<i64>,
    pub skip: Option<i64>,
    pub count: Option<CountSelect<E::Field>>,
    pub avg: Vec<E::Field>,
    pub sum: Vec<E::Field>,
    pub min: Vec<E::Field>,
    pub max: Vec<E::Field>,
}

impl<E: DatabaseEntity> Default for GroupByArgs<E> {
    fn default() -> Self {
        Self {
            by: Vec::new(),
            r#where: None,
            having: Vec::new(),
            order_by: Vec::new(),
            take: None,
            skip: None,
            count: None,
            avg: Vec::new(),
            sum: Vec::new(),
            min: Vec::new(),
            max: Vec::new(),
        }
    }
}

impl<E: DatabaseEntity> GroupByArgs<E> {
    fn validate(&self) -> Result<()> {
        if self.by.is_empty() {
            return Err(DataError::validation("group_by requires at least one field"));
        }
        // Plain field references outside the grouping set would read an
        // arbitrary row of the group.
        for key in &self.order_by {
            if !self.by.contains(&key.field) {
                return Err(DataError::validation(format!(
                    "order_by field {} must be part of by",
                    key.field.column()
                )));
            }
        }
        for expr in &self.having {
            if let HavingExpr::Field { field, .. } = expr
                && !self.by.contains(field)
            {
                return Err(DataError::validation(format!(
                    "having field {} must be part of by",
                    field.column()
                )));
            }
        }
        for field in self.avg.iter().chain(self.sum.iter()) {
            if !field.is_numeric() {
                return Err(DataError::validation(format!(
                    "avg/sum require a numeric field, got {}",
                    field.column()
                )));
            }
        }
        if let Some(skip) = self.skip
            && skip < 0
        {
            return Err(DataError::validation("skip must not be negative"));
        }
        validate_limit(self.take)?;
        Ok(())
    }

    fn aggregate_selection(&self) -> AggregateArgs<E> {
        AggregateArgs {
            r#where: None,
            count: self.count.clone(),
            avg: self.avg.clone(),
            sum: self.sum.clone(),
            min: self.min.clone(),
            max: self.max.clone(),
        }
    }
}

/// One group: the grouping-key values plus the requested aggregates.
#[derive(Debug, Clone)]
pub struct GroupByRow {
    pub keys: BTreeMap<&'static str, Value>,
    pub aggregates: AggregateResult,
}

pub async fn group_by<E: DatabaseEntity>(
    cx: &mut Conn<'_>,
    args: GroupByArgs<E>,
) -> Result<Vec<GroupByRow>> {
    args.validate()?;

    let mut query = EntityQuery::<E>::new();
    if let Some(filter) = &args.r#where {
        query = query.filter(filter);
    }
    let (where_sql, where_values) = query.where_parts();

    let by_columns: Vec<&'static str> = args.by.iter().map(|f| f.column()).collect();
    let selection = args.aggregate_selection();
    let mut expressions: Vec<String> = by_columns.iter().map(|c| c.to_string()).collect();
    expressions.extend(selection.expressions());

    let mut sql = format!(
        "SELECT {} FROM {}{} GROUP BY {}",
        expressions.join(", "),
        E::TABLE_NAME,
        where_sql,
        by_columns.join(", ")
    );
    let mut values: Vec<SqlValue> = where_values.to_vec();

    if !args.having.is_empty() {
        let mut conditions = Vec::new();
        for expr in &args.having {
            match expr {
                HavingExpr::Field { field, op, value } => {
                    conditions.push(format!("{} {} ?", field.column(), op.to_sql()));
                    values.push(value.clone());
                }
                HavingExpr::Aggregate {
                    func,
                    field,
                    op,
                    value,
                } => {
                    let operand = field.map(|f| f.column()).unwrap_or("*");
                    conditions.push(format!("{}({}) {} ?", func.to_sql(), operand, op.to_sql()));
                    values.push(value.clone());
                }
            }
        }
        sql.push_str(&format!(" HAVING {}", conditions.join(" AND ")));
    }

    if args.order_by.is_empty() {
        sql.push_str(&format!(" ORDER BY {}", by_columns.join(", ")));
    } else {
        let keys: Vec<String> = args.order_by.iter().map(OrderBy::to_sql).collect();
        sql.push_str(&format!(" ORDER BY {}", keys.join(", ")));
    }

    let skip = args.skip.unwrap_or(0);
    match (args.take, skip) {
        (Some(take), skip) if skip > 0 => sql.push_str(&format!(" LIMIT {take} OFFSET {skip}")),
        (Some(take), _) => sql.push_str(&format!(" LIMIT {take}")),
        (None, skip) if skip > 0 => sql.push_str(&format!(" LIMIT -1 OFFSET {skip}")),
        _ => {}
    }

    let rows = cx.fetch_all_rows(&sql, &values, E::TABLE_NAME).await?;
    let mut groups = Vec::with_capacity(rows.len());
    for row in &rows {
        let mut keys = BTreeMap::new();
        for (idx, column) in by_columns.iter().enumerate() {
            keys.insert(*column, value_at(row, idx).map_err(DataError::from_sqlx)?);
        }
        let aggregates = selection.decode(row, by_columns.len())?;
        groups.push(GroupByRow { keys, aggregates });
    }
    Ok(groups)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cursor_window_forward_includes_anchor() {
        assert_eq!(cursor_window(5, 0, Some(3)), Some((4, Some(3))));
        assert_eq!(cursor_window(5, 2, Some(3)), Some((6, Some(3))));
        assert_eq!(cursor_window(1, 0, None), Some((0, None)));
    }

    #[test]
    fn cursor_window_backward_ends_at_anchor() {
        // Rows 3..=5 (1-based), anchor at 5.
        assert_eq!(cursor_window(5, 0, Some(-3)), Some((2, Some(3))));
        // Clamped at the start of the set.
        assert_eq!(cursor_window(2, 0, Some(-5)), Some((0, Some(2))));
        // Skipped past the start entirely.
        assert_eq!(cursor_window(2, 3, Some(-1)), None);
    }

    #[test]
    fn chunking_stays_under_the_bind_limit() {
        assert_eq!(rows_per_chunk(9), 100);
        assert_eq!(rows_per_chunk(1000), 1);
    }
}
