//! Relation loading for read operations.
//!
//! Relations are shaped by a second round of queries rather than JOINs: the
//! parent rows are fetched first, then each requested to-many edge runs one
//! `fk IN (...)` query over the collected parent ids and the children are
//! grouped back onto their parents. Nested includes recurse on the full
//! child set before grouping, so depth costs one query per edge, not per
//! parent row.

use std::collections::HashMap;

use crate::error::Result;

use super::builder::EntityQuery;
use super::conn::Conn;
use super::traits::{DatabaseEntity, OrderBy, SqlValue};

/// Arguments for one to-many edge of an include tree: an optional filter,
/// ordering and pagination applied per parent, plus the child's own nested
/// include.
#[derive(Debug, Clone)]
pub struct ToMany<C: DatabaseEntity> {
    pub r#where: Option<C::Where>,
    pub order_by: Vec<OrderBy<C::Field>>,
    pub take: Option<i64>,
    pub skip: Option<i64>,
    pub include: Option<C::Include>,
}

impl<C: DatabaseEntity> Default for ToMany<C> {
    fn default() -> Self {
        Self {
            r#where: None,
            order_by: Vec::new(),
            take: None,
            skip: None,
            include: None,
        }
    }
}

impl<C: DatabaseEntity> ToMany<C> {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn filtered(filter: C::Where) -> Self {
        Self {
            r#where: Some(filter),
            ..Self::default()
        }
    }
}

/// Implemented by the per-entity `*Include` structs. `load` fills the
/// relation fields of the given records in place.
pub trait IncludeLoader<E>: Sized + Send + Sync {
    /// Whether any edge is requested; empty includes skip the extra queries.
    fn is_empty(&self) -> bool;

    #[allow(async_fn_in_trait)]
    async fn load(&self, records: &mut [E], cx: &mut Conn<'_>) -> Result<()>;
}

/// Include type for entities without to-many edges.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoInclude;

impl<E> IncludeLoader<E> for NoInclude {
    fn is_empty(&self) -> bool {
        true
    }

    async fn load(&self, _records: &mut [E], _cx: &mut Conn<'_>) -> Result<()> {
        Ok(())
    }
}

/// Fetch the children of one to-many edge for a set of parents and group
/// them by foreign key. Ordering happens in SQL over the whole child set;
/// `skip`/`take` are applied per parent afterwards (a negative `take` keeps
/// the last `|take|` children instead of the first).
pub async fn load_to_many<C: DatabaseEntity>(
    cx: &mut Conn<'_>,
    parent_ids: &[i64],
    fk_column: &'static str,
    args: &ToMany<C>,
    fk_of: impl Fn(&C) -> i64,
) -> Result<HashMap<i64, Vec<C>>> {
    let mut grouped: HashMap<i64, Vec<C>> = HashMap::new();
    if parent_ids.is_empty() {
        return Ok(grouped);
    }

    let placeholders = vec!["?"; parent_ids.len()].join(", ");
    let ids: Vec<SqlValue> = parent_ids.iter().map(|id| SqlValue::Int(*id)).collect();
    let mut query = EntityQuery::<C>::new()
        .raw_condition(format!("{fk_column} IN ({placeholders})"), ids);
    if let Some(filter) = &args.r#where {
        query = query.filter(filter);
    }
    let mut children = query
        .order_by(&args.order_by)
        .default_order()
        .tiebreaker()
        .fetch_all(cx)
        .await?;

    if let Some(include) = &args.include
        && !include.is_empty()
    {
        include.load(&mut children, cx).await?;
    }

    for child in children {
        grouped.entry(fk_of(&child)).or_default().push(child);
    }

    let skip = args.skip.unwrap_or(0).max(0) as usize;
    if skip > 0 || args.take.is_some() {
        for children in grouped.values_mut() {
            let mut rest = children.split_off(children.len().min(skip));
            match args.take {
                Some(take) if take >= 0 => rest.truncate(take as usize),
                Some(take) => {
                    let keep = take.unsigned_abs() as usize;
                    if rest.len() > keep {
                        rest.drain(..rest.len() - keep);
                    }
                }
                None => {}
            }
            *children = rest;
        }
        grouped.retain(|_, children| !children.is_empty());
    }

    Ok(grouped)
}

/// Collect the primary-key ids of a parent slice, for the `IN` list of a
/// child query.
pub fn parent_ids<E>(records: &[E], id_of: impl Fn(&E) -> i64) -> Vec<i64> {
    records.iter().map(id_of).collect()
}
