//! Field filter operator structs.
//!
//! These are the building blocks of the per-entity `*Where` inputs: one
//! operator struct per field, combinable through the `and`/`or`/`not`
//! sub-trees handled by [`logical`]. All fragments use `?` placeholders and
//! collect their operands into [`SqlValue`]s; no value is ever interpolated
//! into SQL text.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

use super::codec::{datetime_value, escape_like};
use super::traits::{DatabaseFilter, SqlValue};

/// A Rust enum stored as TEXT.
pub trait EnumValue: Copy + Eq + std::fmt::Debug + Send + Sync + 'static {
    fn as_str(&self) -> &'static str;
    fn parse(s: &str) -> Option<Self>;
}

fn push_in_list(
    column: &str,
    negated: bool,
    operands: &[SqlValue],
    conditions: &mut Vec<String>,
    values: &mut Vec<SqlValue>,
) {
    if operands.is_empty() {
        // IN () matches nothing; NOT IN () matches everything.
        if !negated {
            conditions.push("1 = 0".to_string());
        }
        return;
    }
    let placeholders = vec!["?"; operands.len()].join(", ");
    let op = if negated { "NOT IN" } else { "IN" };
    conditions.push(format!("{column} {op} ({placeholders})"));
    values.extend(operands.iter().cloned());
}

fn push_is_null(column: &str, is_null: Option<bool>, conditions: &mut Vec<String>) {
    match is_null {
        Some(true) => conditions.push(format!("{column} IS NULL")),
        Some(false) => conditions.push(format!("{column} IS NOT NULL")),
        None => {}
    }
}

/// Filter for string fields
#[derive(Debug, Clone, Default)]
pub struct StringFilter {
    pub eq: Option<String>,
    pub ne: Option<String>,
    /// Contains substring (case-insensitive for ASCII, SQLite LIKE semantics)
    pub contains: Option<String>,
    pub starts_with: Option<String>,
    pub ends_with: Option<String>,
    pub lt: Option<String>,
    pub lte: Option<String>,
    pub gt: Option<String>,
    pub gte: Option<String>,
    pub in_list: Option<Vec<String>>,
    pub not_in: Option<Vec<String>>,
    pub is_null: Option<bool>,
}

impl StringFilter {
    pub fn eq(value: impl Into<String>) -> Self {
        Self {
            eq: Some(value.into()),
            ..Default::default()
        }
    }

    pub fn ne(value: impl Into<String>) -> Self {
        Self {
            ne: Some(value.into()),
            ..Default::default()
        }
    }

    pub fn contains(value: impl Into<String>) -> Self {
        Self {
            contains: Some(value.into()),
            ..Default::default()
        }
    }

    pub fn starts_with(value: impl Into<String>) -> Self {
        Self {
            starts_with: Some(value.into()),
            ..Default::default()
        }
    }

    pub fn ends_with(value: impl Into<String>) -> Self {
        Self {
            ends_with: Some(value.into()),
            ..Default::default()
        }
    }

    pub fn in_list(values: Vec<String>) -> Self {
        Self {
            in_list: Some(values),
            ..Default::default()
        }
    }

    pub fn not_in(values: Vec<String>) -> Self {
        Self {
            not_in: Some(values),
            ..Default::default()
        }
    }

    pub fn is_null() -> Self {
        Self {
            is_null: Some(true),
            ..Default::default()
        }
    }

    pub fn is_not_null() -> Self {
        Self {
            is_null: Some(false),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.eq.is_none()
            && self.ne.is_none()
            && self.contains.is_none()
            && self.starts_with.is_none()
            && self.ends_with.is_none()
            && self.lt.is_none()
            && self.lte.is_none()
            && self.gt.is_none()
            && self.gte.is_none()
            && self.in_list.is_none()
            && self.not_in.is_none()
            && self.is_null.is_none()
    }

    pub fn push(&self, column: &str, conditions: &mut Vec<String>, values: &mut Vec<SqlValue>) {
        let mut cmp = |op: &str, v: &Option<String>| {
            if let Some(v) = v {
                conditions.push(format!("{column} {op} ?"));
                values.push(SqlValue::Text(v.clone()));
            }
        };
        cmp("=", &self.eq);
        cmp("<>", &self.ne);
        cmp("<", &self.lt);
        cmp("<=", &self.lte);
        cmp(">", &self.gt);
        cmp(">=", &self.gte);
        let mut like = |pattern: String| {
            conditions.push(format!("{column} LIKE ? ESCAPE '\\'"));
            values.push(SqlValue::Text(pattern));
        };
        if let Some(v) = &self.contains {
            like(format!("%{}%", escape_like(v)));
        }
        if let Some(v) = &self.starts_with {
            like(format!("{}%", escape_like(v)));
        }
        if let Some(v) = &self.ends_with {
            like(format!("%{}", escape_like(v)));
        }
        if let Some(list) = &self.in_list {
            let operands: Vec<SqlValue> =
                list.iter().map(|v| SqlValue::Text(v.clone())).collect();
            push_in_list(column, false, &operands, conditions, values);
        }
        if let Some(list) = &self.not_in {
            let operands: Vec<SqlValue> =
                list.iter().map(|v| SqlValue::Text(v.clone())).collect();
            push_in_list(column, true, &operands, conditions, values);
        }
        push_is_null(column, self.is_null, conditions);
    }
}

/// Filter for integer fields (ids, foreign keys, counters)
#[derive(Debug, Clone, Default)]
pub struct IntFilter {
    pub eq: Option<i64>,
    pub ne: Option<i64>,
    pub lt: Option<i64>,
    pub lte: Option<i64>,
    pub gt: Option<i64>,
    pub gte: Option<i64>,
    pub in_list: Option<Vec<i64>>,
    pub not_in: Option<Vec<i64>>,
    pub is_null: Option<bool>,
}

impl IntFilter {
    pub fn eq(value: i64) -> Self {
        Self {
            eq: Some(value),
            ..Default::default()
        }
    }

    pub fn ne(value: i64) -> Self {
        Self {
            ne: Some(value),
            ..Default::default()
        }
    }

    pub fn lt(value: i64) -> Self {
        Self {
            lt: Some(value),
            ..Default::default()
        }
    }

    pub fn lte(value: i64) -> Self {
        Self {
            lte: Some(value),
            ..Default::default()
        }
    }

    pub fn gt(value: i64) -> Self {
        Self {
            gt: Some(value),
            ..Default::default()
        }
    }

    pub fn gte(value: i64) -> Self {
        Self {
            gte: Some(value),
            ..Default::default()
        }
    }

    pub fn in_list(values: Vec<i64>) -> Self {
        Self {
            in_list: Some(values),
            ..Default::default()
        }
    }

    pub fn not_in(values: Vec<i64>) -> Self {
        Self {
            not_in: Some(values),
            ..Default::default()
        }
    }

    pub fn between(min: i64, max: i64) -> Self {
        Self {
            gte: Some(min),
            lte: Some(max),
            ..Default::default()
        }
    }

    pub fn is_null() -> Self {
        Self {
            is_null: Some(true),
            ..Default::default()
        }
    }

    pub fn is_not_null() -> Self {
        Self {
            is_null: Some(false),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.eq.is_none()
            && self.ne.is_none()
            && self.lt.is_none()
            && self.lte.is_none()
            && self.gt.is_none()
            && self.gte.is_none()
            && self.in_list.is_none()
            && self.not_in.is_none()
            && self.is_null.is_none()
    }

    pub fn push(&self, column: &str, conditions: &mut Vec<String>, values: &mut Vec<SqlValue>) {
        let mut cmp = |op: &str, v: Option<i64>| {
            if let Some(v) = v {
                conditions.push(format!("{column} {op} ?"));
                values.push(SqlValue::Int(v));
            }
        };
        cmp("=", self.eq);
        cmp("<>", self.ne);
        cmp("<", self.lt);
        cmp("<=", self.lte);
        cmp(">", self.gt);
        cmp(">=", self.gte);
        if let Some(list) = &self.in_list {
            let operands: Vec<SqlValue> = list.iter().map(|v| SqlValue::Int(*v)).collect();
            push_in_list(column, false, &operands, conditions, values);
        }
        if let Some(list) = &self.not_in {
            let operands: Vec<SqlValue> = list.iter().map(|v| SqlValue::Int(*v)).collect();
            push_in_list(column, true, &operands, conditions, values);
        }
        push_is_null(column, self.is_null, conditions);
    }
}

/// Filter for decimal fields (stored as TEXT; comparisons go through
/// `CAST(col AS REAL)`, so they carry float precision)
#[derive(Debug, Clone, Default)]
pub struct DecimalFilter {
    pub eq: Option<Decimal>,
    pub ne: Option<Decimal>,
    pub lt: Option<Decimal>,
    pub lte: Option<Decimal>,
    pub gt: Option<Decimal>,
    pub gte: Option<Decimal>,
    pub is_null: Option<bool>,
}

impl DecimalFilter {
    pub fn eq(value: Decimal) -> Self {
        Self {
            eq: Some(value),
            ..Default::default()
        }
    }

    pub fn lt(value: Decimal) -> Self {
        Self {
            lt: Some(value),
            ..Default::default()
        }
    }

    pub fn lte(value: Decimal) -> Self {
        Self {
            lte: Some(value),
            ..Default::default()
        }
    }

    pub fn gt(value: Decimal) -> Self {
        Self {
            gt: Some(value),
            ..Default::default()
        }
    }

    pub fn gte(value: Decimal) -> Self {
        Self {
            gte: Some(value),
            ..Default::default()
        }
    }

    pub fn is_null() -> Self {
        Self {
            is_null: Some(true),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.eq.is_none()
            && self.ne.is_none()
            && self.lt.is_none()
            && self.lte.is_none()
            && self.gt.is_none()
            && self.gte.is_none()
            && self.is_null.is_none()
    }

    pub fn push(&self, column: &str, conditions: &mut Vec<String>, values: &mut Vec<SqlValue>) {
        let mut cmp = |op: &str, v: &Option<Decimal>| {
            if let Some(v) = v {
                conditions.push(format!("CAST({column} AS REAL) {op} ?"));
                values.push(SqlValue::Real(v.to_f64().unwrap_or_default()));
            }
        };
        cmp("=", &self.eq);
        cmp("<>", &self.ne);
        cmp("<", &self.lt);
        cmp("<=", &self.lte);
        cmp(">", &self.gt);
        cmp(">=", &self.gte);
        push_is_null(column, self.is_null, conditions);
    }
}

/// Filter for boolean fields
#[derive(Debug, Clone, Default)]
pub struct BoolFilter {
    pub eq: Option<bool>,
    pub ne: Option<bool>,
    pub is_null: Option<bool>,
}

impl BoolFilter {
    pub fn eq(value: bool) -> Self {
        Self {
            eq: Some(value),
            ..Default::default()
        }
    }

    pub fn is_true() -> Self {
        Self::eq(true)
    }

    pub fn is_false() -> Self {
        Self::eq(false)
    }

    pub fn is_empty(&self) -> bool {
        self.eq.is_none() && self.ne.is_none() && self.is_null.is_none()
    }

    pub fn push(&self, column: &str, conditions: &mut Vec<String>, values: &mut Vec<SqlValue>) {
        if let Some(v) = self.eq {
            conditions.push(format!("{column} = ?"));
            values.push(SqlValue::Bool(v));
        }
        if let Some(v) = self.ne {
            conditions.push(format!("{column} <> ?"));
            values.push(SqlValue::Bool(v));
        }
        push_is_null(column, self.is_null, conditions);
    }
}

/// Filter for timestamp fields (RFC 3339 TEXT, so textual comparison is
/// chronological)
#[derive(Debug, Clone, Default)]
pub struct DateTimeFilter {
    pub eq: Option<DateTime<Utc>>,
    pub ne: Option<DateTime<Utc>>,
    pub lt: Option<DateTime<Utc>>,
    pub lte: Option<DateTime<Utc>>,
    pub gt: Option<DateTime<Utc>>,
    pub gte: Option<DateTime<Utc>>,
    pub is_null: Option<bool>,
}

impl DateTimeFilter {
    pub fn eq(value: DateTime<Utc>) -> Self {
        Self {
            eq: Some(value),
            ..Default::default()
        }
    }

    pub fn before(value: DateTime<Utc>) -> Self {
        Self {
            lt: Some(value),
            ..Default::default()
        }
    }

    pub fn after(value: DateTime<Utc>) -> Self {
        Self {
            gt: Some(value),
            ..Default::default()
        }
    }

    pub fn between(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            gte: Some(start),
            lte: Some(end),
            ..Default::default()
        }
    }

    pub fn is_null() -> Self {
        Self {
            is_null: Some(true),
            ..Default::default()
        }
    }

    pub fn is_not_null() -> Self {
        Self {
            is_null: Some(false),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.eq.is_none()
            && self.ne.is_none()
            && self.lt.is_none()
            && self.lte.is_none()
            && self.gt.is_none()
            && self.gte.is_none()
            && self.is_null.is_none()
    }

    pub fn push(&self, column: &str, conditions: &mut Vec<String>, values: &mut Vec<SqlValue>) {
        let mut cmp = |op: &str, v: &Option<DateTime<Utc>>| {
            if let Some(v) = v {
                conditions.push(format!("{column} {op} ?"));
                values.push(datetime_value(v));
            }
        };
        cmp("=", &self.eq);
        cmp("<>", &self.ne);
        cmp("<", &self.lt);
        cmp("<=", &self.lte);
        cmp(">", &self.gt);
        cmp(">=", &self.gte);
        push_is_null(column, self.is_null, conditions);
    }
}

/// Filter for enum fields stored as TEXT
#[derive(Debug, Clone)]
pub struct EnumFilter<T: EnumValue> {
    pub eq: Option<T>,
    pub ne: Option<T>,
    pub in_list: Option<Vec<T>>,
    pub not_in: Option<Vec<T>>,
}

impl<T: EnumValue> Default for EnumFilter<T> {
    fn default() -> Self {
        Self {
            eq: None,
            ne: None,
            in_list: None,
            not_in: None,
        }
    }
}

impl<T: EnumValue> EnumFilter<T> {
    pub fn eq(value: T) -> Self {
        Self {
            eq: Some(value),
            ..Default::default()
        }
    }

    pub fn ne(value: T) -> Self {
        Self {
            ne: Some(value),
            ..Default::default()
        }
    }

    pub fn in_list(values: Vec<T>) -> Self {
        Self {
            in_list: Some(values),
            ..Default::default()
        }
    }

    pub fn not_in(values: Vec<T>) -> Self {
        Self {
            not_in: Some(values),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.eq.is_none() && self.ne.is_none() && self.in_list.is_none() && self.not_in.is_none()
    }

    pub fn push(&self, column: &str, conditions: &mut Vec<String>, values: &mut Vec<SqlValue>) {
        if let Some(v) = self.eq {
            conditions.push(format!("{column} = ?"));
            values.push(SqlValue::Text(v.as_str().to_string()));
        }
        if let Some(v) = self.ne {
            conditions.push(format!("{column} <> ?"));
            values.push(SqlValue::Text(v.as_str().to_string()));
        }
        if let Some(list) = &self.in_list {
            let operands: Vec<SqlValue> = list
                .iter()
                .map(|v| SqlValue::Text(v.as_str().to_string()))
                .collect();
            push_in_list(column, false, &operands, conditions, values);
        }
        if let Some(list) = &self.not_in {
            let operands: Vec<SqlValue> = list
                .iter()
                .map(|v| SqlValue::Text(v.as_str().to_string()))
                .collect();
            push_in_list(column, true, &operands, conditions, values);
        }
    }
}

/// Assembly of the `and`/`or`/`not` sub-trees shared by every `*Where` input.
pub mod logical {
    use super::*;

    /// Append the logical sub-trees of a filter. Empty lists contribute
    /// nothing, so `AND []`/`OR []`/`NOT []` are no-ops equivalent to an
    /// absent filter.
    pub fn push_groups<F: DatabaseFilter>(
        and: &[F],
        or: &[F],
        not: &[F],
        conditions: &mut Vec<String>,
        values: &mut Vec<SqlValue>,
    ) {
        for sub in and {
            if let Some((cond, vals)) = sub.to_grouped_condition() {
                conditions.push(cond);
                values.extend(vals);
            }
        }
        let mut branches = Vec::new();
        let mut branch_values = Vec::new();
        for sub in or {
            if let Some((cond, vals)) = sub.to_grouped_condition() {
                branches.push(cond);
                branch_values.extend(vals);
            }
        }
        if !branches.is_empty() {
            conditions.push(format!("({})", branches.join(" OR ")));
            values.extend(branch_values);
        }
        for sub in not {
            if let Some((cond, vals)) = sub.to_grouped_condition() {
                conditions.push(format!("NOT {cond}"));
                values.extend(vals);
            }
        }
    }

    pub fn groups_empty<F: DatabaseFilter>(and: &[F], or: &[F], not: &[F]) -> bool {
        and.iter().all(DatabaseFilter::is_empty)
            && or.iter().all(DatabaseFilter::is_empty)
            && not.iter().all(DatabaseFilter::is_empty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_contains_escapes_wildcards() {
        let mut conditions = Vec::new();
        let mut values = Vec::new();
        StringFilter::contains("50%").push("name", &mut conditions, &mut values);
        assert_eq!(conditions, vec!["name LIKE ? ESCAPE '\\'".to_string()]);
        assert_eq!(values, vec![SqlValue::Text("%50\\%%".to_string())]);
    }

    #[test]
    fn empty_in_list_matches_nothing() {
        let mut conditions = Vec::new();
        let mut values = Vec::new();
        IntFilter::in_list(vec![]).push("id", &mut conditions, &mut values);
        assert_eq!(conditions, vec!["1 = 0".to_string()]);
        assert!(values.is_empty());
    }

    #[test]
    fn int_filter_collects_operands_in_order() {
        let mut conditions = Vec::new();
        let mut values = Vec::new();
        IntFilter::between(1, 10).push("floor", &mut conditions, &mut values);
        assert_eq!(conditions, vec!["floor <= ?", "floor >= ?"]);
        assert_eq!(values, vec![SqlValue::Int(10), SqlValue::Int(1)]);
    }
}
