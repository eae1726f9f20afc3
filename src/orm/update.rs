//! Typed update operators for numeric fields.
//!
//! Beyond plain `set`, numeric columns accept relative updates
//! (`increment`/`decrement`/`multiply`/`divide`) that are evaluated in SQL,
//! so they compose correctly with concurrent writers.

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

use super::traits::SqlValue;

/// Update operator for integer columns.
#[derive(Debug, Clone, Copy)]
pub enum IntUpdate {
    Set(i64),
    Increment(i64),
    Decrement(i64),
    Multiply(i64),
    Divide(i64),
}

impl IntUpdate {
    pub fn assignment(&self, column: &str) -> (String, SqlValue) {
        match self {
            IntUpdate::Set(v) => (format!("{column} = ?"), SqlValue::Int(*v)),
            IntUpdate::Increment(v) => (format!("{column} = {column} + ?"), SqlValue::Int(*v)),
            IntUpdate::Decrement(v) => (format!("{column} = {column} - ?"), SqlValue::Int(*v)),
            IntUpdate::Multiply(v) => (format!("{column} = {column} * ?"), SqlValue::Int(*v)),
            IntUpdate::Divide(v) => (format!("{column} = {column} / ?"), SqlValue::Int(*v)),
        }
    }
}

/// Update operator for decimal columns (TEXT storage). `Set` keeps the exact
/// textual value; relative operators run through REAL arithmetic in SQL.
#[derive(Debug, Clone, Copy)]
pub enum DecimalUpdate {
    Set(Decimal),
    Increment(Decimal),
    Decrement(Decimal),
    Multiply(Decimal),
    Divide(Decimal),
}

impl DecimalUpdate {
    pub fn assignment(&self, column: &str) -> (String, SqlValue) {
        let relative = |op: &str, v: &Decimal| {
            (
                format!("{column} = CAST(CAST({column} AS REAL) {op} ? AS TEXT)"),
                SqlValue::Real(v.to_f64().unwrap_or_default()),
            )
        };
        match self {
            DecimalUpdate::Set(v) => (format!("{column} = ?"), SqlValue::Text(v.to_string())),
            DecimalUpdate::Increment(v) => relative("+", v),
            DecimalUpdate::Decrement(v) => relative("-", v),
            DecimalUpdate::Multiply(v) => relative("*", v),
            DecimalUpdate::Divide(v) => relative("/", v),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn int_increment_is_relative() {
        let (sql, value) = IntUpdate::Increment(3).assignment("floor");
        assert_eq!(sql, "floor = floor + ?");
        assert_eq!(value, SqlValue::Int(3));
    }

    #[test]
    fn decimal_set_keeps_exact_text() {
        let (sql, value) = DecimalUpdate::Set("1.50".parse().unwrap()).assignment("pos_x");
        assert_eq!(sql, "pos_x = ?");
        assert_eq!(value, SqlValue::Text("1.50".to_string()));
    }
}
