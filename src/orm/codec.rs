//! SQLite type-conversion helpers.
//!
//! SQLite has no native datetime, decimal or enum types; timestamps are
//! stored as RFC 3339 TEXT (fixed millisecond precision, `Z` suffix, so that
//! lexicographic comparison matches chronological order), decimals as their
//! exact TEXT representation, and enums as their wire name.

use chrono::{DateTime, SecondsFormat, Utc};
use rust_decimal::Decimal;

use super::traits::SqlValue;

/// Format a timestamp for storage and comparison.
pub fn datetime_to_sql(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn datetime_value(dt: &DateTime<Utc>) -> SqlValue {
    SqlValue::Text(datetime_to_sql(dt))
}

pub fn datetime_from_sql(s: &str) -> Result<DateTime<Utc>, sqlx::Error> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| decode_error(format!("invalid timestamp {s:?}: {e}")))
}

pub fn opt_datetime_from_sql(s: Option<&str>) -> Result<Option<DateTime<Utc>>, sqlx::Error> {
    s.map(datetime_from_sql).transpose()
}

/// Decimals keep their exact textual representation; numeric comparisons in
/// SQL go through `CAST(col AS REAL)`.
pub fn decimal_to_sql(d: &Decimal) -> String {
    d.to_string()
}

pub fn decimal_value(d: &Decimal) -> SqlValue {
    SqlValue::Text(decimal_to_sql(d))
}

pub fn decimal_from_sql(s: &str) -> Result<Decimal, sqlx::Error> {
    s.parse()
        .map_err(|e| decode_error(format!("invalid decimal {s:?}: {e}")))
}

pub fn opt_decimal_from_sql(s: Option<&str>) -> Result<Option<Decimal>, sqlx::Error> {
    s.map(decimal_from_sql).transpose()
}

/// Escape `%`/`_`/`\` in a LIKE operand; patterns built with it must carry
/// `ESCAPE '\'`.
pub fn escape_like(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

pub fn decode_error(message: String) -> sqlx::Error {
    sqlx::Error::Decode(message.into())
}

/// Decode a column of unknown shape into JSON, following the value's actual
/// SQLite storage class.
pub fn value_at(row: &sqlx::sqlite::SqliteRow, idx: usize) -> Result<serde_json::Value, sqlx::Error> {
    use sqlx::{Row, TypeInfo, ValueRef};

    let raw = row.try_get_raw(idx)?;
    if raw.is_null() {
        return Ok(serde_json::Value::Null);
    }
    let type_name = raw.type_info().name().to_string();
    let value = match type_name.as_str() {
        "INTEGER" | "BOOLEAN" => serde_json::Value::from(row.try_get::<i64, _>(idx)?),
        "REAL" => serde_json::Value::from(row.try_get::<f64, _>(idx)?),
        "BLOB" => serde_json::Value::from(row.try_get::<Vec<u8>, _>(idx)?),
        _ => serde_json::Value::from(row.try_get::<String, _>(idx)?),
    };
    Ok(value)
}

/// Decode a whole row into a JSON object keyed by column name.
pub fn row_to_json(row: &sqlx::sqlite::SqliteRow) -> Result<serde_json::Value, sqlx::Error> {
    use sqlx::{Column, Row};

    let mut map = serde_json::Map::new();
    for (idx, column) in row.columns().iter().enumerate() {
        map.insert(column.name().to_string(), value_at(row, idx)?);
    }
    Ok(serde_json::Value::Object(map))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn datetime_round_trips_and_sorts_lexicographically() {
        let a = datetime_to_sql(&"2026-03-01T10:00:00Z".parse().unwrap());
        let b = datetime_to_sql(&"2026-03-01T10:00:01Z".parse().unwrap());
        assert!(a < b);
        assert_eq!(datetime_from_sql(&a).unwrap(), "2026-03-01T10:00:00Z".parse::<DateTime<Utc>>().unwrap());
    }

    #[test]
    fn decimal_round_trips_exactly() {
        let d: Decimal = "12.3450".parse().unwrap();
        assert_eq!(decimal_from_sql(&decimal_to_sql(&d)).unwrap(), d);
    }

    #[test]
    fn like_escaping() {
        assert_eq!(escape_like("50%_done\\"), "50\\%\\_done\\\\");
    }
}
