//! Core traits for the hand-written ORM layer.
//!
//! Each entity module implements these by hand; the generic query builder
//! ([`EntityQuery`](super::builder::EntityQuery)) and the operation family
//! ([`ops`](super::ops)) work purely through them.

use sqlx::sqlite::SqliteRow;

use super::include::IncludeLoader;

/// Column definition for schema generation.
#[derive(Debug, Clone)]
pub struct ColumnDef {
    /// Column name in the database
    pub name: &'static str,
    /// SQLite column type (TEXT, INTEGER, REAL)
    pub sql_type: &'static str,
    /// Whether the column can be NULL
    pub nullable: bool,
    /// Whether this is the INTEGER PRIMARY KEY AUTOINCREMENT column
    pub is_primary_key: bool,
    /// Referenced table and column for a real foreign key
    pub references: Option<(&'static str, &'static str)>,
}

impl ColumnDef {
    /// Generate the column definition SQL (FK clauses are table-level,
    /// see [`DatabaseSchema::create_table_sql`]).
    pub fn to_sql(&self) -> String {
        let mut sql = format!("{} {}", self.name, self.sql_type);
        if self.is_primary_key {
            sql.push_str(" PRIMARY KEY AUTOINCREMENT");
        }
        if !self.nullable && !self.is_primary_key {
            sql.push_str(" NOT NULL");
        }
        sql
    }
}

/// A named unique index spanning one or more columns.
#[derive(Debug, Clone)]
pub struct IndexDef {
    pub name: &'static str,
    pub columns: &'static [&'static str],
}

impl IndexDef {
    pub fn to_sql(&self, table: &str) -> String {
        format!(
            "CREATE UNIQUE INDEX IF NOT EXISTS {} ON {} ({})",
            self.name,
            table,
            self.columns.join(", ")
        )
    }
}

/// Trait for database schema generation.
pub trait DatabaseSchema: DatabaseEntity {
    /// All column definitions for this entity's table
    fn columns() -> &'static [ColumnDef];

    /// Unique indexes (single-column and composite) for this table
    fn unique_indexes() -> &'static [IndexDef] {
        &[]
    }

    /// Generate CREATE TABLE IF NOT EXISTS SQL, including FK clauses
    fn create_table_sql() -> String {
        let mut defs: Vec<String> = Self::columns().iter().map(|c| c.to_sql()).collect();
        for col in Self::columns() {
            if let Some((table, referenced)) = col.references {
                defs.push(format!(
                    "FOREIGN KEY ({}) REFERENCES {} ({})",
                    col.name, table, referenced
                ));
            }
        }
        format!(
            "CREATE TABLE IF NOT EXISTS {} (\n  {}\n)",
            Self::TABLE_NAME,
            defs.join(",\n  ")
        )
    }
}

/// The scalar fields of an entity, used for ordering, distinct, group-by,
/// count selection and scalar projection.
pub trait FieldSet: Copy + Eq + std::fmt::Debug + Send + Sync + 'static {
    /// Column name in the database
    fn column(&self) -> &'static str;

    /// Whether `_avg`/`_sum` apply to this field
    fn is_numeric(&self) -> bool;

    /// All fields, in declaration order
    fn all() -> &'static [Self];
}

/// Metadata and associated input types of a database entity (table).
pub trait DatabaseEntity:
    Sized + Clone + std::fmt::Debug + Send + Sync + Unpin + serde::Serialize + FromSqlRow + 'static
{
    /// The SQL table name (e.g. "secteurs")
    const TABLE_NAME: &'static str;

    /// The unique column used as a pagination/order tiebreaker
    const PRIMARY_KEY: &'static str = "id";

    /// Default sort column for list queries
    const DEFAULT_SORT: &'static str = "id";

    /// Default sort direction
    const DEFAULT_SORT_DIR: &'static str = "ASC";

    /// Whether the table carries an `updated_at` column maintained on update
    const HAS_UPDATED_AT: bool = true;

    type Field: FieldSet;
    type Where: DatabaseFilter + Default + Clone;
    type WhereUnique: UniqueWhere + Clone;
    type Create: CreateInput;
    type Update: UpdateInput;
    type Include: IncludeLoader<Self> + Default + Clone;

    /// List of all column names in the table
    fn column_names() -> &'static [&'static str];

    /// Build a SELECT for all columns
    fn select_sql() -> String {
        format!(
            "SELECT {} FROM {}",
            Self::column_names().join(", "),
            Self::TABLE_NAME
        )
    }
}

/// Trait for applying a boolean filter tree to a SQL query.
///
/// Implemented by the per-entity `*Where` structs, which carry one optional
/// operator struct per field plus `and`/`or`/`not` sub-trees.
pub trait DatabaseFilter: Send + Sync {
    /// Append WHERE clause fragments (joined with AND by the caller) and the
    /// values to bind, in placeholder order.
    fn push_conditions(&self, conditions: &mut Vec<String>, values: &mut Vec<SqlValue>);

    /// Whether the filter has any conditions. An empty filter (including
    /// empty `and`/`or`/`not` lists) is a no-op.
    fn is_empty(&self) -> bool;

    /// Render as a single parenthesized condition, if non-empty.
    fn to_grouped_condition(&self) -> Option<(String, Vec<SqlValue>)> {
        let mut conditions = Vec::new();
        let mut values = Vec::new();
        self.push_conditions(&mut conditions, &mut values);
        if conditions.is_empty() {
            None
        } else {
            Some((format!("({})", conditions.join(" AND ")), values))
        }
    }
}

/// A filter guaranteed to match at most one row (primary key or a declared
/// unique/composite-unique index). Implemented by the per-entity
/// `*WhereUnique` enums.
pub trait UniqueWhere: Send + Sync {
    /// The SQL condition (e.g. `"entreprise_id = ? AND objet_id = ?"`) and
    /// its bind values.
    fn condition(&self) -> (String, Vec<SqlValue>);
}

/// Insert payload for an entity. Required scalar fields are plain values;
/// optional/defaulted fields are materialized by the implementation so that
/// every row of a `create_many` batch binds the same column list.
pub trait CreateInput: Send + Sync {
    /// Insert column list (everything except the autoincrement id)
    fn columns() -> &'static [&'static str];

    /// Bind values matching [`columns`](Self::columns), defaults applied
    fn values(&self) -> Vec<SqlValue>;
}

/// Update payload for an entity. Absent fields are left untouched.
pub trait UpdateInput: Send + Sync {
    /// SET fragments (e.g. `"floor = floor + ?"`) and their bind values
    fn assignments(&self) -> (Vec<String>, Vec<SqlValue>);

    fn is_empty(&self) -> bool {
        self.assignments().0.is_empty()
    }
}

/// Sort direction for ORDER BY clauses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    pub fn to_sql(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }

    /// Flipped direction, used when paging backward with a negative `take`.
    pub fn reversed(&self) -> Self {
        match self {
            SortOrder::Asc => SortOrder::Desc,
            SortOrder::Desc => SortOrder::Asc,
        }
    }
}

/// NULL placement for an ORDER BY key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NullsOrder {
    First,
    Last,
}

impl NullsOrder {
    pub fn to_sql(&self) -> &'static str {
        match self {
            NullsOrder::First => "NULLS FIRST",
            NullsOrder::Last => "NULLS LAST",
        }
    }

    pub fn reversed(&self) -> Self {
        match self {
            NullsOrder::First => NullsOrder::Last,
            NullsOrder::Last => NullsOrder::First,
        }
    }
}

/// One ordering key: field, direction and optional NULL placement.
#[derive(Debug, Clone, Copy)]
pub struct OrderBy<F: FieldSet> {
    pub field: F,
    pub direction: SortOrder,
    pub nulls: Option<NullsOrder>,
}

impl<F: FieldSet> OrderBy<F> {
    pub fn asc(field: F) -> Self {
        Self {
            field,
            direction: SortOrder::Asc,
            nulls: None,
        }
    }

    pub fn desc(field: F) -> Self {
        Self {
            field,
            direction: SortOrder::Desc,
            nulls: None,
        }
    }

    pub fn with_nulls(mut self, nulls: NullsOrder) -> Self {
        self.nulls = Some(nulls);
        self
    }

    pub fn to_sql(&self) -> String {
        let mut sql = format!("{} {}", self.field.column(), self.direction.to_sql());
        if let Some(nulls) = self.nulls {
            sql.push(' ');
            sql.push_str(nulls.to_sql());
        }
        sql
    }

    pub fn reversed(&self) -> Self {
        Self {
            field: self.field,
            direction: self.direction.reversed(),
            nulls: self.nulls.map(|n| n.reversed()),
        }
    }
}

/// Trait for decoding a database row into an entity.
///
/// Implemented by hand per entity with the SQLite-specific conversions
/// (TEXT -> DateTime, TEXT -> Decimal, TEXT -> enum). Relation fields are
/// initialized to `None` and filled in by include loading.
pub trait FromSqlRow: Sized {
    fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error>;
}

/// Represents a SQL value that can be bound to a parameterized query.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Text(String),
    Int(i64),
    Real(f64),
    Bool(bool),
    Null,
}

impl SqlValue {
    /// Bind this value to a sqlx query builder.
    pub fn bind_to_query<'q>(
        &'q self,
        query: sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>>,
    ) -> sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>> {
        match self {
            SqlValue::Text(s) => query.bind(s.as_str()),
            SqlValue::Int(i) => query.bind(*i),
            SqlValue::Real(f) => query.bind(*f),
            SqlValue::Bool(b) => query.bind(*b),
            SqlValue::Null => query.bind(None::<String>),
        }
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        SqlValue::Text(v)
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        SqlValue::Text(v.to_string())
    }
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        SqlValue::Int(v)
    }
}

impl From<f64> for SqlValue {
    fn from(v: f64) -> Self {
        SqlValue::Real(v)
    }
}

impl From<bool> for SqlValue {
    fn from(v: bool) -> Self {
        SqlValue::Bool(v)
    }
}

impl<T> From<Option<T>> for SqlValue
where
    T: Into<SqlValue>,
{
    fn from(v: Option<T>) -> Self {
        match v {
            Some(v) => v.into(),
            None => SqlValue::Null,
        }
    }
}
