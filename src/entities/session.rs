//! Session: a login session, addressable by its unique token.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use crate::orm::codec::{datetime_from_sql, datetime_value};
use crate::orm::filters::logical;
use crate::orm::include::NoInclude;
use crate::orm::traits::{
    ColumnDef, CreateInput, DatabaseEntity, DatabaseFilter, DatabaseSchema, FieldSet, FromSqlRow,
    IndexDef, SqlValue, UniqueWhere, UpdateInput,
};
use crate::orm::{DateTimeFilter, IntFilter, StringFilter};

#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub id: i64,
    pub session_token: String,
    pub user_id: i64,
    pub expires: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionField {
    Id,
    SessionToken,
    UserId,
    Expires,
}

impl FieldSet for SessionField {
    fn column(&self) -> &'static str {
        match self {
            SessionField::Id => "id",
            SessionField::SessionToken => "session_token",
            SessionField::UserId => "user_id",
            SessionField::Expires => "expires",
        }
    }

    fn is_numeric(&self) -> bool {
        matches!(self, SessionField::Id | SessionField::UserId)
    }

    fn all() -> &'static [Self] {
        &[
            SessionField::Id,
            SessionField::SessionToken,
            SessionField::UserId,
            SessionField::Expires,
        ]
    }
}

#[derive(Debug, Clone, Default)]
pub struct SessionWhere {
    pub id: Option<IntFilter>,
    pub session_token: Option<StringFilter>,
    pub user_id: Option<IntFilter>,
    pub expires: Option<DateTimeFilter>,
    pub and: Vec<SessionWhere>,
    pub or: Vec<SessionWhere>,
    pub not: Vec<SessionWhere>,
}

impl DatabaseFilter for SessionWhere {
    fn push_conditions(&self, conditions: &mut Vec<String>, values: &mut Vec<SqlValue>) {
        if let Some(f) = &self.id {
            f.push("id", conditions, values);
        }
        if let Some(f) = &self.session_token {
            f.push("session_token", conditions, values);
        }
        if let Some(f) = &self.user_id {
            f.push("user_id", conditions, values);
        }
        if let Some(f) = &self.expires {
            f.push("expires", conditions, values);
        }
        logical::push_groups(&self.and, &self.or, &self.not, conditions, values);
    }

    fn is_empty(&self) -> bool {
        self.id.is_none()
            && self.session_token.is_none()
            && self.user_id.is_none()
            && self.expires.is_none()
            && logical::groups_empty(&self.and, &self.or, &self.not)
    }
}

#[derive(Debug, Clone)]
pub enum SessionWhereUnique {
    Id(i64),
    SessionToken(String),
}

impl UniqueWhere for SessionWhereUnique {
    fn condition(&self) -> (String, Vec<SqlValue>) {
        match self {
            SessionWhereUnique::Id(id) => ("id = ?".to_string(), vec![SqlValue::Int(*id)]),
            SessionWhereUnique::SessionToken(token) => (
                "session_token = ?".to_string(),
                vec![SqlValue::Text(token.clone())],
            ),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SessionCreate {
    pub session_token: String,
    pub user_id: i64,
    pub expires: DateTime<Utc>,
}

impl SessionCreate {
    pub fn new(session_token: impl Into<String>, user_id: i64, expires: DateTime<Utc>) -> Self {
        Self {
            session_token: session_token.into(),
            user_id,
            expires,
        }
    }
}

impl CreateInput for SessionCreate {
    fn columns() -> &'static [&'static str] {
        &["session_token", "user_id", "expires"]
    }

    fn values(&self) -> Vec<SqlValue> {
        vec![
            self.session_token.clone().into(),
            self.user_id.into(),
            datetime_value(&self.expires),
        ]
    }
}

#[derive(Debug, Clone, Default)]
pub struct SessionUpdate {
    pub session_token: Option<String>,
    pub user_id: Option<i64>,
    pub expires: Option<DateTime<Utc>>,
}

impl UpdateInput for SessionUpdate {
    fn assignments(&self) -> (Vec<String>, Vec<SqlValue>) {
        let mut fragments = Vec::new();
        let mut values = Vec::new();
        let mut set = |column: &str, value: SqlValue| {
            fragments.push(format!("{column} = ?"));
            values.push(value);
        };
        if let Some(v) = &self.session_token {
            set("session_token", v.clone().into());
        }
        if let Some(v) = self.user_id {
            set("user_id", v.into());
        }
        if let Some(v) = &self.expires {
            set("expires", datetime_value(v));
        }
        (fragments, values)
    }
}

impl DatabaseEntity for Session {
    const TABLE_NAME: &'static str = "sessions";
    const HAS_UPDATED_AT: bool = false;

    type Field = SessionField;
    type Where = SessionWhere;
    type WhereUnique = SessionWhereUnique;
    type Create = SessionCreate;
    type Update = SessionUpdate;
    type Include = NoInclude;

    fn column_names() -> &'static [&'static str] {
        &["id", "session_token", "user_id", "expires"]
    }
}

impl FromSqlRow for Session {
    fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            session_token: row.try_get("session_token")?,
            user_id: row.try_get("user_id")?,
            expires: datetime_from_sql(&row.try_get::<String, _>("expires")?)?,
        })
    }
}

impl DatabaseSchema for Session {
    fn columns() -> &'static [ColumnDef] {
        &[
            ColumnDef {
                name: "id",
                sql_type: "INTEGER",
                nullable: false,
                is_primary_key: true,
                references: None,
            },
            ColumnDef {
                name: "session_token",
                sql_type: "TEXT",
                nullable: false,
                is_primary_key: false,
                references: None,
            },
            ColumnDef {
                name: "user_id",
                sql_type: "INTEGER",
                nullable: false,
                is_primary_key: false,
                references: Some(("users", "id")),
            },
            ColumnDef {
                name: "expires",
                sql_type: "TEXT",
                nullable: false,
                is_primary_key: false,
                references: None,
            },
        ]
    }

    fn unique_indexes() -> &'static [IndexDef] {
        &[IndexDef {
            name: "sessions_session_token_key",
            columns: &["session_token"],
        }]
    }
}
