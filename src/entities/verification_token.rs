//! VerificationToken: a standalone identifier/token/expiry triple for
//! email verification flows. No surrogate id; the token is the key.

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
use crate::orm::{DateTimeFilter, StringFilter};

#[derive(Debug, Clone, Serialize)]
pub struct VerificationToken {
    pub identifier: String,
    pub token: String,
    pub expires: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationTokenField {
    Identifier,
    Token,
    Expires,
}

impl FieldSet for VerificationTokenField {
    fn column(&self) -> &'static str {
        match self {
            VerificationTokenField::Identifier => "identifier",
            VerificationTokenField::Token => "token",
            VerificationTokenField::Expires => "expires",
        }
    }

    fn is_numeric(&self) -> bool {
        false
    }

    fn all() -> &'static [Self] {
        &[
            VerificationTokenField::Identifier,
            VerificationTokenField::Token,
            VerificationTokenField::Expires,
        ]
    }
}

#[derive(Debug, Clone, Default)]
pub struct VerificationTokenWhere {
    pub identifier: Option<StringFilter>,
    pub token: Option<StringFilter>,
    pub expires: Option<DateTimeFilter>,
    pub and: Vec<VerificationTokenWhere>,
    pub or: Vec<VerificationTokenWhere>,
    pub not: Vec<VerificationTokenWhere>,
}

impl DatabaseFilter for VerificationTokenWhere {
    fn push_conditions(&self, conditions: &mut Vec<String>, values: &mut Vec<SqlValue>) {
        if let Some(f) = &self.identifier {
            f.push("identifier", conditions, values);
        }
        if let Some(f) = &self.token {
            f.push("token", conditions, values);
        }
        if let Some(f) = &self.expires {
            f.push("expires", conditions, values);
        }
        logical::push_groups(&self.and, &self.or, &self.not, conditions, values);
    }

    fn is_empty(&self) -> bool {
        self.identifier.is_none()
            && self.token.is_none()
            && self.expires.is_none()
            && logical::groups_empty(&self.and, &self.or, &self.not)
    }
}

#[derive(Debug, Clone)]
pub enum VerificationTokenWhereUnique {
    Token(String),
    IdentifierToken(String, String),
}

impl UniqueWhere for VerificationTokenWhereUnique {
    fn condition(&self) -> (String, Vec<SqlValue>) {
        match self {
            VerificationTokenWhereUnique::Token(token) => {
                ("token = ?".to_string(), vec![SqlValue::Text(token.clone())])
            }
            VerificationTokenWhereUnique::IdentifierToken(identifier, token) => (
                "identifier = ? AND token = ?".to_string(),
                vec![
                    SqlValue::Text(identifier.clone()),
                    SqlValue::Text(token.clone()),
                ],
            ),
        }
    }
}

#[derive(Debug, Clone)]
pub struct VerificationTokenCreate {
    pub identifier: String,
    pub token: String,
    pub expires: DateTime<Utc>,
}

impl VerificationTokenCreate {
    pub fn new(
        identifier: impl Into<String>,
        token: impl Into<String>,
        expires: DateTime<Utc>,
    ) -> Self {
        Self {
            identifier: identifier.into(),
            token: token.into(),
            expires,
        }
    }
}

impl CreateInput for VerificationTokenCreate {
    fn columns() -> &'static [&'static str] {
        &["identifier", "token", "expires"]
    }

    fn values(&self) -> Vec<SqlValue> {
        vec![
            self.identifier.clone().into(),
            self.token.clone().into(),
            datetime_value(&self.expires),
        ]
    }
}

#[derive(Debug, Clone, Default)]
pub struct VerificationTokenUpdate {
    pub identifier: Option<String>,
    pub token: Option<String>,
    pub expires: Option<DateTime<Utc>>,
}

impl UpdateInput for VerificationTokenUpdate {
    fn assignments(&self) -> (Vec<String>, Vec<SqlValue>) {
        let mut fragments = Vec::new();
        let mut values = Vec::new();
        let mut set = |column: &str, value: SqlValue| {
            fragments.push(format!("{column} = ?"));
            values.push(value);
        };
        if let Some(v) = &self.identifier {
            set("identifier", v.clone().into());
        }
        if let Some(v) = &self.token {
            set("token", v.clone().into());
        }
        if let Some(v) = &self.expires {
            set("expires", datetime_value(v));
        }
        (fragments, values)
    }
}

impl DatabaseEntity for VerificationToken {
    const TABLE_NAME: &'static str = "verification_tokens";
    // No surrogate id; the globally-unique token stands in everywhere a
    // primary key is needed.
    const PRIMARY_KEY: &'static str = "token";
    const DEFAULT_SORT: &'static str = "token";
    const HAS_UPDATED_AT: bool = false;

    type Field = VerificationTokenField;
    type Where = VerificationTokenWhere;
    type WhereUnique = VerificationTokenWhereUnique;
    type Create = VerificationTokenCreate;
    type Update = VerificationTokenUpdate;
    type Include = NoInclude;

    fn column_names() -> &'static [&'static str] {
        &["identifier", "token", "expires"]
    }
}

impl FromSqlRow for VerificationToken {
    fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            identifier: row.try_get("identifier")?,
            token: row.try_get("token")?,
            expires: datetime_from_sql(&row.try_get::<String, _>("expires")?)?,
        })
    }
}

impl DatabaseSchema for VerificationToken {
    fn columns() -> &'static [ColumnDef] {
        &[
            ColumnDef {
                name: "identifier",
                sql_type: "TEXT",
                nullable: false,
                is_primary_key: false,
                references: None,
            },
            ColumnDef {
                name: "token",
                sql_type: "TEXT",
                nullable: false,
                is_primary_key: false,
                references: None,
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
        &[
            IndexDef {
                name: "verification_tokens_token_key",
                columns: &["token"],
            },
            IndexDef {
                name: "verification_tokens_identifier_token_key",
                columns: &["identifier", "token"],
            },
        ]
    }
}
