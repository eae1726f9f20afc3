//! Per-user per-site edit permission. One record per (user_id, objet_id).

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
use crate::orm::{BoolFilter, DateTimeFilter, IntFilter};

#[derive(Debug, Clone, Serialize)]
pub struct UserPermission {
    pub id: i64,
    pub user_id: i64,
    pub objet_id: i64,
    pub can_edit: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserPermissionField {
    Id,
    UserId,
    ObjetId,
    CanEdit,
    CreatedAt,
    UpdatedAt,
}

impl FieldSet for UserPermissionField {
    fn column(&self) -> &'static str {
        match self {
            UserPermissionField::Id => "id",
            UserPermissionField::UserId => "user_id",
            UserPermissionField::ObjetId => "objet_id",
            UserPermissionField::CanEdit => "can_edit",
            UserPermissionField::CreatedAt => "created_at",
            UserPermissionField::UpdatedAt => "updated_at",
        }
    }

    fn is_numeric(&self) -> bool {
        matches!(
            self,
            UserPermissionField::Id | UserPermissionField::UserId | UserPermissionField::ObjetId
        )
    }

    fn all() -> &'static [Self] {
        &[
            UserPermissionField::Id,
            UserPermissionField::UserId,
            UserPermissionField::ObjetId,
            UserPermissionField::CanEdit,
            UserPermissionField::CreatedAt,
            UserPermissionField::UpdatedAt,
        ]
    }
}

#[derive(Debug, Clone, Default)]
pub struct UserPermissionWhere {
    pub id: Option<IntFilter>,
    pub user_id: Option<IntFilter>,
    pub objet_id: Option<IntFilter>,
    pub can_edit: Option<BoolFilter>,
    pub created_at: Option<DateTimeFilter>,
    pub updated_at: Option<DateTimeFilter>,
    pub and: Vec<UserPermissionWhere>,
    pub or: Vec<UserPermissionWhere>,
    pub not: Vec<UserPermissionWhere>,
}

impl DatabaseFilter for UserPermissionWhere {
    fn push_conditions(&self, conditions: &mut Vec<String>, values: &mut Vec<SqlValue>) {
        if let Some(f) = &self.id {
            f.push("id", conditions, values);
        }
        if let Some(f) = &self.user_id {
            f.push("user_id", conditions, values);
        }
        if let Some(f) = &self.objet_id {
            f.push("objet_id", conditions, values);
        }
        if let Some(f) = &self.can_edit {
            f.push("can_edit", conditions, values);
        }
        if let Some(f) = &self.created_at {
            f.push("created_at", conditions, values);
        }
        if let Some(f) = &self.updated_at {
            f.push("updated_at", conditions, values);
        }
        logical::push_groups(&self.and, &self.or, &self.not, conditions, values);
    }

    fn is_empty(&self) -> bool {
        self.id.is_none()
            && self.user_id.is_none()
            && self.objet_id.is_none()
            && self.can_edit.is_none()
            && self.created_at.is_none()
            && self.updated_at.is_none()
            && logical::groups_empty(&self.and, &self.or, &self.not)
    }
}

#[derive(Debug, Clone)]
pub enum UserPermissionWhereUnique {
    Id(i64),
    UserIdObjetId(i64, i64),
}

impl UniqueWhere for UserPermissionWhereUnique {
    fn condition(&self) -> (String, Vec<SqlValue>) {
        match self {
            UserPermissionWhereUnique::Id(id) => ("id = ?".to_string(), vec![SqlValue::Int(*id)]),
            UserPermissionWhereUnique::UserIdObjetId(user_id, objet_id) => (
                "user_id = ? AND objet_id = ?".to_string(),
                vec![SqlValue::Int(*user_id), SqlValue::Int(*objet_id)],
            ),
        }
    }
}

#[derive(Debug, Clone)]
pub struct UserPermissionCreate {
    pub user_id: i64,
    pub objet_id: i64,
    /// Defaults to false
    pub can_edit: Option<bool>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl UserPermissionCreate {
    pub fn new(user_id: i64, objet_id: i64) -> Self {
        Self {
            user_id,
            objet_id,
            can_edit: None,
            created_at: None,
            updated_at: None,
        }
    }
}

impl CreateInput for UserPermissionCreate {
    fn columns() -> &'static [&'static str] {
        &["user_id", "objet_id", "can_edit", "created_at", "updated_at"]
    }

    fn values(&self) -> Vec<SqlValue> {
        let now = Utc::now();
        vec![
            self.user_id.into(),
            self.objet_id.into(),
            self.can_edit.unwrap_or(false).into(),
            datetime_value(&self.created_at.unwrap_or(now)),
            datetime_value(&self.updated_at.unwrap_or(now)),
        ]
    }
}

#[derive(Debug, Clone, Default)]
pub struct UserPermissionUpdate {
    pub user_id: Option<i64>,
    pub objet_id: Option<i64>,
    pub can_edit: Option<bool>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl UpdateInput for UserPermissionUpdate {
    fn assignments(&self) -> (Vec<String>, Vec<SqlValue>) {
        let mut fragments = Vec::new();
        let mut values = Vec::new();
        let mut set = |column: &str, value: SqlValue| {
            fragments.push(format!("{column} = ?"));
            values.push(value);
        };
        if let Some(v) = self.user_id {
            set("user_id", v.into());
        }
        if let Some(v) = self.objet_id {
            set("objet_id", v.into());
        }
        if let Some(v) = self.can_edit {
            set("can_edit", v.into());
        }
        if let Some(v) = &self.created_at {
            set("created_at", datetime_value(v));
        }
        if let Some(v) = &self.updated_at {
            set("updated_at", datetime_value(v));
        }
        (fragments, values)
    }
}

impl DatabaseEntity for UserPermission {
    const TABLE_NAME: &'static str = "user_permissions";

    type Field = UserPermissionField;
    type Where = UserPermissionWhere;
    type WhereUnique = UserPermissionWhereUnique;
    type Create = UserPermissionCreate;
    type Update = UserPermissionUpdate;
    type Include = NoInclude;

    fn column_names() -> &'static [&'static str] {
        &["id", "user_id", "objet_id", "can_edit", "created_at", "updated_at"]
    }
}

impl FromSqlRow for UserPermission {
    fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            objet_id: row.try_get("objet_id")?,
            can_edit: row.try_get("can_edit")?,
            created_at: datetime_from_sql(&row.try_get::<String, _>("created_at")?)?,
            updated_at: datetime_from_sql(&row.try_get::<String, _>("updated_at")?)?,
        })
    }
}

impl DatabaseSchema for UserPermission {
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
                name: "user_id",
                sql_type: "INTEGER",
                nullable: false,
                is_primary_key: false,
                references: Some(("users", "id")),
            },
            ColumnDef {
                name: "objet_id",
                sql_type: "INTEGER",
                nullable: false,
                is_primary_key: false,
                references: Some(("objets", "id")),
            },
            ColumnDef {
                name: "can_edit",
                sql_type: "INTEGER",
                nullable: false,
                is_primary_key: false,
                references: None,
            },
            ColumnDef {
                name: "created_at",
                sql_type: "TEXT",
                nullable: false,
                is_primary_key: false,
                references: None,
            },
            ColumnDef {
                name: "updated_at",
                sql_type: "TEXT",
                nullable: false,
                is_primary_key: false,
                references: None,
            },
        ]
    }

    fn unique_indexes() -> &'static [IndexDef] {
        &[IndexDef {
            name: "user_permissions_user_id_objet_id_key",
            columns: &["user_id", "objet_id"],
        }]
    }
}
