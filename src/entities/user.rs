//! User accounts: credentials, tenant membership and role.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use crate::error::Result;
use crate::orm::codec::{datetime_from_sql, datetime_value, decode_error};
use crate::orm::filters::logical;
use crate::orm::include::{IncludeLoader, ToMany, load_to_many, parent_ids};
use crate::orm::traits::{
    ColumnDef, CreateInput, DatabaseEntity, DatabaseFilter, DatabaseSchema, FieldSet, FromSqlRow,
    IndexDef, SqlValue, UniqueWhere, UpdateInput,
};
use crate::orm::{BoolFilter, Conn, DateTimeFilter, EnumFilter, EnumValue, IntFilter, StringFilter};

use super::account::Account;
use super::article::Article;
use super::attachment::Attachment;
use super::secteur::Secteur;
use super::session::Session;
use super::task::Task;
use super::user_permission::UserPermission;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Admin,
    Member,
    Personal,
}

impl EnumValue for UserRole {
    fn as_str(&self) -> &'static str {
        match self {
            UserRole::Admin => "admin",
            UserRole::Member => "member",
            UserRole::Personal => "personal",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "admin" => Some(UserRole::Admin),
            "member" => Some(UserRole::Member),
            "personal" => Some(UserRole::Personal),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub entreprise_id: i64,
    pub role: UserRole,
    pub is_personal: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    // Relations, populated by include loading
    #[serde(skip_serializing_if = "Option::is_none")]
    pub permissions: Option<Vec<UserPermission>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secteurs: Option<Vec<Secteur>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub articles: Option<Vec<Article>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tasks: Option<Vec<Task>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attachments: Option<Vec<Attachment>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sessions: Option<Vec<Session>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accounts: Option<Vec<Account>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserField {
    Id,
    Name,
    Email,
    PasswordHash,
    EntrepriseId,
    Role,
    IsPersonal,
    CreatedAt,
    UpdatedAt,
}

impl FieldSet for UserField {
    fn column(&self) -> &'static str {
        match self {
            UserField::Id => "id",
            UserField::Name => "name",
            UserField::Email => "email",
            UserField::PasswordHash => "password_hash",
            UserField::EntrepriseId => "entreprise_id",
            UserField::Role => "role",
            UserField::IsPersonal => "is_personal",
            UserField::CreatedAt => "created_at",
            UserField::UpdatedAt => "updated_at",
        }
    }

    fn is_numeric(&self) -> bool {
        matches!(self, UserField::Id | UserField::EntrepriseId)
    }

    fn all() -> &'static [Self] {
        &[
            UserField::Id,
            UserField::Name,
            UserField::Email,
            UserField::PasswordHash,
            UserField::EntrepriseId,
            UserField::Role,
            UserField::IsPersonal,
            UserField::CreatedAt,
            UserField::UpdatedAt,
        ]
    }
}

#[derive(Debug, Clone, Default)]
pub struct UserWhere {
    pub id: Option<IntFilter>,
    pub name: Option<StringFilter>,
    pub email: Option<StringFilter>,
    pub password_hash: Option<StringFilter>,
    pub entreprise_id: Option<IntFilter>,
    pub role: Option<EnumFilter<UserRole>>,
    pub is_personal: Option<BoolFilter>,
    pub created_at: Option<DateTimeFilter>,
    pub updated_at: Option<DateTimeFilter>,
    pub and: Vec<UserWhere>,
    pub or: Vec<UserWhere>,
    pub not: Vec<UserWhere>,
}

impl DatabaseFilter for UserWhere {
    fn push_conditions(&self, conditions: &mut Vec<String>, values: &mut Vec<SqlValue>) {
        if let Some(f) = &self.id {
            f.push("id", conditions, values);
        }
        if let Some(f) = &self.name {
            f.push("name", conditions, values);
        }
        if let Some(f) = &self.email {
            f.push("email", conditions, values);
        }
        if let Some(f) = &self.password_hash {
            f.push("password_hash", conditions, values);
        }
        if let Some(f) = &self.entreprise_id {
            f.push("entreprise_id", conditions, values);
        }
        if let Some(f) = &self.role {
            f.push("role", conditions, values);
        }
        if let Some(f) = &self.is_personal {
            f.push("is_personal", conditions, values);
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
            && self.name.is_none()
            && self.email.is_none()
            && self.password_hash.is_none()
            && self.entreprise_id.is_none()
            && self.role.is_none()
            && self.is_personal.is_none()
            && self.created_at.is_none()
            && self.updated_at.is_none()
            && logical::groups_empty(&self.and, &self.or, &self.not)
    }
}

#[derive(Debug, Clone)]
pub enum UserWhereUnique {
    Id(i64),
    Email(String),
}

impl UniqueWhere for UserWhereUnique {
    fn condition(&self) -> (String, Vec<SqlValue>) {
        match self {
            UserWhereUnique::Id(id) => ("id = ?".to_string(), vec![SqlValue::Int(*id)]),
            UserWhereUnique::Email(email) => {
                ("email = ?".to_string(), vec![SqlValue::Text(email.clone())])
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct UserCreate {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub entreprise_id: i64,
    /// Defaults to `member`
    pub role: Option<UserRole>,
    /// Defaults to false
    pub is_personal: Option<bool>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl UserCreate {
    pub fn new(
        name: impl Into<String>,
        email: impl Into<String>,
        password_hash: impl Into<String>,
        entreprise_id: i64,
    ) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            password_hash: password_hash.into(),
            entreprise_id,
            role: None,
            is_personal: None,
            created_at: None,
            updated_at: None,
        }
    }
}

impl CreateInput for UserCreate {
    fn columns() -> &'static [&'static str] {
        &[
            "name",
            "email",
            "password_hash",
            "entreprise_id",
            "role",
            "is_personal",
            "created_at",
            "updated_at",
        ]
    }

    fn values(&self) -> Vec<SqlValue> {
        let now = Utc::now();
        vec![
            self.name.clone().into(),
            self.email.clone().into(),
            self.password_hash.clone().into(),
            self.entreprise_id.into(),
            self.role.unwrap_or(UserRole::Member).as_str().into(),
            self.is_personal.unwrap_or(false).into(),
            datetime_value(&self.created_at.unwrap_or(now)),
            datetime_value(&self.updated_at.unwrap_or(now)),
        ]
    }
}

#[derive(Debug, Clone, Default)]
pub struct UserUpdate {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password_hash: Option<String>,
    pub entreprise_id: Option<i64>,
    pub role: Option<UserRole>,
    pub is_personal: Option<bool>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl UpdateInput for UserUpdate {
    fn assignments(&self) -> (Vec<String>, Vec<SqlValue>) {
        let mut fragments = Vec::new();
        let mut values = Vec::new();
        let mut set = |column: &str, value: SqlValue| {
            fragments.push(format!("{column} = ?"));
            values.push(value);
        };
        if let Some(v) = &self.name {
            set("name", v.clone().into());
        }
        if let Some(v) = &self.email {
            set("email", v.clone().into());
        }
        if let Some(v) = &self.password_hash {
            set("password_hash", v.clone().into());
        }
        if let Some(v) = self.entreprise_id {
            set("entreprise_id", v.into());
        }
        if let Some(v) = self.role {
            set("role", v.as_str().into());
        }
        if let Some(v) = self.is_personal {
            set("is_personal", v.into());
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

/// To-many edges off a user. Each present edge costs one query over the
/// loaded set.
#[derive(Debug, Clone, Default)]
pub struct UserInclude {
    pub permissions: Option<ToMany<UserPermission>>,
    pub secteurs: Option<ToMany<Secteur>>,
    pub articles: Option<ToMany<Article>>,
    pub tasks: Option<ToMany<Task>>,
    pub attachments: Option<ToMany<Attachment>>,
    pub sessions: Option<ToMany<Session>>,
    pub accounts: Option<ToMany<Account>>,
}

impl IncludeLoader<User> for UserInclude {
    fn is_empty(&self) -> bool {
        self.permissions.is_none()
            && self.secteurs.is_none()
            && self.articles.is_none()
            && self.tasks.is_none()
            && self.attachments.is_none()
            && self.sessions.is_none()
            && self.accounts.is_none()
    }

    async fn load(&self, records: &mut [User], cx: &mut Conn<'_>) -> Result<()> {
        let ids = parent_ids(records, |u| u.id);
        if let Some(args) = &self.permissions {
            let mut grouped =
                load_to_many::<UserPermission>(cx, &ids, "user_id", args, |p| p.user_id).await?;
            for record in records.iter_mut() {
                record.permissions = Some(grouped.remove(&record.id).unwrap_or_default());
            }
        }
        if let Some(args) = &self.secteurs {
            let mut grouped =
                load_to_many::<Secteur>(cx, &ids, "user_id", args, |s| s.user_id.unwrap_or(-1))
                    .await?;
            for record in records.iter_mut() {
                record.secteurs = Some(grouped.remove(&record.id).unwrap_or_default());
            }
        }
        if let Some(args) = &self.articles {
            let mut grouped =
                load_to_many::<Article>(cx, &ids, "user_id", args, |a| a.user_id.unwrap_or(-1))
                    .await?;
            for record in records.iter_mut() {
                record.articles = Some(grouped.remove(&record.id).unwrap_or_default());
            }
        }
        if let Some(args) = &self.tasks {
            let mut grouped =
                load_to_many::<Task>(cx, &ids, "executant_id", args, |t| t.executant_id).await?;
            for record in records.iter_mut() {
                record.tasks = Some(grouped.remove(&record.id).unwrap_or_default());
            }
        }
        if let Some(args) = &self.attachments {
            let mut grouped =
                load_to_many::<Attachment>(cx, &ids, "user_id", args, |a| a.user_id.unwrap_or(-1))
                    .await?;
            for record in records.iter_mut() {
                record.attachments = Some(grouped.remove(&record.id).unwrap_or_default());
            }
        }
        if let Some(args) = &self.sessions {
            let mut grouped =
                load_to_many::<Session>(cx, &ids, "user_id", args, |s| s.user_id).await?;
            for record in records.iter_mut() {
                record.sessions = Some(grouped.remove(&record.id).unwrap_or_default());
            }
        }
        if let Some(args) = &self.accounts {
            let mut grouped =
                load_to_many::<Account>(cx, &ids, "user_id", args, |a| a.user_id).await?;
            for record in records.iter_mut() {
                record.accounts = Some(grouped.remove(&record.id).unwrap_or_default());
            }
        }
        Ok(())
    }
}

impl DatabaseEntity for User {
    const TABLE_NAME: &'static str = "users";

    type Field = UserField;
    type Where = UserWhere;
    type WhereUnique = UserWhereUnique;
    type Create = UserCreate;
    type Update = UserUpdate;
    type Include = UserInclude;

    fn column_names() -> &'static [&'static str] {
        &[
            "id",
            "name",
            "email",
            "password_hash",
            "entreprise_id",
            "role",
            "is_personal",
            "created_at",
            "updated_at",
        ]
    }
}

impl FromSqlRow for User {
    fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error> {
        let role: String = row.try_get("role")?;
        Ok(Self {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            email: row.try_get("email")?,
            password_hash: row.try_get("password_hash")?,
            entreprise_id: row.try_get("entreprise_id")?,
            role: UserRole::parse(&role)
                .ok_or_else(|| decode_error(format!("unknown role {role:?}")))?,
            is_personal: row.try_get("is_personal")?,
            created_at: datetime_from_sql(&row.try_get::<String, _>("created_at")?)?,
            updated_at: datetime_from_sql(&row.try_get::<String, _>("updated_at")?)?,
            permissions: None,
            secteurs: None,
            articles: None,
            tasks: None,
            attachments: None,
            sessions: None,
            accounts: None,
        })
    }
}

impl DatabaseSchema for User {
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
                name: "name",
                sql_type: "TEXT",
                nullable: false,
                is_primary_key: false,
                references: None,
            },
            ColumnDef {
                name: "email",
                sql_type: "TEXT",
                nullable: false,
                is_primary_key: false,
                references: None,
            },
            ColumnDef {
                name: "password_hash",
                sql_type: "TEXT",
                nullable: false,
                is_primary_key: false,
                references: None,
            },
            ColumnDef {
                name: "entreprise_id",
                sql_type: "INTEGER",
                nullable: false,
                is_primary_key: false,
                references: Some(("entreprises", "id")),
            },
            ColumnDef {
                name: "role",
                sql_type: "TEXT",
                nullable: false,
                is_primary_key: false,
                references: None,
            },
            ColumnDef {
                name: "is_personal",
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
            name: "users_email_key",
            columns: &["email"],
        }]
    }
}
