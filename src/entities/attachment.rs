//! Attachment: an uploaded file pinned to some other record.
//!
//! The (entity_type, entity_id) pair is a loose polymorphic reference with
//! no FK behind it; [`AttachmentTarget`] gives callers a typed way to build
//! and read the pair, and [`target_exists`] checks liveness on demand.
//! `task_id` is the one real FK, kept alongside the loose pair.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use crate::error::Result;
use crate::orm::codec::{datetime_from_sql, datetime_value};
use crate::orm::filters::logical;
use crate::orm::include::NoInclude;
use crate::orm::traits::{
    ColumnDef, CreateInput, DatabaseEntity, DatabaseFilter, DatabaseSchema, FieldSet, FromSqlRow,
    SqlValue, UniqueWhere, UpdateInput,
};
use crate::orm::{Conn, DateTimeFilter, IntFilter, StringFilter};

/// Typed form of the loose polymorphic (entity_type, entity_id) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachmentTarget {
    User(i64),
    Entreprise(i64),
    Objet(i64),
    Secteur(i64),
    Article(i64),
    Task(i64),
}

impl AttachmentTarget {
    pub fn entity_type(&self) -> &'static str {
        match self {
            AttachmentTarget::User(_) => "user",
            AttachmentTarget::Entreprise(_) => "entreprise",
            AttachmentTarget::Objet(_) => "objet",
            AttachmentTarget::Secteur(_) => "secteur",
            AttachmentTarget::Article(_) => "article",
            AttachmentTarget::Task(_) => "task",
        }
    }

    pub fn entity_id(&self) -> i64 {
        match self {
            AttachmentTarget::User(id)
            | AttachmentTarget::Entreprise(id)
            | AttachmentTarget::Objet(id)
            | AttachmentTarget::Secteur(id)
            | AttachmentTarget::Article(id)
            | AttachmentTarget::Task(id) => *id,
        }
    }

    fn table(&self) -> &'static str {
        match self {
            AttachmentTarget::User(_) => "users",
            AttachmentTarget::Entreprise(_) => "entreprises",
            AttachmentTarget::Objet(_) => "objets",
            AttachmentTarget::Secteur(_) => "secteurs",
            AttachmentTarget::Article(_) => "articles",
            AttachmentTarget::Task(_) => "tasks",
        }
    }

    /// Parse a stored pair back into a typed target. `None` for an
    /// unrecognized discriminator, which the storage layer cannot rule out.
    pub fn from_parts(entity_type: &str, entity_id: i64) -> Option<Self> {
        match entity_type {
            "user" => Some(AttachmentTarget::User(entity_id)),
            "entreprise" => Some(AttachmentTarget::Entreprise(entity_id)),
            "objet" => Some(AttachmentTarget::Objet(entity_id)),
            "secteur" => Some(AttachmentTarget::Secteur(entity_id)),
            "article" => Some(AttachmentTarget::Article(entity_id)),
            "task" => Some(AttachmentTarget::Task(entity_id)),
            _ => None,
        }
    }
}

/// Check that the referenced row is live. The pair carries no FK, so this
/// is the caller's only integrity tool.
pub async fn target_exists(cx: &mut Conn<'_>, target: AttachmentTarget) -> Result<bool> {
    let sql = format!("SELECT 1 FROM {} WHERE id = ?", target.table());
    let row = cx
        .fetch_optional_row(&sql, &[SqlValue::Int(target.entity_id())], Attachment::TABLE_NAME)
        .await?;
    Ok(row.is_some())
}

#[derive(Debug, Clone, Serialize)]
pub struct Attachment {
    pub id: i64,
    pub url: String,
    pub entity_type: String,
    pub entity_id: i64,
    pub user_id: Option<i64>,
    pub task_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

impl Attachment {
    /// The typed target, if the stored discriminator is recognized.
    pub fn target(&self) -> Option<AttachmentTarget> {
        AttachmentTarget::from_parts(&self.entity_type, self.entity_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachmentField {
    Id,
    Url,
    EntityType,
    EntityId,
    UserId,
    TaskId,
    CreatedAt,
}

impl FieldSet for AttachmentField {
    fn column(&self) -> &'static str {
        match self {
            AttachmentField::Id => "id",
            AttachmentField::Url => "url",
            AttachmentField::EntityType => "entity_type",
            AttachmentField::EntityId => "entity_id",
            AttachmentField::UserId => "user_id",
            AttachmentField::TaskId => "task_id",
            AttachmentField::CreatedAt => "created_at",
        }
    }

    fn is_numeric(&self) -> bool {
        matches!(
            self,
            AttachmentField::Id
                | AttachmentField::EntityId
                | AttachmentField::UserId
                | AttachmentField::TaskId
        )
    }

    fn all() -> &'static [Self] {
        &[
            AttachmentField::Id,
            AttachmentField::Url,
            AttachmentField::EntityType,
            AttachmentField::EntityId,
            AttachmentField::UserId,
            AttachmentField::TaskId,
            AttachmentField::CreatedAt,
        ]
    }
}

#[derive(Debug, Clone, Default)]
pub struct AttachmentWhere {
    pub id: Option<IntFilter>,
    pub url: Option<StringFilter>,
    pub entity_type: Option<StringFilter>,
    pub entity_id: Option<IntFilter>,
    pub user_id: Option<IntFilter>,
    pub task_id: Option<IntFilter>,
    pub created_at: Option<DateTimeFilter>,
    pub and: Vec<AttachmentWhere>,
    pub or: Vec<AttachmentWhere>,
    pub not: Vec<AttachmentWhere>,
}

impl AttachmentWhere {
    /// Filter on a typed polymorphic target.
    pub fn for_target(target: AttachmentTarget) -> Self {
        Self {
            entity_type: Some(StringFilter::eq(target.entity_type())),
            entity_id: Some(IntFilter::eq(target.entity_id())),
            ..Self::default()
        }
    }
}

impl DatabaseFilter for AttachmentWhere {
    fn push_conditions(&self, conditions: &mut Vec<String>, values: &mut Vec<SqlValue>) {
        if let Some(f) = &self.id {
            f.push("id", conditions, values);
        }
        if let Some(f) = &self.url {
            f.push("url", conditions, values);
        }
        if let Some(f) = &self.entity_type {
            f.push("entity_type", conditions, values);
        }
        if let Some(f) = &self.entity_id {
            f.push("entity_id", conditions, values);
        }
        if let Some(f) = &self.user_id {
            f.push("user_id", conditions, values);
        }
        if let Some(f) = &self.task_id {
            f.push("task_id", conditions, values);
        }
        if let Some(f) = &self.created_at {
            f.push("created_at", conditions, values);
        }
        logical::push_groups(&self.and, &self.or, &self.not, conditions, values);
    }

    fn is_empty(&self) -> bool {
        self.id.is_none()
            && self.url.is_none()
            && self.entity_type.is_none()
            && self.entity_id.is_none()
            && self.user_id.is_none()
            && self.task_id.is_none()
            && self.created_at.is_none()
            && logical::groups_empty(&self.and, &self.or, &self.not)
    }
}

#[derive(Debug, Clone)]
pub enum AttachmentWhereUnique {
    Id(i64),
}

impl UniqueWhere for AttachmentWhereUnique {
    fn condition(&self) -> (String, Vec<SqlValue>) {
        match self {
            AttachmentWhereUnique::Id(id) => ("id = ?".to_string(), vec![SqlValue::Int(*id)]),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AttachmentCreate {
    pub url: String,
    pub target: AttachmentTarget,
    pub user_id: Option<i64>,
    pub task_id: Option<i64>,
    pub created_at: Option<DateTime<Utc>>,
}

impl AttachmentCreate {
    pub fn new(url: impl Into<String>, target: AttachmentTarget) -> Self {
        Self {
            url: url.into(),
            target,
            user_id: None,
            task_id: None,
            created_at: None,
        }
    }
}

impl CreateInput for AttachmentCreate {
    fn columns() -> &'static [&'static str] {
        &["url", "entity_type", "entity_id", "user_id", "task_id", "created_at"]
    }

    fn values(&self) -> Vec<SqlValue> {
        vec![
            self.url.clone().into(),
            self.target.entity_type().into(),
            self.target.entity_id().into(),
            self.user_id.into(),
            self.task_id.into(),
            datetime_value(&self.created_at.unwrap_or_else(Utc::now)),
        ]
    }
}

#[derive(Debug, Clone, Default)]
pub struct AttachmentUpdate {
    pub url: Option<String>,
    pub target: Option<AttachmentTarget>,
    pub user_id: Option<Option<i64>>,
    pub task_id: Option<Option<i64>>,
    pub created_at: Option<DateTime<Utc>>,
}

impl UpdateInput for AttachmentUpdate {
    fn assignments(&self) -> (Vec<String>, Vec<SqlValue>) {
        let mut fragments = Vec::new();
        let mut values = Vec::new();
        let mut set = |column: &str, value: SqlValue| {
            fragments.push(format!("{column} = ?"));
            values.push(value);
        };
        if let Some(v) = &self.url {
            set("url", v.clone().into());
        }
        if let Some(target) = self.target {
            set("entity_type", target.entity_type().into());
            set("entity_id", target.entity_id().into());
        }
        if let Some(v) = self.user_id {
            set("user_id", v.into());
        }
        if let Some(v) = self.task_id {
            set("task_id", v.into());
        }
        if let Some(v) = &self.created_at {
            set("created_at", datetime_value(v));
        }
        (fragments, values)
    }
}

impl DatabaseEntity for Attachment {
    const TABLE_NAME: &'static str = "attachments";
    const HAS_UPDATED_AT: bool = false;

    type Field = AttachmentField;
    type Where = AttachmentWhere;
    type WhereUnique = AttachmentWhereUnique;
    type Create = AttachmentCreate;
    type Update = AttachmentUpdate;
    type Include = NoInclude;

    fn column_names() -> &'static [&'static str] {
        &["id", "url", "entity_type", "entity_id", "user_id", "task_id", "created_at"]
    }
}

impl FromSqlRow for Attachment {
    fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            url: row.try_get("url")?,
            entity_type: row.try_get("entity_type")?,
            entity_id: row.try_get("entity_id")?,
            user_id: row.try_get("user_id")?,
            task_id: row.try_get("task_id")?,
            created_at: datetime_from_sql(&row.try_get::<String, _>("created_at")?)?,
        })
    }
}

impl DatabaseSchema for Attachment {
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
                name: "url",
                sql_type: "TEXT",
                nullable: false,
                is_primary_key: false,
                references: None,
            },
            // Polymorphic pair: discriminator + id, no FK on purpose.
            ColumnDef {
                name: "entity_type",
                sql_type: "TEXT",
                nullable: false,
                is_primary_key: false,
                references: None,
            },
            ColumnDef {
                name: "entity_id",
                sql_type: "INTEGER",
                nullable: false,
                is_primary_key: false,
                references: None,
            },
            ColumnDef {
                name: "user_id",
                sql_type: "INTEGER",
                nullable: true,
                is_primary_key: false,
                references: Some(("users", "id")),
            },
            ColumnDef {
                name: "task_id",
                sql_type: "INTEGER",
                nullable: true,
                is_primary_key: false,
                references: Some(("tasks", "id")),
            },
            ColumnDef {
                name: "created_at",
                sql_type: "TEXT",
                nullable: false,
                is_primary_key: false,
                references: None,
            },
        ]
    }
}
