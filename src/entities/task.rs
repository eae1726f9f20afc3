//! Task: a maintenance action on an article, assigned to an executant,
//! optionally recurring through an iCal RRULE string.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use crate::error::Result;
use crate::orm::codec::{
    datetime_from_sql, datetime_value, decode_error, opt_datetime_from_sql,
};
use crate::orm::filters::logical;
use crate::orm::include::{IncludeLoader, ToMany, load_to_many, parent_ids};
use crate::orm::traits::{
    ColumnDef, CreateInput, DatabaseEntity, DatabaseFilter, DatabaseSchema, FieldSet, FromSqlRow,
    SqlValue, UniqueWhere, UpdateInput,
};
use crate::orm::{Conn, DateTimeFilter, EnumFilter, EnumValue, IntFilter, StringFilter};

use super::attachment::Attachment;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Todo,
    Doing,
    Done,
}

impl EnumValue for TaskStatus {
    fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Todo => "todo",
            TaskStatus::Doing => "doing",
            TaskStatus::Done => "done",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "todo" => Some(TaskStatus::Todo),
            "doing" => Some(TaskStatus::Doing),
            "done" => Some(TaskStatus::Done),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskType {
    Maintenance,
    Inspection,
    Reparation,
    Nettoyage,
    Remplacement,
    Verification,
    Autre,
}

impl EnumValue for TaskType {
    fn as_str(&self) -> &'static str {
        match self {
            TaskType::Maintenance => "maintenance",
            TaskType::Inspection => "inspection",
            TaskType::Reparation => "reparation",
            TaskType::Nettoyage => "nettoyage",
            TaskType::Remplacement => "remplacement",
            TaskType::Verification => "verification",
            TaskType::Autre => "autre",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "maintenance" => Some(TaskType::Maintenance),
            "inspection" => Some(TaskType::Inspection),
            "reparation" => Some(TaskType::Reparation),
            "nettoyage" => Some(TaskType::Nettoyage),
            "remplacement" => Some(TaskType::Remplacement),
            "verification" => Some(TaskType::Verification),
            "autre" => Some(TaskType::Autre),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Task {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    #[serde(rename = "type")]
    pub task_type: TaskType,
    pub rrule: Option<String>,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub article_id: i64,
    pub executant_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attachments: Option<Vec<Attachment>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskField {
    Id,
    Title,
    Description,
    Status,
    Type,
    Rrule,
    ScheduledAt,
    CompletedAt,
    ArticleId,
    ExecutantId,
    CreatedAt,
    UpdatedAt,
}

impl FieldSet for TaskField {
    fn column(&self) -> &'static str {
        match self {
            TaskField::Id => "id",
            TaskField::Title => "title",
            TaskField::Description => "description",
            TaskField::Status => "status",
            TaskField::Type => "type",
            TaskField::Rrule => "rrule",
            TaskField::ScheduledAt => "scheduled_at",
            TaskField::CompletedAt => "completed_at",
            TaskField::ArticleId => "article_id",
            TaskField::ExecutantId => "executant_id",
            TaskField::CreatedAt => "created_at",
            TaskField::UpdatedAt => "updated_at",
        }
    }

    fn is_numeric(&self) -> bool {
        matches!(
            self,
            TaskField::Id | TaskField::ArticleId | TaskField::ExecutantId
        )
    }

    fn all() -> &'static [Self] {
        &[
            TaskField::Id,
            TaskField::Title,
            TaskField::Description,
            TaskField::Status,
            TaskField::Type,
            TaskField::Rrule,
            TaskField::ScheduledAt,
            TaskField::CompletedAt,
            TaskField::ArticleId,
            TaskField::ExecutantId,
            TaskField::CreatedAt,
            TaskField::UpdatedAt,
        ]
    }
}

#[derive(Debug, Clone, Default)]
pub struct TaskWhere {
    pub id: Option<IntFilter>,
    pub title: Option<StringFilter>,
    pub description: Option<StringFilter>,
    pub status: Option<EnumFilter<TaskStatus>>,
    pub task_type: Option<EnumFilter<TaskType>>,
    pub rrule: Option<StringFilter>,
    pub scheduled_at: Option<DateTimeFilter>,
    pub completed_at: Option<DateTimeFilter>,
    pub article_id: Option<IntFilter>,
    pub executant_id: Option<IntFilter>,
    pub created_at: Option<DateTimeFilter>,
    pub updated_at: Option<DateTimeFilter>,
    pub and: Vec<TaskWhere>,
    pub or: Vec<TaskWhere>,
    pub not: Vec<TaskWhere>,
}

impl DatabaseFilter for TaskWhere {
    fn push_conditions(&self, conditions: &mut Vec<String>, values: &mut Vec<SqlValue>) {
        if let Some(f) = &self.id {
            f.push("id", conditions, values);
        }
        if let Some(f) = &self.title {
            f.push("title", conditions, values);
        }
        if let Some(f) = &self.description {
            f.push("description", conditions, values);
        }
        if let Some(f) = &self.status {
            f.push("status", conditions, values);
        }
        if let Some(f) = &self.task_type {
            f.push("type", conditions, values);
        }
        if let Some(f) = &self.rrule {
            f.push("rrule", conditions, values);
        }
        if let Some(f) = &self.scheduled_at {
            f.push("scheduled_at", conditions, values);
        }
        if let Some(f) = &self.completed_at {
            f.push("completed_at", conditions, values);
        }
        if let Some(f) = &self.article_id {
            f.push("article_id", conditions, values);
        }
        if let Some(f) = &self.executant_id {
            f.push("executant_id", conditions, values);
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
            && self.title.is_none()
            && self.description.is_none()
            && self.status.is_none()
            && self.task_type.is_none()
            && self.rrule.is_none()
            && self.scheduled_at.is_none()
            && self.completed_at.is_none()
            && self.article_id.is_none()
            && self.executant_id.is_none()
            && self.created_at.is_none()
            && self.updated_at.is_none()
            && logical::groups_empty(&self.and, &self.or, &self.not)
    }
}

#[derive(Debug, Clone)]
pub enum TaskWhereUnique {
    Id(i64),
}

impl UniqueWhere for TaskWhereUnique {
    fn condition(&self) -> (String, Vec<SqlValue>) {
        match self {
            TaskWhereUnique::Id(id) => ("id = ?".to_string(), vec![SqlValue::Int(*id)]),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TaskCreate {
    pub title: String,
    pub description: Option<String>,
    /// Defaults to `todo`
    pub status: Option<TaskStatus>,
    pub task_type: TaskType,
    pub rrule: Option<String>,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub article_id: i64,
    pub executant_id: i64,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl TaskCreate {
    pub fn new(
        title: impl Into<String>,
        task_type: TaskType,
        article_id: i64,
        executant_id: i64,
    ) -> Self {
        Self {
            title: title.into(),
            description: None,
            status: None,
            task_type,
            rrule: None,
            scheduled_at: None,
            completed_at: None,
            article_id,
            executant_id,
            created_at: None,
            updated_at: None,
        }
    }
}

fn opt_datetime_value(value: &Option<DateTime<Utc>>) -> SqlValue {
    match value {
        Some(dt) => datetime_value(dt),
        None => SqlValue::Null,
    }
}

impl CreateInput for TaskCreate {
    fn columns() -> &'static [&'static str] {
        &[
            "title",
            "description",
            "status",
            "type",
            "rrule",
            "scheduled_at",
            "completed_at",
            "article_id",
            "executant_id",
            "created_at",
            "updated_at",
        ]
    }

    fn values(&self) -> Vec<SqlValue> {
        let now = Utc::now();
        vec![
            self.title.clone().into(),
            self.description.clone().into(),
            self.status.unwrap_or(TaskStatus::Todo).as_str().into(),
            self.task_type.as_str().into(),
            self.rrule.clone().into(),
            opt_datetime_value(&self.scheduled_at),
            opt_datetime_value(&self.completed_at),
            self.article_id.into(),
            self.executant_id.into(),
            datetime_value(&self.created_at.unwrap_or(now)),
            datetime_value(&self.updated_at.unwrap_or(now)),
        ]
    }
}

#[derive(Debug, Clone, Default)]
pub struct TaskUpdate {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub status: Option<TaskStatus>,
    pub task_type: Option<TaskType>,
    pub rrule: Option<Option<String>>,
    pub scheduled_at: Option<Option<DateTime<Utc>>>,
    pub completed_at: Option<Option<DateTime<Utc>>>,
    pub article_id: Option<i64>,
    pub executant_id: Option<i64>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl UpdateInput for TaskUpdate {
    fn assignments(&self) -> (Vec<String>, Vec<SqlValue>) {
        let mut fragments = Vec::new();
        let mut values = Vec::new();
        let mut set = |column: &str, value: SqlValue| {
            fragments.push(format!("{column} = ?"));
            values.push(value);
        };
        if let Some(v) = &self.title {
            set("title", v.clone().into());
        }
        if let Some(v) = &self.description {
            set("description", v.clone().into());
        }
        if let Some(v) = self.status {
            set("status", v.as_str().into());
        }
        if let Some(v) = self.task_type {
            set("type", v.as_str().into());
        }
        if let Some(v) = &self.rrule {
            set("rrule", v.clone().into());
        }
        if let Some(v) = &self.scheduled_at {
            set("scheduled_at", opt_datetime_value(v));
        }
        if let Some(v) = &self.completed_at {
            set("completed_at", opt_datetime_value(v));
        }
        if let Some(v) = self.article_id {
            set("article_id", v.into());
        }
        if let Some(v) = self.executant_id {
            set("executant_id", v.into());
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

#[derive(Debug, Clone, Default)]
pub struct TaskInclude {
    pub attachments: Option<ToMany<Attachment>>,
}

impl IncludeLoader<Task> for TaskInclude {
    fn is_empty(&self) -> bool {
        self.attachments.is_none()
    }

    async fn load(&self, records: &mut [Task], cx: &mut Conn<'_>) -> Result<()> {
        if let Some(args) = &self.attachments {
            let ids = parent_ids(records, |t| t.id);
            let mut grouped =
                load_to_many::<Attachment>(cx, &ids, "task_id", args, |a| a.task_id.unwrap_or(-1))
                    .await?;
            for record in records.iter_mut() {
                record.attachments = Some(grouped.remove(&record.id).unwrap_or_default());
            }
        }
        Ok(())
    }
}

impl DatabaseEntity for Task {
    const TABLE_NAME: &'static str = "tasks";

    type Field = TaskField;
    type Where = TaskWhere;
    type WhereUnique = TaskWhereUnique;
    type Create = TaskCreate;
    type Update = TaskUpdate;
    type Include = TaskInclude;

    fn column_names() -> &'static [&'static str] {
        &[
            "id",
            "title",
            "description",
            "status",
            "type",
            "rrule",
            "scheduled_at",
            "completed_at",
            "article_id",
            "executant_id",
            "created_at",
            "updated_at",
        ]
    }
}

impl FromSqlRow for Task {
    fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error> {
        let status: String = row.try_get("status")?;
        let task_type: String = row.try_get("type")?;
        Ok(Self {
            id: row.try_get("id")?,
            title: row.try_get("title")?,
            description: row.try_get("description")?,
            status: TaskStatus::parse(&status)
                .ok_or_else(|| decode_error(format!("unknown status {status:?}")))?,
            task_type: TaskType::parse(&task_type)
                .ok_or_else(|| decode_error(format!("unknown task type {task_type:?}")))?,
            rrule: row.try_get("rrule")?,
            scheduled_at: opt_datetime_from_sql(
                row.try_get::<Option<String>, _>("scheduled_at")?.as_deref(),
            )?,
            completed_at: opt_datetime_from_sql(
                row.try_get::<Option<String>, _>("completed_at")?.as_deref(),
            )?,
            article_id: row.try_get("article_id")?,
            executant_id: row.try_get("executant_id")?,
            created_at: datetime_from_sql(&row.try_get::<String, _>("created_at")?)?,
            updated_at: datetime_from_sql(&row.try_get::<String, _>("updated_at")?)?,
            attachments: None,
        })
    }
}

impl DatabaseSchema for Task {
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
                name: "title",
                sql_type: "TEXT",
                nullable: false,
                is_primary_key: false,
                references: None,
            },
            ColumnDef {
                name: "description",
                sql_type: "TEXT",
                nullable: true,
                is_primary_key: false,
                references: None,
            },
            ColumnDef {
                name: "status",
                sql_type: "TEXT",
                nullable: false,
                is_primary_key: false,
                references: None,
            },
            ColumnDef {
                name: "type",
                sql_type: "TEXT",
                nullable: false,
                is_primary_key: false,
                references: None,
            },
            ColumnDef {
                name: "rrule",
                sql_type: "TEXT",
                nullable: true,
                is_primary_key: false,
                references: None,
            },
            ColumnDef {
                name: "scheduled_at",
                sql_type: "TEXT",
                nullable: true,
                is_primary_key: false,
                references: None,
            },
            ColumnDef {
                name: "completed_at",
                sql_type: "TEXT",
                nullable: true,
                is_primary_key: false,
                references: None,
            },
            ColumnDef {
                name: "article_id",
                sql_type: "INTEGER",
                nullable: false,
                is_primary_key: false,
                references: Some(("articles", "id")),
            },
            ColumnDef {
                name: "executant_id",
                sql_type: "INTEGER",
                nullable: false,
                is_primary_key: false,
                references: Some(("users", "id")),
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
}
