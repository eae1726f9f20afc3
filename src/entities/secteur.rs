//! Secteur: a zone/floor within a site. `floor` supports the relative
//! numeric update operators.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use crate::error::Result;
use crate::orm::codec::{datetime_from_sql, datetime_value};
use crate::orm::filters::logical;
use crate::orm::include::{IncludeLoader, ToMany, load_to_many, parent_ids};
use crate::orm::traits::{
    ColumnDef, CreateInput, DatabaseEntity, DatabaseFilter, DatabaseSchema, FieldSet, FromSqlRow,
    SqlValue, UniqueWhere, UpdateInput,
};
use crate::orm::update::IntUpdate;
use crate::orm::{Conn, DateTimeFilter, IntFilter, StringFilter};

use super::article::Article;

#[derive(Debug, Clone, Serialize)]
pub struct Secteur {
    pub id: i64,
    pub name: String,
    pub floor: i64,
    pub objet_id: i64,
    pub user_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub articles: Option<Vec<Article>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecteurField {
    Id,
    Name,
    Floor,
    ObjetId,
    UserId,
    CreatedAt,
    UpdatedAt,
}

impl FieldSet for SecteurField {
    fn column(&self) -> &'static str {
        match self {
            SecteurField::Id => "id",
            SecteurField::Name => "name",
            SecteurField::Floor => "floor",
            SecteurField::ObjetId => "objet_id",
            SecteurField::UserId => "user_id",
            SecteurField::CreatedAt => "created_at",
            SecteurField::UpdatedAt => "updated_at",
        }
    }

    fn is_numeric(&self) -> bool {
        matches!(
            self,
            SecteurField::Id | SecteurField::Floor | SecteurField::ObjetId | SecteurField::UserId
        )
    }

    fn all() -> &'static [Self] {
        &[
            SecteurField::Id,
            SecteurField::Name,
            SecteurField::Floor,
            SecteurField::ObjetId,
            SecteurField::UserId,
            SecteurField::CreatedAt,
            SecteurField::UpdatedAt,
        ]
    }
}

#[derive(Debug, Clone, Default)]
pub struct SecteurWhere {
    pub id: Option<IntFilter>,
    pub name: Option<StringFilter>,
    pub floor: Option<IntFilter>,
    pub objet_id: Option<IntFilter>,
    pub user_id: Option<IntFilter>,
    pub created_at: Option<DateTimeFilter>,
    pub updated_at: Option<DateTimeFilter>,
    pub and: Vec<SecteurWhere>,
    pub or: Vec<SecteurWhere>,
    pub not: Vec<SecteurWhere>,
}

impl DatabaseFilter for SecteurWhere {
    fn push_conditions(&self, conditions: &mut Vec<String>, values: &mut Vec<SqlValue>) {
        if let Some(f) = &self.id {
            f.push("id", conditions, values);
        }
        if let Some(f) = &self.name {
            f.push("name", conditions, values);
        }
        if let Some(f) = &self.floor {
            f.push("floor", conditions, values);
        }
        if let Some(f) = &self.objet_id {
            f.push("objet_id", conditions, values);
        }
        if let Some(f) = &self.user_id {
            f.push("user_id", conditions, values);
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
            && self.floor.is_none()
            && self.objet_id.is_none()
            && self.user_id.is_none()
            && self.created_at.is_none()
            && self.updated_at.is_none()
            && logical::groups_empty(&self.and, &self.or, &self.not)
    }
}

#[derive(Debug, Clone)]
pub enum SecteurWhereUnique {
    Id(i64),
}

impl UniqueWhere for SecteurWhereUnique {
    fn condition(&self) -> (String, Vec<SqlValue>) {
        match self {
            SecteurWhereUnique::Id(id) => ("id = ?".to_string(), vec![SqlValue::Int(*id)]),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SecteurCreate {
    pub name: String,
    pub floor: i64,
    pub objet_id: i64,
    pub user_id: Option<i64>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl SecteurCreate {
    pub fn new(name: impl Into<String>, floor: i64, objet_id: i64) -> Self {
        Self {
            name: name.into(),
            floor,
            objet_id,
            user_id: None,
            created_at: None,
            updated_at: None,
        }
    }
}

impl CreateInput for SecteurCreate {
    fn columns() -> &'static [&'static str] {
        &["name", "floor", "objet_id", "user_id", "created_at", "updated_at"]
    }

    fn values(&self) -> Vec<SqlValue> {
        let now = Utc::now();
        vec![
            self.name.clone().into(),
            self.floor.into(),
            self.objet_id.into(),
            self.user_id.into(),
            datetime_value(&self.created_at.unwrap_or(now)),
            datetime_value(&self.updated_at.unwrap_or(now)),
        ]
    }
}

#[derive(Debug, Clone, Default)]
pub struct SecteurUpdate {
    pub name: Option<String>,
    pub floor: Option<IntUpdate>,
    pub objet_id: Option<i64>,
    pub user_id: Option<Option<i64>>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl UpdateInput for SecteurUpdate {
    fn assignments(&self) -> (Vec<String>, Vec<SqlValue>) {
        let mut fragments = Vec::new();
        let mut values = Vec::new();
        if let Some(v) = &self.name {
            fragments.push("name = ?".to_string());
            values.push(v.clone().into());
        }
        if let Some(op) = &self.floor {
            let (fragment, value) = op.assignment("floor");
            fragments.push(fragment);
            values.push(value);
        }
        if let Some(v) = self.objet_id {
            fragments.push("objet_id = ?".to_string());
            values.push(v.into());
        }
        if let Some(v) = self.user_id {
            fragments.push("user_id = ?".to_string());
            values.push(v.into());
        }
        if let Some(v) = &self.created_at {
            fragments.push("created_at = ?".to_string());
            values.push(datetime_value(v));
        }
        if let Some(v) = &self.updated_at {
            fragments.push("updated_at = ?".to_string());
            values.push(datetime_value(v));
        }
        (fragments, values)
    }
}

#[derive(Debug, Clone, Default)]
pub struct SecteurInclude {
    pub articles: Option<ToMany<Article>>,
}

impl IncludeLoader<Secteur> for SecteurInclude {
    fn is_empty(&self) -> bool {
        self.articles.is_none()
    }

    async fn load(&self, records: &mut [Secteur], cx: &mut Conn<'_>) -> Result<()> {
        if let Some(args) = &self.articles {
            let ids = parent_ids(records, |s| s.id);
            let mut grouped =
                load_to_many::<Article>(cx, &ids, "secteur_id", args, |a| a.secteur_id).await?;
            for record in records.iter_mut() {
                record.articles = Some(grouped.remove(&record.id).unwrap_or_default());
            }
        }
        Ok(())
    }
}

impl DatabaseEntity for Secteur {
    const TABLE_NAME: &'static str = "secteurs";

    type Field = SecteurField;
    type Where = SecteurWhere;
    type WhereUnique = SecteurWhereUnique;
    type Create = SecteurCreate;
    type Update = SecteurUpdate;
    type Include = SecteurInclude;

    fn column_names() -> &'static [&'static str] {
        &["id", "name", "floor", "objet_id", "user_id", "created_at", "updated_at"]
    }
}

impl FromSqlRow for Secteur {
    fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            floor: row.try_get("floor")?,
            objet_id: row.try_get("objet_id")?,
            user_id: row.try_get("user_id")?,
            created_at: datetime_from_sql(&row.try_get::<String, _>("created_at")?)?,
            updated_at: datetime_from_sql(&row.try_get::<String, _>("updated_at")?)?,
            articles: None,
        })
    }
}

impl DatabaseSchema for Secteur {
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
                name: "floor",
                sql_type: "INTEGER",
                nullable: false,
                is_primary_key: false,
                references: None,
            },
            ColumnDef {
                name: "objet_id",
                sql_type: "INTEGER",
                nullable: false,
                is_primary_key: false,
                references: Some(("objets", "id")),
            },
            ColumnDef {
                name: "user_id",
                sql_type: "INTEGER",
                nullable: true,
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
