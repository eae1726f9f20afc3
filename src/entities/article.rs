//! Article: a physical asset placed on a floor plan.
//!
//! Placement is either a circle (radius) or a rectangle (width/height)
//! around pos_x/pos_y; all five are exact decimals stored as TEXT.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use crate::error::Result;
use crate::orm::codec::{
    datetime_from_sql, datetime_value, decimal_value, decode_error, opt_decimal_from_sql,
};
use crate::orm::filters::logical;
use crate::orm::include::{IncludeLoader, ToMany, load_to_many, parent_ids};
use crate::orm::traits::{
    ColumnDef, CreateInput, DatabaseEntity, DatabaseFilter, DatabaseSchema, FieldSet, FromSqlRow,
    SqlValue, UniqueWhere, UpdateInput,
};
use crate::orm::update::DecimalUpdate;
use crate::orm::{
    Conn, DateTimeFilter, DecimalFilter, EnumFilter, EnumValue, IntFilter, StringFilter,
};

use super::task::Task;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShapeType {
    Circle,
    Rectangle,
}

impl EnumValue for ShapeType {
    fn as_str(&self) -> &'static str {
        match self {
            ShapeType::Circle => "circle",
            ShapeType::Rectangle => "rectangle",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "circle" => Some(ShapeType::Circle),
            "rectangle" => Some(ShapeType::Rectangle),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Article {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub shape_type: ShapeType,
    pub pos_x: Option<Decimal>,
    pub pos_y: Option<Decimal>,
    pub width: Option<Decimal>,
    pub height: Option<Decimal>,
    pub radius: Option<Decimal>,
    pub secteur_id: i64,
    pub user_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tasks: Option<Vec<Task>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArticleField {
    Id,
    Name,
    Description,
    ShapeType,
    PosX,
    PosY,
    Width,
    Height,
    Radius,
    SecteurId,
    UserId,
    CreatedAt,
    UpdatedAt,
}

impl FieldSet for ArticleField {
    fn column(&self) -> &'static str {
        match self {
            ArticleField::Id => "id",
            ArticleField::Name => "name",
            ArticleField::Description => "description",
            ArticleField::ShapeType => "shape_type",
            ArticleField::PosX => "pos_x",
            ArticleField::PosY => "pos_y",
            ArticleField::Width => "width",
            ArticleField::Height => "height",
            ArticleField::Radius => "radius",
            ArticleField::SecteurId => "secteur_id",
            ArticleField::UserId => "user_id",
            ArticleField::CreatedAt => "created_at",
            ArticleField::UpdatedAt => "updated_at",
        }
    }

    fn is_numeric(&self) -> bool {
        matches!(
            self,
            ArticleField::Id
                | ArticleField::PosX
                | ArticleField::PosY
                | ArticleField::Width
                | ArticleField::Height
                | ArticleField::Radius
                | ArticleField::SecteurId
                | ArticleField::UserId
        )
    }

    fn all() -> &'static [Self] {
        &[
            ArticleField::Id,
            ArticleField::Name,
            ArticleField::Description,
            ArticleField::ShapeType,
            ArticleField::PosX,
            ArticleField::PosY,
            ArticleField::Width,
            ArticleField::Height,
            ArticleField::Radius,
            ArticleField::SecteurId,
            ArticleField::UserId,
            ArticleField::CreatedAt,
            ArticleField::UpdatedAt,
        ]
    }
}

#[derive(Debug, Clone, Default)]
pub struct ArticleWhere {
    pub id: Option<IntFilter>,
    pub name: Option<StringFilter>,
    pub description: Option<StringFilter>,
    pub shape_type: Option<EnumFilter<ShapeType>>,
    pub pos_x: Option<DecimalFilter>,
    pub pos_y: Option<DecimalFilter>,
    pub width: Option<DecimalFilter>,
    pub height: Option<DecimalFilter>,
    pub radius: Option<DecimalFilter>,
    pub secteur_id: Option<IntFilter>,
    pub user_id: Option<IntFilter>,
    pub created_at: Option<DateTimeFilter>,
    pub updated_at: Option<DateTimeFilter>,
    pub and: Vec<ArticleWhere>,
    pub or: Vec<ArticleWhere>,
    pub not: Vec<ArticleWhere>,
}

impl DatabaseFilter for ArticleWhere {
    fn push_conditions(&self, conditions: &mut Vec<String>, values: &mut Vec<SqlValue>) {
        if let Some(f) = &self.id {
            f.push("id", conditions, values);
        }
        if let Some(f) = &self.name {
            f.push("name", conditions, values);
        }
        if let Some(f) = &self.description {
            f.push("description", conditions, values);
        }
        if let Some(f) = &self.shape_type {
            f.push("shape_type", conditions, values);
        }
        if let Some(f) = &self.pos_x {
            f.push("pos_x", conditions, values);
        }
        if let Some(f) = &self.pos_y {
            f.push("pos_y", conditions, values);
        }
        if let Some(f) = &self.width {
            f.push("width", conditions, values);
        }
        if let Some(f) = &self.height {
            f.push("height", conditions, values);
        }
        if let Some(f) = &self.radius {
            f.push("radius", conditions, values);
        }
        if let Some(f) = &self.secteur_id {
            f.push("secteur_id", conditions, values);
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
            && self.description.is_none()
            && self.shape_type.is_none()
            && self.pos_x.is_none()
            && self.pos_y.is_none()
            && self.width.is_none()
            && self.height.is_none()
            && self.radius.is_none()
            && self.secteur_id.is_none()
            && self.user_id.is_none()
            && self.created_at.is_none()
            && self.updated_at.is_none()
            && logical::groups_empty(&self.and, &self.or, &self.not)
    }
}

#[derive(Debug, Clone)]
pub enum ArticleWhereUnique {
    Id(i64),
}

impl UniqueWhere for ArticleWhereUnique {
    fn condition(&self) -> (String, Vec<SqlValue>) {
        match self {
            ArticleWhereUnique::Id(id) => ("id = ?".to_string(), vec![SqlValue::Int(*id)]),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ArticleCreate {
    pub name: String,
    pub description: Option<String>,
    pub shape_type: ShapeType,
    pub pos_x: Option<Decimal>,
    pub pos_y: Option<Decimal>,
    pub width: Option<Decimal>,
    pub height: Option<Decimal>,
    pub radius: Option<Decimal>,
    pub secteur_id: i64,
    pub user_id: Option<i64>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl ArticleCreate {
    pub fn new(name: impl Into<String>, shape_type: ShapeType, secteur_id: i64) -> Self {
        Self {
            name: name.into(),
            description: None,
            shape_type,
            pos_x: None,
            pos_y: None,
            width: None,
            height: None,
            radius: None,
            secteur_id,
            user_id: None,
            created_at: None,
            updated_at: None,
        }
    }
}

fn opt_decimal_value(value: &Option<Decimal>) -> SqlValue {
    match value {
        Some(d) => decimal_value(d),
        None => SqlValue::Null,
    }
}

impl CreateInput for ArticleCreate {
    fn columns() -> &'static [&'static str] {
        &[
            "name",
            "description",
            "shape_type",
            "pos_x",
            "pos_y",
            "width",
            "height",
            "radius",
            "secteur_id",
            "user_id",
            "created_at",
            "updated_at",
        ]
    }

    fn values(&self) -> Vec<SqlValue> {
        let now = Utc::now();
        vec![
            self.name.clone().into(),
            self.description.clone().into(),
            self.shape_type.as_str().into(),
            opt_decimal_value(&self.pos_x),
            opt_decimal_value(&self.pos_y),
            opt_decimal_value(&self.width),
            opt_decimal_value(&self.height),
            opt_decimal_value(&self.radius),
            self.secteur_id.into(),
            self.user_id.into(),
            datetime_value(&self.created_at.unwrap_or(now)),
            datetime_value(&self.updated_at.unwrap_or(now)),
        ]
    }
}

#[derive(Debug, Clone, Default)]
pub struct ArticleUpdate {
    pub name: Option<String>,
    pub description: Option<Option<String>>,
    pub shape_type: Option<ShapeType>,
    pub pos_x: Option<DecimalUpdate>,
    pub pos_y: Option<DecimalUpdate>,
    pub width: Option<DecimalUpdate>,
    pub height: Option<DecimalUpdate>,
    pub radius: Option<DecimalUpdate>,
    pub secteur_id: Option<i64>,
    pub user_id: Option<Option<i64>>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl UpdateInput for ArticleUpdate {
    fn assignments(&self) -> (Vec<String>, Vec<SqlValue>) {
        let mut fragments = Vec::new();
        let mut values = Vec::new();
        if let Some(v) = &self.name {
            fragments.push("name = ?".to_string());
            values.push(v.clone().into());
        }
        if let Some(v) = &self.description {
            fragments.push("description = ?".to_string());
            values.push(v.clone().into());
        }
        if let Some(v) = self.shape_type {
            fragments.push("shape_type = ?".to_string());
            values.push(v.as_str().into());
        }
        for (column, op) in [
            ("pos_x", &self.pos_x),
            ("pos_y", &self.pos_y),
            ("width", &self.width),
            ("height", &self.height),
            ("radius", &self.radius),
        ] {
            if let Some(op) = op {
                let (fragment, value) = op.assignment(column);
                fragments.push(fragment);
                values.push(value);
            }
        }
        if let Some(v) = self.secteur_id {
            fragments.push("secteur_id = ?".to_string());
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
pub struct ArticleInclude {
    pub tasks: Option<ToMany<Task>>,
}

impl IncludeLoader<Article> for ArticleInclude {
    fn is_empty(&self) -> bool {
        self.tasks.is_none()
    }

    async fn load(&self, records: &mut [Article], cx: &mut Conn<'_>) -> Result<()> {
        if let Some(args) = &self.tasks {
            let ids = parent_ids(records, |a| a.id);
            let mut grouped =
                load_to_many::<Task>(cx, &ids, "article_id", args, |t| t.article_id).await?;
            for record in records.iter_mut() {
                record.tasks = Some(grouped.remove(&record.id).unwrap_or_default());
            }
        }
        Ok(())
    }
}

impl DatabaseEntity for Article {
    const TABLE_NAME: &'static str = "articles";

    type Field = ArticleField;
    type Where = ArticleWhere;
    type WhereUnique = ArticleWhereUnique;
    type Create = ArticleCreate;
    type Update = ArticleUpdate;
    type Include = ArticleInclude;

    fn column_names() -> &'static [&'static str] {
        &[
            "id",
            "name",
            "description",
            "shape_type",
            "pos_x",
            "pos_y",
            "width",
            "height",
            "radius",
            "secteur_id",
            "user_id",
            "created_at",
            "updated_at",
        ]
    }
}

impl FromSqlRow for Article {
    fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error> {
        let shape: String = row.try_get("shape_type")?;
        Ok(Self {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            description: row.try_get("description")?,
            shape_type: ShapeType::parse(&shape)
                .ok_or_else(|| decode_error(format!("unknown shape {shape:?}")))?,
            pos_x: opt_decimal_from_sql(row.try_get::<Option<String>, _>("pos_x")?.as_deref())?,
            pos_y: opt_decimal_from_sql(row.try_get::<Option<String>, _>("pos_y")?.as_deref())?,
            width: opt_decimal_from_sql(row.try_get::<Option<String>, _>("width")?.as_deref())?,
            height: opt_decimal_from_sql(row.try_get::<Option<String>, _>("height")?.as_deref())?,
            radius: opt_decimal_from_sql(row.try_get::<Option<String>, _>("radius")?.as_deref())?,
            secteur_id: row.try_get("secteur_id")?,
            user_id: row.try_get("user_id")?,
            created_at: datetime_from_sql(&row.try_get::<String, _>("created_at")?)?,
            updated_at: datetime_from_sql(&row.try_get::<String, _>("updated_at")?)?,
            tasks: None,
        })
    }
}

impl DatabaseSchema for Article {
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
                name: "description",
                sql_type: "TEXT",
                nullable: true,
                is_primary_key: false,
                references: None,
            },
            ColumnDef {
                name: "shape_type",
                sql_type: "TEXT",
                nullable: false,
                is_primary_key: false,
                references: None,
            },
            ColumnDef {
                name: "pos_x",
                sql_type: "TEXT",
                nullable: true,
                is_primary_key: false,
                references: None,
            },
            ColumnDef {
                name: "pos_y",
                sql_type: "TEXT",
                nullable: true,
                is_primary_key: false,
                references: None,
            },
            ColumnDef {
                name: "width",
                sql_type: "TEXT",
                nullable: true,
                is_primary_key: false,
                references: None,
            },
            ColumnDef {
                name: "height",
                sql_type: "TEXT",
                nullable: true,
                is_primary_key: false,
                references: None,
            },
            ColumnDef {
                name: "radius",
                sql_type: "TEXT",
                nullable: true,
                is_primary_key: false,
                references: None,
            },
            ColumnDef {
                name: "secteur_id",
                sql_type: "INTEGER",
                nullable: false,
                is_primary_key: false,
                references: Some(("secteurs", "id")),
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
