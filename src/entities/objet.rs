//! Objet: a site/building. Root of the containment chain
//! objet -> secteur -> article -> task.

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
use crate::orm::{Conn, DateTimeFilter, IntFilter, StringFilter};

use super::entreprise_objet::EntrepriseObjet;
use super::secteur::Secteur;
use super::user_permission::UserPermission;

#[derive(Debug, Clone, Serialize)]
pub struct Objet {
    pub id: i64,
    pub name: String,
    pub address: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entreprise_links: Option<Vec<EntrepriseObjet>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub permissions: Option<Vec<UserPermission>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secteurs: Option<Vec<Secteur>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjetField {
    Id,
    Name,
    Address,
    CreatedAt,
    UpdatedAt,
}

impl FieldSet for ObjetField {
    fn column(&self) -> &'static str {
        match self {
            ObjetField::Id => "id",
            ObjetField::Name => "name",
            ObjetField::Address => "address",
            ObjetField::CreatedAt => "created_at",
            ObjetField::UpdatedAt => "updated_at",
        }
    }

    fn is_numeric(&self) -> bool {
        matches!(self, ObjetField::Id)
    }

    fn all() -> &'static [Self] {
        &[
            ObjetField::Id,
            ObjetField::Name,
            ObjetField::Address,
            ObjetField::CreatedAt,
            ObjetField::UpdatedAt,
        ]
    }
}

#[derive(Debug, Clone, Default)]
pub struct ObjetWhere {
    pub id: Option<IntFilter>,
    pub name: Option<StringFilter>,
    pub address: Option<StringFilter>,
    pub created_at: Option<DateTimeFilter>,
    pub updated_at: Option<DateTimeFilter>,
    pub and: Vec<ObjetWhere>,
    pub or: Vec<ObjetWhere>,
    pub not: Vec<ObjetWhere>,
}

impl DatabaseFilter for ObjetWhere {
    fn push_conditions(&self, conditions: &mut Vec<String>, values: &mut Vec<SqlValue>) {
        if let Some(f) = &self.id {
            f.push("id", conditions, values);
        }
        if let Some(f) = &self.name {
            f.push("name", conditions, values);
        }
        if let Some(f) = &self.address {
            f.push("address", conditions, values);
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
            && self.address.is_none()
            && self.created_at.is_none()
            && self.updated_at.is_none()
            && logical::groups_empty(&self.and, &self.or, &self.not)
    }
}

#[derive(Debug, Clone)]
pub enum ObjetWhereUnique {
    Id(i64),
}

impl UniqueWhere for ObjetWhereUnique {
    fn condition(&self) -> (String, Vec<SqlValue>) {
        match self {
            ObjetWhereUnique::Id(id) => ("id = ?".to_string(), vec![SqlValue::Int(*id)]),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ObjetCreate {
    pub name: String,
    pub address: String,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl ObjetCreate {
    pub fn new(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
            created_at: None,
            updated_at: None,
        }
    }
}

impl CreateInput for ObjetCreate {
    fn columns() -> &'static [&'static str] {
        &["name", "address", "created_at", "updated_at"]
    }

    fn values(&self) -> Vec<SqlValue> {
        let now = Utc::now();
        vec![
            self.name.clone().into(),
            self.address.clone().into(),
            datetime_value(&self.created_at.unwrap_or(now)),
            datetime_value(&self.updated_at.unwrap_or(now)),
        ]
    }
}

#[derive(Debug, Clone, Default)]
pub struct ObjetUpdate {
    pub name: Option<String>,
    pub address: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl UpdateInput for ObjetUpdate {
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
        if let Some(v) = &self.address {
            set("address", v.clone().into());
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
pub struct ObjetInclude {
    pub entreprise_links: Option<ToMany<EntrepriseObjet>>,
    pub permissions: Option<ToMany<UserPermission>>,
    pub secteurs: Option<ToMany<Secteur>>,
}

impl IncludeLoader<Objet> for ObjetInclude {
    fn is_empty(&self) -> bool {
        self.entreprise_links.is_none() && self.permissions.is_none() && self.secteurs.is_none()
    }

    async fn load(&self, records: &mut [Objet], cx: &mut Conn<'_>) -> Result<()> {
        let ids = parent_ids(records, |o| o.id);
        if let Some(args) = &self.entreprise_links {
            let mut grouped =
                load_to_many::<EntrepriseObjet>(cx, &ids, "objet_id", args, |l| l.objet_id).await?;
            for record in records.iter_mut() {
                record.entreprise_links = Some(grouped.remove(&record.id).unwrap_or_default());
            }
        }
        if let Some(args) = &self.permissions {
            let mut grouped =
                load_to_many::<UserPermission>(cx, &ids, "objet_id", args, |p| p.objet_id).await?;
            for record in records.iter_mut() {
                record.permissions = Some(grouped.remove(&record.id).unwrap_or_default());
            }
        }
        if let Some(args) = &self.secteurs {
            let mut grouped =
                load_to_many::<Secteur>(cx, &ids, "objet_id", args, |s| s.objet_id).await?;
            for record in records.iter_mut() {
                record.secteurs = Some(grouped.remove(&record.id).unwrap_or_default());
            }
        }
        Ok(())
    }
}

impl DatabaseEntity for Objet {
    const TABLE_NAME: &'static str = "objets";

    type Field = ObjetField;
    type Where = ObjetWhere;
    type WhereUnique = ObjetWhereUnique;
    type Create = ObjetCreate;
    type Update = ObjetUpdate;
    type Include = ObjetInclude;

    fn column_names() -> &'static [&'static str] {
        &["id", "name", "address", "created_at", "updated_at"]
    }
}

impl FromSqlRow for Objet {
    fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            address: row.try_get("address")?,
            created_at: datetime_from_sql(&row.try_get::<String, _>("created_at")?)?,
            updated_at: datetime_from_sql(&row.try_get::<String, _>("updated_at")?)?,
            entreprise_links: None,
            permissions: None,
            secteurs: None,
        })
    }
}

impl DatabaseSchema for Objet {
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
                name: "address",
                sql_type: "TEXT",
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
}
