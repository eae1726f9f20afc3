//! Company-to-site link. Pure relationship record: composite unique on
//! (entreprise_id, objet_id), created_at only.

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
use crate::orm::{DateTimeFilter, IntFilter};

#[derive(Debug, Clone, Serialize)]
pub struct EntrepriseObjet {
    pub id: i64,
    pub entreprise_id: i64,
    pub objet_id: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntrepriseObjetField {
    Id,
    EntrepriseId,
    ObjetId,
    CreatedAt,
}

impl FieldSet for EntrepriseObjetField {
    fn column(&self) -> &'static str {
        match self {
            EntrepriseObjetField::Id => "id",
            EntrepriseObjetField::EntrepriseId => "entreprise_id",
            EntrepriseObjetField::ObjetId => "objet_id",
            EntrepriseObjetField::CreatedAt => "created_at",
        }
    }

    fn is_numeric(&self) -> bool {
        !matches!(self, EntrepriseObjetField::CreatedAt)
    }

    fn all() -> &'static [Self] {
        &[
            EntrepriseObjetField::Id,
            EntrepriseObjetField::EntrepriseId,
            EntrepriseObjetField::ObjetId,
            EntrepriseObjetField::CreatedAt,
        ]
    }
}

#[derive(Debug, Clone, Default)]
pub struct EntrepriseObjetWhere {
    pub id: Option<IntFilter>,
    pub entreprise_id: Option<IntFilter>,
    pub objet_id: Option<IntFilter>,
    pub created_at: Option<DateTimeFilter>,
    pub and: Vec<EntrepriseObjetWhere>,
    pub or: Vec<EntrepriseObjetWhere>,
    pub not: Vec<EntrepriseObjetWhere>,
}

impl DatabaseFilter for EntrepriseObjetWhere {
    fn push_conditions(&self, conditions: &mut Vec<String>, values: &mut Vec<SqlValue>) {
        if let Some(f) = &self.id {
            f.push("id", conditions, values);
        }
        if let Some(f) = &self.entreprise_id {
            f.push("entreprise_id", conditions, values);
        }
        if let Some(f) = &self.objet_id {
            f.push("objet_id", conditions, values);
        }
        if let Some(f) = &self.created_at {
            f.push("created_at", conditions, values);
        }
        logical::push_groups(&self.and, &self.or, &self.not, conditions, values);
    }

    fn is_empty(&self) -> bool {
        self.id.is_none()
            && self.entreprise_id.is_none()
            && self.objet_id.is_none()
            && self.created_at.is_none()
            && logical::groups_empty(&self.and, &self.or, &self.not)
    }
}

#[derive(Debug, Clone)]
pub enum EntrepriseObjetWhereUnique {
    Id(i64),
    /// The composite unique pair
    EntrepriseIdObjetId(i64, i64),
}

impl UniqueWhere for EntrepriseObjetWhereUnique {
    fn condition(&self) -> (String, Vec<SqlValue>) {
        match self {
            EntrepriseObjetWhereUnique::Id(id) => {
                ("id = ?".to_string(), vec![SqlValue::Int(*id)])
            }
            EntrepriseObjetWhereUnique::EntrepriseIdObjetId(entreprise_id, objet_id) => (
                "entreprise_id = ? AND objet_id = ?".to_string(),
                vec![SqlValue::Int(*entreprise_id), SqlValue::Int(*objet_id)],
            ),
        }
    }
}

#[derive(Debug, Clone)]
pub struct EntrepriseObjetCreate {
    pub entreprise_id: i64,
    pub objet_id: i64,
    pub created_at: Option<DateTime<Utc>>,
}

impl EntrepriseObjetCreate {
    pub fn new(entreprise_id: i64, objet_id: i64) -> Self {
        Self {
            entreprise_id,
            objet_id,
            created_at: None,
        }
    }
}

impl CreateInput for EntrepriseObjetCreate {
    fn columns() -> &'static [&'static str] {
        &["entreprise_id", "objet_id", "created_at"]
    }

    fn values(&self) -> Vec<SqlValue> {
        vec![
            self.entreprise_id.into(),
            self.objet_id.into(),
            datetime_value(&self.created_at.unwrap_or_else(Utc::now)),
        ]
    }
}

#[derive(Debug, Clone, Default)]
pub struct EntrepriseObjetUpdate {
    pub entreprise_id: Option<i64>,
    pub objet_id: Option<i64>,
    pub created_at: Option<DateTime<Utc>>,
}

impl UpdateInput for EntrepriseObjetUpdate {
    fn assignments(&self) -> (Vec<String>, Vec<SqlValue>) {
        let mut fragments = Vec::new();
        let mut values = Vec::new();
        let mut set = |column: &str, value: SqlValue| {
            fragments.push(format!("{column} = ?"));
            values.push(value);
        };
        if let Some(v) = self.entreprise_id {
            set("entreprise_id", v.into());
        }
        if let Some(v) = self.objet_id {
            set("objet_id", v.into());
        }
        if let Some(v) = &self.created_at {
            set("created_at", datetime_value(v));
        }
        (fragments, values)
    }
}

impl DatabaseEntity for EntrepriseObjet {
    const TABLE_NAME: &'static str = "entreprise_objets";
    const HAS_UPDATED_AT: bool = false;

    type Field = EntrepriseObjetField;
    type Where = EntrepriseObjetWhere;
    type WhereUnique = EntrepriseObjetWhereUnique;
    type Create = EntrepriseObjetCreate;
    type Update = EntrepriseObjetUpdate;
    type Include = NoInclude;

    fn column_names() -> &'static [&'static str] {
        &["id", "entreprise_id", "objet_id", "created_at"]
    }
}

impl FromSqlRow for EntrepriseObjet {
    fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            entreprise_id: row.try_get("entreprise_id")?,
            objet_id: row.try_get("objet_id")?,
            created_at: datetime_from_sql(&row.try_get::<String, _>("created_at")?)?,
        })
    }
}

impl DatabaseSchema for EntrepriseObjet {
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
                name: "entreprise_id",
                sql_type: "INTEGER",
                nullable: false,
                is_primary_key: false,
                references: Some(("entreprises", "id")),
            },
            ColumnDef {
                name: "objet_id",
                sql_type: "INTEGER",
                nullable: false,
                is_primary_key: false,
                references: Some(("objets", "id")),
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

    fn unique_indexes() -> &'static [IndexDef] {
        &[IndexDef {
            name: "entreprise_objets_entreprise_id_objet_id_key",
            columns: &["entreprise_id", "objet_id"],
        }]
    }
}
