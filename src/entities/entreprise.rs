//! Entreprise: the tenant/company an account tree hangs off.
//!
//! `owner_id` is informational only (no FK); `stripe_id` is the billing
//! integration handle and stays NULL until a subscription exists.

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
use crate::orm::{BoolFilter, Conn, DateTimeFilter, IntFilter, StringFilter};

use super::entreprise_objet::EntrepriseObjet;
use super::user::User;

#[derive(Debug, Clone, Serialize)]
pub struct Entreprise {
    pub id: i64,
    pub name: String,
    pub address: String,
    pub stripe_id: Option<String>,
    pub is_personal: bool,
    pub owner_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub users: Option<Vec<User>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub objet_links: Option<Vec<EntrepriseObjet>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntrepriseField {
    Id,
    Name,
    Address,
    StripeId,
    IsPersonal,
    OwnerId,
    CreatedAt,
    UpdatedAt,
}

impl FieldSet for EntrepriseField {
    fn column(&self) -> &'static str {
        match self {
            EntrepriseField::Id => "id",
            EntrepriseField::Name => "name",
            EntrepriseField::Address => "address",
            EntrepriseField::StripeId => "stripe_id",
            EntrepriseField::IsPersonal => "is_personal",
            EntrepriseField::OwnerId => "owner_id",
            EntrepriseField::CreatedAt => "created_at",
            EntrepriseField::UpdatedAt => "updated_at",
        }
    }

    fn is_numeric(&self) -> bool {
        matches!(self, EntrepriseField::Id | EntrepriseField::OwnerId)
    }

    fn all() -> &'static [Self] {
        &[
            EntrepriseField::Id,
            EntrepriseField::Name,
            EntrepriseField::Address,
            EntrepriseField::StripeId,
            EntrepriseField::IsPersonal,
            EntrepriseField::OwnerId,
            EntrepriseField::CreatedAt,
            EntrepriseField::UpdatedAt,
        ]
    }
}

#[derive(Debug, Clone, Default)]
pub struct EntrepriseWhere {
    pub id: Option<IntFilter>,
    pub name: Option<StringFilter>,
    pub address: Option<StringFilter>,
    pub stripe_id: Option<StringFilter>,
    pub is_personal: Option<BoolFilter>,
    pub owner_id: Option<IntFilter>,
    pub created_at: Option<DateTimeFilter>,
    pub updated_at: Option<DateTimeFilter>,
    pub and: Vec<EntrepriseWhere>,
    pub or: Vec<EntrepriseWhere>,
    pub not: Vec<EntrepriseWhere>,
}

impl DatabaseFilter for EntrepriseWhere {
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
        if let Some(f) = &self.stripe_id {
            f.push("stripe_id", conditions, values);
        }
        if let Some(f) = &self.is_personal {
            f.push("is_personal", conditions, values);
        }
        if let Some(f) = &self.owner_id {
            f.push("owner_id", conditions, values);
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
            && self.stripe_id.is_none()
            && self.is_personal.is_none()
            && self.owner_id.is_none()
            && self.created_at.is_none()
            && self.updated_at.is_none()
            && logical::groups_empty(&self.and, &self.or, &self.not)
    }
}

#[derive(Debug, Clone)]
pub enum EntrepriseWhereUnique {
    Id(i64),
}

impl UniqueWhere for EntrepriseWhereUnique {
    fn condition(&self) -> (String, Vec<SqlValue>) {
        match self {
            EntrepriseWhereUnique::Id(id) => ("id = ?".to_string(), vec![SqlValue::Int(*id)]),
        }
    }
}

#[derive(Debug, Clone)]
pub struct EntrepriseCreate {
    pub name: String,
    pub address: String,
    pub stripe_id: Option<String>,
    pub is_personal: Option<bool>,
    pub owner_id: Option<i64>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl EntrepriseCreate {
    pub fn new(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
            stripe_id: None,
            is_personal: None,
            owner_id: None,
            created_at: None,
            updated_at: None,
        }
    }
}

impl CreateInput for EntrepriseCreate {
    fn columns() -> &'static [&'static str] {
        &[
            "name",
            "address",
            "stripe_id",
            "is_personal",
            "owner_id",
            "created_at",
            "updated_at",
        ]
    }

    fn values(&self) -> Vec<SqlValue> {
        let now = Utc::now();
        vec![
            self.name.clone().into(),
            self.address.clone().into(),
            self.stripe_id.clone().into(),
            self.is_personal.unwrap_or(false).into(),
            self.owner_id.into(),
            datetime_value(&self.created_at.unwrap_or(now)),
            datetime_value(&self.updated_at.unwrap_or(now)),
        ]
    }
}

#[derive(Debug, Clone, Default)]
pub struct EntrepriseUpdate {
    pub name: Option<String>,
    pub address: Option<String>,
    /// `Some(None)` clears the value
    pub stripe_id: Option<Option<String>>,
    pub is_personal: Option<bool>,
    pub owner_id: Option<Option<i64>>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl UpdateInput for EntrepriseUpdate {
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
        if let Some(v) = &self.stripe_id {
            set("stripe_id", v.clone().into());
        }
        if let Some(v) = self.is_personal {
            set("is_personal", v.into());
        }
        if let Some(v) = self.owner_id {
            set("owner_id", v.into());
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
pub struct EntrepriseInclude {
    pub users: Option<ToMany<User>>,
    pub objet_links: Option<ToMany<EntrepriseObjet>>,
}

impl IncludeLoader<Entreprise> for EntrepriseInclude {
    fn is_empty(&self) -> bool {
        self.users.is_none() && self.objet_links.is_none()
    }

    async fn load(&self, records: &mut [Entreprise], cx: &mut Conn<'_>) -> Result<()> {
        let ids = parent_ids(records, |e| e.id);
        if let Some(args) = &self.users {
            let mut grouped =
                load_to_many::<User>(cx, &ids, "entreprise_id", args, |u| u.entreprise_id).await?;
            for record in records.iter_mut() {
                record.users = Some(grouped.remove(&record.id).unwrap_or_default());
            }
        }
        if let Some(args) = &self.objet_links {
            let mut grouped =
                load_to_many::<EntrepriseObjet>(cx, &ids, "entreprise_id", args, |l| {
                    l.entreprise_id
                })
                .await?;
            for record in records.iter_mut() {
                record.objet_links = Some(grouped.remove(&record.id).unwrap_or_default());
            }
        }
        Ok(())
    }
}

impl DatabaseEntity for Entreprise {
    const TABLE_NAME: &'static str = "entreprises";

    type Field = EntrepriseField;
    type Where = EntrepriseWhere;
    type WhereUnique = EntrepriseWhereUnique;
    type Create = EntrepriseCreate;
    type Update = EntrepriseUpdate;
    type Include = EntrepriseInclude;

    fn column_names() -> &'static [&'static str] {
        &[
            "id",
            "name",
            "address",
            "stripe_id",
            "is_personal",
            "owner_id",
            "created_at",
            "updated_at",
        ]
    }
}

impl FromSqlRow for Entreprise {
    fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            address: row.try_get("address")?,
            stripe_id: row.try_get("stripe_id")?,
            is_personal: row.try_get("is_personal")?,
            owner_id: row.try_get("owner_id")?,
            created_at: datetime_from_sql(&row.try_get::<String, _>("created_at")?)?,
            updated_at: datetime_from_sql(&row.try_get::<String, _>("updated_at")?)?,
            users: None,
            objet_links: None,
        })
    }
}

impl DatabaseSchema for Entreprise {
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
                name: "stripe_id",
                sql_type: "TEXT",
                nullable: true,
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
            // Deliberately not a FOREIGN KEY: the users table references
            // entreprises, declaring the reverse edge would make table
            // creation order circular.
            ColumnDef {
                name: "owner_id",
                sql_type: "INTEGER",
                nullable: true,
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
