//! Account: a federated credential-provider link for a user, unique per
//! (provider, provider_account_id).

use serde::Serialize;
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use crate::orm::filters::logical;
use crate::orm::include::NoInclude;
use crate::orm::traits::{
    ColumnDef, CreateInput, DatabaseEntity, DatabaseFilter, DatabaseSchema, FieldSet, FromSqlRow,
    IndexDef, SqlValue, UniqueWhere, UpdateInput,
};
use crate::orm::{IntFilter, StringFilter};

#[derive(Debug, Clone, Serialize)]
pub struct Account {
    pub id: i64,
    pub user_id: i64,
    #[serde(rename = "type")]
    pub account_type: String,
    pub provider: String,
    pub provider_account_id: String,
    pub refresh_token: Option<String>,
    pub access_token: Option<String>,
    /// Unix epoch seconds, as issued by the provider
    pub expires_at: Option<i64>,
    pub token_type: Option<String>,
    pub scope: Option<String>,
    pub id_token: Option<String>,
    pub session_state: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountField {
    Id,
    UserId,
    Type,
    Provider,
    ProviderAccountId,
    RefreshToken,
    AccessToken,
    ExpiresAt,
    TokenType,
    Scope,
    IdToken,
    SessionState,
}

impl FieldSet for AccountField {
    fn column(&self) -> &'static str {
        match self {
            AccountField::Id => "id",
            AccountField::UserId => "user_id",
            AccountField::Type => "type",
            AccountField::Provider => "provider",
            AccountField::ProviderAccountId => "provider_account_id",
            AccountField::RefreshToken => "refresh_token",
            AccountField::AccessToken => "access_token",
            AccountField::ExpiresAt => "expires_at",
            AccountField::TokenType => "token_type",
            AccountField::Scope => "scope",
            AccountField::IdToken => "id_token",
            AccountField::SessionState => "session_state",
        }
    }

    fn is_numeric(&self) -> bool {
        matches!(
            self,
            AccountField::Id | AccountField::UserId | AccountField::ExpiresAt
        )
    }

    fn all() -> &'static [Self] {
        &[
            AccountField::Id,
            AccountField::UserId,
            AccountField::Type,
            AccountField::Provider,
            AccountField::ProviderAccountId,
            AccountField::RefreshToken,
            AccountField::AccessToken,
            AccountField::ExpiresAt,
            AccountField::TokenType,
            AccountField::Scope,
            AccountField::IdToken,
            AccountField::SessionState,
        ]
    }
}

#[derive(Debug, Clone, Default)]
pub struct AccountWhere {
    pub id: Option<IntFilter>,
    pub user_id: Option<IntFilter>,
    pub account_type: Option<StringFilter>,
    pub provider: Option<StringFilter>,
    pub provider_account_id: Option<StringFilter>,
    pub expires_at: Option<IntFilter>,
    pub scope: Option<StringFilter>,
    pub and: Vec<AccountWhere>,
    pub or: Vec<AccountWhere>,
    pub not: Vec<AccountWhere>,
}

impl DatabaseFilter for AccountWhere {
    fn push_conditions(&self, conditions: &mut Vec<String>, values: &mut Vec<SqlValue>) {
        if let Some(f) = &self.id {
            f.push("id", conditions, values);
        }
        if let Some(f) = &self.user_id {
            f.push("user_id", conditions, values);
        }
        if let Some(f) = &self.account_type {
            f.push("type", conditions, values);
        }
        if let Some(f) = &self.provider {
            f.push("provider", conditions, values);
        }
        if let Some(f) = &self.provider_account_id {
            f.push("provider_account_id", conditions, values);
        }
        if let Some(f) = &self.expires_at {
            f.push("expires_at", conditions, values);
        }
        if let Some(f) = &self.scope {
            f.push("scope", conditions, values);
        }
        logical::push_groups(&self.and, &self.or, &self.not, conditions, values);
    }

    fn is_empty(&self) -> bool {
        self.id.is_none()
            && self.user_id.is_none()
            && self.account_type.is_none()
            && self.provider.is_none()
            && self.provider_account_id.is_none()
            && self.expires_at.is_none()
            && self.scope.is_none()
            && logical::groups_empty(&self.and, &self.or, &self.not)
    }
}

#[derive(Debug, Clone)]
pub enum AccountWhereUnique {
    Id(i64),
    ProviderProviderAccountId(String, String),
}

impl UniqueWhere for AccountWhereUnique {
    fn condition(&self) -> (String, Vec<SqlValue>) {
        match self {
            AccountWhereUnique::Id(id) => ("id = ?".to_string(), vec![SqlValue::Int(*id)]),
            AccountWhereUnique::ProviderProviderAccountId(provider, provider_account_id) => (
                "provider = ? AND provider_account_id = ?".to_string(),
                vec![
                    SqlValue::Text(provider.clone()),
                    SqlValue::Text(provider_account_id.clone()),
                ],
            ),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AccountCreate {
    pub user_id: i64,
    pub account_type: String,
    pub provider: String,
    pub provider_account_id: String,
    pub refresh_token: Option<String>,
    pub access_token: Option<String>,
    pub expires_at: Option<i64>,
    pub token_type: Option<String>,
    pub scope: Option<String>,
    pub id_token: Option<String>,
    pub session_state: Option<String>,
}

impl AccountCreate {
    pub fn new(
        user_id: i64,
        account_type: impl Into<String>,
        provider: impl Into<String>,
        provider_account_id: impl Into<String>,
    ) -> Self {
        Self {
            user_id,
            account_type: account_type.into(),
            provider: provider.into(),
            provider_account_id: provider_account_id.into(),
            refresh_token: None,
            access_token: None,
            expires_at: None,
            token_type: None,
            scope: None,
            id_token: None,
            session_state: None,
        }
    }
}

impl CreateInput for AccountCreate {
    fn columns() -> &'static [&'static str] {
        &[
            "user_id",
            "type",
            "provider",
            "provider_account_id",
            "refresh_token",
            "access_token",
            "expires_at",
            "token_type",
            "scope",
            "id_token",
            "session_state",
        ]
    }

    fn values(&self) -> Vec<SqlValue> {
        vec![
            self.user_id.into(),
            self.account_type.clone().into(),
            self.provider.clone().into(),
            self.provider_account_id.clone().into(),
            self.refresh_token.clone().into(),
            self.access_token.clone().into(),
            self.expires_at.into(),
            self.token_type.clone().into(),
            self.scope.clone().into(),
            self.id_token.clone().into(),
            self.session_state.clone().into(),
        ]
    }
}

#[derive(Debug, Clone, Default)]
pub struct AccountUpdate {
    pub user_id: Option<i64>,
    pub account_type: Option<String>,
    pub provider: Option<String>,
    pub provider_account_id: Option<String>,
    pub refresh_token: Option<Option<String>>,
    pub access_token: Option<Option<String>>,
    pub expires_at: Option<Option<i64>>,
    pub token_type: Option<Option<String>>,
    pub scope: Option<Option<String>>,
    pub id_token: Option<Option<String>>,
    pub session_state: Option<Option<String>>,
}

impl UpdateInput for AccountUpdate {
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
        if let Some(v) = &self.account_type {
            set("type", v.clone().into());
        }
        if let Some(v) = &self.provider {
            set("provider", v.clone().into());
        }
        if let Some(v) = &self.provider_account_id {
            set("provider_account_id", v.clone().into());
        }
        if let Some(v) = &self.refresh_token {
            set("refresh_token", v.clone().into());
        }
        if let Some(v) = &self.access_token {
            set("access_token", v.clone().into());
        }
        if let Some(v) = self.expires_at {
            set("expires_at", v.into());
        }
        if let Some(v) = &self.token_type {
            set("token_type", v.clone().into());
        }
        if let Some(v) = &self.scope {
            set("scope", v.clone().into());
        }
        if let Some(v) = &self.id_token {
            set("id_token", v.clone().into());
        }
        if let Some(v) = &self.session_state {
            set("session_state", v.clone().into());
        }
        (fragments, values)
    }
}

impl DatabaseEntity for Account {
    const TABLE_NAME: &'static str = "accounts";
    const HAS_UPDATED_AT: bool = false;

    type Field = AccountField;
    type Where = AccountWhere;
    type WhereUnique = AccountWhereUnique;
    type Create = AccountCreate;
    type Update = AccountUpdate;
    type Include = NoInclude;

    fn column_names() -> &'static [&'static str] {
        &[
            "id",
            "user_id",
            "type",
            "provider",
            "provider_account_id",
            "refresh_token",
            "access_token",
            "expires_at",
            "token_type",
            "scope",
            "id_token",
            "session_state",
        ]
    }
}

impl FromSqlRow for Account {
    fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            account_type: row.try_get("type")?,
            provider: row.try_get("provider")?,
            provider_account_id: row.try_get("provider_account_id")?,
            refresh_token: row.try_get("refresh_token")?,
            access_token: row.try_get("access_token")?,
            expires_at: row.try_get("expires_at")?,
            token_type: row.try_get("token_type")?,
            scope: row.try_get("scope")?,
            id_token: row.try_get("id_token")?,
            session_state: row.try_get("session_state")?,
        })
    }
}

impl DatabaseSchema for Account {
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
                name: "type",
                sql_type: "TEXT",
                nullable: false,
                is_primary_key: false,
                references: None,
            },
            ColumnDef {
                name: "provider",
                sql_type: "TEXT",
                nullable: false,
                is_primary_key: false,
                references: None,
            },
            ColumnDef {
                name: "provider_account_id",
                sql_type: "TEXT",
                nullable: false,
                is_primary_key: false,
                references: None,
            },
            ColumnDef {
                name: "refresh_token",
                sql_type: "TEXT",
                nullable: true,
                is_primary_key: false,
                references: None,
            },
            ColumnDef {
                name: "access_token",
                sql_type: "TEXT",
                nullable: true,
                is_primary_key: false,
                references: None,
            },
            ColumnDef {
                name: "expires_at",
                sql_type: "INTEGER",
                nullable: true,
                is_primary_key: false,
                references: None,
            },
            ColumnDef {
                name: "token_type",
                sql_type: "TEXT",
                nullable: true,
                is_primary_key: false,
                references: None,
            },
            ColumnDef {
                name: "scope",
                sql_type: "TEXT",
                nullable: true,
                is_primary_key: false,
                references: None,
            },
            ColumnDef {
                name: "id_token",
                sql_type: "TEXT",
                nullable: true,
                is_primary_key: false,
                references: None,
            },
            ColumnDef {
                name: "session_state",
                sql_type: "TEXT",
                nullable: true,
                is_primary_key: false,
                references: None,
            },
        ]
    }

    fn unique_indexes() -> &'static [IndexDef] {
        &[IndexDef {
            name: "accounts_provider_provider_account_id_key",
            columns: &["provider", "provider_account_id"],
        }]
    }
}
