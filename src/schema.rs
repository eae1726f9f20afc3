//! Schema synchronization from entity definitions.
//!
//! On connect, every entity table is compared to the live database:
//! missing tables are created from the entity's column definitions and
//! missing columns are added. Column renames and type changes are not
//! handled. Unique indexes are created with IF NOT EXISTS, so declared
//! uniqueness is enforced even on pre-existing tables.

use sqlx::SqlitePool;
use tracing::{debug, info, warn};

use crate::entities::{
    Account, Article, Attachment, Entreprise, EntrepriseObjet, Objet, Secteur, Session, Task,
    User, UserPermission, VerificationToken,
};
use crate::orm::traits::{ColumnDef, DatabaseSchema};

/// Result of a schema sync operation.
#[derive(Debug, Default)]
pub struct SchemaSyncResult {
    pub tables_created: Vec<String>,
    pub columns_added: Vec<(String, String)>,
    pub errors: Vec<String>,
}

impl SchemaSyncResult {
    fn merge(&mut self, other: SchemaSyncResult) {
        self.tables_created.extend(other.tables_created);
        self.columns_added.extend(other.columns_added);
        self.errors.extend(other.errors);
    }
}

async fn table_exists(pool: &SqlitePool, table_name: &str) -> Result<bool, sqlx::Error> {
    let result: Option<(String,)> =
        sqlx::query_as("SELECT name FROM sqlite_master WHERE type='table' AND name = ?")
            .bind(table_name)
            .fetch_optional(pool)
            .await?;
    Ok(result.is_some())
}

async fn get_table_columns(
    pool: &SqlitePool,
    table_name: &str,
) -> Result<Vec<String>, sqlx::Error> {
    let rows: Vec<(i32, String, String, i32, Option<String>, i32)> =
        sqlx::query_as(&format!("PRAGMA table_info({table_name})"))
            .fetch_all(pool)
            .await?;
    Ok(rows.into_iter().map(|(_, name, _, _, _, _)| name).collect())
}

/// ALTER TABLE ADD COLUMN, respecting SQLite's restriction that NOT NULL
/// columns need a default.
fn generate_add_column_sql(table_name: &str, col: &ColumnDef) -> String {
    let mut sql = format!(
        "ALTER TABLE {} ADD COLUMN {} {}",
        table_name, col.name, col.sql_type
    );
    if !col.nullable {
        let default_val = match col.sql_type {
            "INTEGER" => "0",
            "REAL" => "0.0",
            _ => "''",
        };
        sql.push_str(&format!(" NOT NULL DEFAULT {default_val}"));
    }
    sql
}

/// Sync a single entity's table and unique indexes.
pub async fn sync_entity<E: DatabaseSchema>(
    pool: &SqlitePool,
) -> Result<SchemaSyncResult, sqlx::Error> {
    let mut result = SchemaSyncResult::default();
    let table_name = E::TABLE_NAME;

    if !table_exists(pool, table_name).await? {
        let create_sql = E::create_table_sql();
        debug!("Creating table {}: {}", table_name, create_sql);
        match sqlx::query(&create_sql).execute(pool).await {
            Ok(_) => {
                info!("Created table: {}", table_name);
                result.tables_created.push(table_name.to_string());
            }
            Err(e) => {
                let msg = format!("Failed to create table {table_name}: {e}");
                warn!("{}", msg);
                result.errors.push(msg);
            }
        }
    } else {
        let existing_columns = get_table_columns(pool, table_name).await?;
        for col_def in E::columns() {
            if !existing_columns.iter().any(|c| c == col_def.name) {
                let alter_sql = generate_add_column_sql(table_name, col_def);
                debug!("Adding column to {}: {}", table_name, alter_sql);
                match sqlx::query(&alter_sql).execute(pool).await {
                    Ok(_) => {
                        info!("Added column {}.{}", table_name, col_def.name);
                        result
                            .columns_added
                            .push((table_name.to_string(), col_def.name.to_string()));
                    }
                    Err(e) => {
                        let msg =
                            format!("Failed to add column {}.{}: {}", table_name, col_def.name, e);
                        warn!("{}", msg);
                        result.errors.push(msg);
                    }
                }
            }
        }
    }

    for index in E::unique_indexes() {
        let index_sql = index.to_sql(table_name);
        if let Err(e) = sqlx::query(&index_sql).execute(pool).await {
            let msg = format!("Failed to create index {}: {}", index.name, e);
            warn!("{}", msg);
            result.errors.push(msg);
        }
    }

    Ok(result)
}

/// Sync all entity tables, in FK dependency order so table-level FOREIGN
/// KEY clauses always reference an existing table.
pub async fn sync_all(pool: &SqlitePool) -> Result<SchemaSyncResult, sqlx::Error> {
    let mut result = SchemaSyncResult::default();
    result.merge(sync_entity::<Entreprise>(pool).await?);
    result.merge(sync_entity::<User>(pool).await?);
    result.merge(sync_entity::<Objet>(pool).await?);
    result.merge(sync_entity::<EntrepriseObjet>(pool).await?);
    result.merge(sync_entity::<UserPermission>(pool).await?);
    result.merge(sync_entity::<Secteur>(pool).await?);
    result.merge(sync_entity::<Article>(pool).await?);
    result.merge(sync_entity::<Task>(pool).await?);
    result.merge(sync_entity::<Attachment>(pool).await?);
    result.merge(sync_entity::<Account>(pool).await?);
    result.merge(sync_entity::<Session>(pool).await?);
    result.merge(sync_entity::<VerificationToken>(pool).await?);

    if !result.tables_created.is_empty() || !result.columns_added.is_empty() {
        info!(
            "Schema sync: {} tables created, {} columns added",
            result.tables_created.len(),
            result.columns_added.len()
        );
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orm::traits::DatabaseEntity;

    #[test]
    fn create_table_sql_carries_fk_clauses() {
        let sql = Secteur::create_table_sql();
        assert!(sql.starts_with("CREATE TABLE IF NOT EXISTS secteurs"));
        assert!(sql.contains("FOREIGN KEY (objet_id) REFERENCES objets (id)"));
        assert!(sql.contains("FOREIGN KEY (user_id) REFERENCES users (id)"));
    }

    #[test]
    fn verification_tokens_have_no_rowid_surrogate() {
        let sql = VerificationToken::create_table_sql();
        assert!(!sql.contains("AUTOINCREMENT"));
        assert_eq!(VerificationToken::PRIMARY_KEY, "token");
    }
}
