//! Database configuration module.
//!
//! Handles the `SQLite` connection of the bundled record store and creates the
//! tables from the entity definitions with `Schema::create_table_from_entity`,
//! so the schema always matches the Rust structs.

use crate::entities::{
    Employee, Encumbrance, Expense, FixedExpense, MiscPayroll, Revenue, Setting,
};
use crate::errors::Result;
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, EntityTrait, Schema};
use std::path::Path;
use tracing::info;

/// Default database location when neither the environment nor config.toml
/// names one.
pub const DEFAULT_DATABASE_URL: &str = "sqlite://data/cashflow_buddy.sqlite?mode=rwc";

/// Resolves the database URL: `DATABASE_URL` wins, then the configured
/// value, then [`DEFAULT_DATABASE_URL`].
#[must_use]
pub fn resolve_database_url(configured: Option<&str>) -> String {
    std::env::var("DATABASE_URL")
        .ok()
        .or_else(|| configured.map(str::to_string))
        .unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string())
}

/// File path of a `sqlite://` URL, without query parameters.
fn sqlite_file_path(database_url: &str) -> Option<&Path> {
    let rest = database_url.strip_prefix("sqlite://")?;
    let path = rest.split('?').next().unwrap_or(rest);
    (!path.is_empty() && !path.contains(":memory:")).then_some(Path::new(path))
}

/// Opens a connection to `database_url`, creating the directory of a
/// file-backed database first.
pub async fn create_connection(database_url: &str) -> Result<DatabaseConnection> {
    if let Some(parent) = sqlite_file_path(database_url).and_then(Path::parent) {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let db = Database::connect(database_url).await?;
    info!("Connected to record store");
    Ok(db)
}

/// Creates every table the engine uses, skipping tables that already exist.
pub async fn create_tables(db: &DatabaseConnection) -> Result<()> {
    create_table(db, Expense).await?;
    create_table(db, Revenue).await?;
    create_table(db, Employee).await?;
    create_table(db, Encumbrance).await?;
    create_table(db, MiscPayroll).await?;
    create_table(db, FixedExpense).await?;
    create_table(db, Setting).await?;
    Ok(())
}

async fn create_table<E: EntityTrait>(db: &DatabaseConnection, entity: E) -> Result<()> {
    let builder = db.get_database_backend();
    let schema = Schema::new(builder);
    let mut statement = schema.create_table_from_entity(entity);
    statement.if_not_exists();
    db.execute(builder.build(&statement)).await?;
    Ok(())
}
