//! Database module for local persistence.
//!
//! A single SQLite file is the durable owner of all site content. Content lives
//! in the `kv` table; sticky local markers (the forced-local flag) live in
//! `local_flags` so that clearing content does not depend on them.

pub mod keys;
mod kv;
mod memory;

pub use kv::*;
pub use memory::MemoryKvStore;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;

/// Table holding site content.
pub const DATA_TABLE: &str = "kv";
/// Table holding local markers.
pub const FLAGS_TABLE: &str = "local_flags";

/// Initialize the database connection pool and run migrations.
pub async fn init_database(db_path: &Path) -> Result<SqlitePool, sqlx::Error> {
    // Ensure the parent directory exists
    if let Some(parent) = db_path.parent() {
        tokio::fs::create_dir_all(parent).await.ok();
    }

    let db_url = format!("sqlite:{}?mode=rwc", db_path.display());

    let options = SqliteConnectOptions::from_str(&db_url)?
        .create_if_missing(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
        .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
        .busy_timeout(std::time::Duration::from_secs(30));

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    // Run embedded migrations
    run_migrations(&pool).await?;

    Ok(pool)
}

/// Run database migrations.
async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    for table in [DATA_TABLE, FLAGS_TABLE] {
        let ddl = format!(
            r#"
            CREATE TABLE IF NOT EXISTS {table} (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            "#
        );
        sqlx::query(&ddl).execute(pool).await?;
    }

    Ok(())
}
