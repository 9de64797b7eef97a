//! Database module for SQLite persistence
//!
//! Handles grail dataset storage with version tokens, plus per-address
//! settings.

mod grail;

pub use grail::{GrailRepository, PutOutcome, SettingsRepository, StoredGrail};

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;

use crate::error::Result;

/// Create a new database connection pool
pub async fn create_pool(database_url: &str) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
        .synchronous(sqlx::sqlite::SqliteSynchronous::Normal);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    GrailRepository::new(&pool).init().await?;
    SettingsRepository::new(&pool).init().await?;

    Ok(pool)
}
