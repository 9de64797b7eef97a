//! Grail dataset persistence
//!
//! SQLite storage for per-address datasets and their version tokens. Writes
//! run a compare-and-swap on the stored token inside a transaction; every
//! accepted write gets a fresh token.

use chrono::Utc;
use sqlx::SqlitePool;

use crate::error::Result;
use crate::grail::Dataset;
use crate::sync::{GrailSettings, VersionToken};

/// A dataset as held by the server.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredGrail {
    pub data: Dataset,
    pub token: VersionToken,
}

/// Result of a conditional write.
#[derive(Debug, Clone, PartialEq)]
pub enum PutOutcome {
    /// Token matched (or a fresh grail was created); the new token
    Accepted(VersionToken),
    /// Token mismatch; the current server state
    Stale(StoredGrail),
    /// The client sent a token but no record exists for this address
    Missing,
}

/// Repository for grail datasets
pub struct GrailRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> GrailRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Initialize grail tables
    pub async fn init(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS grails (
                address TEXT PRIMARY KEY,
                data TEXT NOT NULL,
                token TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            "#,
        )
        .execute(self.pool)
        .await?;

        Ok(())
    }

    /// Get the dataset and token for an address
    pub async fn get(&self, address: &str) -> Result<Option<StoredGrail>> {
        let row: Option<(String, String)> =
            sqlx::query_as("SELECT data, token FROM grails WHERE address = ?")
                .bind(address)
                .fetch_optional(self.pool)
                .await?;

        row.map(|(data, token)| {
            Ok(StoredGrail {
                data: serde_json::from_str(&data)?,
                token: VersionToken::from(token),
            })
        })
        .transpose()
    }

    /// Conditionally replace the dataset for an address.
    ///
    /// `expected` must match the stored token (or be `None` for a fresh
    /// address) for the write to be accepted. The compare-and-swap runs
    /// inside a transaction so concurrent writers cannot both win.
    pub async fn put(
        &self,
        address: &str,
        data: &Dataset,
        expected: Option<&VersionToken>,
    ) -> Result<PutOutcome> {
        let mut tx = self.pool.begin().await?;

        let current: Option<(String, String)> =
            sqlx::query_as("SELECT data, token FROM grails WHERE address = ?")
                .bind(address)
                .fetch_optional(&mut *tx)
                .await?;

        let accepted = match (&current, expected) {
            (None, None) => true,
            (Some((_, token)), Some(expected)) => token == expected.as_str(),
            _ => false,
        };

        if !accepted {
            tx.rollback().await?;
            return Ok(match current {
                Some((data, token)) => PutOutcome::Stale(StoredGrail {
                    data: serde_json::from_str(&data)?,
                    token: VersionToken::from(token),
                }),
                None => PutOutcome::Missing,
            });
        }

        let token = VersionToken::issue();
        let now = Utc::now().to_rfc3339();

        sqlx::query(
            r#"
            INSERT INTO grails (address, data, token, updated_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(address) DO UPDATE SET
                data = excluded.data,
                token = excluded.token,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(address)
        .bind(serde_json::to_string(data)?)
        .bind(token.as_str())
        .bind(&now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(PutOutcome::Accepted(token))
    }
}

/// Repository for per-address settings
pub struct SettingsRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> SettingsRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Initialize settings table
    pub async fn init(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS grail_settings (
                address TEXT PRIMARY KEY,
                use_item_count_mode INTEGER NOT NULL DEFAULT 0,
                updated_at TEXT NOT NULL
            );
            "#,
        )
        .execute(self.pool)
        .await?;

        Ok(())
    }

    /// Get settings for an address; defaults when never saved
    pub async fn get(&self, address: &str) -> Result<GrailSettings> {
        let row: Option<(i64,)> =
            sqlx::query_as("SELECT use_item_count_mode FROM grail_settings WHERE address = ?")
                .bind(address)
                .fetch_optional(self.pool)
                .await?;

        Ok(row
            .map(|(flag,)| GrailSettings {
                use_item_count_mode: flag != 0,
            })
            .unwrap_or_default())
    }

    /// Save settings for an address
    pub async fn upsert(&self, address: &str, settings: &GrailSettings) -> Result<()> {
        let now = Utc::now().to_rfc3339();

        sqlx::query(
            r#"
            INSERT INTO grail_settings (address, use_item_count_mode, updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT(address) DO UPDATE SET
                use_item_count_mode = excluded.use_item_count_mode,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(address)
        .bind(settings.use_item_count_mode as i64)
        .bind(&now)
        .execute(self.pool)
        .await?;

        Ok(())
    }
}
