//! SQLite-backed durable store

use std::path::Path;

use async_sqlite::Client;
use async_sqlite::ClientBuilder;
use async_sqlite::JournalMode;
use async_sqlite::rusqlite;
use async_trait::async_trait;
use chrono::TimeZone;
use chrono::Utc;

use super::CachedValue;
use super::DurableStore;
use super::key::escape_part;
use crate::error::Error;

/// A [`DurableStore`] backed by a SQLite file.
///
/// Values persist across process restarts. Uses WAL journal mode for better
/// concurrent read performance. Timestamps are stored in milliseconds.
///
/// # Example
///
/// ```ignore
/// use backoffice_lib::cache::SqliteStore;
///
/// // File-based store
/// let store = SqliteStore::open("backoffice-cache.db").await?;
///
/// // In-memory store (for testing)
/// let store = SqliteStore::open_in_memory().await?;
/// ```
pub struct SqliteStore {
    client: Client,
}

impl SqliteStore {
    /// Opens a store at the specified path, creating the file and table if needed.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        let client = ClientBuilder::new()
            .path(path)
            .journal_mode(JournalMode::Wal)
            .open()
            .await?;

        Self::init_schema(&client).await?;

        Ok(Self { client })
    }

    /// Opens an in-memory store. Data is lost when the store is dropped.
    pub async fn open_in_memory() -> Result<Self, Error> {
        let client = ClientBuilder::new().path(":memory:").open().await?;

        Self::init_schema(&client).await?;

        Ok(Self { client })
    }

    async fn init_schema(client: &Client) -> Result<(), async_sqlite::Error> {
        client
            .conn(|conn| {
                conn.execute(
                    "CREATE TABLE IF NOT EXISTS durable_cache (
                        key TEXT PRIMARY KEY,
                        data BLOB NOT NULL,
                        created_at INTEGER NOT NULL,
                        expires_at INTEGER NOT NULL
                    )",
                    [],
                )?;
                conn.execute(
                    "CREATE INDEX IF NOT EXISTS idx_durable_cache_expires_at ON durable_cache(expires_at)",
                    [],
                )?;
                Ok(())
            })
            .await
    }

    /// Returns the number of entries (including expired ones).
    pub async fn len(&self) -> Result<usize, Error> {
        let count = self
            .client
            .conn(|conn| conn.query_row("SELECT COUNT(*) FROM durable_cache", [], |row| row.get::<_, i64>(0)))
            .await?;
        Ok(count as usize)
    }

    /// Returns `true` if the store is empty.
    pub async fn is_empty(&self) -> Result<bool, Error> {
        self.len().await.map(|len| len == 0)
    }
}

#[async_trait]
impl DurableStore for SqliteStore {
    async fn get(&self, key: &str) -> Result<Option<CachedValue>, Error> {
        let key = key.to_string();
        let now = Utc::now().timestamp_millis();

        let row = self
            .client
            .conn(move |conn| {
                let result = conn.query_row(
                    "SELECT data, created_at, expires_at FROM durable_cache WHERE key = ? AND expires_at > ?",
                    rusqlite::params![key, now],
                    |row| {
                        let data: Vec<u8> = row.get(0)?;
                        let created_at: i64 = row.get(1)?;
                        let expires_at: i64 = row.get(2)?;
                        Ok((data, created_at, expires_at))
                    },
                );
                match result {
                    Ok(row) => Ok(Some(row)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(err) => Err(err),
                }
            })
            .await?;

        Ok(row.and_then(|(data, created_at, expires_at)| {
            let created_at = Utc.timestamp_millis_opt(created_at).single()?;
            let expires_at = Utc.timestamp_millis_opt(expires_at).single()?;
            Some(CachedValue::new(data, created_at, expires_at))
        }))
    }

    async fn set(&self, key: &str, value: CachedValue) -> Result<(), Error> {
        let key = key.to_string();
        let data = value.data;
        let created_at = value.created_at.timestamp_millis();
        let expires_at = value.expires_at.timestamp_millis();

        self.client
            .conn(move |conn| {
                conn.execute(
                    "INSERT OR REPLACE INTO durable_cache (key, data, created_at, expires_at) VALUES (?, ?, ?, ?)",
                    rusqlite::params![key, data, created_at, expires_at],
                )
            })
            .await?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), Error> {
        let key = key.to_string();

        self.client
            .conn(move |conn| conn.execute("DELETE FROM durable_cache WHERE key = ?", [key]))
            .await?;
        Ok(())
    }

    async fn remove_namespace(&self, namespace: &str) -> Result<usize, Error> {
        let exact = escape_part(namespace);
        let prefix = format!("{exact}:");
        let prefix_len = prefix.chars().count() as i64;

        let removed = self
            .client
            .conn(move |conn| {
                conn.execute(
                    "DELETE FROM durable_cache WHERE key = ?1 OR substr(key, 1, ?2) = ?3",
                    rusqlite::params![exact, prefix_len, prefix],
                )
            })
            .await?;
        Ok(removed)
    }

    async fn clear(&self) -> Result<(), Error> {
        self.client
            .conn(|conn| conn.execute("DELETE FROM durable_cache", []))
            .await?;
        Ok(())
    }

    async fn gc(&self) -> Result<usize, Error> {
        let now = Utc::now().timestamp_millis();

        let removed = self
            .client
            .conn(move |conn| conn.execute("DELETE FROM durable_cache WHERE expires_at <= ?", [now]))
            .await?;
        Ok(removed)
    }
}
