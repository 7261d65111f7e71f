//! Caching layer
//!
//! Two tiers:
//!
//! - [`KeyedCache`]: the in-process, typed get-or-fetch cache every
//!   repository reads through. Collapses concurrent misses into one fetch.
//! - [`DurableStore`]: an optional byte store that keeps selected values
//!   (list totals) across restarts, each with its own TTL.

mod clock;
mod config;
mod key;
mod keyed;
mod memory;
mod sqlite;

pub use clock::*;
pub use config::*;
pub use key::*;
pub use keyed::*;
pub use memory::*;
pub use sqlite::*;

use std::time::Duration;

use async_trait::async_trait;
use chrono::DateTime;
use chrono::Utc;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::Error;

/// A durable value with metadata about when it was stored and when it expires.
#[derive(Debug, Clone)]
pub struct CachedValue {
    /// The stored data, serialized with bincode.
    pub data: Vec<u8>,
    /// When this value was stored.
    pub created_at: DateTime<Utc>,
    /// When this value expires and should no longer be returned.
    pub expires_at: DateTime<Utc>,
}

impl CachedValue {
    /// Creates a new cached value.
    pub fn new(data: Vec<u8>, created_at: DateTime<Utc>, expires_at: DateTime<Utc>) -> Self {
        Self {
            data,
            created_at,
            expires_at,
        }
    }

    /// Creates a new cached value with a TTL from now.
    pub fn with_ttl(data: Vec<u8>, ttl: Duration) -> Self {
        let now = Utc::now();
        let expires_at = now + chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::zero());
        Self {
            data,
            created_at: now,
            expires_at,
        }
    }

    /// Returns `true` if this cached value has expired.
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }
}

/// Trait for durable stores.
///
/// Implementations store and retrieve TTL-stamped bytes by string key and
/// must never return expired values from `get()`.
#[async_trait]
pub trait DurableStore: Send + Sync {
    /// Retrieves a stored value by key.
    ///
    /// Returns `None` if the key doesn't exist or the value has expired.
    async fn get(&self, key: &str) -> Result<Option<CachedValue>, Error>;

    /// Stores a value.
    async fn set(&self, key: &str, value: CachedValue) -> Result<(), Error>;

    /// Removes a value.
    async fn remove(&self, key: &str) -> Result<(), Error>;

    /// Removes every value whose key was composed under `namespace`.
    async fn remove_namespace(&self, namespace: &str) -> Result<usize, Error>;

    /// Clears all values.
    async fn clear(&self) -> Result<(), Error>;

    /// Removes all expired entries, returning how many were removed.
    async fn gc(&self) -> Result<usize, Error>;
}

/// Reads and decodes a value from a durable store.
pub async fn load<T: DeserializeOwned>(store: &dyn DurableStore, key: &str) -> Result<Option<T>, Error> {
    match store.get(key).await? {
        Some(cached) => Ok(Some(bincode::deserialize(&cached.data)?)),
        None => Ok(None),
    }
}

/// Encodes and writes a value to a durable store with the given TTL.
pub async fn save<T: Serialize>(store: &dyn DurableStore, key: &str, value: &T, ttl: Duration) -> Result<(), Error> {
    let data = bincode::serialize(value)?;
    store.set(key, CachedValue::with_ttl(data, ttl)).await
}
