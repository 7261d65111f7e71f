//! In-memory durable store, for tests and single-run tools

use async_trait::async_trait;
use dashmap::DashMap;

use super::CachedValue;
use super::DurableStore;
use super::key::in_namespace;
use crate::error::Error;

/// A [`DurableStore`] backed by a concurrent hash map.
///
/// Nothing survives the process; useful wherever a durable store is
/// required but persistence is not.
#[derive(Debug, Default)]
pub struct MemoryStore {
    store: DashMap<String, CachedValue>,
}

impl MemoryStore {
    /// Creates a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of entries (including expired ones).
    pub fn len(&self) -> usize {
        self.store.len()
    }

    /// Returns `true` if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }
}

#[async_trait]
impl DurableStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<CachedValue>, Error> {
        let Some(entry) = self.store.get(key) else {
            return Ok(None);
        };

        if entry.value().is_expired() {
            drop(entry);
            self.store.remove(key);
            Ok(None)
        } else {
            Ok(Some(entry.value().clone()))
        }
    }

    async fn set(&self, key: &str, value: CachedValue) -> Result<(), Error> {
        self.store.insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), Error> {
        self.store.remove(key);
        Ok(())
    }

    async fn remove_namespace(&self, namespace: &str) -> Result<usize, Error> {
        let before = self.store.len();
        self.store.retain(|key, _| !in_namespace(key, namespace));
        Ok(before.saturating_sub(self.store.len()))
    }

    async fn clear(&self) -> Result<(), Error> {
        self.store.clear();
        Ok(())
    }

    async fn gc(&self) -> Result<usize, Error> {
        let mut removed = 0;
        self.store.retain(|_, value| {
            if value.is_expired() {
                removed += 1;
                false
            } else {
                true
            }
        });
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::cache::load;
    use crate::cache::save;

    #[tokio::test]
    async fn test_typed_round_trip_and_expiry() {
        let store = MemoryStore::new();
        save(&store, "customers:count", &42u64, Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(load::<u64>(&store, "customers:count").await.unwrap(), Some(42));

        save(&store, "claims:count", &1u64, Duration::ZERO).await.unwrap();
        assert_eq!(load::<u64>(&store, "claims:count").await.unwrap(), None);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_remove_namespace() {
        let store = MemoryStore::new();
        for key in ["claims:a", "claims:b", "customers:a"] {
            save(&store, key, &0u64, Duration::from_secs(60)).await.unwrap();
        }
        assert_eq!(store.remove_namespace("claims").await.unwrap(), 2);
        assert_eq!(store.len(), 1);
    }
}
