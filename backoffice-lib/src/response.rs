//! Response wrapper with cache status

use chrono::DateTime;
use chrono::Utc;

/// A value returned by a cached fetch, together with where it came from.
///
/// Every read that goes through a [`KeyedCache`](crate::cache::KeyedCache)
/// returns this wrapper so callers (and logs) can tell a cache hit from a
/// fresh fetch or from a fetch started by another caller.
///
/// # Example
///
/// ```ignore
/// let response = backoffice.customers().get("c-1").await?;
///
/// if response.is_cached() {
///     println!("served from cache, fetched at {:?}", response.cached_at());
/// }
///
/// let record = response.into_inner();
/// ```
#[derive(Debug, Clone)]
pub struct Response<T> {
    data: T,
    /// How the value was obtained.
    pub cache: CacheStatus,
    /// Fetch and expiry times; `None` when no cache was involved.
    pub freshness: Option<Freshness>,
}

impl<T> Response<T> {
    /// Wraps a value that did not go through a cache.
    pub fn new(data: T) -> Self {
        Self {
            data,
            cache: CacheStatus::None,
            freshness: None,
        }
    }

    fn cached(data: T, cache: CacheStatus, fetched_at: DateTime<Utc>, expires_at: DateTime<Utc>) -> Self {
        Self {
            data,
            cache,
            freshness: Some(Freshness {
                fetched_at,
                expires_at,
            }),
        }
    }

    /// This caller fetched the value.
    pub fn cache_miss(data: T, fetched_at: DateTime<Utc>, expires_at: DateTime<Utc>) -> Self {
        Self::cached(data, CacheStatus::Miss, fetched_at, expires_at)
    }

    /// Another caller's fetch was in flight and this caller awaited it.
    pub fn cache_joined(data: T, fetched_at: DateTime<Utc>, expires_at: DateTime<Utc>) -> Self {
        Self::cached(data, CacheStatus::Joined, fetched_at, expires_at)
    }

    /// The value was stored and still fresh.
    pub fn cache_hit(data: T, fetched_at: DateTime<Utc>, expires_at: DateTime<Utc>) -> Self {
        Self::cached(data, CacheStatus::Hit, fetched_at, expires_at)
    }

    /// Returns `true` if the remote store was not asked for this value.
    pub fn is_cached(&self) -> bool {
        self.cache.is_hit()
    }

    pub fn cached_at(&self) -> Option<DateTime<Utc>> {
        self.freshness.map(|f| f.fetched_at)
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.freshness.map(|f| f.expires_at)
    }

    /// Time since the value was fetched, as of `now`.
    pub fn age(&self, now: DateTime<Utc>) -> Option<chrono::Duration> {
        self.freshness.map(|f| f.age(now))
    }

    pub fn data(&self) -> &T {
        &self.data
    }

    pub fn into_inner(self) -> T {
        self.data
    }

    /// Transforms the value, keeping the cache metadata.
    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Response<U> {
        Response {
            data: f(self.data),
            cache: self.cache,
            freshness: self.freshness,
        }
    }
}

/// Where a response's value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    /// No cache in the path.
    None,
    /// Fetched by this caller and stored.
    Miss,
    /// Shared another caller's in-flight fetch.
    Joined,
    /// Served from the cache.
    Hit,
}

impl CacheStatus {
    pub fn is_hit(&self) -> bool {
        matches!(self, Self::Hit)
    }

    pub fn is_miss(&self) -> bool {
        matches!(self, Self::Miss)
    }

    pub fn is_joined(&self) -> bool {
        matches!(self, Self::Joined)
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }
}

/// When a cached value was fetched and when it stops being served.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Freshness {
    pub fetched_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Freshness {
    pub fn age(&self, now: DateTime<Utc>) -> chrono::Duration {
        now - self.fetched_at
    }

    /// Time left before expiry, zero once expired.
    pub fn remaining(&self, now: DateTime<Utc>) -> chrono::Duration {
        (self.expires_at - now).max(chrono::Duration::zero())
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn test_hit_keeps_metadata_through_map() {
        let fetched = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let expires = Utc.with_ymd_and_hms(2024, 1, 1, 12, 5, 0).unwrap();
        let response = Response::cache_hit(3usize, fetched, expires).map(|n| n * 2);

        assert!(response.is_cached());
        assert_eq!(*response.data(), 6);
        assert_eq!(response.cached_at(), Some(fetched));

        let now = Utc.with_ymd_and_hms(2024, 1, 1, 12, 4, 0).unwrap();
        assert_eq!(response.age(now), Some(chrono::Duration::minutes(4)));
        assert_eq!(response.freshness.unwrap().remaining(now), chrono::Duration::minutes(1));
    }

    #[test]
    fn test_uncached_response() {
        let response = Response::new("x");
        assert!(response.cache.is_none());
        assert_eq!(response.expires_at(), None);
        assert!(!response.is_cached());
    }
}
