//! Read-through keyed TTL cache with in-flight de-duplication

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::sync::Weak;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::time::Duration;

use chrono::DateTime;
use chrono::Utc;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures::FutureExt;
use futures::future::BoxFuture;
use futures::future::Shared;
use log::debug;
use log::info;
use log::warn;

use super::Clock;
use super::SystemClock;
use super::key::in_namespace;
use crate::error::Error;
use crate::response::Response;

type Fetched<V> = Result<(V, DateTime<Utc>), Error>;
type InFlight<V> = Shared<BoxFuture<'static, Fetched<V>>>;

enum Slot<V> {
    /// A fetch has started and not yet settled.
    Pending { generation: u64, fetch: InFlight<V> },
    /// The last successful fetch.
    Ready { value: V, fetched_at: DateTime<Utc> },
}

enum Lookup<V> {
    Hit(V, DateTime<Utc>),
    Join(InFlight<V>),
    Miss,
}

/// An explicitly constructed get-or-fetch cache for one logical domain.
///
/// Each key maps to either the value of the last successful fetch or to a
/// fetch that is still in flight. Concurrent callers for the same key share
/// one in-flight fetch; a failed fetch leaves no entry behind so the next
/// call retries.
///
/// Cloning is cheap and clones share the same store.
///
/// # Example
///
/// ```ignore
/// use std::time::Duration;
/// use backoffice_lib::cache::KeyedCache;
///
/// let cache: KeyedCache<String> = KeyedCache::new("greetings");
///
/// cache
///     .get_or_fetch("fr", Duration::from_secs(60), || async { Ok("bonjour".to_string()) })
///     .await?;
/// let second = cache
///     .get_or_fetch("fr", Duration::from_secs(60), || async { Ok("salut".to_string()) })
///     .await?;
///
/// assert_eq!(second.data(), "bonjour");
/// assert!(second.is_cached());
/// ```
pub struct KeyedCache<V> {
    inner: Arc<Inner<V>>,
}

struct Inner<V> {
    name: String,
    slots: DashMap<String, Slot<V>>,
    clock: Arc<dyn Clock>,
    timeout: Option<Duration>,
    generation: AtomicU64,
}

impl<V> Clone for KeyedCache<V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<V> fmt::Debug for KeyedCache<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyedCache")
            .field("name", &self.inner.name)
            .field("entries", &self.inner.slots.len())
            .field("timeout", &self.inner.timeout)
            .finish()
    }
}

impl<V> KeyedCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Creates an empty cache on the system clock with no fetch timeout.
    ///
    /// `name` identifies the cache in log output.
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_parts(name.into(), Arc::new(SystemClock), None)
    }

    /// Creates an empty cache with an explicit clock and fetch timeout.
    pub fn with_parts(name: String, clock: Arc<dyn Clock>, timeout: Option<Duration>) -> Self {
        Self {
            inner: Arc::new(Inner {
                name,
                slots: DashMap::new(),
                clock,
                timeout,
                generation: AtomicU64::new(0),
            }),
        }
    }

    /// Returns the cache's name.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Returns the cached value for `key` if it is younger than `ttl`,
    /// otherwise fetches it.
    ///
    /// - A fetch already in flight for `key` is joined rather than duplicated,
    ///   whatever `ttl` is.
    /// - `ttl == 0` never serves a stored value.
    /// - The pending fetch is stored before it is awaited; on success it is
    ///   replaced by the value, on failure (including timeout) the entry is
    ///   removed and every joined caller receives the same error.
    ///
    /// `fetch` is invoked at most once, while the key's slot is locked. It
    /// must only build the future and must not touch this cache itself.
    pub async fn get_or_fetch<K, F, Fut>(&self, key: K, ttl: Duration, fetch: F) -> Result<Response<V>, Error>
    where
        K: AsRef<str>,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, Error>> + Send + 'static,
    {
        let key = key.as_ref();
        if key.is_empty() {
            return Err(Error::InvalidKey(key.to_string()));
        }

        let now = self.inner.clock.now();
        let (in_flight, leader) = match self.inner.slots.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                let lookup = match occupied.get() {
                    Slot::Ready { value, fetched_at } if is_fresh(*fetched_at, now, ttl) => {
                        Lookup::Hit(value.clone(), *fetched_at)
                    }
                    Slot::Pending { fetch, .. } => Lookup::Join(fetch.clone()),
                    Slot::Ready { .. } => Lookup::Miss,
                };

                match lookup {
                    Lookup::Hit(value, fetched_at) => {
                        debug!("{}: hit {}", self.inner.name, key);
                        return Ok(Response::cache_hit(value, fetched_at, expiry(fetched_at, ttl)));
                    }
                    Lookup::Join(in_flight) => {
                        debug!("{}: joining in-flight fetch for {}", self.inner.name, key);
                        (in_flight, false)
                    }
                    Lookup::Miss => {
                        debug!("{}: stale {}, refetching", self.inner.name, key);
                        let (generation, in_flight) = self.launch(key, fetch);
                        occupied.insert(Slot::Pending {
                            generation,
                            fetch: in_flight.clone(),
                        });
                        (in_flight, true)
                    }
                }
            }
            Entry::Vacant(vacant) => {
                debug!("{}: miss {}", self.inner.name, key);
                let (generation, in_flight) = self.launch(key, fetch);
                vacant.insert(Slot::Pending {
                    generation,
                    fetch: in_flight.clone(),
                });
                (in_flight, true)
            }
        };

        let (value, fetched_at) = in_flight.await?;
        let expires_at = expiry(fetched_at, ttl);
        Ok(if leader {
            Response::cache_miss(value, fetched_at, expires_at)
        } else {
            Response::cache_joined(value, fetched_at, expires_at)
        })
    }

    /// Wraps `fetch` into a shareable future that settles its own slot, so
    /// the store is updated even if the caller that started it is dropped.
    fn launch<F, Fut>(&self, key: &str, fetch: F) -> (u64, InFlight<V>)
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, Error>> + Send + 'static,
    {
        let generation = self.inner.generation.fetch_add(1, Ordering::Relaxed) + 1;
        let store: Weak<Inner<V>> = Arc::downgrade(&self.inner);
        let timeout = self.inner.timeout;
        let key = key.to_string();
        let pending = fetch();

        let in_flight = async move {
            let outcome = match timeout {
                Some(limit) => match tokio::time::timeout(limit, pending).await {
                    Ok(result) => result,
                    Err(_) => Err(Error::Timeout(limit)),
                },
                None => pending.await,
            };

            match store.upgrade() {
                Some(inner) => inner.settle(&key, generation, outcome),
                None => outcome.map(|value| (value, Utc::now())),
            }
        }
        .boxed()
        .shared();

        (generation, in_flight)
    }

    /// Removes the entry for `key`, forcing the next access to refetch.
    ///
    /// A fetch in flight for `key` still completes for its callers, but its
    /// result is not stored. Returns `true` if an entry was removed.
    pub fn invalidate(&self, key: impl AsRef<str>) -> bool {
        let key = key.as_ref();
        let removed = self.inner.slots.remove(key).is_some();
        if removed {
            debug!("{}: invalidated {}", self.inner.name, key);
        }
        removed
    }

    /// Removes every key composed under `namespace`.
    ///
    /// Returns the number of entries removed.
    pub fn invalidate_namespace(&self, namespace: &str) -> usize {
        let before = self.inner.slots.len();
        self.inner.slots.retain(|key, _| !in_namespace(key, namespace));
        let removed = before.saturating_sub(self.inner.slots.len());
        if removed > 0 {
            info!("{}: invalidated {} entries under {}", self.inner.name, removed, namespace);
        }
        removed
    }

    /// Clears the whole cache.
    pub fn invalidate_all(&self) {
        let removed = self.inner.slots.len();
        self.inner.slots.clear();
        info!("{}: cleared {} entries", self.inner.name, removed);
    }

    /// Drops the stored value for `key` but leaves an in-flight fetch alone,
    /// so the next caller joins it instead of starting another.
    ///
    /// Returns `true` if a stored value was dropped.
    pub fn expire(&self, key: impl AsRef<str>) -> bool {
        let key = key.as_ref();
        let expired = self.inner.slots.remove_if(key, |_, slot| is_ready(slot)).is_some();
        if expired {
            debug!("{}: expired {}", self.inner.name, key);
        }
        expired
    }

    /// Drops the stored values under `namespace`, keeping in-flight fetches.
    ///
    /// Returns the number of values dropped.
    pub fn expire_namespace(&self, namespace: &str) -> usize {
        let before = self.inner.slots.len();
        self.inner
            .slots
            .retain(|key, slot| !(is_ready(slot) && in_namespace(key, namespace)));
        let expired = before.saturating_sub(self.inner.slots.len());
        if expired > 0 {
            debug!("{}: expired {} entries under {}", self.inner.name, expired, namespace);
        }
        expired
    }

    /// Drops every stored value, keeping in-flight fetches.
    pub fn expire_all(&self) {
        let before = self.inner.slots.len();
        self.inner.slots.retain(|_, slot| !is_ready(slot));
        debug!(
            "{}: expired {} entries",
            self.inner.name,
            before.saturating_sub(self.inner.slots.len())
        );
    }

    /// Returns the stored value and its fetch time, ignoring TTL.
    ///
    /// Returns `None` while a fetch is in flight.
    pub fn peek(&self, key: impl AsRef<str>) -> Option<(V, DateTime<Utc>)> {
        match self.inner.slots.get(key.as_ref())?.value() {
            Slot::Ready { value, fetched_at } => Some((value.clone(), *fetched_at)),
            Slot::Pending { .. } => None,
        }
    }

    /// Returns `true` if a fetch for `key` is in flight.
    pub fn is_pending(&self, key: impl AsRef<str>) -> bool {
        self.inner
            .slots
            .get(key.as_ref())
            .is_some_and(|slot| matches!(slot.value(), Slot::Pending { .. }))
    }

    /// Returns the number of entries, stale and pending ones included.
    pub fn len(&self) -> usize {
        self.inner.slots.len()
    }

    /// Returns `true` if the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.inner.slots.is_empty()
    }
}

impl<V> Inner<V>
where
    V: Clone,
{
    /// Records the outcome of fetch `generation` for `key`.
    ///
    /// Only touches the slot if it still holds that same pending fetch, so an
    /// invalidation or a newer fetch always wins over a late result.
    fn settle(&self, key: &str, generation: u64, outcome: Result<V, Error>) -> Fetched<V> {
        let fetched_at = self.clock.now();
        match outcome {
            Ok(value) => {
                if let Some(mut slot) = self.slots.get_mut(key) {
                    if is_generation(&slot, generation) {
                        *slot = Slot::Ready {
                            value: value.clone(),
                            fetched_at,
                        };
                    }
                }
                Ok((value, fetched_at))
            }
            Err(err) => {
                self.slots
                    .remove_if(key, |_, slot| is_generation(slot, generation));
                warn!("{}: fetch for {} failed: {}", self.name, key, err);
                Err(err)
            }
        }
    }
}

fn is_generation<V>(slot: &Slot<V>, expected: u64) -> bool {
    matches!(slot, Slot::Pending { generation, .. } if *generation == expected)
}

fn is_ready<V>(slot: &Slot<V>) -> bool {
    matches!(slot, Slot::Ready { .. })
}

fn is_fresh(fetched_at: DateTime<Utc>, now: DateTime<Utc>, ttl: Duration) -> bool {
    if ttl.is_zero() {
        return false;
    }
    match chrono::Duration::from_std(ttl) {
        Ok(ttl) => now - fetched_at < ttl,
        // beyond chrono's range: never expires
        Err(_) => true,
    }
}

fn expiry(fetched_at: DateTime<Utc>, ttl: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(ttl)
        .ok()
        .and_then(|ttl| fetched_at.checked_add_signed(ttl))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}
