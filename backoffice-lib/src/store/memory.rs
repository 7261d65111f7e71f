//! In-process store for tests and offline tools

use std::collections::HashMap;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::PoisonError;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::broadcast;

use super::ChangeEvent;
use super::ChangeKind;
use super::ChangeSource;
use super::ChangeStream;
use super::Direction;
use super::EventMask;
use super::Filter;
use super::RemoteStore;
use super::Rows;
use super::Select;
use super::UrlSigner;
use super::compare_values;
use super::event::table_stream;
use crate::error::ApiError;
use crate::error::Error;
use crate::model::Record;

/// Call counters, for asserting how often the remote store was reached.
#[derive(Debug, Default)]
pub struct StoreStats {
    pub selects: AtomicUsize,
    pub counts: AtomicUsize,
    pub writes: AtomicUsize,
    pub signs: AtomicUsize,
}

impl StoreStats {
    pub fn selects(&self) -> usize {
        self.selects.load(Ordering::SeqCst)
    }

    pub fn counts(&self) -> usize {
        self.counts.load(Ordering::SeqCst)
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn signs(&self) -> usize {
        self.signs.load(Ordering::SeqCst)
    }
}

/// A [`RemoteStore`], [`ChangeSource`] and [`UrlSigner`] over in-process
/// tables.
///
/// Writes broadcast change events. Failures and latency can be injected to
/// exercise the cache's failure and de-duplication paths.
///
/// Cheap to clone; clones share the same tables.
///
/// # Example
///
/// ```ignore
/// let store = InMemoryStore::new();
/// store.seed("customers", [Record::new().set("id", "c-1").set("first_name", "Jean")]);
/// let rows = store.select(&Select::from("customers")).await?;
/// ```
#[derive(Clone)]
pub struct InMemoryStore {
    inner: Arc<MemoryInner>,
}

struct MemoryInner {
    tables: Mutex<HashMap<String, Vec<Record>>>,
    events: broadcast::Sender<ChangeEvent>,
    failures: Mutex<VecDeque<Error>>,
    latency: Mutex<Option<Duration>>,
    stats: StoreStats,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(256);
        Self {
            inner: Arc::new(MemoryInner {
                tables: Mutex::new(HashMap::new()),
                events,
                failures: Mutex::new(VecDeque::new()),
                latency: Mutex::new(None),
                stats: StoreStats::default(),
            }),
        }
    }

    /// Appends rows to a table without emitting change events.
    pub fn seed(&self, table: &str, rows: impl IntoIterator<Item = Record>) {
        let mut tables = self.tables();
        tables.entry(table.to_string()).or_default().extend(rows);
    }

    /// Makes the next read or write fail with `error`.
    pub fn fail_next(&self, error: Error) {
        self.inner
            .failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(error);
    }

    /// Delays every call by `latency`.
    pub fn set_latency(&self, latency: Option<Duration>) {
        *self.inner.latency.lock().unwrap_or_else(PoisonError::into_inner) = latency;
    }

    /// Returns the call counters.
    pub fn stats(&self) -> &StoreStats {
        &self.inner.stats
    }

    /// Returns a snapshot of a table.
    pub fn rows(&self, table: &str) -> Vec<Record> {
        self.tables().get(table).cloned().unwrap_or_default()
    }

    fn tables(&self) -> std::sync::MutexGuard<'_, HashMap<String, Vec<Record>>> {
        self.inner.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn enter(&self, counter: &AtomicUsize) -> Result<(), Error> {
        counter.fetch_add(1, Ordering::SeqCst);
        let latency = *self.inner.latency.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        let failure = self
            .inner
            .failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();
        match failure {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn publish(&self, kind: ChangeKind, table: &str, row: Option<Record>) {
        // no receivers is fine
        let _ = self.inner.events.send(ChangeEvent::new(kind, table, row));
    }
}

fn position(rows: &[Record], id: &str) -> Option<usize> {
    rows.iter().position(|row| row.id().as_deref() == Some(id))
}

fn sort(rows: &mut [Record], select: &Select) {
    let Some(order) = &select.order else {
        return;
    };
    rows.sort_by(|a, b| {
        for (field, direction) in order.fields() {
            let ordering = match (a.get(field), b.get(field)) {
                (Some(a), Some(b)) => compare_values(a, b).unwrap_or(std::cmp::Ordering::Equal),
                (Some(_), None) => std::cmp::Ordering::Less,
                (None, Some(_)) => std::cmp::Ordering::Greater,
                (None, None) => std::cmp::Ordering::Equal,
            };
            let ordering = match direction {
                Direction::Asc => ordering,
                Direction::Desc => ordering.reverse(),
            };
            if ordering.is_ne() {
                return ordering;
            }
        }
        std::cmp::Ordering::Equal
    });
}

#[async_trait]
impl RemoteStore for InMemoryStore {
    async fn select(&self, select: &Select) -> Result<Rows, Error> {
        self.enter(&self.inner.stats.selects).await?;

        let mut rows: Vec<Record> = self
            .rows(&select.table)
            .into_iter()
            .filter(|row| select.filter.as_ref().is_none_or(|f| f.matches(row)))
            .collect();
        sort(&mut rows, select);

        let total = select.count.then_some(rows.len());
        let records = match select.range {
            Some((from, to)) => rows.into_iter().skip(from).take(to - from + 1).collect(),
            None => rows,
        };
        Ok(Rows { records, total })
    }

    async fn count(&self, table: &str, filter: Option<&Filter>) -> Result<usize, Error> {
        self.enter(&self.inner.stats.counts).await?;

        Ok(self
            .rows(table)
            .iter()
            .filter(|row| filter.is_none_or(|f| f.matches(row)))
            .count())
    }

    async fn insert(&self, table: &str, record: &Record) -> Result<Record, Error> {
        self.enter(&self.inner.stats.writes).await?;

        let mut row = record.clone();
        if row.id().is_none() {
            row.insert("id", uuid::Uuid::new_v4());
        }
        if !row.contains("created_at") {
            row.insert("created_at", Utc::now());
        }
        self.tables()
            .entry(table.to_string())
            .or_default()
            .push(row.clone());
        self.publish(ChangeKind::Insert, table, Some(row.clone()));
        Ok(row)
    }

    async fn update(&self, table: &str, id: &str, patch: &Record) -> Result<Record, Error> {
        self.enter(&self.inner.stats.writes).await?;

        let updated = {
            let mut tables = self.tables();
            let rows = tables.entry(table.to_string()).or_default();
            let index = position(rows, id).ok_or_else(|| Error::not_found(table, id))?;
            rows[index].merge(patch);
            rows[index].clone()
        };
        self.publish(ChangeKind::Update, table, Some(updated.clone()));
        Ok(updated)
    }

    async fn delete(&self, table: &str, id: &str) -> Result<(), Error> {
        self.enter(&self.inner.stats.writes).await?;

        let removed = {
            let mut tables = self.tables();
            let rows = tables.entry(table.to_string()).or_default();
            let index = position(rows, id).ok_or_else(|| Error::not_found(table, id))?;
            rows.remove(index)
        };
        self.publish(ChangeKind::Delete, table, Some(removed));
        Ok(())
    }
}

impl ChangeSource for InMemoryStore {
    fn subscribe(&self, table: &str, mask: EventMask) -> ChangeStream {
        table_stream(self.inner.events.subscribe(), table, mask)
    }
}

#[async_trait]
impl UrlSigner for InMemoryStore {
    async fn sign(&self, bucket: &str, path: &str, expires_in: Duration) -> Result<String, Error> {
        self.enter(&self.inner.stats.signs).await?;

        if path.is_empty() {
            return Err(Error::Api(ApiError::http(400, "object path is empty")));
        }
        let expires = Utc::now().timestamp() + expires_in.as_secs() as i64;
        Ok(format!(
            "memory://{}/{}?expires={}&token={}",
            bucket,
            path,
            expires,
            uuid::Uuid::new_v4().simple()
        ))
    }
}
