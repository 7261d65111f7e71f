//! Cached list fetches

use std::sync::Arc;

use log::debug;
use log::warn;

use super::ListPage;
use super::ListQuery;
use crate::cache;
use crate::cache::CacheConfig;
use crate::cache::DurableStore;
use crate::cache::KeyedCache;
use crate::error::Error;
use crate::model::Record;
use crate::response::Response;
use crate::store::Filter;
use crate::store::OrderBy;
use crate::store::RemoteStore;
use crate::store::Select;

/// How one table is listed: which columns free-text search looks at, which
/// column holds the status, and the default ordering.
#[derive(Debug, Clone, PartialEq)]
pub struct ListSpec {
    pub table: String,
    pub search_fields: Vec<String>,
    pub status_field: Option<String>,
    pub order: Option<OrderBy>,
}

impl ListSpec {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            search_fields: Vec::new(),
            status_field: None,
            order: None,
        }
    }

    pub fn search_fields(mut self, fields: &[&str]) -> Self {
        self.search_fields = fields.iter().map(|f| f.to_string()).collect();
        self
    }

    pub fn status_field(mut self, field: impl Into<String>) -> Self {
        self.status_field = Some(field.into());
        self
    }

    pub fn order(mut self, order: OrderBy) -> Self {
        self.order = Some(order);
        self
    }

    /// Builds the row filter for `query`: the search filter ANDed with the
    /// status filter.
    pub fn filter(&self, query: &ListQuery) -> Result<Option<Filter>, Error> {
        let search = query.search_term().to_filter(&self.search_fields);
        let status = match (query.status(), &self.status_field) {
            (None, _) => None,
            (Some(status), Some(field)) => Some(Filter::eq(field.as_str(), status)),
            (Some(_), None) => {
                return Err(Error::InvalidQuery(format!(
                    "{} cannot be filtered by status",
                    self.table
                )));
            }
        };
        Ok(Filter::both(search, status))
    }
}

/// Fetches list pages through two caches: one for page data, one for totals.
///
/// The total is fetched with its own query and TTL, so paging through a
/// list costs one count. Totals can additionally be persisted to a
/// [`DurableStore`], which is read before the remote store is asked.
#[derive(Clone)]
pub struct Lister {
    store: Arc<dyn RemoteStore>,
    pages: KeyedCache<Vec<Record>>,
    counts: KeyedCache<usize>,
    durable: Option<Arc<dyn DurableStore>>,
    config: CacheConfig,
}

impl Lister {
    pub fn new(
        store: Arc<dyn RemoteStore>,
        pages: KeyedCache<Vec<Record>>,
        counts: KeyedCache<usize>,
        config: CacheConfig,
    ) -> Self {
        Self {
            store,
            pages,
            counts,
            durable: None,
            config,
        }
    }

    /// Persists totals to `durable`.
    pub fn with_durable(mut self, durable: Arc<dyn DurableStore>) -> Self {
        self.durable = Some(durable);
        self
    }

    /// Returns one page and the total. The response's cache status is that of
    /// the page data.
    pub async fn list(&self, spec: &ListSpec, query: &ListQuery) -> Result<Response<ListPage<Record>>, Error> {
        let (from, to) = query.range()?;
        let filter = spec.filter(query)?;

        let mut select = Select::from(spec.table.as_str())
            .filter_opt(filter.clone())
            .range(from, to);
        if let Some(order) = spec.order.clone() {
            select = select.order(order);
        }

        let store = Arc::clone(&self.store);
        let page_key = query.page_key(&spec.table);
        let data = self.pages.get_or_fetch(&page_key, self.config.list_ttl, move || async move {
            Ok(store.select(&select).await?.records)
        });
        let total = self.count_filtered(&spec.table, query, filter);

        let (data, total) = futures::try_join!(data, total)?;
        let total = total.into_inner();
        debug!(
            "{}: page {} ({} rows of {})",
            spec.table,
            query.page,
            data.data().len(),
            total
        );

        Ok(data.map(|data| ListPage {
            data,
            total,
            page: query.page,
            page_size: query.page_size,
        }))
    }

    /// Returns the number of rows matching `query`, ignoring its page.
    pub async fn count(&self, spec: &ListSpec, query: &ListQuery) -> Result<Response<usize>, Error> {
        let filter = spec.filter(query)?;
        self.count_filtered(&spec.table, query, filter).await
    }

    async fn count_filtered(
        &self,
        table: &str,
        query: &ListQuery,
        filter: Option<Filter>,
    ) -> Result<Response<usize>, Error> {
        let key = query.count_key(table);
        let store = Arc::clone(&self.store);
        let durable = self.durable.clone();
        let durable_ttl = self.config.durable_count_ttl;
        let table = table.to_string();
        let durable_key = key.to_string();

        self.counts
            .get_or_fetch(&key, self.config.count_ttl, move || async move {
                if let Some(durable) = &durable {
                    match cache::load::<usize>(durable.as_ref(), &durable_key).await {
                        Ok(Some(total)) => return Ok(total),
                        Ok(None) => {}
                        Err(e) => warn!("{}: durable count unreadable: {}", table, e),
                    }
                }

                let total = store.count(&table, filter.as_ref()).await?;

                if let Some(durable) = durable.filter(|_| !durable_ttl.is_zero()) {
                    if let Err(e) = cache::save(durable.as_ref(), &durable_key, &total, durable_ttl).await {
                        warn!("{}: durable count not saved: {}", table, e);
                    }
                }
                Ok(total)
            })
            .await
    }

    /// Drops every cached page and total of `table`, including durable totals.
    pub async fn invalidate_table(&self, table: &str) -> Result<(), Error> {
        let pages = self.pages.invalidate_namespace(table);
        let counts = self.counts.invalidate_namespace(table);
        debug!("{}: dropped {} pages and {} totals", table, pages, counts);

        if let Some(durable) = &self.durable {
            durable.remove_namespace(table).await?;
        }
        Ok(())
    }

    /// Like [`invalidate_table`](Self::invalidate_table) but leaves fetches
    /// in flight alone, so a reader arriving now joins them.
    pub async fn expire_table(&self, table: &str) -> Result<(), Error> {
        let pages = self.pages.expire_namespace(table);
        let counts = self.counts.expire_namespace(table);
        debug!("{}: expired {} pages and {} totals", table, pages, counts);

        if let Some(durable) = &self.durable {
            durable.remove_namespace(table).await?;
        }
        Ok(())
    }

    /// Drops every cached page and total.
    pub async fn invalidate_all(&self) -> Result<(), Error> {
        self.pages.invalidate_all();
        self.counts.invalidate_all();
        if let Some(durable) = &self.durable {
            durable.clear().await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryStore;
    use crate::store::InMemoryStore;

    fn customers() -> ListSpec {
        ListSpec::new("customers")
            .search_fields(&["first_name", "last_name", "email", "phone"])
            .status_field("status")
            .order(OrderBy::asc("last_name"))
    }

    fn seeded() -> InMemoryStore {
        let store = InMemoryStore::new();
        store.seed(
            "customers",
            (0..45).map(|i| {
                Record::new()
                    .set("id", format!("c-{i:02}"))
                    .set("first_name", if i == 7 { "Jean" } else { "Anne" })
                    .set("last_name", format!("Name{i:02}"))
                    .set("email", format!("user{i}@example.com"))
                    .set("status", if i % 3 == 0 { "blocked" } else { "active" })
            }),
        );
        store
    }

    fn lister(store: &InMemoryStore) -> Lister {
        Lister::new(
            Arc::new(store.clone()),
            KeyedCache::new("pages"),
            KeyedCache::new("counts"),
            CacheConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_pages_share_one_count() {
        let store = seeded();
        let lister = lister(&store);
        let spec = customers();

        let first = lister.list(&spec, &ListQuery::new(1, 20)).await.unwrap();
        let third = lister.list(&spec, &ListQuery::new(3, 20)).await.unwrap();

        assert_eq!(first.data().data.len(), 20);
        assert_eq!(third.data().data.len(), 5);
        assert_eq!(third.data().total, 45);
        assert_eq!(store.stats().counts(), 1);
        assert_eq!(store.stats().selects(), 2);
    }

    #[tokio::test]
    async fn test_status_and_search_filter() {
        let store = seeded();
        let lister = lister(&store);
        let spec = customers();

        let blocked = lister
            .list(&spec, &ListQuery::new(1, 50).with_status("blocked"))
            .await
            .unwrap();
        assert_eq!(blocked.data().total, 15);

        let jean = lister
            .list(&spec, &ListQuery::new(1, 50).with_search("JEAN name07"))
            .await
            .unwrap();
        assert_eq!(jean.data().total, 1);
        assert_eq!(jean.data().data[0].id().as_deref(), Some("c-07"));
    }

    #[tokio::test]
    async fn test_status_on_table_without_status_is_rejected() {
        let store = seeded();
        let spec = ListSpec::new("customers");
        let result = lister(&store)
            .list(&spec, &ListQuery::default().with_status("active"))
            .await;
        assert!(matches!(result, Err(Error::InvalidQuery(_))));
    }

    #[tokio::test]
    async fn test_durable_count_survives_memory_reset() {
        let store = seeded();
        let durable: Arc<dyn DurableStore> = Arc::new(MemoryStore::new());
        let lister = lister(&store).with_durable(Arc::clone(&durable));
        let spec = customers();

        lister.count(&spec, &ListQuery::default()).await.unwrap();
        // A fresh in-memory tier reads the persisted total.
        let restarted = self::lister(&store).with_durable(durable);
        let total = restarted.count(&spec, &ListQuery::default()).await.unwrap();

        assert_eq!(total.into_inner(), 45);
        assert_eq!(store.stats().counts(), 1);
    }

    #[tokio::test]
    async fn test_invalidate_table_clears_durable_totals() {
        let store = seeded();
        let durable = Arc::new(MemoryStore::new());
        let lister = lister(&store).with_durable(durable.clone());
        let spec = customers();

        lister.count(&spec, &ListQuery::default()).await.unwrap();
        assert_eq!(durable.len(), 1);

        lister.invalidate_table("customers").await.unwrap();
        assert!(durable.is_empty());

        lister.count(&spec, &ListQuery::default()).await.unwrap();
        assert_eq!(store.stats().counts(), 2);
    }
}
