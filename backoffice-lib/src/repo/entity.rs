//! Cached access to one table

use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use log::debug;

use super::BlastRadius;
use super::Invalidate;
use crate::cache::KeyedCache;
use crate::domain::Entity;
use crate::error::Error;
use crate::listing::ListPage;
use crate::listing::ListQuery;
use crate::listing::ListSpec;
use crate::listing::Lister;
use crate::model::Record;
use crate::response::Response;
use crate::store::RemoteStore;

/// Reads rows of `E` through a record cache and list caches, and routes every
/// write through its [`BlastRadius`].
///
/// # Example
///
/// ```ignore
/// let customers = backoffice.customers();
///
/// let page = customers.list(&ListQuery::new(1, 20).with_search("jean dupont")).await?;
/// for customer in &page.data().data {
///     println!("{}", customer.display_name());
/// }
///
/// customers.update("c-1", &Record::new().set("status", "blocked")).await?;
/// // The next read of c-1 (and of any customer list) goes to the store.
/// ```
pub struct EntityRepo<E> {
    store: Arc<dyn RemoteStore>,
    records: KeyedCache<Record>,
    lister: Lister,
    spec: ListSpec,
    record_ttl: Duration,
    _entity: PhantomData<fn() -> E>,
}

impl<E> Clone for EntityRepo<E> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            records: self.records.clone(),
            lister: self.lister.clone(),
            spec: self.spec.clone(),
            record_ttl: self.record_ttl,
            _entity: PhantomData,
        }
    }
}

impl<E: Entity> EntityRepo<E> {
    pub fn new(store: Arc<dyn RemoteStore>, records: KeyedCache<Record>, lister: Lister, record_ttl: Duration) -> Self {
        Self {
            store,
            records,
            lister,
            spec: E::list_spec(),
            record_ttl,
            _entity: PhantomData,
        }
    }

    pub fn table(&self) -> &str {
        E::TABLE
    }

    /// Fetches one row by id. A missing row is `Error::NotFound` and is not cached.
    pub async fn get(&self, id: &str) -> Result<Response<E>, Error> {
        let store = Arc::clone(&self.store);
        let owned = id.to_string();
        let response = self
            .records
            .get_or_fetch(id, self.record_ttl, move || async move {
                let row = store.fetch_one(E::TABLE, &owned).await?;
                row.ok_or_else(|| Error::not_found(E::TABLE, owned))
            })
            .await?;
        Ok(response.map(E::from_record))
    }

    /// Fetches one page and the total matching `query`.
    pub async fn list(&self, query: &ListQuery) -> Result<Response<ListPage<E>>, Error> {
        let page = self.lister.list(&self.spec, query).await?;
        Ok(page.map(|page| page.map(E::from_record)))
    }

    /// Counts rows matching `query`'s search and status.
    pub async fn count(&self, query: &ListQuery) -> Result<Response<usize>, Error> {
        self.lister.count(&self.spec, query).await
    }

    pub async fn insert(&self, record: &Record) -> Result<E, Error> {
        let row = self.store.insert(E::TABLE, record).await?;
        self.invalidate(&BlastRadius::table(E::TABLE)).await?;
        Ok(E::from_record(row))
    }

    /// Applies `patch` and drops the row and every list of the table from cache.
    pub async fn update(&self, id: &str, patch: &Record) -> Result<E, Error> {
        let row = self.store.update(E::TABLE, id, patch).await?;
        self.invalidate(&BlastRadius::record(E::TABLE, id)).await?;
        Ok(E::from_record(row))
    }

    pub async fn delete(&self, id: &str) -> Result<(), Error> {
        self.store.delete(E::TABLE, id).await?;
        self.invalidate(&BlastRadius::record(E::TABLE, id)).await
    }

    /// Returns the cached row without fetching.
    pub fn peek(&self, id: &str) -> Option<E> {
        self.records.peek(id).map(|(record, _)| E::from_record(record))
    }

    /// Drops every cached row, page and total of the table.
    pub async fn invalidate_all(&self) -> Result<(), Error> {
        self.records.invalidate_all();
        self.lister.invalidate_table(E::TABLE).await
    }
}

#[async_trait]
impl<E: Entity> Invalidate for EntityRepo<E> {
    async fn invalidate(&self, radius: &BlastRadius) -> Result<(), Error> {
        if radius.table != E::TABLE {
            return Ok(());
        }
        let expiry = radius.is_expiry();
        for id in &radius.ids {
            if expiry {
                self.records.expire(id);
            } else {
                self.records.invalidate(id);
            }
        }
        match (radius.views, expiry) {
            (false, _) => {}
            (true, false) => self.lister.invalidate_table(E::TABLE).await?,
            (true, true) => self.lister.expire_table(E::TABLE).await?,
        }
        debug!("{}: invalidated {} rows and views", E::TABLE, radius.ids.len());
        Ok(())
    }
}
