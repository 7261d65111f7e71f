//! Claims and the unresolved-claims counter

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use log::debug;
use log::warn;
use tokio::sync::watch;

use super::BlastRadius;
use super::EntityRepo;
use super::Invalidate;
use crate::cache::KeyedCache;
use crate::domain::Claim;
use crate::domain::Entity;
use crate::error::Error;
use crate::listing::ListPage;
use crate::listing::ListQuery;
use crate::model::Record;
use crate::response::Response;
use crate::store::ChangeSource;
use crate::store::EventMask;
use crate::store::RemoteStore;

const UNRESOLVED: &str = "unresolved";

/// Claims, plus a cached count of unresolved ones that can follow realtime
/// changes.
#[derive(Clone)]
pub struct ClaimsRepo {
    entities: EntityRepo<Claim>,
    store: Arc<dyn RemoteStore>,
    counts: KeyedCache<usize>,
    count_ttl: Duration,
}

impl ClaimsRepo {
    pub fn new(
        entities: EntityRepo<Claim>,
        store: Arc<dyn RemoteStore>,
        counts: KeyedCache<usize>,
        count_ttl: Duration,
    ) -> Self {
        Self {
            entities,
            store,
            counts,
            count_ttl,
        }
    }

    pub async fn get(&self, id: &str) -> Result<Response<Claim>, Error> {
        self.entities.get(id).await
    }

    pub async fn list(&self, query: &ListQuery) -> Result<Response<ListPage<Claim>>, Error> {
        self.entities.list(query).await
    }

    pub async fn update(&self, id: &str, patch: &Record) -> Result<Claim, Error> {
        let claim = self.entities.update(id, patch).await?;
        self.counts.invalidate(UNRESOLVED);
        Ok(claim)
    }

    pub async fn delete(&self, id: &str) -> Result<(), Error> {
        self.entities.delete(id).await?;
        self.counts.invalidate(UNRESOLVED);
        Ok(())
    }

    /// Marks a claim resolved.
    pub async fn resolve(&self, id: &str) -> Result<Claim, Error> {
        self.update(id, &Record::new().set("status", "resolved")).await
    }

    /// Counts claims that are not resolved or closed.
    pub async fn unresolved_count(&self) -> Result<Response<usize>, Error> {
        let store = Arc::clone(&self.store);
        self.counts
            .get_or_fetch(UNRESOLVED, self.count_ttl, move || async move {
                store.count(Claim::TABLE, Some(&Claim::unresolved_filter())).await
            })
            .await
    }

    /// Publishes the unresolved count now and again after every change to
    /// the claims table.
    ///
    /// Each change drops the affected cache entries and re-fetches the count.
    /// The value is `None` until the first fetch succeeds; a failed refresh
    /// keeps the last value. The watcher stops when every receiver is dropped
    /// or the change stream ends.
    pub fn watch_unresolved(&self, source: &dyn ChangeSource) -> watch::Receiver<Option<usize>> {
        let (tx, rx) = watch::channel(None);
        let mut changes = source.subscribe(Claim::TABLE, EventMask::ALL);
        let repo = self.clone();

        tokio::spawn(async move {
            repo.publish_unresolved(&tx).await;
            loop {
                tokio::select! {
                    _ = tx.closed() => break,
                    event = changes.next() => {
                        let Some(event) = event else { break };
                        debug!("claims: {:?} event, refreshing unresolved count", event.kind);
                        if let Err(e) = repo.invalidate(&BlastRadius::of_event(&event)).await {
                            warn!("claims: invalidation after change failed: {}", e);
                        }
                        repo.publish_unresolved(&tx).await;
                    }
                }
            }
            debug!("claims: unresolved watcher stopped");
        });

        rx
    }

    async fn publish_unresolved(&self, tx: &watch::Sender<Option<usize>>) {
        match self.unresolved_count().await {
            Ok(count) => {
                tx.send_replace(Some(count.into_inner()));
            }
            Err(e) => warn!("claims: unresolved count refresh failed: {}", e),
        }
    }

    pub async fn invalidate_all(&self) -> Result<(), Error> {
        self.counts.invalidate_all();
        self.entities.invalidate_all().await
    }
}

#[async_trait]
impl Invalidate for ClaimsRepo {
    async fn invalidate(&self, radius: &BlastRadius) -> Result<(), Error> {
        if radius.table != Claim::TABLE {
            return Ok(());
        }
        self.entities.invalidate(radius).await?;
        if radius.views {
            if radius.is_expiry() {
                self.counts.expire(UNRESOLVED);
            } else {
                self.counts.invalidate(UNRESOLVED);
            }
        }
        Ok(())
    }
}
