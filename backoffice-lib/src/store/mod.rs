//! Remote data store collaborators
//!
//! The hosted database is reached through [`RemoteStore`] (rows),
//! [`ChangeSource`] (realtime notifications) and [`UrlSigner`] (storage URL
//! signing). [`RestStore`] talks to the real gateway; [`InMemoryStore`]
//! implements all three in-process.

mod event;
mod filter;
mod memory;
mod order;
pub mod rest;
mod select;

pub use event::*;
pub use filter::Filter;
pub use memory::*;
pub use order::Direction;
pub use order::OrderBy;
pub use rest::RestStore;
pub use select::Select;

pub(crate) use filter::compare_values;

use std::time::Duration;

use async_trait::async_trait;

use crate::error::Error;
use crate::model::Record;

/// Rows returned by a select, with the total match count when requested.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Rows {
    pub records: Vec<Record>,
    pub total: Option<usize>,
}

/// Row access to the hosted database.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Selects rows.
    async fn select(&self, select: &Select) -> Result<Rows, Error>;

    /// Counts rows matching `filter`.
    async fn count(&self, table: &str, filter: Option<&Filter>) -> Result<usize, Error>;

    /// Inserts a row and returns it as stored.
    async fn insert(&self, table: &str, record: &Record) -> Result<Record, Error>;

    /// Applies `patch` to the row with `id` and returns the updated row.
    async fn update(&self, table: &str, id: &str, patch: &Record) -> Result<Record, Error>;

    /// Deletes the row with `id`.
    async fn delete(&self, table: &str, id: &str) -> Result<(), Error>;

    /// Fetches one row by id.
    async fn fetch_one(&self, table: &str, id: &str) -> Result<Option<Record>, Error> {
        let select = Select::from(table).filter(Filter::eq("id", id)).range(0, 0);
        Ok(self.select(&select).await?.records.into_iter().next())
    }
}

/// Realtime change notifications.
pub trait ChangeSource: Send + Sync {
    /// Subscribes to changes of `table` that pass `mask`.
    fn subscribe(&self, table: &str, mask: EventMask) -> ChangeStream;
}

/// Issues time-limited URLs for stored objects.
#[async_trait]
pub trait UrlSigner: Send + Sync {
    /// Returns a URL for `path` in `bucket` that stays valid for `expires_in`.
    async fn sign(&self, bucket: &str, path: &str, expires_in: Duration) -> Result<String, Error>;
}
