//! Mutation blast radius

use async_trait::async_trait;

use crate::error::Error;
use crate::store::ChangeEvent;
use crate::store::ChangeKind;

/// How the entries inside a [`BlastRadius`] are cleared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Reach {
    /// A write happened: stored values and in-flight fetches are both wrong.
    #[default]
    Drop,
    /// Time passed: stored values are dropped but a fetch already in flight
    /// is kept, so the next reader joins it.
    Expire,
}

/// The cache entries a change to one table can make stale.
///
/// Every write path builds one of these and hands it to an [`Invalidate`]
/// target, so the link between a mutation and the keys it affects lives in
/// one place instead of at each call site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlastRadius {
    pub table: String,
    /// Single-record keys to drop.
    pub ids: Vec<String>,
    /// Whether list pages, totals and derived views of the table are stale too.
    pub views: bool,
    pub reach: Reach,
}

impl BlastRadius {
    /// A write to one row: the row itself and every view of its table.
    pub fn record(table: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            ids: vec![id.into()],
            views: true,
            reach: Reach::Drop,
        }
    }

    /// An insert or an unknown change: every view of the table, no single row.
    pub fn table(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            ids: Vec::new(),
            views: true,
            reach: Reach::Drop,
        }
    }

    /// Every view of the table, cleared without cancelling fetches in flight.
    pub fn expired(table: impl Into<String>) -> Self {
        Self {
            reach: Reach::Expire,
            ..Self::table(table)
        }
    }

    pub fn is_expiry(&self) -> bool {
        self.reach == Reach::Expire
    }

    /// The radius of a realtime change event. A resync drops the whole table.
    pub fn of_event(event: &ChangeEvent) -> Self {
        match (event.kind, event.row_id()) {
            (ChangeKind::Insert, _) | (ChangeKind::Resync, _) | (_, None) => Self::table(event.table.as_str()),
            (ChangeKind::Update | ChangeKind::Delete, Some(id)) => Self::record(event.table.as_str(), id),
        }
    }
}

/// Something holding cache entries that a [`BlastRadius`] can clear.
#[async_trait]
pub trait Invalidate: Send + Sync {
    /// Drops every entry inside `radius`. Tables this target does not cache
    /// are ignored.
    async fn invalidate(&self, radius: &BlastRadius) -> Result<(), Error>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Record;

    #[test]
    fn test_radius_of_event() {
        let row = Record::new().set("id", "k-1");

        let update = ChangeEvent::new(ChangeKind::Update, "claims", Some(row.clone()));
        assert_eq!(BlastRadius::of_event(&update), BlastRadius::record("claims", "k-1"));

        let insert = ChangeEvent::new(ChangeKind::Insert, "claims", Some(row));
        assert_eq!(BlastRadius::of_event(&insert), BlastRadius::table("claims"));

        let anonymous = ChangeEvent::new(ChangeKind::Delete, "claims", None);
        assert_eq!(BlastRadius::of_event(&anonymous), BlastRadius::table("claims"));
    }

    #[test]
    fn test_only_polling_expires() {
        assert!(BlastRadius::expired("claims").is_expiry());
        assert!(!BlastRadius::table("claims").is_expiry());
        assert!(!BlastRadius::record("claims", "k-1").is_expiry());
        assert!(BlastRadius::expired("claims").views);
    }
}
