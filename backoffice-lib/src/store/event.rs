//! Realtime change notifications

use std::pin::Pin;

use futures::Stream;
use futures::StreamExt;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;

use crate::model::Record;

/// The kind of change a notification reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
    /// The subscriber fell behind and missed events; treat every cached
    /// view of the table as stale.
    Resync,
}

/// Which change kinds a subscriber wants. `Resync` is always delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventMask {
    pub insert: bool,
    pub update: bool,
    pub delete: bool,
}

impl EventMask {
    /// Every change kind.
    pub const ALL: EventMask = EventMask {
        insert: true,
        update: true,
        delete: true,
    };

    /// Returns `true` if `kind` passes this mask.
    pub fn allows(&self, kind: ChangeKind) -> bool {
        match kind {
            ChangeKind::Insert => self.insert,
            ChangeKind::Update => self.update,
            ChangeKind::Delete => self.delete,
            ChangeKind::Resync => true,
        }
    }
}

impl Default for EventMask {
    fn default() -> Self {
        Self::ALL
    }
}

/// A change to one row of one table.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEvent {
    pub kind: ChangeKind,
    pub table: String,
    /// The new row for inserts and updates, the old row for deletes.
    pub row: Option<Record>,
}

impl ChangeEvent {
    pub fn new(kind: ChangeKind, table: impl Into<String>, row: Option<Record>) -> Self {
        Self {
            kind,
            table: table.into(),
            row,
        }
    }

    /// Returns the affected row's id, if known.
    pub fn row_id(&self) -> Option<String> {
        self.row.as_ref().and_then(Record::id)
    }
}

/// A stream of change events for one table.
pub type ChangeStream = Pin<Box<dyn Stream<Item = ChangeEvent> + Send>>;

/// Adapts a broadcast receiver of all changes into a per-table stream.
///
/// Lagging turns into a single `Resync` event; the stream ends when the
/// sender is dropped.
pub fn table_stream(receiver: broadcast::Receiver<ChangeEvent>, table: &str, mask: EventMask) -> ChangeStream {
    let table = table.to_string();
    futures::stream::unfold(receiver, move |mut receiver| {
        let table = table.clone();
        async move {
            loop {
                match receiver.recv().await {
                    Ok(event) if event.table == table && mask.allows(event.kind) => {
                        return Some((event, receiver));
                    }
                    Ok(_) => continue,
                    Err(RecvError::Lagged(_)) => {
                        return Some((ChangeEvent::new(ChangeKind::Resync, table, None), receiver));
                    }
                    Err(RecvError::Closed) => return None,
                }
            }
        }
    })
    .boxed()
}
