//! Typed views over table rows
//!
//! Rows stay opaque [`Record`]s; each view adds accessors with the display
//! fallbacks the back office shows when optional columns are empty.

mod claim;
mod customer;
mod fliiinker;
mod image;
mod meeting;
mod payment;

pub use claim::*;
pub use customer::*;
pub use fliiinker::*;
pub use image::*;
pub use meeting::*;
pub use payment::*;

use crate::listing::ListSpec;
use crate::model::Record;

/// A row type stored in one remote table.
pub trait Entity: Clone + Send + Sync + 'static {
    /// The remote table holding these rows.
    const TABLE: &'static str;

    fn from_record(record: Record) -> Self;

    fn record(&self) -> &Record;

    /// How the table is searched, filtered and ordered in list views.
    fn list_spec() -> ListSpec;

    fn id(&self) -> Option<String> {
        self.record().id()
    }
}

/// Joins first and last name, or returns `None` if both are empty.
pub(crate) fn full_name(record: &Record) -> Option<String> {
    let parts: Vec<&str> = ["first_name", "last_name"]
        .iter()
        .filter_map(|field| record.text(field))
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join(" "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_name() {
        let both = Record::new().set("first_name", " Jean ").set("last_name", "Dupont");
        assert_eq!(full_name(&both).as_deref(), Some("Jean Dupont"));

        let last = Record::new().set("first_name", "").set("last_name", "Dupont");
        assert_eq!(full_name(&last).as_deref(), Some("Dupont"));

        assert_eq!(full_name(&Record::new()), None);
    }
}
