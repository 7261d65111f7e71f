//! Paginated, searchable list views
//!
//! A [`ListQuery`] names a page, an optional free-text search and an
//! optional status. [`Lister`] turns it into a range select plus a separate,
//! separately cached count.

mod lister;
mod page;
mod query;
mod search;

pub use lister::*;
pub use page::*;
pub use query::*;
pub use search::*;
