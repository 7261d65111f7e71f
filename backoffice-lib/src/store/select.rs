//! Select query description

use super::Filter;
use super::OrderBy;

/// A select against one remote table.
///
/// # Example
///
/// ```
/// use backoffice_lib::store::{Filter, OrderBy, Select};
///
/// let select = Select::from("customers")
///     .filter(Filter::eq("status", "active"))
///     .order(OrderBy::desc("created_at"))
///     .range(0, 19)
///     .with_count();
/// assert_eq!(select.limit(), Some(20));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Select {
    pub table: String,
    /// Columns to return. `None` returns every column.
    pub columns: Option<Vec<String>>,
    pub filter: Option<Filter>,
    pub order: Option<OrderBy>,
    /// Inclusive row range `(from, to)`, zero-based.
    pub range: Option<(usize, usize)>,
    /// Also compute the total number of matching rows.
    pub count: bool,
}

impl Select {
    /// Starts a select on `table`.
    pub fn from(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            columns: None,
            filter: None,
            order: None,
            range: None,
            count: false,
        }
    }

    /// Restricts the returned columns.
    pub fn columns(mut self, columns: &[&str]) -> Self {
        self.columns = Some(columns.iter().map(|c| c.to_string()).collect());
        self
    }

    /// Adds a filter, ANDed with any filter already present.
    pub fn filter(mut self, filter: Filter) -> Self {
        self.filter = Filter::both(self.filter.take(), Some(filter));
        self
    }

    /// Adds an optional filter.
    pub fn filter_opt(self, filter: Option<Filter>) -> Self {
        match filter {
            Some(filter) => self.filter(filter),
            None => self,
        }
    }

    /// Sets the ordering.
    pub fn order(mut self, order: OrderBy) -> Self {
        self.order = Some(order);
        self
    }

    /// Sets the inclusive row range.
    pub fn range(mut self, from: usize, to: usize) -> Self {
        self.range = Some((from, to.max(from)));
        self
    }

    /// Requests the total count of matching rows.
    pub fn with_count(mut self) -> Self {
        self.count = true;
        self
    }

    /// Returns the row offset implied by the range.
    pub fn offset(&self) -> Option<usize> {
        self.range.map(|(from, _)| from)
    }

    /// Returns the row limit implied by the range.
    pub fn limit(&self) -> Option<usize> {
        self.range.map(|(from, to)| to - from + 1)
    }
}
