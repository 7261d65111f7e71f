//! List query parameters

use super::SearchTerm;
use crate::cache::CacheKey;
use crate::error::Error;

/// One page request for a list view.
///
/// Pages are 1-based. Two queries that differ only in search whitespace or
/// case share cache entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListQuery {
    pub page: usize,
    pub page_size: usize,
    pub search: Option<String>,
    pub status: Option<String>,
}

impl Default for ListQuery {
    fn default() -> Self {
        Self::new(1, 20)
    }
}

impl ListQuery {
    /// Creates a query for `page` (1-based) of `page_size` rows.
    pub fn new(page: usize, page_size: usize) -> Self {
        Self {
            page,
            page_size,
            search: None,
            status: None,
        }
    }

    /// Sets the free-text search.
    pub fn with_search(mut self, search: impl Into<String>) -> Self {
        self.search = Some(search.into());
        self
    }

    /// Restricts results to one status.
    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    /// Returns the same query for another page.
    pub fn at_page(&self, page: usize) -> Self {
        Self {
            page,
            ..self.clone()
        }
    }

    /// Rejects zero pages and zero page sizes.
    pub fn validate(&self) -> Result<(), Error> {
        if self.page == 0 {
            return Err(Error::InvalidQuery("page numbers start at 1".to_string()));
        }
        if self.page_size == 0 {
            return Err(Error::InvalidQuery("page size must be at least 1".to_string()));
        }
        Ok(())
    }

    /// Returns the inclusive zero-based row range for this page.
    ///
    /// ```
    /// use backoffice_lib::listing::ListQuery;
    ///
    /// assert_eq!(ListQuery::new(1, 20).range().unwrap(), (0, 19));
    /// assert_eq!(ListQuery::new(3, 20).range().unwrap(), (40, 59));
    /// ```
    pub fn range(&self) -> Result<(usize, usize), Error> {
        self.validate()?;
        let from = (self.page - 1)
            .checked_mul(self.page_size)
            .ok_or_else(|| Error::InvalidQuery(format!("page {} is out of range", self.page)))?;
        let to = from
            .checked_add(self.page_size - 1)
            .ok_or_else(|| Error::InvalidQuery(format!("page {} is out of range", self.page)))?;
        Ok((from, to))
    }

    /// Returns the parsed search, empty when none was given.
    pub fn search_term(&self) -> SearchTerm {
        self.search.as_deref().map(SearchTerm::parse).unwrap_or_default()
    }

    /// Returns the status filter, ignoring blank values.
    pub fn status(&self) -> Option<&str> {
        self.status.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }

    pub(crate) fn page_key(&self, table: &str) -> CacheKey {
        CacheKey::compose([
            table.to_string(),
            self.page.to_string(),
            self.page_size.to_string(),
            self.search_term().to_string(),
            self.status().unwrap_or_default().to_string(),
        ])
    }

    pub(crate) fn count_key(&self, table: &str) -> CacheKey {
        CacheKey::compose([
            table.to_string(),
            self.search_term().to_string(),
            self.status().unwrap_or_default().to_string(),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_page_or_size_is_rejected() {
        assert!(matches!(ListQuery::new(0, 20).range(), Err(Error::InvalidQuery(_))));
        assert!(matches!(ListQuery::new(1, 0).range(), Err(Error::InvalidQuery(_))));
    }

    #[test]
    fn test_overflowing_page_is_rejected() {
        assert!(ListQuery::new(usize::MAX, 2).range().is_err());
    }

    #[test]
    fn test_keys_normalize_search() {
        let a = ListQuery::new(1, 20).with_search("Jean  Dupont");
        let b = ListQuery::new(1, 20).with_search(" jean dupont ");
        assert_eq!(a.page_key("customers"), b.page_key("customers"));
        assert_eq!(a.count_key("customers"), b.count_key("customers"));
    }

    #[test]
    fn test_count_key_ignores_page() {
        let query = ListQuery::new(1, 20).with_status("active");
        assert_eq!(query.count_key("customers"), query.at_page(4).count_key("customers"));
        assert_ne!(query.page_key("customers"), query.at_page(4).page_key("customers"));
    }

    #[test]
    fn test_keys_live_in_table_namespace() {
        let query = ListQuery::new(2, 10).with_search("a:b");
        assert!(query.page_key("claims").is_within("claims"));
        assert!(query.count_key("claims").is_within("claims"));
        assert!(!query.page_key("claims").is_within("claim"));
    }

    #[test]
    fn test_blank_status_is_ignored() {
        assert_eq!(ListQuery::default().with_status("  ").status(), None);
        assert_eq!(ListQuery::default().with_status("open").status(), Some("open"));
    }
}
