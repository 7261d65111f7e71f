//! One page of a list view

/// A page of rows and the total number of rows matching the query.
#[derive(Debug, Clone, PartialEq)]
pub struct ListPage<R> {
    pub data: Vec<R>,
    pub total: usize,
    pub page: usize,
    pub page_size: usize,
}

impl<R> ListPage<R> {
    /// Returns the number of pages needed for `total` rows.
    pub fn total_pages(&self) -> usize {
        if self.page_size == 0 {
            return 0;
        }
        self.total.div_ceil(self.page_size)
    }

    /// Returns `true` if a later page holds more rows.
    pub fn has_next(&self) -> bool {
        self.page < self.total_pages()
    }

    /// Converts the rows, keeping the paging information.
    pub fn map<T, F: FnMut(R) -> T>(self, f: F) -> ListPage<T> {
        ListPage {
            data: self.data.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            page_size: self.page_size,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total_pages() {
        let page = ListPage::<u8> {
            data: vec![],
            total: 41,
            page: 2,
            page_size: 20,
        };
        assert_eq!(page.total_pages(), 3);
        assert!(page.has_next());

        let last = ListPage { page: 3, ..page };
        assert!(!last.has_next());
    }
}
