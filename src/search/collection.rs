//! Paginated result sets.

use std::collections::BTreeMap;

use crate::search::response::SelectResponse;

#[derive(Debug, Clone)]
pub struct ResultCollection<T> {
    pub items: Vec<T>,
    current_page: u64,
    per_page: u64,
    total_entries: u64,
    total_pages: u64,
    pub response: Option<SelectResponse>,
    pub facets: BTreeMap<String, Vec<(String, u64)>>,
    /// Filter categories that shaped the request, in order.
    pub crumbs: Vec<String>,
    /// Ids the index returned but the store could not resolve.
    pub missing_ids: Vec<String>,
}

impl<T> ResultCollection<T> {
    /// `per_page` of 0 is treated as 1.
    pub fn new(items: Vec<T>, current_page: u64, per_page: u64, total_entries: u64) -> Self {
        let per_page = per_page.max(1);
        Self {
            items,
            current_page,
            per_page,
            total_entries,
            total_pages: total_entries.div_ceil(per_page),
            response: None,
            facets: BTreeMap::new(),
            crumbs: Vec::new(),
            missing_ids: Vec::new(),
        }
    }

    pub fn current_page(&self) -> u64 {
        self.current_page
    }

    pub fn per_page(&self) -> u64 {
        self.per_page
    }

    pub fn total_entries(&self) -> u64 {
        self.total_entries
    }

    pub fn total_pages(&self) -> u64 {
        self.total_pages
    }

    pub fn out_of_bounds(&self) -> bool {
        self.current_page > self.total_pages
    }

    pub fn offset(&self) -> u64 {
        self.current_page.saturating_sub(1) * self.per_page
    }

    pub fn previous_page(&self) -> Option<u64> {
        (self.current_page > 1).then(|| self.current_page - 1)
    }

    pub fn next_page(&self) -> Option<u64> {
        (self.current_page < self.total_pages).then(|| self.current_page + 1)
    }

    /// True when some returned ids could not be rehydrated.
    pub fn is_partial(&self) -> bool {
        !self.missing_ids.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    /// Same pagination and attachments, different items.
    pub fn map_items<U>(self, f: impl FnMut(T) -> U) -> ResultCollection<U> {
        ResultCollection {
            items: self.items.into_iter().map(f).collect(),
            current_page: self.current_page,
            per_page: self.per_page,
            total_entries: self.total_entries,
            total_pages: self.total_pages,
            response: self.response,
            facets: self.facets,
            crumbs: self.crumbs,
            missing_ids: self.missing_ids,
        }
    }
}

impl<'a, T> IntoIterator for &'a ResultCollection<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

impl<T> std::fmt::Display for ResultCollection<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "page {}/{} ({} per page, {} total)",
            self.current_page, self.total_pages, self.per_page, self.total_entries
        )
    }
}
