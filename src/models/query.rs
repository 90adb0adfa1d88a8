//! Search query parameters.

use std::collections::BTreeMap;

use super::TimeRange;

/// Parameters for one search request.
///
/// `limit` is always sent; `datetime` and `page` only when set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuerySpec {
    limit: u32,
    datetime: Option<String>,
    page: Option<u32>,
    params: BTreeMap<String, String>,
}

impl QuerySpec {
    /// Create a query with the given page size.
    pub fn new(limit: u32) -> Self {
        Self {
            limit,
            datetime: None,
            page: None,
            params: BTreeMap::new(),
        }
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub fn datetime(&self) -> Option<&str> {
        self.datetime.as_deref()
    }

    pub fn page(&self) -> Option<u32> {
        self.page
    }

    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = limit;
        self
    }

    /// Set the raw `datetime` interval string.
    pub fn with_datetime(mut self, datetime: impl Into<String>) -> Self {
        self.datetime = Some(datetime.into());
        self
    }

    /// Set `datetime` from a parsed range.
    pub fn with_range(self, range: &TimeRange) -> Self {
        self.with_datetime(range.to_string())
    }

    /// Set the 1-based page cursor.
    pub fn with_page(mut self, page: u32) -> Self {
        self.page = Some(page);
        self
    }

    pub fn without_page(mut self) -> Self {
        self.page = None;
        self
    }

    /// Add a pass-through parameter (filters, sort keys, ...).
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Render as query-string pairs in a stable order.
    pub fn to_pairs(&self) -> Vec<(String, String)> {
        let mut pairs: Vec<(String, String)> = self
            .params
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        if let Some(datetime) = &self.datetime {
            pairs.push(("datetime".to_string(), datetime.clone()));
        }
        pairs.push(("limit".to_string(), self.limit.to_string()));
        if let Some(page) = self.page {
            pairs.push(("page".to_string(), page.to_string()));
        }
        pairs
    }
}
