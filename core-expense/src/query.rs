//! Query strings for `GET /v1/transactions` and `GET /v1/summary`.

use crate::error::{ExpenseError, Result};
use crate::filters::FeedQueryFilters;
use crate::types::{SortOrder, TransactionDirection, TransactionSortField, TransactionType};
use chrono::NaiveDate;

pub const TRANSACTIONS_PATH: &str = "/v1/transactions";
pub const SUMMARY_PATH: &str = "/v1/summary";

/// Filters, sorting and paging for the transaction feed.
///
/// Unset fields are left out of the query. `limit` and `offset` of zero are
/// treated as unset.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransactionQuery {
    /// Inclusive lower bound, RFC 3339
    pub from: Option<String>,
    /// Exclusive upper bound, RFC 3339
    pub to: Option<String>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
    pub sort_by: Option<TransactionSortField>,
    pub sort_order: Option<SortOrder>,
    pub direction: Option<TransactionDirection>,
    pub types: Vec<TransactionType>,
    pub categories: Vec<String>,
    pub min_amount: Option<f64>,
    pub max_amount: Option<f64>,
}

impl TransactionQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn range(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.from = Some(from.into());
        self.to = Some(to.into());
        self
    }

    pub fn page(mut self, limit: u32, offset: u32) -> Self {
        self.limit = Some(limit);
        self.offset = Some(offset);
        self
    }

    pub fn sort(mut self, field: TransactionSortField, order: SortOrder) -> Self {
        self.sort_by = Some(field);
        self.sort_order = Some(order);
        self
    }

    /// Apply the feed's active filters.
    pub fn with_filters(mut self, filters: FeedQueryFilters) -> Self {
        self.direction = filters.direction;
        self.types = filters.types.unwrap_or_default();
        self.categories = filters.categories.unwrap_or_default();
        self.min_amount = filters.min_amount;
        self.max_amount = filters.max_amount;
        self
    }

    fn pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(from) = self.from.as_deref().filter(|v| !v.is_empty()) {
            pairs.push(("from", from.to_string()));
        }
        if let Some(to) = self.to.as_deref().filter(|v| !v.is_empty()) {
            pairs.push(("to", to.to_string()));
        }
        if let Some(limit) = self.limit.filter(|v| *v != 0) {
            pairs.push(("limit", limit.to_string()));
        }
        if let Some(offset) = self.offset.filter(|v| *v != 0) {
            pairs.push(("offset", offset.to_string()));
        }
        if let Some(sort_by) = self.sort_by {
            pairs.push(("sort_by", sort_by.as_str().to_string()));
        }
        if let Some(sort_order) = self.sort_order {
            pairs.push(("sort_order", sort_order.as_str().to_string()));
        }
        if let Some(direction) = self.direction {
            pairs.push(("direction", direction.as_str().to_string()));
        }
        for kind in &self.types {
            pairs.push(("type", kind.as_str().to_string()));
        }
        for category in &self.categories {
            pairs.push(("category", category.clone()));
        }
        if let Some(min) = self.min_amount {
            pairs.push(("min_amount", min.to_string()));
        }
        if let Some(max) = self.max_amount {
            pairs.push(("max_amount", max.to_string()));
        }
        pairs
    }

    /// Request path including the query, without a `?` when nothing is set.
    pub fn to_path(&self) -> Result<String> {
        let pairs = self.pairs();
        if pairs.is_empty() {
            return Ok(TRANSACTIONS_PATH.to_string());
        }
        let query = serde_urlencoded::to_string(&pairs)?;
        Ok(format!("{}?{}", TRANSACTIONS_PATH, query))
    }
}

/// Path for the monthly summary. `month` must be `YYYY-MM`.
pub fn summary_path(month: &str) -> Result<String> {
    if NaiveDate::parse_from_str(&format!("{}-01", month), "%Y-%m-%d").is_err() || month.len() != 7
    {
        return Err(ExpenseError::InvalidInput(format!(
            "month must be YYYY-MM, got {:?}",
            month
        )));
    }
    let query = serde_urlencoded::to_string([("month", month)])?;
    Ok(format!("{}?{}", SUMMARY_PATH, query))
}
