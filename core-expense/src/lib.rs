//! # Expense Module
//!
//! Typed access to the expense endpoints on top of the authenticated
//! request pipeline from `core-auth`, plus the client-side helpers the feed
//! screens share.
//!
//! - [`ExpenseApi`] parses, confirms, lists, summarizes and edits
//!   transactions.
//! - [`QueryCache`] keeps recent list and summary responses. It registers
//!   with the auth session so signing out empties it.
//! - [`filters`] turns the feed's filter form into query parameters and
//!   persists it.
//! - [`format`] renders amounts and timestamps for display.

pub mod api;
pub mod cache;
pub mod catalog;
pub mod error;
pub mod filters;
pub mod format;
pub mod query;
pub mod types;

pub use api::{ExpenseApi, FetchPolicy};
pub use cache::{CacheStats, QueryCache};
pub use error::{ExpenseError, Result};
pub use filters::{
    build_feed_query_filters, count_active_filters, parse_amount, sanitize_amount_input,
    FeedFilterStore, FeedFilters, FeedQueryFilters,
};
pub use format::{format_currency, format_currency_value, format_date_time};
pub use query::TransactionQuery;
pub use types::*;
