//! Feed filter state and its translation into query parameters.

use crate::error::Result;
use crate::types::{TransactionDirection, TransactionType};
use bridge_traits::storage::SettingsStore;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, warn};

/// Filters as edited in the UI. Amounts are kept as typed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FeedFilters {
    pub direction: Option<TransactionDirection>,
    pub types: Vec<TransactionType>,
    pub categories: Vec<String>,
    pub min_amount: String,
    pub max_amount: String,
}

/// Filters ready to be sent. Empty lists and unusable amounts are `None`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedQueryFilters {
    pub direction: Option<TransactionDirection>,
    pub types: Option<Vec<TransactionType>>,
    pub categories: Option<Vec<String>>,
    pub min_amount: Option<f64>,
    pub max_amount: Option<f64>,
}

pub fn build_feed_query_filters(filters: &FeedFilters) -> FeedQueryFilters {
    FeedQueryFilters {
        direction: filters.direction,
        types: normalize(&filters.types),
        categories: normalize(&filters.categories),
        min_amount: parse_filter_amount(&filters.min_amount),
        max_amount: parse_filter_amount(&filters.max_amount),
    }
}

/// One per active dimension. Blank amount text does not count.
pub fn count_active_filters(filters: &FeedFilters) -> usize {
    [
        filters.direction.is_some(),
        !filters.types.is_empty(),
        !filters.categories.is_empty(),
        !filters.min_amount.trim().is_empty(),
        !filters.max_amount.trim().is_empty(),
    ]
    .into_iter()
    .filter(|active| *active)
    .count()
}

/// Strip everything but digits and dots, keeping only the first dot.
///
/// `"1.2.3"` becomes `"1.23"`, `"₹1,200.50"` becomes `"1200.50"`.
pub fn sanitize_amount_input(value: &str) -> String {
    let cleaned: String = value
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    match cleaned.split_once('.') {
        Some((whole, rest)) => format!("{}.{}", whole, rest.replace('.', "")),
        None => cleaned,
    }
}

/// Leading-number parse of user input. Anything unusable is `0`.
pub fn parse_amount(value: &str) -> f64 {
    parse_leading_float(value)
        .filter(|v| v.is_finite())
        .unwrap_or(0.0)
}

fn parse_filter_amount(value: &str) -> Option<f64> {
    parse_leading_float(value).filter(|v| v.is_finite() && *v >= 0.0)
}

fn normalize<T: Ord + Clone>(values: &[T]) -> Option<Vec<T>> {
    let unique: BTreeSet<T> = values.iter().cloned().collect();
    if unique.is_empty() {
        None
    } else {
        Some(unique.into_iter().collect())
    }
}

/// Parse the longest numeric prefix after leading whitespace, so `"12abc"`
/// is 12 and `"abc"` is nothing.
fn parse_leading_float(value: &str) -> Option<f64> {
    let s = value.trim_start();
    let bytes = s.as_bytes();
    let mut end = 0;

    if matches!(bytes.first(), Some(b'+') | Some(b'-')) {
        end += 1;
    }
    let int_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    let mut digits = end - int_start;

    if end < bytes.len() && bytes[end] == b'.' {
        let frac_start = end + 1;
        let mut frac_end = frac_start;
        while frac_end < bytes.len() && bytes[frac_end].is_ascii_digit() {
            frac_end += 1;
        }
        digits += frac_end - frac_start;
        if digits > 0 {
            end = frac_end;
        }
    }
    if digits == 0 {
        return None;
    }

    if end < bytes.len() && (bytes[end] == b'e' || bytes[end] == b'E') {
        let mut exp_end = end + 1;
        if matches!(bytes.get(exp_end), Some(b'+') | Some(b'-')) {
            exp_end += 1;
        }
        let exp_digits_start = exp_end;
        while exp_end < bytes.len() && bytes[exp_end].is_ascii_digit() {
            exp_end += 1;
        }
        if exp_end > exp_digits_start {
            end = exp_end;
        }
    }

    s[..end].parse().ok()
}

pub const FEED_FILTERS_KEY: &str = "feed_filters_v1";

/// Keeps the feed filters across launches in the settings store.
pub struct FeedFilterStore {
    settings: Arc<dyn SettingsStore>,
}

impl FeedFilterStore {
    pub fn new(settings: Arc<dyn SettingsStore>) -> Self {
        Self { settings }
    }

    /// Saved filters, or the defaults when nothing usable is stored.
    pub async fn load(&self) -> FeedFilters {
        let stored = match self.settings.get_string(FEED_FILTERS_KEY).await {
            Ok(stored) => stored,
            Err(e) => {
                warn!(error = %e, "Could not read saved feed filters");
                return FeedFilters::default();
            }
        };

        match stored.as_deref().map(serde_json::from_str::<FeedFilters>) {
            Some(Ok(filters)) => filters,
            Some(Err(e)) => {
                warn!(error = %e, "Ignoring corrupt saved feed filters");
                FeedFilters::default()
            }
            None => FeedFilters::default(),
        }
    }

    pub async fn save(&self, filters: &FeedFilters) -> Result<()> {
        let json = serde_json::to_string(filters)?;
        self.settings.set_string(FEED_FILTERS_KEY, &json).await?;
        debug!(active = count_active_filters(filters), "Saved feed filters");
        Ok(())
    }

    pub async fn reset(&self) -> Result<FeedFilters> {
        self.settings.delete(FEED_FILTERS_KEY).await?;
        Ok(FeedFilters::default())
    }
}
