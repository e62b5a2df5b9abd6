//! Fixed pick lists shared with the UI.

use crate::types::{SortOrder, TransactionSortField};
use serde::{Deserialize, Serialize};

pub const TRANSACTION_CATEGORIES: [&str; 16] = [
    "Food & Drinks",
    "Groceries",
    "Transport",
    "Entertainment",
    "Shopping",
    "Subscriptions",
    "Bills & Utilities",
    "Health",
    "Rent",
    "Travel",
    "Education",
    "Income",
    "Investments",
    "Loans",
    "Transfer",
    "Other",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionSortId {
    Recent,
    Oldest,
    AmountHigh,
    AmountLow,
    CategoryAz,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortOption {
    pub id: TransactionSortId,
    pub label: &'static str,
    pub sort_by: TransactionSortField,
    pub sort_order: SortOrder,
}

pub static TRANSACTION_SORT_OPTIONS: [SortOption; 5] = [
    SortOption {
        id: TransactionSortId::Recent,
        label: "Newest",
        sort_by: TransactionSortField::OccurredTime,
        sort_order: SortOrder::Desc,
    },
    SortOption {
        id: TransactionSortId::Oldest,
        label: "Oldest",
        sort_by: TransactionSortField::OccurredTime,
        sort_order: SortOrder::Asc,
    },
    SortOption {
        id: TransactionSortId::AmountHigh,
        label: "Amount high",
        sort_by: TransactionSortField::Amount,
        sort_order: SortOrder::Desc,
    },
    SortOption {
        id: TransactionSortId::AmountLow,
        label: "Amount low",
        sort_by: TransactionSortField::Amount,
        sort_order: SortOrder::Asc,
    },
    SortOption {
        id: TransactionSortId::CategoryAz,
        label: "Category A-Z",
        sort_by: TransactionSortField::Category,
        sort_order: SortOrder::Asc,
    },
];

impl TransactionSortId {
    pub fn option(&self) -> &'static SortOption {
        let index = match self {
            TransactionSortId::Recent => 0,
            TransactionSortId::Oldest => 1,
            TransactionSortId::AmountHigh => 2,
            TransactionSortId::AmountLow => 3,
            TransactionSortId::CategoryAz => 4,
        };
        &TRANSACTION_SORT_OPTIONS[index]
    }
}

impl Default for TransactionSortId {
    fn default() -> Self {
        TransactionSortId::Recent
    }
}
