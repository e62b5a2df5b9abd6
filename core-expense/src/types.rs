//! Wire types for the expense endpoints.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionDirection {
    Inflow,
    Outflow,
}

impl TransactionDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionDirection::Inflow => "inflow",
            TransactionDirection::Outflow => "outflow",
        }
    }
}

impl fmt::Display for TransactionDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    Expense,
    Income,
    RepaymentReceived,
    RepaymentSent,
    Refund,
    Transfer,
    InvestmentIncome,
    Other,
}

impl TransactionType {
    pub const ALL: [TransactionType; 8] = [
        TransactionType::Expense,
        TransactionType::Income,
        TransactionType::RepaymentReceived,
        TransactionType::RepaymentSent,
        TransactionType::Refund,
        TransactionType::Transfer,
        TransactionType::InvestmentIncome,
        TransactionType::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Expense => "expense",
            TransactionType::Income => "income",
            TransactionType::RepaymentReceived => "repayment_received",
            TransactionType::RepaymentSent => "repayment_sent",
            TransactionType::Refund => "refund",
            TransactionType::Transfer => "transfer",
            TransactionType::InvestmentIncome => "investment_income",
            TransactionType::Other => "other",
        }
    }

    /// Short label for chips and pickers.
    pub fn label(&self) -> &'static str {
        match self {
            TransactionType::Expense => "Expense",
            TransactionType::Income => "Income",
            TransactionType::RepaymentReceived => "Repayment In",
            TransactionType::RepaymentSent => "Repayment Out",
            TransactionType::Refund => "Refund",
            TransactionType::Transfer => "Transfer",
            TransactionType::InvestmentIncome => "Investment Inc",
            TransactionType::Other => "Other",
        }
    }

    /// Direction a transaction of this type moves money in.
    pub fn default_direction(&self) -> TransactionDirection {
        match self {
            TransactionType::Income
            | TransactionType::RepaymentReceived
            | TransactionType::Refund
            | TransactionType::InvestmentIncome => TransactionDirection::Inflow,
            TransactionType::Expense
            | TransactionType::RepaymentSent
            | TransactionType::Transfer
            | TransactionType::Other => TransactionDirection::Outflow,
        }
    }

    /// Category implied by the type, if any.
    pub fn default_category(&self) -> Option<&'static str> {
        match self {
            TransactionType::Income => Some("Income"),
            TransactionType::InvestmentIncome => Some("Investments"),
            TransactionType::RepaymentReceived | TransactionType::RepaymentSent => Some("Loans"),
            TransactionType::Transfer => Some("Transfer"),
            _ => None,
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionSortField {
    OccurredTime,
    Amount,
    Category,
}

impl TransactionSortField {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionSortField::OccurredTime => "occurred_time",
            TransactionSortField::Amount => "amount",
            TransactionSortField::Category => "category",
        }
    }
}

/// One transaction proposed by the parser.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParseTransaction {
    pub amount: f64,
    pub currency: String,
    pub direction: TransactionDirection,
    #[serde(rename = "type")]
    pub kind: TransactionType,
    pub category: String,
    #[serde(default)]
    pub assumptions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParseRequest {
    pub raw_text: String,
    /// RFC 3339 time relative expressions ("yesterday") resolve against
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference_datetime: Option<String>,
}

impl ParseRequest {
    pub fn new(raw_text: impl Into<String>) -> Self {
        Self {
            raw_text: raw_text.into(),
            reference_datetime: None,
        }
    }

    pub fn with_reference_datetime(mut self, value: impl Into<String>) -> Self {
        self.reference_datetime = Some(value.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryStatus {
    Parsed,
    PendingConfirmation,
    Confirmed,
    Rejected,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ParseResponse {
    pub entry_id: i64,
    pub status: EntryStatus,
    #[serde(default)]
    pub entry_summary: Option<String>,
    #[serde(default)]
    pub occurred_time: Option<String>,
    pub transactions: Vec<ParseTransaction>,
    #[serde(default)]
    pub assumptions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfirmTransactionInput {
    pub occurred_time: String,
    pub amount: f64,
    pub currency: String,
    pub direction: TransactionDirection,
    #[serde(rename = "type")]
    pub kind: TransactionType,
    pub category: String,
    pub assumptions: Vec<String>,
}

impl ConfirmTransactionInput {
    /// Accept a parsed transaction as-is at `occurred_time`.
    pub fn from_parsed(parsed: &ParseTransaction, occurred_time: impl Into<String>) -> Self {
        Self {
            occurred_time: occurred_time.into(),
            amount: parsed.amount,
            currency: parsed.currency.clone(),
            direction: parsed.direction,
            kind: parsed.kind,
            category: parsed.category.clone(),
            assumptions: parsed.assumptions.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfirmRequest {
    pub entry_id: i64,
    pub transactions: Vec<ConfirmTransactionInput>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionOut {
    pub id: i64,
    pub entry_id: i64,
    pub occurred_time: String,
    pub created_time: String,
    pub modified_time: String,
    pub amount: f64,
    pub currency: String,
    pub direction: TransactionDirection,
    #[serde(rename = "type")]
    pub kind: TransactionType,
    pub category: String,
    #[serde(default)]
    pub assumptions_json: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransactionUpdateRequest {
    pub amount: f64,
    pub currency: String,
    pub direction: TransactionDirection,
    #[serde(rename = "type")]
    pub kind: TransactionType,
    pub category: String,
}

impl From<&TransactionOut> for TransactionUpdateRequest {
    fn from(tx: &TransactionOut) -> Self {
        Self {
            amount: tx.amount,
            currency: tx.currency.clone(),
            direction: tx.direction,
            kind: tx.kind,
            category: tx.category.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryOut {
    pub id: i64,
    pub raw_text: String,
    pub source: String,
    pub created_time: String,
    pub modified_time: String,
    #[serde(default)]
    pub parser_output_json: Option<Value>,
    #[serde(default)]
    pub parser_version: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ConfirmResponse {
    pub entry: EntryOut,
    pub transactions: Vec<TransactionOut>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionsResponse {
    pub items: Vec<TransactionOut>,
    pub total_count: i64,
    pub limit: i64,
    pub offset: i64,
}

impl TransactionsResponse {
    /// Whether the server holds more items past this page.
    pub fn has_more(&self) -> bool {
        self.offset + (self.items.len() as i64) < self.total_count
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategorySummary {
    pub direction: TransactionDirection,
    pub category: String,
    pub total: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryResponse {
    /// `YYYY-MM`
    pub month: String,
    pub total_inflow: f64,
    pub total_outflow: f64,
    pub net: f64,
    pub by_category: Vec<CategorySummary>,
    pub transaction_count: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_tables() {
        assert_eq!(
            TransactionType::Refund.default_direction(),
            TransactionDirection::Inflow
        );
        assert_eq!(
            TransactionType::Transfer.default_direction(),
            TransactionDirection::Outflow
        );
        assert_eq!(TransactionType::RepaymentSent.default_category(), Some("Loans"));
        assert_eq!(TransactionType::Expense.default_category(), None);
        assert_eq!(TransactionType::InvestmentIncome.label(), "Investment Inc");
    }

    #[test]
    fn test_transaction_out_wire_shape() {
        let tx: TransactionOut = serde_json::from_str(
            r#"{"id":3,"entry_id":1,"occurred_time":"2026-10-19T10:00:00Z",
                "created_time":"2026-10-19T10:00:01Z","modified_time":"2026-10-19T10:00:01Z",
                "amount":250.5,"currency":"INR","direction":"outflow","type":"repayment_sent",
                "category":"Loans","assumptions_json":null}"#,
        )
        .unwrap();

        assert_eq!(tx.kind, TransactionType::RepaymentSent);
        assert_eq!(tx.assumptions_json, None);

        let update = serde_json::to_value(TransactionUpdateRequest::from(&tx)).unwrap();
        assert_eq!(update["type"], "repayment_sent");
        assert_eq!(update["direction"], "outflow");
    }

    #[test]
    fn test_parse_response_optional_fields() {
        let parsed: ParseResponse = serde_json::from_str(
            r#"{"entry_id":9,"status":"pending_confirmation","transactions":[
                {"amount":120,"currency":"INR","direction":"outflow","type":"expense",
                 "category":"Food & Drinks","assumptions":["Assumed INR"]}],
                "assumptions":[]}"#,
        )
        .unwrap();

        assert_eq!(parsed.status, EntryStatus::PendingConfirmation);
        assert_eq!(parsed.entry_summary, None);
        let confirm = ConfirmTransactionInput::from_parsed(&parsed.transactions[0], "2026-10-19T09:00:00Z");
        assert_eq!(confirm.amount, 120.0);
        assert_eq!(confirm.assumptions, vec!["Assumed INR".to_string()]);
    }

    #[test]
    fn test_parse_request_omits_missing_reference() {
        let body = serde_json::to_string(&ParseRequest::new("chai 20")).unwrap();
        assert_eq!(body, r#"{"raw_text":"chai 20"}"#);
    }

    #[test]
    fn test_has_more() {
        let page = TransactionsResponse {
            items: Vec::new(),
            total_count: 45,
            limit: 20,
            offset: 40,
        };
        assert!(page.has_more());
        let page = TransactionsResponse { offset: 45, ..page };
        assert!(!page.has_more());
    }
}
