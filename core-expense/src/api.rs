//! Typed wrappers over the expense endpoints.
//!
//! Reads are served from the [`QueryCache`] when possible. Writes that change
//! transactions drop every cached transaction page and summary.

use crate::cache::QueryCache;
use crate::error::Result;
use crate::query::{summary_path, TransactionQuery, SUMMARY_PATH, TRANSACTIONS_PATH};
use crate::types::{
    ConfirmRequest, ConfirmResponse, ParseRequest, ParseResponse, SummaryResponse,
    TransactionOut, TransactionUpdateRequest, TransactionsResponse,
};
use core_auth::{ApiClient, RequestOptions};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Whether a read may be answered from the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FetchPolicy {
    #[default]
    CacheFirst,
    /// Always ask the server, then refresh the cached copy
    NetworkOnly,
}

#[derive(Clone)]
pub struct ExpenseApi {
    client: Arc<ApiClient>,
    cache: Arc<QueryCache>,
}

impl ExpenseApi {
    pub fn new(client: Arc<ApiClient>, cache: Arc<QueryCache>) -> Self {
        Self { client, cache }
    }

    pub fn cache(&self) -> &Arc<QueryCache> {
        &self.cache
    }

    /// Send free text to the parser. Nothing is stored until the entry is
    /// confirmed.
    #[instrument(skip_all)]
    pub async fn parse_entry(&self, request: &ParseRequest) -> Result<ParseResponse> {
        let response: ParseResponse = self
            .client
            .request("/v1/parse", RequestOptions::post().json(request)?)
            .await?;
        debug!(
            entry_id = response.entry_id,
            transactions = response.transactions.len(),
            "Entry parsed"
        );
        Ok(response)
    }

    #[instrument(skip_all, fields(entry_id = request.entry_id))]
    pub async fn confirm_entry(&self, request: &ConfirmRequest) -> Result<ConfirmResponse> {
        let response: ConfirmResponse = self
            .client
            .request("/v1/entries/confirm", RequestOptions::post().json(request)?)
            .await?;
        info!(
            transactions = response.transactions.len(),
            "Entry confirmed"
        );
        self.invalidate_transactions().await;
        Ok(response)
    }

    pub async fn fetch_transactions(
        &self,
        query: &TransactionQuery,
    ) -> Result<TransactionsResponse> {
        self.fetch_transactions_with(query, FetchPolicy::CacheFirst)
            .await
    }

    #[instrument(skip(self, query))]
    pub async fn fetch_transactions_with(
        &self,
        query: &TransactionQuery,
        policy: FetchPolicy,
    ) -> Result<TransactionsResponse> {
        let path = query.to_path()?;
        self.cached_get(&path, policy).await
    }

    pub async fn fetch_summary(&self, month: &str) -> Result<SummaryResponse> {
        self.fetch_summary_with(month, FetchPolicy::CacheFirst).await
    }

    #[instrument(skip(self))]
    pub async fn fetch_summary_with(
        &self,
        month: &str,
        policy: FetchPolicy,
    ) -> Result<SummaryResponse> {
        let path = summary_path(month)?;
        self.cached_get(&path, policy).await
    }

    #[instrument(skip(self, update))]
    pub async fn update_transaction(
        &self,
        transaction_id: i64,
        update: &TransactionUpdateRequest,
    ) -> Result<TransactionOut> {
        let updated: TransactionOut = self
            .client
            .request(
                &format!("{}/{}", TRANSACTIONS_PATH, transaction_id),
                RequestOptions::patch().json(update)?,
            )
            .await?;
        info!("Transaction updated");
        self.invalidate_transactions().await;
        Ok(updated)
    }

    /// Drop cached transaction pages and summaries.
    pub async fn invalidate_transactions(&self) -> usize {
        self.cache
            .invalidate_prefixes("transactions", &[TRANSACTIONS_PATH, SUMMARY_PATH])
            .await
    }

    async fn cached_get<T>(&self, path: &str, policy: FetchPolicy) -> Result<T>
    where
        T: DeserializeOwned + Serialize,
    {
        let generation = self.cache.generation();
        if policy == FetchPolicy::CacheFirst {
            if let Some(hit) = self.cache.get::<T>(path).await {
                debug!(path, "Served from cache");
                return Ok(hit);
            }
        }

        let fresh: T = self.client.request(path, RequestOptions::get()).await?;
        self.cache.put_if_current(path, &fresh, generation).await;
        Ok(fresh)
    }
}
