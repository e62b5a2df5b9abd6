use async_trait::async_trait;
use bridge_traits::error::Result as BridgeResult;
use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest, HttpResponse};
use bridge_traits::storage::{SecureStore, SettingsStore};
use bridge_traits::time::ManualClock;
use core_auth::{ApiClient, AuthApi, AuthSession, SessionRefresher, TokenStore};
use core_expense::{
    build_feed_query_filters, ConfirmRequest, ConfirmTransactionInput, ExpenseApi, ExpenseError,
    FeedFilters, FetchPolicy, ParseRequest, QueryCache, TransactionDirection, TransactionQuery,
    TransactionType, TransactionUpdateRequest,
};
use core_runtime::EventBus;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

const BASE_URL: &str = "http://api.test";
const NOW: i64 = 1_700_000_000_000;

const PAGE: &str = r#"{"items":[{"id":7,"entry_id":3,"occurred_time":"2026-10-19T09:00:00Z",
    "created_time":"2026-10-19T09:00:01Z","modified_time":"2026-10-19T09:00:01Z",
    "amount":120.0,"currency":"INR","direction":"outflow","type":"expense",
    "category":"Food & Drinks","assumptions_json":["Assumed INR"]}],
    "total_count":1,"limit":20,"offset":0}"#;

const SUMMARY: &str = r#"{"month":"2026-10","total_inflow":5000.0,"total_outflow":120.0,
    "net":4880.0,"by_category":[{"direction":"outflow","category":"Food & Drinks","total":120.0}],
    "transaction_count":2}"#;

const TRANSACTION: &str = r#"{"id":7,"entry_id":3,"occurred_time":"2026-10-19T09:00:00Z",
    "created_time":"2026-10-19T09:00:01Z","modified_time":"2026-10-19T10:00:00Z",
    "amount":150.0,"currency":"INR","direction":"outflow","type":"expense",
    "category":"Groceries"}"#;

const CONFIRMED: &str = r#"{"entry":{"id":3,"raw_text":"lunch 120","source":"text",
    "created_time":"2026-10-19T09:00:00Z","modified_time":"2026-10-19T09:00:00Z",
    "parser_output_json":{"model":"v1"},"parser_version":"1"},
    "transactions":[]}"#;

/// Answers by `METHOD path` and records every request. Routes can be given a
/// delay to overlap requests with other work.
#[derive(Default)]
struct RoutedHttp {
    routes: Mutex<HashMap<String, (u16, &'static str)>>,
    delays: Mutex<HashMap<String, Duration>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl RoutedHttp {
    fn on(&self, method: HttpMethod, path_and_query: &str, status: u16, body: &'static str) {
        self.routes
            .lock()
            .unwrap()
            .insert(format!("{} {}", method, path_and_query), (status, body));
    }

    fn delay(&self, method: HttpMethod, path_and_query: &str, delay: Duration) {
        self.delays
            .lock()
            .unwrap()
            .insert(format!("{} {}", method, path_and_query), delay);
    }

    fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl HttpClient for RoutedHttp {
    async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse> {
        let key = format!("{} {}", request.method, request.url.trim_start_matches(BASE_URL));
        self.requests.lock().unwrap().push(request);
        let delay = self.delays.lock().unwrap().get(&key).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let (status, body) = self
            .routes
            .lock()
            .unwrap()
            .get(&key)
            .copied()
            .unwrap_or((404, r#"{"detail":"Not Found"}"#));
        Ok(HttpResponse::new(status, body))
    }
}

#[derive(Default)]
struct MemorySecureStore {
    data: Mutex<HashMap<String, Vec<u8>>>,
}

#[async_trait]
impl SecureStore for MemorySecureStore {
    async fn set_secret(&self, key: &str, value: &[u8]) -> BridgeResult<()> {
        self.data.lock().unwrap().insert(key.to_string(), value.to_vec());
        Ok(())
    }
    async fn get_secret(&self, key: &str) -> BridgeResult<Option<Vec<u8>>> {
        Ok(self.data.lock().unwrap().get(key).cloned())
    }
    async fn delete_secret(&self, key: &str) -> BridgeResult<()> {
        self.data.lock().unwrap().remove(key);
        Ok(())
    }
}

struct NoSettings;

#[async_trait]
impl SettingsStore for NoSettings {
    async fn set_string(&self, _: &str, _: &str) -> BridgeResult<()> {
        Ok(())
    }
    async fn get_string(&self, _: &str) -> BridgeResult<Option<String>> {
        Ok(None)
    }
    async fn delete(&self, _: &str) -> BridgeResult<()> {
        Ok(())
    }
    async fn list_keys(&self) -> BridgeResult<Vec<String>> {
        Ok(Vec::new())
    }
    async fn clear_all(&self) -> BridgeResult<()> {
        Ok(())
    }
}

struct Fixture {
    http: Arc<RoutedHttp>,
    api: ExpenseApi,
    cache: Arc<QueryCache>,
    session: AuthSession,
}

fn fixture() -> Fixture {
    let http = Arc::new(RoutedHttp::default());
    let secure = Arc::new(MemorySecureStore::default());
    for (key, value) in [
        ("auth.accessToken", "access-1".to_string()),
        ("auth.refreshToken", "refresh-1".to_string()),
        ("auth.expiresAt", (NOW + 600_000).to_string()),
        (
            "auth.user",
            r#"{"id":"u-1","email":"me@example.com","has_password":true}"#.to_string(),
        ),
    ] {
        secure
            .data
            .lock()
            .unwrap()
            .insert(key.to_string(), value.into_bytes());
    }

    let clock = Arc::new(ManualClock::new(NOW));
    let bus = EventBus::new(32);
    let store = Arc::new(TokenStore::new(secure, Arc::new(NoSettings), clock.clone()));
    let refresher = Arc::new(SessionRefresher::new(
        http.clone(),
        BASE_URL,
        Duration::from_secs(5),
        store.clone(),
        bus.clone(),
    ));
    let client = Arc::new(ApiClient::new(
        http.clone(),
        BASE_URL,
        store.clone(),
        refresher.clone(),
        clock.clone(),
    ));
    let cache = Arc::new(QueryCache::new(16, bus.clone()));
    let session = AuthSession::new(AuthApi::new(client.clone()), store, refresher, clock, bus);

    Fixture {
        http,
        api: ExpenseApi::new(client, cache.clone()),
        cache,
        session,
    }
}

#[tokio::test]
async fn test_parse_entry_is_authenticated_post() {
    let f = fixture();
    f.http.on(
        HttpMethod::Post,
        "/v1/parse",
        200,
        r#"{"entry_id":3,"status":"parsed","transactions":[],"assumptions":[]}"#,
    );

    let parsed = f
        .api
        .parse_entry(&ParseRequest::new("lunch 120").with_reference_datetime("2026-10-19T09:00:00Z"))
        .await
        .unwrap();

    assert_eq!(parsed.entry_id, 3);
    let request = &f.http.requests()[0];
    assert_eq!(request.authorization_token(), Some("access-1"));
    let body: serde_json::Value = serde_json::from_slice(request.body.as_ref().unwrap()).unwrap();
    assert_eq!(body["raw_text"], "lunch 120");
    assert_eq!(body["reference_datetime"], "2026-10-19T09:00:00Z");
}

#[tokio::test]
async fn test_transactions_are_cached_until_a_write() {
    let f = fixture();
    let filters = build_feed_query_filters(&FeedFilters {
        types: vec![TransactionType::Expense],
        ..FeedFilters::default()
    });
    let query = TransactionQuery::new().page(20, 0).with_filters(filters);
    f.http.on(
        HttpMethod::Get,
        "/v1/transactions?limit=20&type=expense",
        200,
        PAGE,
    );
    f.http
        .on(HttpMethod::Get, "/v1/summary?month=2026-10", 200, SUMMARY);
    f.http
        .on(HttpMethod::Post, "/v1/entries/confirm", 200, CONFIRMED);

    let first = f.api.fetch_transactions(&query).await.unwrap();
    let second = f.api.fetch_transactions(&query).await.unwrap();
    let summary = f.api.fetch_summary("2026-10").await.unwrap();
    f.api.fetch_summary("2026-10").await.unwrap();

    assert_eq!(first, second);
    assert_eq!(first.items[0].kind, TransactionType::Expense);
    assert_eq!(summary.net, 4880.0);
    assert_eq!(f.http.requests().len(), 2);
    assert_eq!(f.cache.len().await, 2);

    f.api
        .confirm_entry(&ConfirmRequest {
            entry_id: 3,
            transactions: vec![ConfirmTransactionInput {
                occurred_time: "2026-10-19T09:00:00Z".to_string(),
                amount: 120.0,
                currency: "INR".to_string(),
                direction: TransactionDirection::Outflow,
                kind: TransactionType::Expense,
                category: "Food & Drinks".to_string(),
                assumptions: Vec::new(),
            }],
        })
        .await
        .unwrap();

    assert_eq!(f.cache.len().await, 0);
    f.api.fetch_transactions(&query).await.unwrap();
    assert_eq!(f.http.requests().len(), 4);
}

#[tokio::test]
async fn test_network_only_bypasses_cache() {
    let f = fixture();
    f.http.on(HttpMethod::Get, "/v1/transactions", 200, PAGE);

    f.api.fetch_transactions(&TransactionQuery::new()).await.unwrap();
    f.api
        .fetch_transactions_with(&TransactionQuery::new(), FetchPolicy::NetworkOnly)
        .await
        .unwrap();

    assert_eq!(f.http.requests().len(), 2);
}

#[tokio::test]
async fn test_update_transaction_patches_and_invalidates() {
    let f = fixture();
    f.http
        .on(HttpMethod::Get, "/v1/summary?month=2026-10", 200, SUMMARY);
    f.http
        .on(HttpMethod::Patch, "/v1/transactions/7", 200, TRANSACTION);
    f.api.fetch_summary("2026-10").await.unwrap();

    let updated = f
        .api
        .update_transaction(
            7,
            &TransactionUpdateRequest {
                amount: 150.0,
                currency: "INR".to_string(),
                direction: TransactionDirection::Outflow,
                kind: TransactionType::Expense,
                category: "Groceries".to_string(),
            },
        )
        .await
        .unwrap();

    assert_eq!(updated.category, "Groceries");
    assert_eq!(updated.assumptions_json, None);
    assert_eq!(f.cache.len().await, 0);
    let patch = &f.http.requests()[1];
    assert_eq!(patch.method, HttpMethod::Patch);
    let body: serde_json::Value = serde_json::from_slice(patch.body.as_ref().unwrap()).unwrap();
    assert_eq!(body["type"], "expense");
}

#[tokio::test]
async fn test_failed_write_keeps_cache() {
    let f = fixture();
    f.http
        .on(HttpMethod::Get, "/v1/summary?month=2026-10", 200, SUMMARY);
    f.http.on(
        HttpMethod::Patch,
        "/v1/transactions/99",
        404,
        r#"{"detail":"Transaction not found"}"#,
    );
    f.api.fetch_summary("2026-10").await.unwrap();

    let err = f
        .api
        .update_transaction(
            99,
            &TransactionUpdateRequest {
                amount: 1.0,
                currency: "INR".to_string(),
                direction: TransactionDirection::Inflow,
                kind: TransactionType::Refund,
                category: "Other".to_string(),
            },
        )
        .await
        .unwrap_err();

    assert_eq!(err.status(), Some(404));
    assert_eq!(err.to_string(), "Transaction not found");
    assert_eq!(f.cache.len().await, 1);
}

#[tokio::test]
async fn test_invalid_month_makes_no_request() {
    let f = fixture();

    let err = f.api.fetch_summary("10/2026").await.unwrap_err();

    assert!(matches!(err, ExpenseError::InvalidInput(_)));
    assert!(f.http.requests().is_empty());
}

#[tokio::test]
async fn test_logout_clears_registered_cache() {
    let f = fixture();
    f.session.register_cache(f.cache.clone()).await;
    f.session.bootstrap().await.unwrap();
    f.http.on(HttpMethod::Get, "/v1/transactions", 200, PAGE);
    f.http.on(HttpMethod::Post, "/v1/auth/logout", 204, "");
    f.api.fetch_transactions(&TransactionQuery::new()).await.unwrap();
    assert_eq!(f.cache.len().await, 1);

    f.session.logout().await.unwrap();

    assert_eq!(f.cache.len().await, 0);
}

fn lunch() -> ConfirmRequest {
    ConfirmRequest {
        entry_id: 3,
        transactions: vec![ConfirmTransactionInput {
            occurred_time: "2026-10-19T09:00:00Z".to_string(),
            amount: 120.0,
            currency: "INR".to_string(),
            direction: TransactionDirection::Outflow,
            kind: TransactionType::Expense,
            category: "Food & Drinks".to_string(),
            assumptions: Vec::new(),
        }],
    }
}

#[tokio::test(start_paused = true)]
async fn test_page_fetched_across_logout_is_not_cached() {
    let f = fixture();
    f.session.register_cache(f.cache.clone()).await;
    f.session.bootstrap().await.unwrap();
    f.http.on(HttpMethod::Get, "/v1/transactions", 200, PAGE);
    f.http
        .delay(HttpMethod::Get, "/v1/transactions", Duration::from_millis(50));
    f.http.on(HttpMethod::Post, "/v1/auth/logout", 204, "");

    let query = TransactionQuery::new();
    let (page, logout) = tokio::join!(
        f.api.fetch_transactions(&query),
        async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            f.session.logout().await
        }
    );

    page.unwrap();
    logout.unwrap();
    assert!(!f.session.state().is_authenticated());
    assert_eq!(f.cache.len().await, 0);
}

#[tokio::test(start_paused = true)]
async fn test_page_fetched_across_confirm_is_not_cached() {
    let f = fixture();
    f.http.on(HttpMethod::Get, "/v1/transactions", 200, PAGE);
    f.http
        .delay(HttpMethod::Get, "/v1/transactions", Duration::from_millis(50));
    f.http
        .on(HttpMethod::Post, "/v1/entries/confirm", 200, CONFIRMED);

    let query = TransactionQuery::new();
    let (page, confirmed) = tokio::join!(
        f.api.fetch_transactions(&query),
        async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            f.api.confirm_entry(&lunch()).await
        }
    );

    page.unwrap();
    confirmed.unwrap();
    assert_eq!(f.cache.len().await, 0);

    f.api.fetch_transactions(&TransactionQuery::new()).await.unwrap();
    assert_eq!(f.http.requests().len(), 3);
    assert_eq!(f.cache.len().await, 1);
}
