#![allow(dead_code)]

use async_trait::async_trait;
use bridge_traits::error::{BridgeError, Result as BridgeResult};
use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest, HttpResponse};
use bridge_traits::storage::{SecureStore, SettingsStore};
use bridge_traits::time::ManualClock;
use core_auth::{ApiClient, AuthApi, AuthSession, SessionCache, SessionRefresher, TokenStore};
use core_runtime::EventBus;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const BASE_URL: &str = "http://api.test";
pub const NOW: i64 = 1_700_000_000_000;

#[derive(Clone)]
pub enum Reply {
    Json(u16, &'static str),
    Offline,
}

/// HTTP bridge answering from per-route scripts. The last reply of a route
/// repeats once the script runs out.
#[derive(Default)]
pub struct ScriptedHttp {
    routes: Mutex<HashMap<String, VecDeque<Reply>>>,
    requests: Mutex<Vec<HttpRequest>>,
    delay: Mutex<Duration>,
}

impl ScriptedHttp {
    pub fn on(&self, method: HttpMethod, path: &str, replies: Vec<Reply>) {
        self.routes
            .lock()
            .unwrap()
            .insert(format!("{} {}", method, path), replies.into());
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = delay;
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn calls_to(&self, path: &str) -> usize {
        self.requests()
            .iter()
            .filter(|r| r.url == format!("{}{}", BASE_URL, path))
            .count()
    }

    fn next_reply(&self, key: &str) -> Option<Reply> {
        let mut routes = self.routes.lock().unwrap();
        let queue = routes.get_mut(key)?;
        if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        }
    }
}

#[async_trait]
impl HttpClient for ScriptedHttp {
    async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse> {
        let path = request.url.trim_start_matches(BASE_URL).to_string();
        let key = format!("{} {}", request.method, path);
        self.requests.lock().unwrap().push(request);

        let delay = *self.delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        match self.next_reply(&key) {
            Some(Reply::Json(status, body)) => Ok(HttpResponse::new(status, body)),
            Some(Reply::Offline) => Err(BridgeError::OperationFailed("network unreachable".into())),
            None => Ok(HttpResponse::new(404, r#"{"detail":"Not Found"}"#)),
        }
    }
}

#[derive(Default)]
pub struct MemorySecureStore {
    pub data: Mutex<HashMap<String, Vec<u8>>>,
    pub fail_writes: AtomicBool,
}

impl MemorySecureStore {
    pub fn get(&self, key: &str) -> Option<String> {
        self.data
            .lock()
            .unwrap()
            .get(key)
            .map(|v| String::from_utf8(v.clone()).unwrap())
    }

    pub fn put(&self, key: &str, value: &str) {
        self.data
            .lock()
            .unwrap()
            .insert(key.to_string(), value.as_bytes().to_vec());
    }
}

#[async_trait]
impl SecureStore for MemorySecureStore {
    async fn set_secret(&self, key: &str, value: &[u8]) -> BridgeResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(BridgeError::OperationFailed("keychain locked".into()));
        }
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

#[derive(Default)]
pub struct MemorySettings {
    data: Mutex<HashMap<String, String>>,
}

#[async_trait]
impl SettingsStore for MemorySettings {
    async fn set_string(&self, key: &str, value: &str) -> BridgeResult<()> {
        self.data.lock().unwrap().insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn get_string(&self, key: &str) -> BridgeResult<Option<String>> {
        Ok(self.data.lock().unwrap().get(key).cloned())
    }

    async fn delete(&self, key: &str) -> BridgeResult<()> {
        self.data.lock().unwrap().remove(key);
        Ok(())
    }

    async fn list_keys(&self) -> BridgeResult<Vec<String>> {
        Ok(self.data.lock().unwrap().keys().cloned().collect())
    }

    async fn clear_all(&self) -> BridgeResult<()> {
        self.data.lock().unwrap().clear();
        Ok(())
    }
}

#[derive(Default)]
pub struct CountingCache {
    pub clears: AtomicUsize,
}

impl CountingCache {
    pub fn clears(&self) -> usize {
        self.clears.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SessionCache for CountingCache {
    async fn clear(&self) {
        self.clears.fetch_add(1, Ordering::SeqCst);
    }
}

pub fn auth_response(access: &str, refresh: &str, expires_in: i64) -> String {
    format!(
        r#"{{"access_token":"{}","refresh_token":"{}","token_type":"bearer","expires_in":{},
            "user":{{"id":"u-1","email":"me@example.com","has_password":true}}}}"#,
        access, refresh, expires_in
    )
}

pub fn leak(body: String) -> &'static str {
    Box::leak(body.into_boxed_str())
}

pub struct Harness {
    pub http: Arc<ScriptedHttp>,
    pub secure: Arc<MemorySecureStore>,
    pub clock: Arc<ManualClock>,
    pub bus: EventBus,
    pub store: Arc<TokenStore>,
    pub refresher: Arc<SessionRefresher>,
    pub client: Arc<ApiClient>,
    pub session: Arc<AuthSession>,
}

impl Harness {
    pub fn new() -> Self {
        let http = Arc::new(ScriptedHttp::default());
        let secure = Arc::new(MemorySecureStore::default());
        let clock = Arc::new(ManualClock::new(NOW));
        let bus = EventBus::new(64);

        let store = Arc::new(TokenStore::new(
            secure.clone(),
            Arc::new(MemorySettings::default()),
            clock.clone(),
        ));
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
        let session = Arc::new(AuthSession::new(
            AuthApi::new(client.clone()),
            store.clone(),
            refresher.clone(),
            clock.clone(),
            bus.clone(),
        ));

        Self {
            http,
            secure,
            clock,
            bus,
            store,
            refresher,
            client,
            session,
        }
    }

    /// Persist a session whose access token expires `expires_in_ms` from now.
    pub fn seed_session(&self, access: &str, refresh: &str, expires_in_ms: i64) {
        self.secure.put("auth.accessToken", access);
        self.secure.put("auth.refreshToken", refresh);
        self.secure
            .put("auth.expiresAt", &(NOW + expires_in_ms).to_string());
        self.secure.put(
            "auth.user",
            r#"{"id":"u-1","email":"me@example.com","has_password":true}"#,
        );
    }
}
