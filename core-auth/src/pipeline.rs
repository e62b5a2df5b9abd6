//! Authenticated JSON request pipeline.
//!
//! Every API call made by the core goes through [`ApiClient::request`]:
//!
//! 1. If the call is authenticated, a valid access token is obtained
//!    (refreshing first when it is within the refresh margin of expiry).
//! 2. The request is sent with `Content-Type: application/json` when it has a
//!    body and `Authorization: Bearer …` when a token is available.
//! 3. A `401` on an authenticated call triggers one refresh and one replay.
//! 4. The body is decoded as JSON, falling back to raw text.
//! 5. Non-2xx statuses become [`AuthError::Api`].
//!
//! Transport failures surface as [`AuthError::Network`] and are never
//! retried.

use crate::error::{AuthError, Result};
use crate::refresher::SessionRefresher;
use crate::token_store::TokenStore;
use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest, HttpResponse};
use bridge_traits::time::Clock;
use serde::de::{DeserializeOwned, IgnoredAny};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Parsed response body.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    Empty,
    Json(Value),
    /// Non-JSON text, kept verbatim
    Text(String),
}

impl ResponseBody {
    pub fn parse(raw: &[u8]) -> Self {
        if raw.is_empty() {
            return ResponseBody::Empty;
        }
        let text = String::from_utf8_lossy(raw);
        match serde_json::from_str(&text) {
            Ok(value) => ResponseBody::Json(value),
            Err(_) => ResponseBody::Text(text.into_owned()),
        }
    }

    /// The `detail` field of a JSON object body. Non-string details are
    /// rendered as compact JSON.
    pub fn detail(&self) -> Option<String> {
        match self {
            ResponseBody::Json(Value::Object(map)) => match map.get("detail")? {
                Value::String(detail) => Some(detail.clone()),
                Value::Null => None,
                other => Some(other.to_string()),
            },
            _ => None,
        }
    }

    fn into_value(self) -> Value {
        match self {
            ResponseBody::Empty => Value::Null,
            ResponseBody::Json(value) => value,
            ResponseBody::Text(text) => Value::String(text),
        }
    }
}

/// Per-call options for [`ApiClient::request`].
#[derive(Debug, Clone)]
pub struct RequestOptions {
    pub method: HttpMethod,
    pub body: Option<Value>,
    pub headers: Vec<(String, String)>,
    /// Attach a bearer token and refresh on 401
    pub auth: bool,
    /// Allow one refresh-and-replay on 401
    pub retry: bool,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            method: HttpMethod::Get,
            body: None,
            headers: Vec::new(),
            auth: true,
            retry: true,
        }
    }
}

impl RequestOptions {
    pub fn new(method: HttpMethod) -> Self {
        Self {
            method,
            ..Self::default()
        }
    }

    pub fn get() -> Self {
        Self::new(HttpMethod::Get)
    }

    pub fn post() -> Self {
        Self::new(HttpMethod::Post)
    }

    pub fn patch() -> Self {
        Self::new(HttpMethod::Patch)
    }

    pub fn delete() -> Self {
        Self::new(HttpMethod::Delete)
    }

    /// Attach a JSON body.
    pub fn json<T: Serialize>(mut self, body: &T) -> Result<Self> {
        self.body = Some(serde_json::to_value(body)?);
        Ok(self)
    }

    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((key.into(), value.into()));
        self
    }

    /// Send without a bearer token and never refresh.
    pub fn unauthenticated(mut self) -> Self {
        self.auth = false;
        self
    }

    pub fn without_retry(mut self) -> Self {
        self.retry = false;
        self
    }
}

/// Client for the expense API.
pub struct ApiClient {
    http: Arc<dyn HttpClient>,
    base_url: String,
    token_store: Arc<TokenStore>,
    refresher: Arc<SessionRefresher>,
    clock: Arc<dyn Clock>,
    refresh_margin: Duration,
    request_timeout: Duration,
}

impl ApiClient {
    pub fn new(
        http: Arc<dyn HttpClient>,
        api_base_url: impl Into<String>,
        token_store: Arc<TokenStore>,
        refresher: Arc<SessionRefresher>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            http,
            base_url: api_base_url.into().trim_end_matches('/').to_string(),
            token_store,
            refresher,
            clock,
            refresh_margin: Duration::from_secs(30),
            request_timeout: Duration::from_secs(30),
        }
    }

    pub fn with_refresh_margin(mut self, margin: Duration) -> Self {
        self.refresh_margin = margin;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Perform a request and decode a 2xx body into `T`.
    #[instrument(skip(self, options), fields(method = %options.method, auth = options.auth))]
    pub async fn request<T: DeserializeOwned>(
        &self,
        path: &str,
        options: RequestOptions,
    ) -> Result<T> {
        let body = self.request_body(path, options).await?;
        serde_json::from_value(body.into_value()).map_err(|e| {
            warn!(error = %e, "Response did not match expected shape");
            AuthError::Decode(e.to_string())
        })
    }

    /// Perform a request whose 2xx body is not needed.
    pub async fn request_unit(&self, path: &str, options: RequestOptions) -> Result<()> {
        self.request::<IgnoredAny>(path, options).await.map(|_| ())
    }

    /// Perform a request and return the raw parsed body.
    pub async fn request_body(&self, path: &str, options: RequestOptions) -> Result<ResponseBody> {
        let mut options = options;
        loop {
            let response = self.send(path, &options).await?;

            if response.status == 401 && options.auth && options.retry {
                debug!(path, "Unauthorized, attempting token refresh");
                if self.refresher.refresh().await?.is_some() {
                    options.retry = false;
                    continue;
                }
            }

            let body = ResponseBody::parse(&response.body);
            if !response.is_success() {
                debug!(path, status = response.status, "Request failed");
                return Err(AuthError::from_response(response.status, body));
            }
            return Ok(body);
        }
    }

    async fn send(&self, path: &str, options: &RequestOptions) -> Result<HttpResponse> {
        let mut request = HttpRequest::new(options.method, format!("{}{}", self.base_url, path))
            .timeout(self.request_timeout);

        for (key, value) in &options.headers {
            request = request.header(key.as_str(), value.as_str());
        }

        if let Some(body) = &options.body {
            request = request
                .json(body)
                .map_err(|e| AuthError::Serialization(e.to_string()))?;
        }

        if options.auth {
            if let Some(token) = self.valid_access_token().await? {
                request = request.bearer_token(token);
            }
        }

        self.http.execute(request).await.map_err(|e| {
            warn!(path, error = %e, "Request failed before a response was received");
            AuthError::Network(e.to_string())
        })
    }

    /// Access token to attach, refreshing when it is close to expiry.
    ///
    /// With no stored access token or no stored expiry nothing is attached
    /// and no refresh is attempted.
    pub async fn valid_access_token(&self) -> Result<Option<String>> {
        let snapshot = self.token_store.load().await?;
        if snapshot.access_token.is_none() || snapshot.expires_at.is_none() {
            return Ok(None);
        }

        let now = self.clock.unix_timestamp_millis();
        let margin = self.refresh_margin.as_millis() as i64;
        if let Some(token) = snapshot.usable_access_token(now, margin) {
            return Ok(Some(token.to_string()));
        }

        debug!("Access token within refresh margin, refreshing");
        Ok(self
            .refresher
            .refresh()
            .await?
            .and_then(|fresh| fresh.access_token))
    }
}
