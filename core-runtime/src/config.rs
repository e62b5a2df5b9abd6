//! # Client Configuration Module
//!
//! Provides configuration management for the expense client core.
//!
//! ## Overview
//!
//! The configuration system uses a builder pattern to construct a `ClientConfig`
//! holding every bridge and tunable the core needs. It enforces fail-fast
//! validation so a missing capability is reported at startup, not on the
//! first request.
//!
//! ## Required Dependencies
//!
//! - `HttpClient` - Executes API requests (desktop default: reqwest)
//! - `SecureStore` - Preferred token persistence (desktop default: OS keychain)
//! - `SettingsStore` - Fallback token persistence (desktop default: SQLite)
//!
//! ## Optional Dependencies
//!
//! - `Clock` - Time source for expiry checks (default: `SystemClock`)
//!
//! When the `desktop-shims` feature is enabled, desktop-ready defaults for the
//! three required bridges are injected automatically if not provided.
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::ClientConfig;
//! use std::time::Duration;
//!
//! let config = ClientConfig::builder()
//!     .api_base_url("https://api.example.com")
//!     .request_timeout(Duration::from_secs(15))
//!     .build()?;
//! ```
//!
//! Or seeded from the environment (`EXPENSE_API_URL`):
//!
//! ```ignore
//! let config = ClientConfigBuilder::from_env().build()?;
//! ```

use crate::error::{Error, Result};
use crate::events::DEFAULT_EVENT_BUFFER_SIZE;
use bridge_traits::{Clock, HttpClient, SecureStore, SettingsStore, SystemClock};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Environment variable holding the API base URL.
pub const API_URL_ENV: &str = "EXPENSE_API_URL";

/// Base URL used when nothing else is configured.
pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8000";

/// Access tokens expiring within this window are refreshed before use.
pub const DEFAULT_REFRESH_MARGIN: Duration = Duration::from_secs(30);

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Number of API responses kept by the query cache.
pub const DEFAULT_CACHE_CAPACITY: usize = 64;

/// Core configuration
///
/// Holds the injected platform bridges plus tunables. Built once at startup
/// and shared by every component.
#[derive(Clone)]
pub struct ClientConfig {
    /// API base URL without a trailing slash
    pub api_base_url: String,

    /// HTTP bridge used by the request pipeline
    pub http_client: Arc<dyn HttpClient>,

    /// Preferred token storage
    pub secure_store: Arc<dyn SecureStore>,

    /// Token storage used when the secure store reports itself unavailable
    pub settings_store: Arc<dyn SettingsStore>,

    /// Time source for token expiry
    pub clock: Arc<dyn Clock>,

    /// Tokens expiring within this margin are refreshed proactively
    pub refresh_margin: Duration,

    /// Timeout applied to each HTTP request
    pub request_timeout: Duration,

    /// Maximum number of cached API responses
    pub cache_capacity: usize,

    /// Broadcast buffer for the event bus
    pub event_buffer_size: usize,
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("api_base_url", &self.api_base_url)
            .field("http_client", &"HttpClient { ... }")
            .field("secure_store", &"SecureStore { ... }")
            .field("settings_store", &"SettingsStore { ... }")
            .field("clock", &"Clock { ... }")
            .field("refresh_margin", &self.refresh_margin)
            .field("request_timeout", &self.request_timeout)
            .field("cache_capacity", &self.cache_capacity)
            .field("event_buffer_size", &self.event_buffer_size)
            .finish()
    }
}

impl ClientConfig {
    /// Create a new configuration builder
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::default()
    }

    /// Join an API path onto the base URL.
    ///
    /// `path` is expected to start with `/` and may carry a query string.
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.api_base_url, path)
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The base URL is not an absolute http(s) URL
    /// - A size or duration is zero
    /// - The refresh margin is not shorter than one hour
    pub fn validate(&self) -> Result<()> {
        normalize_base_url(&self.api_base_url)?;

        if self.request_timeout.is_zero() {
            return Err(Error::Config(
                "Request timeout must be greater than 0".to_string(),
            ));
        }

        if self.refresh_margin >= Duration::from_secs(3600) {
            return Err(Error::Config(
                "Refresh margin must be shorter than one hour".to_string(),
            ));
        }

        if self.cache_capacity == 0 {
            return Err(Error::Config(
                "Cache capacity must be greater than 0".to_string(),
            ));
        }

        if self.event_buffer_size == 0 {
            return Err(Error::Config(
                "Event buffer size must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

/// Parse and normalize an API base URL, dropping any trailing slash.
fn normalize_base_url(raw: &str) -> Result<String> {
    let parsed = Url::parse(raw.trim())
        .map_err(|e| Error::Config(format!("Invalid API base URL '{}': {}", raw, e)))?;

    match parsed.scheme() {
        "http" | "https" => {}
        other => {
            return Err(Error::Config(format!(
                "API base URL must use http or https, got '{}'",
                other
            )))
        }
    }

    if parsed.query().is_some() || parsed.fragment().is_some() {
        return Err(Error::Config(
            "API base URL must not carry a query string or fragment".to_string(),
        ));
    }

    Ok(parsed.as_str().trim_end_matches('/').to_string())
}

#[cfg(not(feature = "desktop-shims"))]
fn http_client_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "HttpClient".to_string(),
        message: "No HTTP client implementation provided. \
                 Desktop: ensure the 'desktop-shims' feature is enabled to use ReqwestHttpClient. \
                 Mobile: inject the platform-native HTTP adapter."
            .to_string(),
    }
}

#[cfg(not(feature = "desktop-shims"))]
fn secure_store_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "SecureStore".to_string(),
        message: "SecureStore implementation is required for token persistence. \
                 Desktop: ensure the 'desktop-shims' feature is enabled to use the default KeyringSecureStore. \
                 Mobile: inject platform-native secure storage (Keychain/Keystore)."
            .to_string(),
    }
}

#[cfg(not(feature = "desktop-shims"))]
fn settings_store_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "SettingsStore".to_string(),
        message: "SettingsStore implementation is required as the token storage fallback. \
                 Desktop: ensure the 'desktop-shims' feature is enabled to use the default SqliteSettingsStore. \
                 Mobile: inject platform-native settings (UserDefaults/DataStore)."
            .to_string(),
    }
}

#[cfg(feature = "desktop-shims")]
fn provide_default_http_client(timeout: Duration) -> Result<Arc<dyn HttpClient>> {
    use bridge_desktop::ReqwestHttpClient;

    let client = ReqwestHttpClient::with_timeout(timeout).map_err(|e| {
        Error::Internal(format!("Failed to initialize default HttpClient: {}", e))
    })?;
    let client: Arc<dyn HttpClient> = Arc::new(client);
    Ok(client)
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_http_client(_timeout: Duration) -> Result<Arc<dyn HttpClient>> {
    Err(http_client_missing_error())
}

#[cfg(feature = "desktop-shims")]
fn provide_default_secure_store() -> Result<Arc<dyn SecureStore>> {
    use bridge_desktop::KeyringSecureStore;

    let store: Arc<dyn SecureStore> = Arc::new(KeyringSecureStore::new());
    Ok(store)
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_secure_store() -> Result<Arc<dyn SecureStore>> {
    Err(secure_store_missing_error())
}

#[cfg(feature = "desktop-shims")]
fn provide_default_settings_store(path: Option<PathBuf>) -> Result<Arc<dyn SettingsStore>> {
    let store: Arc<dyn SettingsStore> = Arc::new(desktop::DeferredSqliteSettings::new(path));
    Ok(store)
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_settings_store(_path: Option<PathBuf>) -> Result<Arc<dyn SettingsStore>> {
    Err(settings_store_missing_error())
}

#[cfg(feature = "desktop-shims")]
mod desktop {
    //! The SQLite pool must be created on the runtime that will use it, and
    //! `build()` is synchronous, so the fallback store opens on first use.

    use async_trait::async_trait;
    use bridge_desktop::SqliteSettingsStore;
    use bridge_traits::{error::Result, SettingsStore};
    use std::path::PathBuf;
    use tokio::sync::OnceCell;

    pub(super) struct DeferredSqliteSettings {
        path: Option<PathBuf>,
        store: OnceCell<SqliteSettingsStore>,
    }

    impl DeferredSqliteSettings {
        pub(super) fn new(path: Option<PathBuf>) -> Self {
            Self {
                path,
                store: OnceCell::new(),
            }
        }

        async fn store(&self) -> Result<&SqliteSettingsStore> {
            self.store
                .get_or_try_init(|| async {
                    match &self.path {
                        Some(path) => SqliteSettingsStore::new(path.clone()).await,
                        None => SqliteSettingsStore::open_default().await,
                    }
                })
                .await
        }
    }

    #[async_trait]
    impl SettingsStore for DeferredSqliteSettings {
        async fn set_string(&self, key: &str, value: &str) -> Result<()> {
            self.store().await?.set_string(key, value).await
        }

        async fn get_string(&self, key: &str) -> Result<Option<String>> {
            self.store().await?.get_string(key).await
        }

        async fn delete(&self, key: &str) -> Result<()> {
            self.store().await?.delete(key).await
        }

        async fn has_key(&self, key: &str) -> Result<bool> {
            self.store().await?.has_key(key).await
        }

        async fn list_keys(&self) -> Result<Vec<String>> {
            self.store().await?.list_keys().await
        }

        async fn clear_all(&self) -> Result<()> {
            self.store().await?.clear_all().await
        }
    }
}

/// Builder for `ClientConfig`
///
/// Provides a fluent API for constructing configuration with validation.
#[derive(Default)]
pub struct ClientConfigBuilder {
    api_base_url: Option<String>,
    http_client: Option<Arc<dyn HttpClient>>,
    secure_store: Option<Arc<dyn SecureStore>>,
    settings_store: Option<Arc<dyn SettingsStore>>,
    settings_path: Option<PathBuf>,
    clock: Option<Arc<dyn Clock>>,
    refresh_margin: Option<Duration>,
    request_timeout: Option<Duration>,
    cache_capacity: Option<usize>,
    event_buffer_size: Option<usize>,
}

impl ClientConfigBuilder {
    /// Seed the builder from the process environment.
    ///
    /// Reads `EXPENSE_API_URL`; a missing or blank value leaves the default
    /// base URL in place.
    pub fn from_env() -> Self {
        let mut builder = Self::default();
        if let Ok(url) = std::env::var(API_URL_ENV) {
            if !url.trim().is_empty() {
                builder.api_base_url = Some(url);
            }
        }
        builder
    }

    /// Set the API base URL (e.g., `https://api.example.com`)
    pub fn api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = Some(url.into());
        self
    }

    /// Set the HTTP client implementation
    pub fn http_client(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(client);
        self
    }

    /// Set the secure store implementation
    pub fn secure_store(mut self, store: Arc<dyn SecureStore>) -> Self {
        self.secure_store = Some(store);
        self
    }

    /// Set the fallback settings store implementation
    pub fn settings_store(mut self, store: Arc<dyn SettingsStore>) -> Self {
        self.settings_store = Some(store);
        self
    }

    /// Database file for the default desktop settings store.
    ///
    /// Ignored when a settings store is injected.
    pub fn settings_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.settings_path = Some(path.into());
        self
    }

    /// Set the time source
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn refresh_margin(mut self, margin: Duration) -> Self {
        self.refresh_margin = Some(margin);
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    pub fn cache_capacity(mut self, capacity: usize) -> Self {
        self.cache_capacity = Some(capacity);
        self
    }

    pub fn event_buffer_size(mut self, size: usize) -> Self {
        self.event_buffer_size = Some(size);
        self
    }

    /// Build the configuration
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The base URL does not parse
    /// - A required bridge is missing and no desktop default is available
    /// - Validation fails
    pub fn build(self) -> Result<ClientConfig> {
        let api_base_url = normalize_base_url(
            self.api_base_url
                .as_deref()
                .unwrap_or(DEFAULT_API_BASE_URL),
        )?;

        let request_timeout = self.request_timeout.unwrap_or(DEFAULT_REQUEST_TIMEOUT);

        let http_client = match self.http_client {
            Some(client) => client,
            None => provide_default_http_client(request_timeout)?,
        };

        let secure_store = match self.secure_store {
            Some(store) => store,
            None => provide_default_secure_store()?,
        };

        let settings_store = match self.settings_store {
            Some(store) => store,
            None => provide_default_settings_store(self.settings_path)?,
        };

        let config = ClientConfig {
            api_base_url,
            http_client,
            secure_store,
            settings_store,
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            refresh_margin: self.refresh_margin.unwrap_or(DEFAULT_REFRESH_MARGIN),
            request_timeout,
            cache_capacity: self.cache_capacity.unwrap_or(DEFAULT_CACHE_CAPACITY),
            event_buffer_size: self.event_buffer_size.unwrap_or(DEFAULT_EVENT_BUFFER_SIZE),
        };

        config.validate()?;

        Ok(config)
    }
}
