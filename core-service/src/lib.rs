//! Core service façade and bootstrap helpers.
//!
//! [`CoreService`] builds every component of the client core once from a
//! [`ClientConfig`] and hands them out behind `Arc`s:
//!
//! ```text
//! AuthSession ─┐
//! ExpenseApi ──┼─> ApiClient ─> TokenStore
//!              │            └─> SessionRefresher ─> TokenStore
//! QueryCache <─┘ (cleared when the session ends)
//! ```
//!
//! Desktop apps enable the `desktop-shims` feature so the configuration
//! builder can fill in `bridge-desktop` adapters. Mobile hosts inject their
//! own bridges.

pub mod error;

pub use error::{error_message, CoreError, Result, FALLBACK_ERROR_MESSAGE};

use bridge_traits::time::Clock;
use core_auth::{ApiClient, AuthApi, AuthSession, SessionRefresher, TokenStore};
use core_expense::{ExpenseApi, FeedFilterStore, QueryCache};
use core_runtime::events::{AuthEvent, CoreEvent, EventBus, Receiver, RecvError};
use core_runtime::ClientConfig;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

/// Primary façade exposed to host applications.
pub struct CoreService {
    config: Arc<ClientConfig>,
    event_bus: EventBus,
    token_store: Arc<TokenStore>,
    api_client: Arc<ApiClient>,
    auth_session: Arc<AuthSession>,
    query_cache: Arc<QueryCache>,
    expense_api: Arc<ExpenseApi>,
    feed_filters: Arc<FeedFilterStore>,
    session_watcher: JoinHandle<()>,
}

impl CoreService {
    /// Wire the components, start the session watcher and restore the
    /// persisted session.
    ///
    /// A session that cannot be read from storage leaves the service running
    /// with an anonymous session.
    ///
    /// ```no_run
    /// use core_runtime::ClientConfig;
    /// use core_service::CoreService;
    ///
    /// # async fn example() -> core_service::Result<()> {
    /// let config = ClientConfig::builder()
    ///     .api_base_url("https://api.example.com")
    ///     .build()?;
    /// let core = CoreService::bootstrap(config).await?;
    ///
    /// if core.auth_session().state().is_authenticated() {
    ///     let summary = core.expense_api().fetch_summary("2026-10").await?;
    ///     println!("net this month: {}", summary.net);
    /// }
    /// # Ok(())
    /// # }
    /// ```
    #[instrument(skip(config), fields(api = %config.api_base_url))]
    pub async fn bootstrap(config: ClientConfig) -> Result<Self> {
        config.validate()?;
        let config = Arc::new(config);
        let event_bus = EventBus::new(config.event_buffer_size);
        let clock: Arc<dyn Clock> = Arc::clone(&config.clock);

        let token_store = Arc::new(TokenStore::new(
            Arc::clone(&config.secure_store),
            Arc::clone(&config.settings_store),
            Arc::clone(&clock),
        ));
        let refresher = Arc::new(SessionRefresher::new(
            Arc::clone(&config.http_client),
            &config.api_base_url,
            config.request_timeout,
            Arc::clone(&token_store),
            event_bus.clone(),
        ));
        let api_client = Arc::new(
            ApiClient::new(
                Arc::clone(&config.http_client),
                config.api_base_url.clone(),
                Arc::clone(&token_store),
                Arc::clone(&refresher),
                Arc::clone(&clock),
            )
            .with_refresh_margin(config.refresh_margin)
            .with_request_timeout(config.request_timeout),
        );
        let auth_session = Arc::new(AuthSession::new(
            AuthApi::new(Arc::clone(&api_client)),
            Arc::clone(&token_store),
            refresher,
            clock,
            event_bus.clone(),
        ));

        let query_cache = Arc::new(QueryCache::new(config.cache_capacity, event_bus.clone()));
        auth_session.register_cache(query_cache.clone()).await;

        let expense_api = Arc::new(ExpenseApi::new(
            Arc::clone(&api_client),
            Arc::clone(&query_cache),
        ));
        let feed_filters = Arc::new(FeedFilterStore::new(Arc::clone(&config.settings_store)));

        let session_watcher =
            Self::spawn_session_watcher(event_bus.subscribe(), Arc::clone(&auth_session));

        match auth_session.bootstrap().await {
            Ok(state) => info!(status = ?state.status, "Core ready"),
            Err(e) => warn!(error = %e, "Session restore failed, continuing signed out"),
        }

        Ok(Self {
            config,
            event_bus,
            token_store,
            api_client,
            auth_session,
            query_cache,
            expense_api,
            feed_filters,
            session_watcher,
        })
    }

    /// Bootstrap with desktop adapters and `EXPENSE_API_URL`.
    ///
    /// Also installs the default tracing subscriber unless the host already
    /// set one.
    #[cfg(feature = "desktop-shims")]
    pub async fn bootstrap_desktop() -> Result<Self> {
        if let Err(e) = core_runtime::logging::init_logging(Default::default()) {
            debug!(error = %e, "Keeping existing tracing subscriber");
        }
        let config = core_runtime::ClientConfigBuilder::from_env().build()?;
        Self::bootstrap(config).await
    }

    /// Keep the session in step with refreshes made by the pipeline.
    ///
    /// The refresher clears the token store when a refresh fails, without the
    /// session knowing. On `SessionExpired` and `TokenRefreshed` the session
    /// re-reads the store, which also clears response caches when the
    /// session ended. A lagged receiver reconciles once to catch up.
    pub fn spawn_session_watcher(
        mut events: Receiver<CoreEvent>,
        session: Arc<AuthSession>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(CoreEvent::Auth(AuthEvent::SessionExpired))
                    | Ok(CoreEvent::Auth(AuthEvent::TokenRefreshed { .. })) => {}
                    Ok(_) => continue,
                    Err(RecvError::Lagged(skipped)) => {
                        debug!(skipped, "Session watcher lagged");
                    }
                    Err(RecvError::Closed) => break,
                }

                if let Err(e) = session.reconcile().await {
                    warn!(error = %e, "Failed to reconcile session with token store");
                }
            }
            debug!("Session watcher stopped");
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    pub fn subscribe_events(&self) -> Receiver<CoreEvent> {
        self.event_bus.subscribe()
    }

    pub fn auth_session(&self) -> Arc<AuthSession> {
        Arc::clone(&self.auth_session)
    }

    pub fn expense_api(&self) -> Arc<ExpenseApi> {
        Arc::clone(&self.expense_api)
    }

    pub fn api_client(&self) -> Arc<ApiClient> {
        Arc::clone(&self.api_client)
    }

    pub fn token_store(&self) -> Arc<TokenStore> {
        Arc::clone(&self.token_store)
    }

    pub fn query_cache(&self) -> Arc<QueryCache> {
        Arc::clone(&self.query_cache)
    }

    pub fn feed_filters(&self) -> Arc<FeedFilterStore> {
        Arc::clone(&self.feed_filters)
    }
}

impl Drop for CoreService {
    fn drop(&mut self) {
        self.session_watcher.abort();
    }
}
