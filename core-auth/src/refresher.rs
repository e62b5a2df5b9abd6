//! Single-flight refresh-token exchange.
//!
//! At most one exchange runs at a time. Callers that arrive while one is in
//! progress await the same outcome instead of starting their own.
//!
//! An exchange only writes back if the token store has not been cleared
//! since it read the refresh token, so a sign-out that overlaps a refresh
//! stays signed out.

use crate::error::{AuthError, Result};
use crate::token_store::TokenStore;
use crate::types::{AuthResponse, RefreshTokenRequest, SessionSnapshot};
use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest};
use core_runtime::events::{AuthEvent, CoreEvent, EventBus};
use futures::future::{BoxFuture, FutureExt, Shared};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

pub const REFRESH_PATH: &str = "/v1/auth/refresh";

type RefreshFuture = Shared<BoxFuture<'static, Result<Option<SessionSnapshot>>>>;

#[derive(Clone)]
struct RefreshContext {
    http: Arc<dyn HttpClient>,
    refresh_url: String,
    timeout: Duration,
    token_store: Arc<TokenStore>,
    event_bus: EventBus,
}

/// Exchanges the stored refresh token for a new session.
///
/// The exchange talks to the HTTP client directly, never through the request
/// pipeline, so a 401 from the refresh endpoint cannot trigger another
/// refresh.
pub struct SessionRefresher {
    context: RefreshContext,
    in_flight: Arc<Mutex<Option<RefreshFuture>>>,
}

impl SessionRefresher {
    pub fn new(
        http: Arc<dyn HttpClient>,
        api_base_url: &str,
        timeout: Duration,
        token_store: Arc<TokenStore>,
        event_bus: EventBus,
    ) -> Self {
        Self {
            context: RefreshContext {
                http,
                refresh_url: format!("{}{}", api_base_url.trim_end_matches('/'), REFRESH_PATH),
                timeout,
                token_store,
                event_bus,
            },
            in_flight: Arc::new(Mutex::new(None)),
        }
    }

    /// Obtain a fresh session.
    ///
    /// Resolves to `None` when there is no refresh token or the server
    /// rejected it. In the rejected case the persisted session has already
    /// been cleared. Storage failures are returned as errors.
    pub async fn refresh(&self) -> Result<Option<SessionSnapshot>> {
        let exchange = {
            let mut slot = self.in_flight.lock().await;
            match slot.as_ref() {
                Some(existing) => {
                    debug!("Joining in-flight token refresh");
                    existing.clone()
                }
                None => {
                    let exchange =
                        Self::exchange(self.context.clone(), Arc::clone(&self.in_flight))
                            .boxed()
                            .shared();
                    *slot = Some(exchange.clone());
                    exchange
                }
            }
        };

        exchange.await
    }

    /// Whether an exchange is currently outstanding.
    pub async fn is_refreshing(&self) -> bool {
        self.in_flight.lock().await.is_some()
    }

    async fn exchange(
        context: RefreshContext,
        in_flight: Arc<Mutex<Option<RefreshFuture>>>,
    ) -> Result<Option<SessionSnapshot>> {
        let outcome = run_exchange(&context).await;
        // Cleared before any waiter observes the outcome.
        in_flight.lock().await.take();
        outcome
    }
}

#[instrument(skip(context))]
async fn run_exchange(context: &RefreshContext) -> Result<Option<SessionSnapshot>> {
    let epoch = context.token_store.epoch();
    let stored = context.token_store.load().await?;
    let Some(refresh_token) = stored.refresh_token else {
        debug!("No refresh token stored, skipping refresh");
        return Ok(None);
    };

    let _ = context
        .event_bus
        .emit(CoreEvent::Auth(AuthEvent::TokenRefreshing));

    let request = HttpRequest::new(HttpMethod::Post, context.refresh_url.as_str())
        .json(&RefreshTokenRequest { refresh_token })
        .map_err(|e| AuthError::Serialization(e.to_string()))?
        .timeout(context.timeout);

    let response = match context.http.execute(request).await {
        Ok(response) => response,
        Err(e) => {
            warn!(error = %e, "Token refresh request failed");
            return expire(context, epoch).await;
        }
    };

    if !response.is_success() {
        warn!(status = response.status, "Refresh token rejected");
        return expire(context, epoch).await;
    }

    let auth: AuthResponse = match response.json() {
        Ok(auth) => auth,
        Err(e) => {
            warn!(error = %e, "Malformed token refresh response");
            return expire(context, epoch).await;
        }
    };

    let Some(snapshot) = context
        .token_store
        .set_from_response_if_current(&auth, epoch)
        .await?
    else {
        info!("Session ended during refresh, discarding new tokens");
        return Ok(None);
    };
    let expires_at = snapshot.expires_at.unwrap_or_default();
    info!(expires_at, "Access token refreshed");

    let _ = context
        .event_bus
        .emit(CoreEvent::Auth(AuthEvent::TokenRefreshed { expires_at }));

    Ok(Some(snapshot))
}

async fn expire(context: &RefreshContext, epoch: u64) -> Result<Option<SessionSnapshot>> {
    if !context.token_store.clear_if_current(epoch).await? {
        debug!("Session already ended, nothing to expire");
        return Ok(None);
    }
    let _ = context
        .event_bus
        .emit(CoreEvent::Auth(AuthEvent::SessionExpired));
    Ok(None)
}
