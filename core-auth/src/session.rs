//! Application-level session state machine.
//!
//! ```text
//! Bootstrapping ──bootstrap──> Authenticated | Anonymous
//! Anonymous ──login / register / google──> Authenticated
//! Authenticated ──logout / delete_account / expiry──> Anonymous
//! Authenticated ──update_user──> Authenticated
//! ```
//!
//! The session holds the in-memory snapshot, mirrors every change to the
//! [`TokenStore`], and republishes [`SessionState`] through a `watch`
//! channel. Leaving `Authenticated` clears every registered
//! [`SessionCache`].
//!
//! Sign-in, sign-out, profile updates and [`AuthSession::reconcile`] run one
//! at a time, so a reconcile never observes a half-finished sign-in.

use crate::api::AuthApi;
use crate::error::{AuthError, Result};
use crate::refresher::SessionRefresher;
use crate::token_store::TokenStore;
use crate::types::{AuthResponse, AuthUser, MessageResponse, SessionSnapshot, UserUpdate};
use async_trait::async_trait;
use bridge_traits::time::Clock;
use core_runtime::events::{AuthEvent, CoreEvent, EventBus, SignInMethod, SignOutReason};
use std::sync::Arc;
use tokio::sync::{watch, Mutex, RwLock};
use tracing::{debug, info, instrument, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Bootstrapping,
    Authenticated,
    Anonymous,
}

/// What the UI needs to render the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionState {
    pub status: SessionStatus,
    pub user: Option<AuthUser>,
}

impl SessionState {
    pub fn is_loading(&self) -> bool {
        self.status == SessionStatus::Bootstrapping
    }

    pub fn is_authenticated(&self) -> bool {
        self.status == SessionStatus::Authenticated
    }
}

/// Per-user data that must not outlive the session.
#[async_trait]
pub trait SessionCache: Send + Sync {
    async fn clear(&self);
}

pub struct AuthSession {
    api: AuthApi,
    token_store: Arc<TokenStore>,
    refresher: Arc<SessionRefresher>,
    clock: Arc<dyn Clock>,
    event_bus: EventBus,
    snapshot: RwLock<SessionSnapshot>,
    state: watch::Sender<SessionState>,
    caches: RwLock<Vec<Arc<dyn SessionCache>>>,
    transitions: Mutex<()>,
}

impl AuthSession {
    pub fn new(
        api: AuthApi,
        token_store: Arc<TokenStore>,
        refresher: Arc<SessionRefresher>,
        clock: Arc<dyn Clock>,
        event_bus: EventBus,
    ) -> Self {
        let (state, _) = watch::channel(SessionState {
            status: SessionStatus::Bootstrapping,
            user: None,
        });
        Self {
            api,
            token_store,
            refresher,
            clock,
            event_bus,
            snapshot: RwLock::new(SessionSnapshot::empty()),
            state,
            caches: RwLock::new(Vec::new()),
            transitions: Mutex::new(()),
        }
    }

    pub fn api(&self) -> &AuthApi {
        &self.api
    }

    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    pub fn status(&self) -> SessionStatus {
        self.state.borrow().status
    }

    pub fn current_user(&self) -> Option<AuthUser> {
        self.state.borrow().user.clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        self.snapshot.read().await.clone()
    }

    pub async fn register_cache(&self, cache: Arc<dyn SessionCache>) {
        self.caches.write().await.push(cache);
    }

    /// Restore the persisted session, refreshing once if the access token is
    /// missing or past its expiry.
    ///
    /// A storage failure leaves the session `Anonymous` and is returned.
    #[instrument(skip(self))]
    pub async fn bootstrap(&self) -> Result<SessionState> {
        let stored = match self.token_store.load().await {
            Ok(stored) => stored,
            Err(e) => {
                warn!(error = %e, "Could not read persisted session");
                self.adopt(SessionSnapshot::empty()).await;
                return Err(e);
            }
        };

        let now = self.clock.unix_timestamp_millis();
        let needs_refresh = stored.refresh_token.is_some()
            && (stored.access_token.is_none() || stored.is_expired_at(now));

        let next = if needs_refresh {
            debug!("Persisted access token unusable, refreshing");
            match self.refresher.refresh().await {
                Ok(refreshed) => refreshed.unwrap_or_default(),
                Err(e) => {
                    warn!(error = %e, "Session refresh during bootstrap failed");
                    self.adopt(SessionSnapshot::empty()).await;
                    return Err(e);
                }
            }
        } else {
            stored
        };

        let state = self.adopt(next.clone()).await;
        if let (true, Some(user_id)) = (state.is_authenticated(), next.user_id()) {
            info!(user_id, "Session restored");
            self.emit(AuthEvent::SignedIn {
                user_id: user_id.to_string(),
                method: SignInMethod::Restored,
            });
        } else {
            debug!("No session to restore");
        }
        Ok(state)
    }

    #[instrument(skip_all)]
    pub async fn login(&self, email: &str, password: &str) -> Result<AuthUser> {
        let outcome = self.api.login(email, password).await;
        self.complete_sign_in(outcome, SignInMethod::Password).await
    }

    #[instrument(skip_all)]
    pub async fn register(&self, email: &str, password: &str) -> Result<AuthUser> {
        let outcome = self.api.register(email, password).await;
        self.complete_sign_in(outcome, SignInMethod::Registration)
            .await
    }

    #[instrument(skip_all)]
    pub async fn login_with_google(&self, id_token: &str) -> Result<AuthUser> {
        let outcome = self.api.login_with_google(id_token).await;
        self.complete_sign_in(outcome, SignInMethod::Google).await
    }

    /// Sign out. The server is asked to revoke the refresh token but its
    /// answer is ignored; local state is always cleared.
    #[instrument(skip(self))]
    pub async fn logout(&self) -> Result<()> {
        let refresh_token = match self.token_store.load().await {
            Ok(stored) => stored.refresh_token,
            Err(e) => {
                warn!(error = %e, "Could not read persisted session, using in-memory copy");
                self.snapshot.read().await.refresh_token.clone()
            }
        };

        if let Some(refresh_token) = refresh_token {
            if let Err(e) = self.api.logout(&refresh_token).await {
                warn!(error = %e, status = e.status(), "Server logout failed, clearing locally");
            }
        }

        self.end_session(SignOutReason::Logout).await
    }

    /// Delete the account on the server, then sign out locally. If the
    /// server refuses, the session is left untouched.
    #[instrument(skip_all)]
    pub async fn delete_account(&self, password: Option<&str>) -> Result<()> {
        if let Err(e) = self.api.delete_account(password).await {
            warn!(error = %e, "Account deletion failed");
            self.report(&e);
            return Err(e);
        }
        self.end_session(SignOutReason::AccountDeleted).await
    }

    /// Merge `update` into the current user and persist it. Returns `None`
    /// without doing anything when no user is signed in.
    #[instrument(skip(self))]
    pub async fn update_user(&self, update: UserUpdate) -> Result<Option<AuthUser>> {
        let _transition = self.transitions.lock().await;
        let next = {
            let current = self.snapshot.read().await;
            let Some(user) = current.user.as_ref() else {
                debug!("No signed-in user, ignoring update");
                return Ok(None);
            };
            SessionSnapshot {
                user: Some(update.apply_to(user)),
                ..current.clone()
            }
        };

        let saved = self.token_store.save(next).await?;
        self.adopt(saved.clone()).await;

        let user = saved.user;
        if let Some(user) = &user {
            self.emit(AuthEvent::UserUpdated {
                user_id: user.id.clone(),
            });
        }
        Ok(user)
    }

    pub async fn request_reset_password(&self) -> Result<MessageResponse> {
        self.api.request_reset_password().await
    }

    /// Set a new password with an emailed code. The user is then known to
    /// have a password.
    #[instrument(skip_all)]
    pub async fn confirm_reset_password(&self, otp: &str, new_password: &str) -> Result<()> {
        self.api.confirm_reset_password(otp, new_password).await?;
        self.update_user(UserUpdate::has_password(true)).await?;
        Ok(())
    }

    pub async fn forgot_password(&self, email: &str) -> Result<MessageResponse> {
        self.api.forgot_password(email).await
    }

    pub async fn confirm_forgot_password(
        &self,
        email: &str,
        otp: &str,
        new_password: &str,
    ) -> Result<()> {
        self.api
            .confirm_forgot_password(email, otp, new_password)
            .await
    }

    /// Re-read the persisted session after the refresher changed it behind
    /// the session's back.
    ///
    /// Only updates tokens in place or ends the session: a cleared store ends
    /// an authenticated session with [`SignOutReason::SessionExpired`]. A
    /// signed-out session that finds tokens in the store clears them instead
    /// of signing back in. Does nothing while bootstrapping.
    #[instrument(skip(self))]
    pub async fn reconcile(&self) -> Result<SessionState> {
        let _transition = self.transitions.lock().await;
        if self.status() == SessionStatus::Bootstrapping {
            return Ok(self.state());
        }

        let stored = self.token_store.load().await?;
        if self.status() != SessionStatus::Authenticated {
            if stored.is_authenticated() {
                warn!("Tokens written after sign-out, discarding them");
                self.token_store.clear().await?;
            }
            return Ok(self.state());
        }

        let previous_user = self.snapshot.read().await.user_id().map(str::to_string);
        let state = self.adopt(stored).await;

        if !state.is_authenticated() {
            info!("Session expired");
            self.invalidate_caches().await;
            self.emit(AuthEvent::SignedOut {
                user_id: previous_user,
                reason: SignOutReason::SessionExpired,
            });
        }
        Ok(state)
    }

    /// Whether a token exchange is running right now.
    pub async fn is_refreshing(&self) -> bool {
        self.refresher.is_refreshing().await
    }

    async fn complete_sign_in(
        &self,
        outcome: Result<AuthResponse>,
        method: SignInMethod,
    ) -> Result<AuthUser> {
        let response = match outcome {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, ?method, "Sign-in failed");
                self.report(&e);
                return Err(e);
            }
        };

        {
            let _transition = self.transitions.lock().await;
            let snapshot = self.token_store.set_from_response(&response).await?;
            self.adopt(snapshot).await;
        }

        info!(user_id = %response.user.id, ?method, "Signed in");
        self.emit(AuthEvent::SignedIn {
            user_id: response.user.id.clone(),
            method,
        });
        Ok(response.user)
    }

    async fn end_session(&self, reason: SignOutReason) -> Result<()> {
        let _transition = self.transitions.lock().await;
        let user_id = self.snapshot.read().await.user_id().map(str::to_string);

        let cleared = self.token_store.clear().await;
        if let Err(e) = &cleared {
            warn!(error = %e, "Failed to clear persisted session");
        }

        self.adopt(SessionSnapshot::empty()).await;
        self.invalidate_caches().await;

        info!(?reason, "Signed out");
        self.emit(AuthEvent::SignedOut { user_id, reason });
        cleared
    }

    async fn adopt(&self, snapshot: SessionSnapshot) -> SessionState {
        let state = SessionState {
            status: if snapshot.is_authenticated() {
                SessionStatus::Authenticated
            } else {
                SessionStatus::Anonymous
            },
            user: snapshot.user.clone(),
        };
        *self.snapshot.write().await = snapshot;
        self.state.send_replace(state.clone());
        state
    }

    async fn invalidate_caches(&self) {
        let caches = self.caches.read().await.clone();
        for cache in caches {
            cache.clear().await;
        }
    }

    fn report(&self, error: &AuthError) {
        let _ = self.event_bus.emit(CoreEvent::Auth(AuthEvent::AuthError {
            message: error.to_string(),
            status: error.status().unwrap_or(0),
        }));
    }

    fn emit(&self, event: AuthEvent) {
        let _ = self.event_bus.emit(CoreEvent::Auth(event));
    }
}
