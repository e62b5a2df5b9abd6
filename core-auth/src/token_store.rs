//! Persisted session storage.
//!
//! The session is kept under four string keys:
//!
//! | key                 | value                                   |
//! |---------------------|-----------------------------------------|
//! | `auth.accessToken`  | bearer token                            |
//! | `auth.refreshToken` | refresh token                           |
//! | `auth.expiresAt`    | access token expiry, epoch milliseconds |
//! | `auth.user`         | JSON encoded [`AuthUser`]               |
//!
//! An absent field is stored by deleting its key. Reads go through an
//! in-memory copy that is updated before each write reaches the backend, so
//! a load that follows a save observes the saved value even while the write
//! is still in progress.
//!
//! Every [`TokenStore::clear`] starts a new epoch. Writers that read the
//! store, wait on the network and then write back (the token refresher)
//! use the `*_if_current` variants so a sign-out that happened in between
//! is never undone.
//!
//! ## Example
//!
//! ```no_run
//! use core_auth::TokenStore;
//! use std::sync::Arc;
//! # use bridge_traits::{Clock, SecureStore, SettingsStore};
//! # async fn example(
//! #     secure: Arc<dyn SecureStore>,
//! #     settings: Arc<dyn SettingsStore>,
//! #     clock: Arc<dyn Clock>,
//! # ) -> core_auth::Result<()> {
//! let store = TokenStore::new(secure, settings, clock);
//!
//! let snapshot = store.load().await?;
//! if snapshot.is_authenticated() {
//!     println!("signed in as {:?}", snapshot.user_id());
//! }
//!
//! store.clear().await?;
//! # Ok(())
//! # }
//! ```

use crate::error::Result;
use crate::storage::{BackendSelector, KeyValueBackend};
use crate::types::{AuthResponse, AuthUser, SessionSnapshot};
use bridge_traits::storage::{SecureStore, SettingsStore};
use bridge_traits::time::Clock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, instrument, warn};

pub const ACCESS_TOKEN_KEY: &str = "auth.accessToken";
pub const REFRESH_TOKEN_KEY: &str = "auth.refreshToken";
pub const EXPIRES_AT_KEY: &str = "auth.expiresAt";
pub const USER_KEY: &str = "auth.user";

/// Durable home of the session snapshot.
///
/// Storage failures propagate to the caller. A corrupt user record or an
/// unparseable expiry reads back as absent.
pub struct TokenStore {
    backends: BackendSelector,
    cache: RwLock<Option<SessionSnapshot>>,
    clock: Arc<dyn Clock>,
    epoch: AtomicU64,
    /// Serializes saves and clears so backend writes land in call order.
    writes: Mutex<()>,
}

impl TokenStore {
    pub fn new(
        secure_store: Arc<dyn SecureStore>,
        settings_store: Arc<dyn SettingsStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            backends: BackendSelector::new(secure_store, settings_store),
            cache: RwLock::new(None),
            clock,
            epoch: AtomicU64::new(0),
            writes: Mutex::new(()),
        }
    }

    /// Number of clears so far.
    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }

    /// Return the current snapshot, reading the backend on first use.
    pub async fn load(&self) -> Result<SessionSnapshot> {
        if let Some(snapshot) = self.cache.read().await.as_ref() {
            return Ok(snapshot.clone());
        }

        let backend = self.backends.backend().await;
        let (access_token, refresh_token, expires_at, user) = futures::try_join!(
            backend.get(ACCESS_TOKEN_KEY),
            backend.get(REFRESH_TOKEN_KEY),
            backend.get(EXPIRES_AT_KEY),
            backend.get(USER_KEY),
        )?;

        let loaded = SessionSnapshot {
            access_token: non_empty(access_token),
            refresh_token: non_empty(refresh_token),
            expires_at: non_empty(expires_at).and_then(|raw| parse_expiry(&raw)),
            user: non_empty(user).and_then(|raw| parse_user(&raw)),
        };

        debug!(
            backend = backend.name(),
            has_access_token = loaded.access_token.is_some(),
            has_refresh_token = loaded.refresh_token.is_some(),
            "Loaded persisted session"
        );

        // A save that landed while we were reading wins.
        let mut cache = self.cache.write().await;
        Ok(cache.get_or_insert(loaded).clone())
    }

    /// Persist `snapshot`, deleting the keys of absent fields.
    #[instrument(skip(self, snapshot), fields(authenticated = snapshot.is_authenticated()))]
    pub async fn save(&self, snapshot: SessionSnapshot) -> Result<SessionSnapshot> {
        let _writes = self.writes.lock().await;
        self.persist(snapshot).await
    }

    /// Like [`save`](Self::save), but only while the store is still in
    /// `epoch`. Returns `None` without writing once it has been cleared.
    #[instrument(skip(self, snapshot))]
    pub async fn save_if_current(
        &self,
        snapshot: SessionSnapshot,
        epoch: u64,
    ) -> Result<Option<SessionSnapshot>> {
        let _writes = self.writes.lock().await;
        if self.epoch() != epoch {
            debug!(epoch, current = self.epoch(), "Store cleared since read, not saving");
            return Ok(None);
        }
        self.persist(snapshot).await.map(Some)
    }

    /// Store the tokens of a fresh auth response. Expiry is computed from the
    /// clock at the time of the call.
    pub async fn set_from_response(&self, response: &AuthResponse) -> Result<SessionSnapshot> {
        let now = self.clock.unix_timestamp_millis();
        self.save(SessionSnapshot::from_response(response, now)).await
    }

    /// [`set_from_response`](Self::set_from_response) guarded by `epoch`.
    pub async fn set_from_response_if_current(
        &self,
        response: &AuthResponse,
        epoch: u64,
    ) -> Result<Option<SessionSnapshot>> {
        let now = self.clock.unix_timestamp_millis();
        self.save_if_current(SessionSnapshot::from_response(response, now), epoch)
            .await
    }

    /// Remove every persisted field and start a new epoch.
    #[instrument(skip(self))]
    pub async fn clear(&self) -> Result<()> {
        let _writes = self.writes.lock().await;
        self.wipe().await
    }

    /// Clear only while the store is still in `epoch`. Returns whether it
    /// did.
    #[instrument(skip(self))]
    pub async fn clear_if_current(&self, epoch: u64) -> Result<bool> {
        let _writes = self.writes.lock().await;
        if self.epoch() != epoch {
            debug!(epoch, current = self.epoch(), "Store cleared since read, not clearing");
            return Ok(false);
        }
        self.wipe().await.map(|()| true)
    }

    async fn persist(&self, snapshot: SessionSnapshot) -> Result<SessionSnapshot> {
        *self.cache.write().await = Some(snapshot.clone());

        let user_json = snapshot
            .user
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        let expires_at = snapshot.expires_at.map(|at| at.to_string());

        let backend = self.backends.backend().await;
        futures::try_join!(
            write_field(backend, ACCESS_TOKEN_KEY, snapshot.access_token.as_deref()),
            write_field(backend, REFRESH_TOKEN_KEY, snapshot.refresh_token.as_deref()),
            write_field(backend, EXPIRES_AT_KEY, expires_at.as_deref()),
            write_field(backend, USER_KEY, user_json.as_deref()),
        )?;

        Ok(snapshot)
    }

    async fn wipe(&self) -> Result<()> {
        *self.cache.write().await = Some(SessionSnapshot::empty());
        self.epoch.fetch_add(1, Ordering::SeqCst);

        let backend = self.backends.backend().await;
        futures::try_join!(
            backend.remove(ACCESS_TOKEN_KEY),
            backend.remove(REFRESH_TOKEN_KEY),
            backend.remove(EXPIRES_AT_KEY),
            backend.remove(USER_KEY),
        )?;

        debug!("Cleared persisted session");
        Ok(())
    }
}

async fn write_field(backend: &Arc<dyn KeyValueBackend>, key: &str, value: Option<&str>) -> Result<()> {
    match value {
        Some(value) => backend.set(key, value).await,
        None => backend.remove(key).await,
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

fn parse_expiry(raw: &str) -> Option<i64> {
    let trimmed = raw.trim();
    if let Ok(millis) = trimmed.parse::<i64>() {
        return Some(millis);
    }
    match trimmed.parse::<f64>() {
        Ok(value) if value.is_finite() => Some(value as i64),
        _ => {
            warn!("Ignoring unparseable session expiry");
            None
        }
    }
}

fn parse_user(raw: &str) -> Option<AuthUser> {
    match serde_json::from_str(raw) {
        Ok(user) => Some(user),
        Err(e) => {
            warn!(error = %e, "Ignoring corrupt persisted user");
            None
        }
    }
}
