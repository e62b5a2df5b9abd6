//! # Authentication Module
//!
//! Token lifecycle and session management for the expense API.
//!
//! ## Overview
//!
//! - [`TokenStore`] persists the session snapshot in the platform secure
//!   store, falling back to the settings store when no secure store exists.
//! - [`SessionRefresher`] exchanges the refresh token, with concurrent
//!   callers sharing one exchange.
//! - [`ApiClient`] is the request pipeline every API call goes through. It
//!   attaches bearer tokens, refreshes near expiry and replays once on 401.
//! - [`AuthApi`] wraps the `/v1/auth` endpoints.
//! - [`AuthSession`] is the state machine the UI observes.
//!
//! ## Example
//!
//! ```no_run
//! use core_auth::{ApiClient, AuthApi, AuthSession, SessionRefresher, TokenStore};
//! use core_runtime::{ClientConfig, EventBus};
//! use std::sync::Arc;
//!
//! # async fn example(config: ClientConfig) -> core_auth::Result<()> {
//! let bus = EventBus::default();
//! let store = Arc::new(TokenStore::new(
//!     config.secure_store.clone(),
//!     config.settings_store.clone(),
//!     config.clock.clone(),
//! ));
//! let refresher = Arc::new(SessionRefresher::new(
//!     config.http_client.clone(),
//!     &config.api_base_url,
//!     config.request_timeout,
//!     store.clone(),
//!     bus.clone(),
//! ));
//! let client = Arc::new(ApiClient::new(
//!     config.http_client.clone(),
//!     config.api_base_url.clone(),
//!     store.clone(),
//!     refresher.clone(),
//!     config.clock.clone(),
//! ));
//! let session = AuthSession::new(AuthApi::new(client), store, refresher, config.clock.clone(), bus);
//!
//! let state = session.bootstrap().await?;
//! if !state.is_authenticated() {
//!     session.login("me@example.com", "hunter22").await?;
//! }
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod error;
pub mod pipeline;
pub mod refresher;
pub mod session;
mod storage;
pub mod token_store;
pub mod types;

pub use api::AuthApi;
pub use error::{AuthError, Result};
pub use pipeline::{ApiClient, RequestOptions, ResponseBody};
pub use refresher::SessionRefresher;
pub use session::{AuthSession, SessionCache, SessionState, SessionStatus};
pub use token_store::TokenStore;
pub use types::{AuthResponse, AuthUser, MessageResponse, SessionSnapshot, UserUpdate};
