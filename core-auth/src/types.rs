//! Wire types for the auth endpoints and the persisted session snapshot.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Authenticated user profile as returned by the API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: String,
    pub email: String,
    pub has_password: bool,
}

/// Token pair issued by login, register, social login and refresh.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthResponse {
    pub access_token: String,
    pub refresh_token: String,
    /// Always `"bearer"`
    #[serde(default = "default_token_type")]
    pub token_type: String,
    /// Access token lifetime in seconds
    pub expires_in: i64,
    pub user: AuthUser,
}

fn default_token_type() -> String {
    "bearer".to_string()
}

impl fmt::Debug for AuthResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthResponse")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .field("token_type", &self.token_type)
            .field("expires_in", &self.expires_in)
            .field("user", &self.user)
            .finish()
    }
}

/// Persisted session state.
///
/// Access token and user are present together or absent together, and
/// `expires_at` is present exactly when the access token is.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    /// Access token expiry in epoch milliseconds
    pub expires_at: Option<i64>,
    pub user: Option<AuthUser>,
}

impl SessionSnapshot {
    /// The snapshot of a signed-out client.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a snapshot from a token response received at `now_millis`.
    ///
    /// An absurd `expires_in` saturates instead of wrapping into the past.
    pub fn from_response(response: &AuthResponse, now_millis: i64) -> Self {
        Self {
            access_token: Some(response.access_token.clone()),
            refresh_token: Some(response.refresh_token.clone()),
            expires_at: Some(now_millis.saturating_add(response.expires_in.saturating_mul(1000))),
            user: Some(response.user.clone()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.access_token.is_none()
            && self.refresh_token.is_none()
            && self.expires_at.is_none()
            && self.user.is_none()
    }

    /// Authenticated iff both an access token and a user are present.
    pub fn is_authenticated(&self) -> bool {
        self.access_token.is_some() && self.user.is_some()
    }

    /// No expiry counts as expired.
    pub fn is_expired_at(&self, now_millis: i64) -> bool {
        self.expires_at.map_or(true, |at| at <= now_millis)
    }

    /// The access token if it stays valid for longer than `margin_millis`.
    pub fn usable_access_token(&self, now_millis: i64, margin_millis: i64) -> Option<&str> {
        match (&self.access_token, self.expires_at) {
            (Some(token), Some(at)) if at - now_millis > margin_millis => Some(token),
            _ => None,
        }
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user.as_ref().map(|u| u.id.as_str())
    }
}

impl fmt::Debug for SessionSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionSnapshot")
            .field("access_token", &self.access_token.as_ref().map(|_| "[REDACTED]"))
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "[REDACTED]"))
            .field("expires_at", &self.expires_at)
            .field("user", &self.user)
            .finish()
    }
}

/// Partial update merged into the current user.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserUpdate {
    pub id: Option<String>,
    pub email: Option<String>,
    pub has_password: Option<bool>,
}

impl UserUpdate {
    pub fn has_password(value: bool) -> Self {
        Self {
            has_password: Some(value),
            ..Self::default()
        }
    }

    pub fn email(value: impl Into<String>) -> Self {
        Self {
            email: Some(value.into()),
            ..Self::default()
        }
    }

    pub fn apply_to(&self, user: &AuthUser) -> AuthUser {
        AuthUser {
            id: self.id.clone().unwrap_or_else(|| user.id.clone()),
            email: self.email.clone().unwrap_or_else(|| user.email.clone()),
            has_password: self.has_password.unwrap_or(user.has_password),
        }
    }
}

/// Body for `/v1/auth/login` and `/v1/auth/register`.
#[derive(Clone, Serialize)]
pub struct PasswordCredentials {
    pub email: String,
    pub password: String,
}

impl fmt::Debug for PasswordCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PasswordCredentials")
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct GoogleLoginRequest {
    pub id_token: String,
}

/// Body for `/v1/auth/refresh` and `/v1/auth/logout`.
#[derive(Clone, Serialize)]
pub struct RefreshTokenRequest {
    pub refresh_token: String,
}

impl fmt::Debug for RefreshTokenRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("RefreshTokenRequest { refresh_token: [REDACTED] }")
    }
}

#[derive(Clone, Default, Serialize)]
pub struct DeleteAccountRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(Clone, Serialize)]
pub struct ForgotPasswordConfirmRequest {
    pub email: String,
    pub otp: String,
    pub new_password: String,
}

#[derive(Clone, Serialize)]
pub struct ResetPasswordConfirmRequest {
    pub otp: String,
    pub new_password: String,
}

/// Generic `{ "message": ... }` acknowledgement.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}
