//! Typed wrappers over the `/v1/auth` endpoints.

use crate::error::Result;
use crate::pipeline::{ApiClient, RequestOptions};
use crate::types::{
    AuthResponse, DeleteAccountRequest, ForgotPasswordConfirmRequest, ForgotPasswordRequest,
    GoogleLoginRequest, MessageResponse, PasswordCredentials, RefreshTokenRequest,
    ResetPasswordConfirmRequest,
};
use core_runtime::logging::redact_if_sensitive;
use std::sync::Arc;
use tracing::instrument;

#[derive(Clone)]
pub struct AuthApi {
    client: Arc<ApiClient>,
}

impl AuthApi {
    pub fn new(client: Arc<ApiClient>) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &Arc<ApiClient> {
        &self.client
    }

    #[instrument(skip(self, email, password), fields(email = %redact_if_sensitive("email", email)))]
    pub async fn register(&self, email: &str, password: &str) -> Result<AuthResponse> {
        let body = PasswordCredentials {
            email: email.to_string(),
            password: password.to_string(),
        };
        self.client
            .request(
                "/v1/auth/register",
                RequestOptions::post().json(&body)?.unauthenticated(),
            )
            .await
    }

    #[instrument(skip(self, email, password), fields(email = %redact_if_sensitive("email", email)))]
    pub async fn login(&self, email: &str, password: &str) -> Result<AuthResponse> {
        let body = PasswordCredentials {
            email: email.to_string(),
            password: password.to_string(),
        };
        self.client
            .request(
                "/v1/auth/login",
                RequestOptions::post().json(&body)?.unauthenticated(),
            )
            .await
    }

    #[instrument(skip_all)]
    pub async fn login_with_google(&self, id_token: &str) -> Result<AuthResponse> {
        let body = GoogleLoginRequest {
            id_token: id_token.to_string(),
        };
        self.client
            .request(
                "/v1/auth/google",
                RequestOptions::post().json(&body)?.unauthenticated(),
            )
            .await
    }

    /// Exchange a refresh token directly. The session refresher does not use
    /// this; it exists for hosts that manage tokens themselves.
    #[instrument(skip_all)]
    pub async fn refresh(&self, refresh_token: &str) -> Result<AuthResponse> {
        let body = RefreshTokenRequest {
            refresh_token: refresh_token.to_string(),
        };
        self.client
            .request(
                "/v1/auth/refresh",
                RequestOptions::post().json(&body)?.unauthenticated(),
            )
            .await
    }

    #[instrument(skip_all)]
    pub async fn logout(&self, refresh_token: &str) -> Result<()> {
        let body = RefreshTokenRequest {
            refresh_token: refresh_token.to_string(),
        };
        self.client
            .request_unit(
                "/v1/auth/logout",
                RequestOptions::post().json(&body)?.unauthenticated(),
            )
            .await
    }

    /// Delete the account. A body is sent only when a non-empty password is
    /// given.
    #[instrument(skip_all)]
    pub async fn delete_account(&self, password: Option<&str>) -> Result<()> {
        let mut options = RequestOptions::delete();
        if let Some(password) = password.filter(|p| !p.is_empty()) {
            options = options.json(&DeleteAccountRequest {
                password: Some(password.to_string()),
            })?;
        }
        self.client.request_unit("/v1/auth/account", options).await
    }

    #[instrument(skip(self, email), fields(email = %redact_if_sensitive("email", email)))]
    pub async fn forgot_password(&self, email: &str) -> Result<MessageResponse> {
        let body = ForgotPasswordRequest {
            email: email.to_string(),
        };
        self.client
            .request(
                "/v1/auth/forgot-password",
                RequestOptions::post().json(&body)?.unauthenticated(),
            )
            .await
    }

    #[instrument(skip(self, email, otp, new_password), fields(email = %redact_if_sensitive("email", email)))]
    pub async fn confirm_forgot_password(
        &self,
        email: &str,
        otp: &str,
        new_password: &str,
    ) -> Result<()> {
        let body = ForgotPasswordConfirmRequest {
            email: email.to_string(),
            otp: otp.to_string(),
            new_password: new_password.to_string(),
        };
        self.client
            .request_unit(
                "/v1/auth/forgot-password/confirm",
                RequestOptions::post().json(&body)?.unauthenticated(),
            )
            .await
    }

    /// Ask the server to email a reset code to the signed-in user.
    #[instrument(skip(self))]
    pub async fn request_reset_password(&self) -> Result<MessageResponse> {
        self.client
            .request("/v1/auth/reset-password/request", RequestOptions::post())
            .await
    }

    #[instrument(skip_all)]
    pub async fn confirm_reset_password(&self, otp: &str, new_password: &str) -> Result<()> {
        let body = ResetPasswordConfirmRequest {
            otp: otp.to_string(),
            new_password: new_password.to_string(),
        };
        self.client
            .request_unit(
                "/v1/auth/reset-password/confirm",
                RequestOptions::post().json(&body)?,
            )
            .await
    }
}
