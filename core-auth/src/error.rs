use crate::pipeline::ResponseBody;
use bridge_traits::error::BridgeError;
use thiserror::Error;

/// Message shown when an error carries nothing the user can act on.

/// Errors produced by the token store, refresher, request pipeline and
/// auth session.
///
/// `Clone` so a single in-flight refresh can hand the same outcome to every
/// waiter.
#[derive(Error, Debug, Clone)]
pub enum AuthError {
    /// The server answered with a non-2xx status.
    #[error("{message}")]
    Api {
        message: String,
        status: u16,
        body: ResponseBody,
    },

    /// The request never produced an HTTP response.
    #[error("Network request failed: {0}")]
    Network(String),

    #[error("Secure storage unavailable: {0}")]
    SecureStorageUnavailable(String),

    #[error("Serialization failed: {0}")]
    Serialization(String),

    /// A 2xx body did not match the expected shape.
    #[error("Unexpected response: {0}")]
    Decode(String),

    #[error("Not authenticated")]
    NotAuthenticated,

    #[error("Configuration error: {0}")]
    Config(String),
}

impl AuthError {
    /// Build the typed request error for a non-2xx response.
    ///
    /// The message is the body's `detail` field when the body is a JSON
    /// object carrying one, else `Request failed with status N`.
    pub fn from_response(status: u16, body: ResponseBody) -> Self {
        let message = body
            .detail()
            .unwrap_or_else(|| format!("Request failed with status {}", status));
        AuthError::Api {
            message,
            status,
            body,
        }
    }

    /// HTTP status of a request error. Transport failures report `0`.
    pub fn status(&self) -> Option<u16> {
        match self {
            AuthError::Api { status, .. } => Some(*status),
            AuthError::Network(_) => Some(0),
            _ => None,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(401)
    }
}

impl From<BridgeError> for AuthError {
    fn from(err: BridgeError) -> Self {
        AuthError::SecureStorageUnavailable(err.to_string())
    }
}

impl From<serde_json::Error> for AuthError {
    fn from(err: serde_json::Error) -> Self {
        AuthError::Serialization(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AuthError>;
