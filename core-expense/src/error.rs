use bridge_traits::error::BridgeError;
use core_auth::AuthError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExpenseError {
    /// Failure inside the request pipeline, including server errors.
    #[error("{0}")]
    Auth(#[from] AuthError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Failed to encode query: {0}")]
    Query(#[from] serde_urlencoded::ser::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] BridgeError),

    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ExpenseError {
    /// HTTP status of the underlying request error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            ExpenseError::Auth(e) => e.status(),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ExpenseError>;
