use core_auth::AuthError;
use core_expense::ExpenseError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Core initialization failed: {0}")]
    InitializationFailed(String),

    #[error("Capability missing: {capability} - {message}")]
    CapabilityMissing { capability: String, message: String },

    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    #[error("Expense error: {0}")]
    Expense(#[from] ExpenseError),
}

impl From<core_runtime::Error> for CoreError {
    fn from(err: core_runtime::Error) -> Self {
        match err {
            core_runtime::Error::CapabilityMissing {
                capability,
                message,
            } => CoreError::CapabilityMissing {
                capability,
                message,
            },
            other => CoreError::InitializationFailed(other.to_string()),
        }
    }
}

/// Shown when an error carries nothing a user can act on.
pub const FALLBACK_ERROR_MESSAGE: &str = "Something went wrong. Please try again.";

/// User-facing text for any error raised by the core.
///
/// Walks the source chain. Server errors yield the server's message wherever
/// they are wrapped. Setup and local expense failures yield their display
/// text. Anything else yields [`FALLBACK_ERROR_MESSAGE`].
pub fn error_message(err: &(dyn std::error::Error + 'static)) -> String {
    let mut current = Some(err);
    while let Some(e) = current {
        if let Some(core) = e.downcast_ref::<CoreError>() {
            if let CoreError::InitializationFailed(_) | CoreError::CapabilityMissing { .. } = core {
                return core.to_string();
            }
        }
        if let Some(expense) = e.downcast_ref::<ExpenseError>() {
            if !matches!(expense, ExpenseError::Auth(_)) {
                return expense.to_string();
            }
        }
        if let Some(auth) = e.downcast_ref::<AuthError>() {
            return auth.to_string();
        }
        current = e.source();
    }
    FALLBACK_ERROR_MESSAGE.to_string()
}

pub type Result<T> = std::result::Result<T, CoreError>;
