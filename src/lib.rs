//! Workspace placeholder crate.
//!
//! This crate exists to expose shared feature flags that map to the individual
//! workspace crates (e.g., `core-service`, `core-auth`, `core-expense`).
//! Host applications can depend on `expense-workspace` and enable the
//! documented features without needing to wire each crate individually.

#[cfg(feature = "service")]
pub use core_service::{error_message, CoreError, CoreService, FALLBACK_ERROR_MESSAGE};

#[cfg(feature = "auth")]
pub use core_auth::{AuthError, AuthSession, SessionSnapshot, SessionStatus};

#[cfg(feature = "expense")]
pub use core_expense::{ExpenseApi, ExpenseError};
