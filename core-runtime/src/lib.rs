//! # Core Runtime Module
//!
//! Provides foundational runtime infrastructure for the expense client core:
//! - Logging and tracing infrastructure
//! - Configuration management
//! - Event bus system
//!
//! ## Overview
//!
//! This crate contains the runtime utilities that other modules depend on.
//! It establishes the logging conventions, the configuration builder that
//! carries the platform bridges, and the event broadcasting used throughout
//! the system.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use config::{ClientConfig, ClientConfigBuilder};
pub use error::{Error, Result};
pub use events::{AuthEvent, CacheEvent, CoreEvent, EventBus};
