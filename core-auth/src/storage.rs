//! Key-value backend selection for persisted session fields.
//!
//! The secure store is preferred. When it reports itself unavailable the
//! session is kept in the general settings store instead. The probe runs once
//! per process and the choice is kept for its lifetime.

use crate::error::{AuthError, Result};
use async_trait::async_trait;
use bridge_traits::storage::{SecureStore, SettingsStore};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{info, warn};

/// String key-value operations shared by both backends.
#[async_trait]
pub(crate) trait KeyValueBackend: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn set(&self, key: &str, value: &str) -> Result<()>;
    async fn remove(&self, key: &str) -> Result<()>;
    fn name(&self) -> &'static str;
}

struct SecureBackend(Arc<dyn SecureStore>);

#[async_trait]
impl KeyValueBackend for SecureBackend {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        match self.0.get_secret(key).await? {
            Some(bytes) => String::from_utf8(bytes).map(Some).map_err(|e| {
                AuthError::SecureStorageUnavailable(format!("{} is not valid UTF-8: {}", key, e))
            }),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        Ok(self.0.set_secret(key, value.as_bytes()).await?)
    }

    async fn remove(&self, key: &str) -> Result<()> {
        Ok(self.0.delete_secret(key).await?)
    }

    fn name(&self) -> &'static str {
        "secure"
    }
}

struct SettingsBackend(Arc<dyn SettingsStore>);

#[async_trait]
impl KeyValueBackend for SettingsBackend {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.0.get_string(key).await?)
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        Ok(self.0.set_string(key, value).await?)
    }

    async fn remove(&self, key: &str) -> Result<()> {
        Ok(self.0.delete(key).await?)
    }

    fn name(&self) -> &'static str {
        "settings"
    }
}

/// Lazily picks the backend on first use.
pub(crate) struct BackendSelector {
    secure: Arc<dyn SecureStore>,
    settings: Arc<dyn SettingsStore>,
    selected: OnceCell<Arc<dyn KeyValueBackend>>,
}

impl BackendSelector {
    pub(crate) fn new(secure: Arc<dyn SecureStore>, settings: Arc<dyn SettingsStore>) -> Self {
        Self {
            secure,
            settings,
            selected: OnceCell::new(),
        }
    }

    pub(crate) async fn backend(&self) -> &Arc<dyn KeyValueBackend> {
        self.selected
            .get_or_init(|| async {
                if self.secure.is_available().await {
                    info!("Persisting session in secure storage");
                    Arc::new(SecureBackend(Arc::clone(&self.secure))) as Arc<dyn KeyValueBackend>
                } else {
                    warn!("Secure storage unavailable, persisting session in settings storage");
                    Arc::new(SettingsBackend(Arc::clone(&self.settings))) as Arc<dyn KeyValueBackend>
                }
            })
            .await
    }
}
