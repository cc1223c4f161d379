//! Client configuration.

use crate::error::{CloudError, CloudResult};
use groupdrive_storage::KeyStore;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for talking to the group server.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CloudConfig {
    /// Base URL of the group server (e.g., "https://drive.example.com").
    pub api_base_url: String,

    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,

    /// Key store database file. `None` keeps keys in memory only.
    pub key_store_path: Option<PathBuf>,

    /// Create a key pair on first download when the caller has none.
    pub lazy_key_provisioning: bool,
}

impl Default for CloudConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:5000".to_string(),
            request_timeout_secs: 30,
            key_store_path: None,
            lazy_key_provisioning: false,
        }
    }
}

impl CloudConfig {
    pub fn validate(&self) -> CloudResult<()> {
        let url = self.api_base_url.trim();
        if url.is_empty() {
            return Err(CloudError::Config("api_base_url is empty".to_string()));
        }
        let host = url
            .strip_prefix("https://")
            .or_else(|| url.strip_prefix("http://"))
            .ok_or_else(|| {
                CloudError::Config(format!("api_base_url must be http(s): {url}"))
            })?;
        if host.is_empty() || host.starts_with('/') {
            return Err(CloudError::Config(format!("api_base_url has no host: {url}")));
        }
        if self.request_timeout_secs == 0 {
            return Err(CloudError::Config(
                "request_timeout_secs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Opens the key store this configuration points at.
    pub fn open_key_store(&self) -> CloudResult<KeyStore> {
        let store = match &self.key_store_path {
            Some(path) => KeyStore::open(path)?,
            None => KeyStore::open_in_memory()?,
        };
        Ok(store)
    }

    /// Base URL without a trailing slash.
    pub(crate) fn base_url(&self) -> &str {
        self.api_base_url.trim().trim_end_matches('/')
    }
}
