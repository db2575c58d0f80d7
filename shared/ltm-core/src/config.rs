//! Plugin configuration

use crate::error::{LtmError, Result};
use serde::Deserialize;
use std::fmt;

const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Connection settings for one load-balancer device.
///
/// Values are handed to the device session unchanged. There are no built-in
/// credentials: host, username and password must always be supplied.
#[derive(Clone, Deserialize, PartialEq, Eq)]
pub struct PluginConfig {
    /// Hostname or IP address of the management endpoint.
    pub host: String,
    pub username: String,
    pub password: String,
    /// Virtual server that carries HTTP traffic. Empty means unmanaged.
    #[serde(default)]
    pub http_vserver: String,
    /// Virtual server that carries HTTPS traffic. Empty means unmanaged.
    #[serde(default)]
    pub https_vserver: String,
    /// SSH private key used to copy certificates to the device.
    #[serde(default)]
    pub private_key: String,
    /// Skip TLS certificate verification for the management endpoint.
    #[serde(default)]
    pub insecure: bool,
    /// Administrative partition; empty selects `/Common`.
    #[serde(default)]
    pub partition_path: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

impl PluginConfig {
    pub fn new(
        host: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            username: username.into(),
            password: password.into(),
            http_vserver: String::new(),
            https_vserver: String::new(),
            private_key: String::new(),
            insecure: false,
            partition_path: String::new(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }

    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup, using the same
    /// keys as [`PluginConfig::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            lookup(key)
                .filter(|v| !v.is_empty())
                .ok_or_else(|| LtmError::Config(format!("{} is required", key)))
        };

        Ok(Self {
            host: required("LTM_HOST")?,
            username: required("LTM_USERNAME")?,
            password: required("LTM_PASSWORD")?,
            http_vserver: lookup("LTM_HTTP_VSERVER").unwrap_or_default(),
            https_vserver: lookup("LTM_HTTPS_VSERVER").unwrap_or_default(),
            private_key: lookup("LTM_PRIVATE_KEY").unwrap_or_default(),
            insecure: lookup("LTM_INSECURE")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false),
            partition_path: lookup("LTM_PARTITION_PATH").unwrap_or_default(),
            request_timeout_secs: match lookup("LTM_REQUEST_TIMEOUT_SECS") {
                Some(v) => v.parse().map_err(|e| {
                    LtmError::Config(format!("Invalid LTM_REQUEST_TIMEOUT_SECS: {}", e))
                })?,
                None => DEFAULT_REQUEST_TIMEOUT_SECS,
            },
        })
    }

    /// Partition name without slashes, e.g. `Common` for `/Common`.
    pub fn partition(&self) -> &str {
        let trimmed = self.partition_path.trim_matches('/');
        if trimmed.is_empty() {
            "Common"
        } else {
            trimmed
        }
    }
}

impl fmt::Debug for PluginConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginConfig")
            .field("host", &self.host)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("http_vserver", &self.http_vserver)
            .field("https_vserver", &self.https_vserver)
            .field("private_key", &self.private_key)
            .field("insecure", &self.insecure)
            .field("partition_path", &self.partition_path)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}
