//! Connection settings and backend selection.
//!
//! # Design
//! `ConnectionConfig` carries everything that is plain data and can be
//! loaded from a config file (it derives serde). The backend is chosen
//! separately through `Backend`, because a platform fetch handle is a live
//! object supplied by the host. Deciding which backend to use (for example by
//! looking at environment variables) is the job of the program's entry
//! point; this crate never inspects the environment.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::fetch::Fetch;

/// Default request timeout: ten minutes.
pub const DEFAULT_TIMEOUT_SECS: u64 = 600;

/// Domain every account subdomain lives under.
pub const SERVICE_DOMAIN: &str = "example-service.net";

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

/// Credentials and transport settings for a `Connection`.
#[derive(Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Tenant identifier, used as the subdomain of the base URL.
    pub account_id: String,
    /// Sent as `X-ApiKey` on every request.
    pub api_key: String,
    /// Sent as `X-AppId` when present and non-empty.
    #[serde(default)]
    pub app_id: Option<String>,
    /// Sent as `X-AppSecret` when present and non-empty.
    #[serde(default)]
    pub app_secret: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Replaces `https://{account_id}.example-service.net/` when set.
    #[serde(default)]
    pub base_url: Option<String>,
    /// PEM bundle used instead of the built-in trusted roots (pooled backend only).
    #[serde(default)]
    pub ca_cert_path: Option<PathBuf>,
}

impl ConnectionConfig {
    pub fn new(account_id: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            account_id: account_id.into(),
            api_key: api_key.into(),
            app_id: None,
            app_secret: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            base_url: None,
            ca_cert_path: None,
        }
    }

    pub fn with_app_credentials(
        mut self,
        app_id: impl Into<String>,
        app_secret: impl Into<String>,
    ) -> Self {
        self.app_id = Some(app_id.into());
        self.app_secret = Some(app_secret.into());
        self
    }

    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn with_ca_cert(mut self, path: impl Into<PathBuf>) -> Self {
        self.ca_cert_path = Some(path.into());
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// The base URL requests are resolved against.
    ///
    /// No validation happens here: a malformed account id produces a
    /// malformed URL that fails on the first request.
    pub fn resolved_base_url(&self) -> String {
        match &self.base_url {
            Some(url) => url.clone(),
            None => format!("https://{}.{SERVICE_DOMAIN}/", self.account_id),
        }
    }
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("account_id", &self.account_id)
            .field("api_key", &"<redacted>")
            .field("app_id", &self.app_id)
            .field("app_secret", &self.app_secret.as_ref().map(|_| "<redacted>"))
            .field("timeout_secs", &self.timeout_secs)
            .field("base_url", &self.base_url)
            .field("ca_cert_path", &self.ca_cert_path)
            .finish()
    }
}

/// Which transport a `Connection` uses for its whole lifetime.
#[derive(Clone)]
pub enum Backend {
    /// Connection-pooled HTTPS client with certificate verification.
    Pooled,
    /// Deadline-based fetch primitive supplied by a sandboxed host platform.
    Fetch(Arc<dyn Fetch>),
}

impl Backend {
    pub fn kind(&self) -> BackendKind {
        match self {
            Backend::Pooled => BackendKind::Pooled,
            Backend::Fetch(_) => BackendKind::Fetch,
        }
    }
}

impl fmt::Debug for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backend::Pooled => f.write_str("Pooled"),
            Backend::Fetch(_) => f.write_str("Fetch(..)"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Pooled,
    Fetch,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Pooled => f.write_str("pooled"),
            BackendKind::Fetch => f.write_str("fetch"),
        }
    }
}
