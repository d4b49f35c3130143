//! Authenticated connection to the invoicing service.
//!
//! # Design
//! `Connection` owns the base URL, the authentication headers and one
//! transport, all fixed at construction. Each verb resolves the path
//! against the base URL, merges per-request headers into a copy of the base
//! headers and hands off to the transport. Nothing is retried; transport
//! failures and HTTP error statuses reach the caller unchanged.

use std::time::Duration;

use crate::config::{Backend, BackendKind, ConnectionConfig};
use crate::error::{Error, Result};
use crate::fetch::FetchTransport;
use crate::http::{Headers, HttpMethod, Response};
use crate::pooled::PooledTransport;
use crate::transport::Transport;

pub const API_KEY_HEADER: &str = "X-ApiKey";
pub const APP_ID_HEADER: &str = "X-AppId";
pub const APP_SECRET_HEADER: &str = "X-AppSecret";
pub const CONTENT_TYPE: &str = "application/xml";

/// Blocking client for the invoicing REST API.
///
/// Safe to share between threads; the pooled backend reuses sockets across
/// calls, the fetch backend issues one platform call per request.
pub struct Connection {
    base_url: String,
    headers: Headers,
    timeout: Duration,
    backend: BackendKind,
    transport: Box<dyn Transport>,
}

impl Connection {
    /// Build a connection using `backend` for every request.
    ///
    /// Fails only when a required credential is missing or the configured
    /// CA bundle cannot be loaded. The base URL itself is not validated.
    pub fn new(config: ConnectionConfig, backend: Backend) -> Result<Self> {
        if config.account_id.trim().is_empty() {
            return Err(Error::Config("account id is required".to_string()));
        }
        if config.api_key.is_empty() {
            return Err(Error::Config("API key is required".to_string()));
        }

        let base_url = config.resolved_base_url();
        let headers = base_headers(&config);
        let timeout = config.timeout();
        let kind = backend.kind();

        let transport: Box<dyn Transport> = match backend {
            Backend::Pooled => Box::new(PooledTransport::new(
                timeout,
                config.ca_cert_path.as_deref(),
            )?),
            Backend::Fetch(handle) => Box::new(FetchTransport::new(handle, timeout)),
        };

        tracing::info!(account_id = %config.account_id, backend = %kind, base_url = %base_url, "connection ready");

        Ok(Self {
            base_url,
            headers,
            timeout,
            backend: kind,
            transport,
        })
    }

    /// Shorthand for `Connection::new(config, Backend::Pooled)`.
    pub fn pooled(config: ConnectionConfig) -> Result<Self> {
        Self::new(config, Backend::Pooled)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Headers sent with every request.
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn backend_kind(&self) -> BackendKind {
        self.backend
    }

    /// GET `path`, accepting a gzip-compressed response.
    pub fn get(&self, path: &str) -> Result<Response> {
        let url = self.resolve(path)?;
        let mut headers = self.headers.clone();
        headers.insert("Accept-Encoding", "gzip");

        tracing::debug!(method = "GET", %url, backend = %self.backend, "sending request");
        self.transport.get(url.as_str(), &headers)
    }

    pub fn post(&self, path: &str, body: impl AsRef<[u8]>) -> Result<Response> {
        self.request_with_body(HttpMethod::Post, path, Some(body.as_ref()))
    }

    pub fn put(&self, path: &str, body: impl AsRef<[u8]>) -> Result<Response> {
        self.request_with_body(HttpMethod::Put, path, Some(body.as_ref()))
    }

    pub fn delete(&self, path: &str, body: Option<&[u8]>) -> Result<Response> {
        self.request_with_body(HttpMethod::Delete, path, body)
    }

    fn request_with_body(
        &self,
        method: HttpMethod,
        path: &str,
        body: Option<&[u8]>,
    ) -> Result<Response> {
        let url = self.resolve(path)?;

        tracing::debug!(
            %method,
            %url,
            backend = %self.backend,
            body_len = body.map_or(0, <[u8]>::len),
            "sending request"
        );
        self.transport
            .request_with_body(method, url.as_str(), body, &self.headers)
    }

    /// Join `path` onto the base URL using relative-reference rules.
    ///
    /// The result must keep the base URL's scheme, host and port; absolute
    /// and protocol-relative paths pointing elsewhere are refused.
    fn resolve(&self, path: &str) -> Result<url::Url> {
        let base = url::Url::parse(&self.base_url)?;
        let url = base.join(path)?;
        if url.scheme() != base.scheme()
            || url.host() != base.host()
            || url.port_or_known_default() != base.port_or_known_default()
        {
            tracing::warn!(base_url = %self.base_url, %url, "refusing request to another host");
            return Err(Error::HostChanged(url.to_string()));
        }
        Ok(url)
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .field("backend", &self.backend)
            .finish_non_exhaustive()
    }
}

fn base_headers(config: &ConnectionConfig) -> Headers {
    let mut headers = Headers::new();
    headers.insert(API_KEY_HEADER, config.api_key.as_str());
    headers.insert("Content-Type", CONTENT_TYPE);
    if let Some(app_id) = config.app_id.as_deref().filter(|id| !id.is_empty()) {
        headers.insert(APP_ID_HEADER, app_id);
    }
    if let Some(secret) = config.app_secret.as_deref().filter(|s| !s.is_empty()) {
        headers.insert(APP_SECRET_HEADER, secret);
    }
    headers
}
