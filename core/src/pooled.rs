//! Socket-based backend on top of a pooled `ureq::Agent`.
//!
//! # Design
//! The agent keeps idle connections per host and is safe to share across
//! threads, so one agent serves every request of a `Connection`. TLS
//! verification is always on; the trusted roots are the bundled WebPKI set
//! unless a PEM bundle is configured. HTTP error statuses are returned as
//! data, and gzip bodies are decoded by the agent itself. The agent would
//! also advertise gzip on every request, so requests with a body pin
//! `Accept-Encoding: identity` unless the caller set one.

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use ureq::tls::{PemItem, RootCerts, TlsConfig};
use ureq::{Agent, RequestBuilder};

use crate::error::{Error, Result};
use crate::http::{Headers, HttpMethod, Response};
use crate::transport::Transport;

/// Upper bound on a buffered response body.
const MAX_BODY_BYTES: u64 = 64 * 1024 * 1024;

pub struct PooledTransport {
    agent: Agent,
}

impl PooledTransport {
    pub fn new(timeout: Duration, ca_cert_path: Option<&Path>) -> Result<Self> {
        let root_certs = match ca_cert_path {
            Some(path) => load_root_certs(path)?,
            None => RootCerts::WebPki,
        };
        let tls = TlsConfig::builder().root_certs(root_certs).build();

        let agent = Agent::config_builder()
            .timeout_global(Some(timeout))
            .http_status_as_error(false)
            .tls_config(tls)
            .build()
            .new_agent();

        Ok(Self { agent })
    }
}

impl Transport for PooledTransport {
    fn get(&self, url: &str, headers: &Headers) -> Result<Response> {
        let response = with_headers(self.agent.get(url), headers).call()?;
        read_response(response)
    }

    fn request_with_body(
        &self,
        method: HttpMethod,
        url: &str,
        body: Option<&[u8]>,
        headers: &Headers,
    ) -> Result<Response> {
        let builder = match method {
            HttpMethod::Get => self.agent.get(url).force_send_body(),
            HttpMethod::Delete => self.agent.delete(url).force_send_body(),
            HttpMethod::Post => self.agent.post(url),
            HttpMethod::Put => self.agent.put(url),
        };
        let mut builder = with_headers(builder, headers);
        if !headers.contains("Accept-Encoding") {
            builder = builder.header("Accept-Encoding", "identity");
        }

        let response = match body {
            Some(body) => builder.send(body)?,
            None => builder.send_empty()?,
        };
        read_response(response)
    }
}

fn with_headers<B>(mut builder: RequestBuilder<B>, headers: &Headers) -> RequestBuilder<B> {
    for (name, value) in headers.iter() {
        builder = builder.header(name, value);
    }
    builder
}

fn read_response(mut response: ureq::http::Response<ureq::Body>) -> Result<Response> {
    let status = response.status().as_u16();
    let headers: Headers = response
        .headers()
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|value| (name.as_str().to_string(), value.to_string()))
        })
        .collect();
    let data = response
        .body_mut()
        .with_config()
        .limit(MAX_BODY_BYTES)
        .read_to_vec()?;

    Ok(Response {
        status,
        headers,
        data,
    })
}

fn load_root_certs(path: &Path) -> Result<RootCerts> {
    let pem = fs::read(path).map_err(|e| {
        Error::Config(format!("failed to read CA bundle {}: {e}", path.display()))
    })?;

    let mut certs = Vec::new();
    for item in ureq::tls::parse_pem(&pem) {
        match item {
            Ok(PemItem::Certificate(cert)) => certs.push(cert),
            Ok(_) => {}
            Err(e) => {
                return Err(Error::Config(format!(
                    "failed to parse CA bundle {}: {e}",
                    path.display()
                )))
            }
        }
    }
    if certs.is_empty() {
        return Err(Error::Config(format!(
            "CA bundle {} contains no certificates",
            path.display()
        )));
    }

    tracing::debug!(ca_path = %path.display(), count = certs.len(), "loaded CA bundle");
    Ok(RootCerts::Specific(Arc::new(certs)))
}
