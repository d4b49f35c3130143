//! Backend for sandboxed hosts that expose a fetch primitive instead of sockets.
//!
//! # Design
//! The host implements `Fetch` (a closure works too). Each call is a single
//! blocking exchange bounded by a deadline, with no pooling. The platform's
//! `status_code`/`content` pair is mapped onto `Response::status`/`data`, and
//! since nothing on this path decodes content for us, GET bodies announced as
//! gzip are decompressed here, dropping the headers that described the
//! compressed body.

use std::io::Read;
use std::sync::Arc;
use std::time::Duration;

use flate2::read::GzDecoder;

use crate::error::{Error, FetchError, Result};
use crate::http::{Headers, HttpMethod, Response};
use crate::transport::Transport;

/// One request handed to the platform.
#[derive(Debug, Clone, Copy)]
pub struct FetchRequest<'a> {
    pub url: &'a str,
    pub method: HttpMethod,
    pub headers: &'a Headers,
    pub payload: Option<&'a [u8]>,
    pub deadline: Duration,
}

/// What the platform returns, before normalization.
#[derive(Debug, Clone, Default)]
pub struct FetchResponse {
    pub status_code: u16,
    pub headers: Headers,
    pub content: Vec<u8>,
}

pub type FetchResult = std::result::Result<FetchResponse, FetchError>;

/// A deadline-based fetch primitive supplied by the host platform.
pub trait Fetch: Send + Sync {
    fn fetch(&self, request: FetchRequest<'_>) -> FetchResult;
}

impl<F> Fetch for F
where
    F: Fn(FetchRequest<'_>) -> FetchResult + Send + Sync,
{
    fn fetch(&self, request: FetchRequest<'_>) -> FetchResult {
        self(request)
    }
}

pub struct FetchTransport {
    handle: Arc<dyn Fetch>,
    deadline: Duration,
}

impl FetchTransport {
    pub fn new(handle: Arc<dyn Fetch>, deadline: Duration) -> Self {
        Self { handle, deadline }
    }

    fn call(
        &self,
        method: HttpMethod,
        url: &str,
        payload: Option<&[u8]>,
        headers: &Headers,
    ) -> Result<Response> {
        let response = self
            .handle
            .fetch(FetchRequest {
                url,
                method,
                headers,
                payload,
                deadline: self.deadline,
            })
            .map_err(Error::Fetch)?;

        Ok(Response {
            status: response.status_code,
            headers: response.headers,
            data: response.content,
        })
    }
}

impl Transport for FetchTransport {
    fn get(&self, url: &str, headers: &Headers) -> Result<Response> {
        let mut response = self.call(HttpMethod::Get, url, None, headers)?;
        if is_gzip(&response.headers) {
            let compressed = response.data.len();
            response.data = gunzip(&response.data)?;
            response.headers.remove("content-encoding");
            response.headers.remove("content-length");
            tracing::debug!(compressed, decompressed = response.data.len(), "decompressed gzip body");
        }
        Ok(response)
    }

    fn request_with_body(
        &self,
        method: HttpMethod,
        url: &str,
        body: Option<&[u8]>,
        headers: &Headers,
    ) -> Result<Response> {
        self.call(method, url, body, headers)
    }
}

fn is_gzip(headers: &Headers) -> bool {
    headers
        .get("content-encoding")
        .is_some_and(|value| value.to_ascii_lowercase().contains("gzip"))
}

fn gunzip(data: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    GzDecoder::new(data)
        .read_to_end(&mut out)
        .map_err(Error::Decompress)?;
    Ok(out)
}
