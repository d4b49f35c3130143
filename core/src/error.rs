//! Error types for the invoicing client.
//!
//! # Design
//! Configuration problems are reported when a `Connection` is built.
//! Transport failures (DNS, refused connections, TLS, timeouts) are passed
//! through from the active backend without retrying. HTTP error statuses are
//! not errors at this layer; they come back as ordinary `Response` values.
//! `UrlError` covers malformed input to `Url` construction.

/// Boxed error raised by a platform fetch implementation.
pub type FetchError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors returned by `Connection` construction and requests.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A required setting is missing or unusable.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The base URL or request path could not be turned into a URL.
    #[error("invalid request url: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// The request path resolved to a different scheme, host or port than
    /// the base URL.
    #[error("request url {0} is outside the connection's host")]
    HostChanged(String),

    /// The pooled client failed to complete the exchange.
    #[error("transport error: {0}")]
    Transport(#[from] ureq::Error),

    /// The platform fetch primitive failed to complete the exchange.
    #[error("fetch error: {0}")]
    Fetch(#[source] FetchError),

    /// A gzip response body could not be decompressed.
    #[error("failed to decompress response body: {0}")]
    Decompress(#[source] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned while building a `Url`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UrlError {
    /// A query or fragment segment did not contain exactly one `=`.
    #[error("malformed key=value pair: {0:?}")]
    MalformedPair(String),

    /// A byte-string component was not valid UTF-8.
    #[error("component is not valid UTF-8: {0}")]
    InvalidUtf8(String),
}
