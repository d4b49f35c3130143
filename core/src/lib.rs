//! Blocking client core for the invoicing service REST API.
//!
//! # Overview
//! `Connection` sends authenticated GET/POST/PUT/DELETE requests to
//! `https://{account_id}.example-service.net/` and returns a `Response` with
//! status, headers and (decompressed) body bytes. `Url` builds and normalizes
//! request targets from strings, byte strings, segment lists and maps.
//!
//! # Design
//! - Two transports behind one `Transport` trait: a pooled `ureq` agent for
//!   ordinary hosts and a host-supplied `Fetch` primitive for sandboxes
//!   without sockets. The caller picks one with `Backend` when building the
//!   connection; environment detection belongs at the program entry point.
//! - HTTP error statuses are data, not errors. Transport failures propagate
//!   untouched and are never retried here.
//! - Resource models (invoices, clients, recurrings) are built on top of this
//!   crate and are not part of it.

pub mod config;
pub mod connection;
pub mod error;
pub mod fetch;
pub mod http;
pub mod pooled;
pub mod transport;
pub mod url_model;

pub use config::{Backend, BackendKind, ConnectionConfig};
pub use connection::Connection;
pub use error::{Error, FetchError, Result, UrlError};
pub use fetch::{Fetch, FetchRequest, FetchResponse, FetchResult};
pub use http::{Headers, HttpMethod, Response};
pub use transport::Transport;
pub use url_model::{Params, ParamsInput, PathInput, Text, Url, UrlBuilder};
