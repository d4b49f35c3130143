//! The capability set every backend implements.
//!
//! # Design
//! `Connection` owns exactly one `Box<dyn Transport>`, picked when it is
//! built. The connection resolves paths and assembles headers; a transport
//! only moves bytes and hands back a normalized `Response`.

use crate::error::Result;
use crate::http::{Headers, HttpMethod, Response};

pub trait Transport: Send + Sync {
    /// GET `url` with `headers`. The response body is decompressed if the
    /// server sent gzip.
    fn get(&self, url: &str, headers: &Headers) -> Result<Response>;

    /// Send `method` to `url` with an optional body. No content decoding is
    /// requested or applied.
    fn request_with_body(
        &self,
        method: HttpMethod,
        url: &str,
        body: Option<&[u8]>,
        headers: &Headers,
    ) -> Result<Response>;
}
