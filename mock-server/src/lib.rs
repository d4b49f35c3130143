use std::{collections::BTreeMap, io::Write, sync::Arc, time::Duration};

use axum::{
    extract::{Path, Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use flate2::{write::GzEncoder, Compression};
use tokio::{net::TcpListener, sync::RwLock};
use uuid::Uuid;

pub const DEFAULT_API_KEY: &str = "test-api-key";
pub const API_KEY_HEADER: &str = "x-apikey";

/// How long `/api/slow` waits before answering.
pub const SLOW_DELAY: Duration = Duration::from_secs(3);

pub type Db = Arc<RwLock<BTreeMap<Uuid, String>>>;

#[derive(Clone)]
pub struct AppState {
    api_key: Arc<str>,
    db: Db,
}

pub fn app() -> Router {
    app_with_key(DEFAULT_API_KEY)
}

pub fn app_with_key(api_key: &str) -> Router {
    let state = AppState {
        api_key: Arc::from(api_key),
        db: Db::default(),
    };
    Router::new()
        .route("/api/invoices", get(list_invoices).post(create_invoice))
        .route(
            "/api/invoices/{id}",
            get(get_invoice).put(update_invoice).delete(delete_invoice),
        )
        .route("/api/echo-headers", get(echo_headers).post(echo_headers))
        .route("/api/slow", get(slow))
        .layer(middleware::from_fn_with_state(state.clone(), require_api_key))
        .with_state(state)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

pub async fn run_with_key(listener: TcpListener, api_key: &str) -> Result<(), std::io::Error> {
    axum::serve(listener, app_with_key(api_key)).await
}

async fn require_api_key(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let supplied = request
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok());
    if supplied != Some(&*state.api_key) {
        tracing::warn!(path = %request.uri().path(), "rejected request without valid api key");
        return xml(
            request.headers(),
            StatusCode::UNAUTHORIZED,
            "<error><message>invalid api key</message></error>".to_string(),
        );
    }
    next.run(request).await
}

async fn list_invoices(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let db = state.db.read().await;
    let mut body = format!("<invoices total=\"{}\">", db.len());
    for (id, invoice) in db.iter() {
        body.push_str(&invoice_xml(*id, invoice));
    }
    body.push_str("</invoices>");
    xml(&headers, StatusCode::OK, body)
}

async fn create_invoice(State(state): State<AppState>, headers: HeaderMap, body: String) -> Response {
    if body.trim().is_empty() {
        return empty_body(&headers);
    }
    let id = Uuid::new_v4();
    let rendered = invoice_xml(id, &body);
    state.db.write().await.insert(id, body);

    let mut response = xml(&headers, StatusCode::CREATED, rendered);
    if let Ok(location) = format!("/api/invoices/{id}").parse() {
        response.headers_mut().insert(header::LOCATION, location);
    }
    response
}

async fn get_invoice(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> Response {
    let db = state.db.read().await;
    match db.get(&id) {
        Some(invoice) => xml(&headers, StatusCode::OK, invoice_xml(id, invoice)),
        None => not_found(&headers),
    }
}

async fn update_invoice(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    body: String,
) -> Response {
    if body.trim().is_empty() {
        return empty_body(&headers);
    }
    let mut db = state.db.write().await;
    match db.get_mut(&id) {
        Some(invoice) => {
            *invoice = body;
            xml(&headers, StatusCode::OK, invoice_xml(id, invoice))
        }
        None => not_found(&headers),
    }
}

async fn delete_invoice(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> Response {
    match state.db.write().await.remove(&id) {
        Some(_) => StatusCode::OK.into_response(),
        None => not_found(&headers),
    }
}

/// Lists the request headers, lowercased and sorted, one `<header>` each.
async fn echo_headers(headers: HeaderMap) -> Response {
    let mut pairs: Vec<(String, String)> = headers
        .iter()
        .map(|(name, value)| {
            (
                name.as_str().to_string(),
                value.to_str().unwrap_or_default().to_string(),
            )
        })
        .collect();
    pairs.sort();

    let mut body = String::from("<headers>");
    for (name, value) in pairs {
        body.push_str(&format!("<header name=\"{name}\">{value}</header>"));
    }
    body.push_str("</headers>");
    xml(&headers, StatusCode::OK, body)
}

async fn slow(headers: HeaderMap) -> Response {
    tokio::time::sleep(SLOW_DELAY).await;
    xml(&headers, StatusCode::OK, "<slow/>".to_string())
}

pub fn invoice_xml(id: Uuid, body: &str) -> String {
    format!("<invoice id=\"{id}\">{body}</invoice>")
}

fn not_found(headers: &HeaderMap) -> Response {
    xml(
        headers,
        StatusCode::NOT_FOUND,
        "<error><message>invoice not found</message></error>".to_string(),
    )
}

fn empty_body(headers: &HeaderMap) -> Response {
    xml(
        headers,
        StatusCode::BAD_REQUEST,
        "<error><message>request body is empty</message></error>".to_string(),
    )
}

/// XML response, gzip-compressed when the request accepts it.
fn xml(request_headers: &HeaderMap, status: StatusCode, body: String) -> Response {
    if accepts_gzip(request_headers) {
        if let Ok(compressed) = gzip(body.as_bytes()) {
            return (
                status,
                [
                    (header::CONTENT_TYPE, "application/xml"),
                    (header::CONTENT_ENCODING, "gzip"),
                ],
                compressed,
            )
                .into_response();
        }
    }
    (status, [(header::CONTENT_TYPE, "application/xml")], body).into_response()
}

fn accepts_gzip(headers: &HeaderMap) -> bool {
    headers
        .get(header::ACCEPT_ENCODING)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.contains("gzip"))
}

pub fn gzip(data: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    encoder.finish()
}

#[cfg(test)]
mod tests {
    use std::io::Read;

    use flate2::read::GzDecoder;

    use super::*;

    #[test]
    fn invoice_xml_wraps_body_with_id() {
        let rendered = invoice_xml(Uuid::nil(), "<number>RE-1</number>");
        assert_eq!(
            rendered,
            "<invoice id=\"00000000-0000-0000-0000-000000000000\"><number>RE-1</number></invoice>"
        );
    }

    #[test]
    fn gzip_output_decodes_back() {
        let compressed = gzip(b"<invoices total=\"0\"></invoices>").unwrap();
        let mut out = String::new();
        GzDecoder::new(&compressed[..]).read_to_string(&mut out).unwrap();
        assert_eq!(out, "<invoices total=\"0\"></invoices>");
    }

    #[test]
    fn accepts_gzip_reads_accept_encoding() {
        let mut headers = HeaderMap::new();
        assert!(!accepts_gzip(&headers));
        headers.insert(header::ACCEPT_ENCODING, "gzip, deflate".parse().unwrap());
        assert!(accepts_gzip(&headers));
    }
}
