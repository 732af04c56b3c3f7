//! Request handling and transformation.
//!
//! # Responsibilities
//! - Rebuild an inbound request against a backend base URL
//! - Strip hop-by-hop headers in both directions
//!
//! # Design Decisions
//! - Method, path and query are reused verbatim
//! - The inbound body is moved into the outbound request, never buffered
//! - `Host` is dropped so the client derives it from the backend URI

use axum::{
    body::Body,
    http::{header, HeaderMap, HeaderName, Request},
};

use crate::load_balancer::backend::BackendId;

/// Headers that describe a single connection and must not be forwarded.
const HOP_BY_HOP: [HeaderName; 8] = [
    header::CONNECTION,
    HeaderName::from_static("keep-alive"),
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

/// Build the request sent to `backend` from the inbound `request`.
pub fn build_outbound(backend: &BackendId, request: Request<Body>) -> Result<Request<Body>, axum::http::Error> {
    let (parts, body) = request.into_parts();
    let path_and_query = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");

    let mut builder = Request::builder()
        .method(parts.method)
        .uri(format!("{}{}", backend.base(), path_and_query));

    if let Some(headers) = builder.headers_mut() {
        *headers = parts.headers;
        headers.remove(header::HOST);
        strip_hop_by_hop(headers);
    }

    builder.body(body)
}

/// Remove hop-by-hop headers, including any the `Connection` header names.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let named: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();

    for name in named.iter().chain(HOP_BY_HOP.iter()) {
        headers.remove(name);
    }
}
