//! Response construction for gate rejections and forwarded responses.
//!
//! # Design Decisions
//! - Rejections carry `Retry-After` equal to the full window, not the
//!   precise time left in the client's window
//! - Hop-by-hop headers are stripped in both directions

use std::time::Duration;

use axum::{
    body::Body,
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::Response,
};

use crate::security::headers::set_real_ip;

/// Headers meaningful only for a single connection.
const HOP_BY_HOP: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "proxy-connection",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// 429 with `Retry-After` in seconds and the client IP echoed in `x-real-ip`.
pub fn too_many_requests(client_ip: &str, retry_after: Duration) -> Response {
    let mut response = Response::new(Body::from("Too Many Requests"));
    *response.status_mut() = StatusCode::TOO_MANY_REQUESTS;
    response.headers_mut().insert(
        header::RETRY_AFTER,
        HeaderValue::from(retry_after.as_secs()),
    );
    set_real_ip(response.headers_mut(), client_ip);
    response
}

pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    for name in HOP_BY_HOP {
        headers.remove(*name);
    }
}
