//! Security response headers.
//!
//! Every response the gate passes through carries `X-Frame-Options: DENY`,
//! `X-Content-Type-Options: nosniff` and the resolved client IP in
//! `x-real-ip`.

use axum::http::{header, HeaderMap, HeaderValue};

use crate::security::client_ip::X_REAL_IP;

/// Set the pass-through security headers, replacing upstream values.
pub fn apply_security_headers(headers: &mut HeaderMap, client_ip: &str) {
    headers.insert(header::X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));
    headers.insert(header::X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"));
    set_real_ip(headers, client_ip);
}

/// Echo the resolved client IP in `x-real-ip`.
pub fn set_real_ip(headers: &mut HeaderMap, client_ip: &str) {
    match HeaderValue::from_str(client_ip) {
        Ok(value) => {
            headers.insert(X_REAL_IP, value);
        }
        Err(_) => tracing::debug!(client_ip, "Client IP is not a valid header value"),
    }
}
