//! Client IP resolution from proxy and CDN headers.
//!
//! Headers are consulted in strict priority order:
//! 1. `cf-connecting-ip` (CDN)
//! 2. `x-real-ip` (reverse proxy)
//! 3. `x-forwarded-for` (left-most entry only)
//!
//! The left-most forwarded-for entry is taken as the originating client
//! without checking it against a trusted proxy list, so the value is only
//! as trustworthy as the proxy in front of the gate. Clients that cannot be
//! resolved share the `Unknown` bucket.

use axum::http::HeaderMap;

pub const CF_CONNECTING_IP: &str = "cf-connecting-ip";
pub const X_REAL_IP: &str = "x-real-ip";
pub const X_FORWARDED_FOR: &str = "x-forwarded-for";

/// Sentinel used when no header yields an address.
pub const UNKNOWN_CLIENT: &str = "Unknown";

/// Per-request client identity. Only the IP is tracked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIdentity {
    pub ip: String,
}

impl ClientIdentity {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        Self {
            ip: resolve_client_ip(headers),
        }
    }

    pub fn is_unknown(&self) -> bool {
        self.ip == UNKNOWN_CLIENT
    }
}

/// Resolve the best-effort client IP. Never fails.
pub fn resolve_client_ip(headers: &HeaderMap) -> String {
    if let Some(ip) = header_str(headers, CF_CONNECTING_IP) {
        return ip.to_string();
    }
    if let Some(ip) = header_str(headers, X_REAL_IP) {
        return ip.to_string();
    }
    if let Some(forwarded) = header_str(headers, X_FORWARDED_FOR) {
        let first = forwarded.split(',').next().unwrap_or_default().trim();
        if !first.is_empty() {
            return first.to_string();
        }
    }
    UNKNOWN_CLIENT.to_string()
}

// Empty and non-UTF-8 values count as absent.
fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (k, v) in pairs {
            map.insert(*k, HeaderValue::from_static(v));
        }
        map
    }

    #[test]
    fn test_cdn_header_wins() {
        let map = headers(&[
            (CF_CONNECTING_IP, "1.1.1.1"),
            (X_REAL_IP, "2.2.2.2"),
            (X_FORWARDED_FOR, "3.3.3.3,4.4.4.4"),
        ]);
        assert_eq!(resolve_client_ip(&map), "1.1.1.1");
    }

    #[test]
    fn test_real_ip_before_forwarded_for() {
        let map = headers(&[(X_REAL_IP, "2.2.2.2"), (X_FORWARDED_FOR, "3.3.3.3")]);
        assert_eq!(resolve_client_ip(&map), "2.2.2.2");
    }

    #[test]
    fn test_forwarded_for_takes_left_most_trimmed() {
        let map = headers(&[(X_FORWARDED_FOR, " 3.3.3.3 , 4.4.4.4")]);
        assert_eq!(resolve_client_ip(&map), "3.3.3.3");

        let map = headers(&[(X_FORWARDED_FOR, "3.3.3.3, 4.4.4.4")]);
        assert_eq!(resolve_client_ip(&map), "3.3.3.3");
    }

    #[test]
    fn test_unknown_when_nothing_usable() {
        assert_eq!(resolve_client_ip(&HeaderMap::new()), UNKNOWN_CLIENT);

        let map = headers(&[(CF_CONNECTING_IP, ""), (X_FORWARDED_FOR, " , 4.4.4.4")]);
        let identity = ClientIdentity::from_headers(&map);
        assert!(identity.is_unknown());
    }
}
