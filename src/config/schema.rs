//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gate.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the marketplace gate.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GateConfig {
    /// Listener configuration (bind address, connection cap).
    pub listener: ListenerConfig,

    /// Page server that receives allowed traffic.
    pub upstream: UpstreamConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Per-IP fixed window rate limiting.
    pub rate_limit: RateLimitConfig,

    /// Route policy: public, excluded and redirect targets.
    pub routes: RoutesConfig,

    /// Crawler allowance for public pages.
    pub bots: BotConfig,

    /// Identity provider used to resolve sessions.
    pub identity: IdentityConfig,

    /// Verification session API settings.
    pub verification: VerificationConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    pub admin: AdminConfig,

    pub security: SecurityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Maximum concurrent in-flight requests (backpressure).
    pub max_connections: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            max_connections: 10_000,
        }
    }
}

/// Upstream page server configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Upstream address (e.g., "127.0.0.1:3000").
    pub address: String,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1:3000".to_string(),
        }
    }
}

/// Timeout configuration for various operations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,

    /// Upstream connection establishment timeout in seconds.
    pub upstream_connect_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            request_secs: 30,
            upstream_connect_secs: 5,
        }
    }
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Enable rate limiting.
    pub enabled: bool,

    /// Maximum requests per window per client IP.
    pub max_requests: u32,

    /// Window length in seconds. Also sent as `Retry-After`.
    pub window_secs: u64,

    /// Interval between sweeps of expired windows.
    pub cleanup_interval_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_requests: 100,
            window_secs: 900,
            cleanup_interval_secs: 60,
        }
    }
}

/// Route policy configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct RoutesConfig {
    /// Paths reachable without a session. `/` matches only the root.
    pub public: Vec<String>,

    /// Path prefixes that are never policy-checked (assets, framework internals).
    pub excluded: Vec<String>,

    /// Where unverified sessions are sent.
    pub verification_path: String,

    pub login_path: String,

    pub signup_path: String,

    /// Landing page for verified sessions.
    pub dashboard_path: String,
}

impl Default for RoutesConfig {
    fn default() -> Self {
        Self {
            public: [
                "/",
                "/login",
                "/signup",
                "/forgot-password",
                "/auth",
                "/terms",
                "/privacy",
            ]
            .iter()
            .map(|p| p.to_string())
            .collect(),
            excluded: ["/_next/static", "/_next/image", "/favicon.ico"]
                .iter()
                .map(|p| p.to_string())
                .collect(),
            verification_path: "/verify-email".to_string(),
            login_path: "/login".to_string(),
            signup_path: "/signup".to_string(),
            dashboard_path: "/dashboard".to_string(),
        }
    }
}

/// Crawler bypass configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct BotConfig {
    /// Let recognized crawlers reach `allowed_paths` without a session.
    pub bypass_enabled: bool,

    /// Paths crawlers may index.
    pub allowed_paths: Vec<String>,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            bypass_enabled: true,
            allowed_paths: ["/", "/login", "/signup", "/terms", "/privacy"]
                .iter()
                .map(|p| p.to_string())
                .collect(),
        }
    }
}

/// Identity provider configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct IdentityConfig {
    /// Base URL of the identity provider (e.g., "https://project.supabase.co").
    pub url: String,

    /// Public API key sent as the `apikey` header.
    pub api_key: String,

    /// Cookie carrying the access token when no Authorization header is sent.
    pub cookie_name: String,

    /// Session lookup timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:54321".to_string(),
            api_key: String::new(),
            cookie_name: "sb-access-token".to_string(),
            timeout_secs: 5,
        }
    }
}

/// Verification session settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct VerificationConfig {
    /// Lifetime of a verification session in seconds.
    pub session_ttl_secs: u64,

    /// Type recorded when the request does not name one.
    pub default_type: String,

    /// Optional JSON file the in-memory store is loaded from and saved to.
    pub store_path: Option<String>,
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            session_ttl_secs: 30 * 60,
            default_type: "human_verification".to_string(),
            store_path: None,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable admin API.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,

    /// Admin API bind address.
    pub bind_address: String,
}

/// Placeholder admin key; rejected by validation when the admin API is enabled.
pub const ADMIN_KEY_PLACEHOLDER: &str = "CHANGE_ME_IN_PRODUCTION";

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_key: ADMIN_KEY_PLACEHOLDER.to_string(),
            bind_address: "127.0.0.1:8081".to_string(),
        }
    }
}

/// Security hardening configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Maximum body size in bytes.
    pub max_body_size: usize,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_body_size: 2 * 1024 * 1024, // 2MB
        }
    }
}
