//! Configuration validation.
//!
//! Serde handles syntax; this module checks values that parse but make no
//! sense (unparseable addresses, zero-length windows, relative paths).
//! Every problem is reported, not just the first.

use std::net::SocketAddr;

use crate::config::schema::{GateConfig, ADMIN_KEY_PLACEHOLDER};

/// Longest verification session lifetime accepted (7 days).
pub const MAX_SESSION_TTL_SECS: u64 = 7 * 24 * 60 * 60;

/// A single semantic problem with a loaded configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field (e.g. `rate_limit.window_secs`).
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

/// Validate a configuration, collecting all errors.
pub fn validate_config(config: &GateConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    check_socket_addr(&mut errors, "listener.bind_address", &config.listener.bind_address);
    check_socket_addr(&mut errors, "upstream.address", &config.upstream.address);

    if config.listener.max_connections == 0 {
        errors.push(ValidationError::new("listener.max_connections", "must be greater than 0"));
    }
    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::new("timeouts.request_secs", "must be greater than 0"));
    }

    if config.rate_limit.enabled {
        if config.rate_limit.max_requests == 0 {
            errors.push(ValidationError::new("rate_limit.max_requests", "must be greater than 0"));
        }
        if config.rate_limit.window_secs == 0 {
            errors.push(ValidationError::new("rate_limit.window_secs", "must be greater than 0"));
        }
        if config.rate_limit.cleanup_interval_secs == 0 {
            errors.push(ValidationError::new("rate_limit.cleanup_interval_secs", "must be greater than 0"));
        }
    }

    let routes = &config.routes;
    for (field, path) in [
        ("routes.verification_path", &routes.verification_path),
        ("routes.login_path", &routes.login_path),
        ("routes.signup_path", &routes.signup_path),
        ("routes.dashboard_path", &routes.dashboard_path),
    ] {
        check_absolute_path(&mut errors, field, path);
    }
    for path in &routes.public {
        check_absolute_path(&mut errors, "routes.public", path);
    }
    for path in &routes.excluded {
        check_absolute_path(&mut errors, "routes.excluded", path);
    }
    for path in &config.bots.allowed_paths {
        check_absolute_path(&mut errors, "bots.allowed_paths", path);
    }

    if url::Url::parse(&config.identity.url).is_err() {
        errors.push(ValidationError::new(
            "identity.url",
            format!("'{}' is not a valid URL", config.identity.url),
        ));
    }
    if config.identity.cookie_name.is_empty() {
        errors.push(ValidationError::new("identity.cookie_name", "must not be empty"));
    }

    if config.verification.session_ttl_secs == 0 {
        errors.push(ValidationError::new("verification.session_ttl_secs", "must be greater than 0"));
    } else if config.verification.session_ttl_secs > MAX_SESSION_TTL_SECS {
        errors.push(ValidationError::new(
            "verification.session_ttl_secs",
            format!("must be at most {} seconds", MAX_SESSION_TTL_SECS),
        ));
    }

    if config.observability.metrics_enabled {
        check_socket_addr(&mut errors, "observability.metrics_address", &config.observability.metrics_address);
    }

    if config.admin.enabled {
        check_socket_addr(&mut errors, "admin.bind_address", &config.admin.bind_address);
        if config.admin.api_key.is_empty() || config.admin.api_key == ADMIN_KEY_PLACEHOLDER {
            errors.push(ValidationError::new("admin.api_key", "must be set when admin API is enabled"));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_socket_addr(errors: &mut Vec<ValidationError>, field: &str, value: &str) {
    if value.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(field, format!("'{}' is not a socket address", value)));
    }
}

fn check_absolute_path(errors: &mut Vec<ValidationError>, field: &str, value: &str) {
    if !value.starts_with('/') {
        errors.push(ValidationError::new(field, format!("'{}' must start with '/'", value)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&GateConfig::default()).is_ok());
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = GateConfig::default();
        config.upstream.address = "not-an-address".into();
        config.rate_limit.window_secs = 0;
        config.routes.public.push("dashboard".into());

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, vec!["upstream.address", "rate_limit.window_secs", "routes.public"]);
    }

    #[test]
    fn test_disabled_rate_limit_skips_limits() {
        let mut config = GateConfig::default();
        config.rate_limit.enabled = false;
        config.rate_limit.max_requests = 0;
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_admin_requires_real_key() {
        let mut config = GateConfig::default();
        config.admin.enabled = true;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors[0].field, "admin.api_key");

        config.admin.api_key = "s3cret".into();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_session_ttl_bounds() {
        let mut config = GateConfig::default();
        config.verification.session_ttl_secs = MAX_SESSION_TTL_SECS;
        assert!(validate_config(&config).is_ok());

        for ttl in [0, MAX_SESSION_TTL_SECS + 1, 10_000_000_000_000] {
            config.verification.session_ttl_secs = ttl;
            let errors = validate_config(&config).unwrap_err();
            assert_eq!(errors.len(), 1);
            assert_eq!(errors[0].field, "verification.session_ttl_secs");
        }
    }
}
