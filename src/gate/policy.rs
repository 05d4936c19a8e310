//! Static route policy.

use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use serde::Serialize;

use crate::config::{BotConfig, GateConfig, RoutesConfig};

/// Characters escaped in the `redirect` query value. `/` stays readable.
const REDIRECT_PARAM: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'&')
    .add(b'+')
    .add(b'<')
    .add(b'=')
    .add(b'>')
    .add(b'?')
    .add(b'`');

/// Route pattern match: `/` matches only the root; any other pattern
/// matches itself and paths below it (`/auth` matches `/auth/callback`,
/// not `/authors`).
pub fn matches_route(path: &str, pattern: &str) -> bool {
    if pattern == "/" {
        return path == "/";
    }
    let pattern = pattern.trim_end_matches('/');
    match path.strip_prefix(pattern) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

/// Which paths are public, which are never checked, and where redirects go.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoutePolicy {
    public: Vec<String>,
    excluded: Vec<String>,
    verification_path: String,
    login_path: String,
    signup_path: String,
    dashboard_path: String,
}

impl RoutePolicy {
    pub fn from_config(config: &RoutesConfig) -> Self {
        Self {
            public: config.public.clone(),
            excluded: config.excluded.clone(),
            verification_path: config.verification_path.clone(),
            login_path: config.login_path.clone(),
            signup_path: config.signup_path.clone(),
            dashboard_path: config.dashboard_path.clone(),
        }
    }

    /// Excluded paths are plain prefixes (`/_next/static`, `/favicon.ico`).
    pub fn is_excluded(&self, path: &str) -> bool {
        self.excluded.iter().any(|prefix| path.starts_with(prefix.as_str()))
    }

    pub fn is_public(&self, path: &str) -> bool {
        self.public.iter().any(|pattern| matches_route(path, pattern))
    }

    pub fn is_verification_path(&self, path: &str) -> bool {
        path.starts_with(self.verification_path.as_str())
    }

    /// Login and signup pages.
    pub fn is_auth_page(&self, path: &str) -> bool {
        path == self.login_path || path == self.signup_path
    }

    /// `/login?redirect=<path>`.
    pub fn login_location(&self, return_to: &str) -> String {
        format!(
            "{}?redirect={}",
            self.login_path,
            utf8_percent_encode(return_to, REDIRECT_PARAM)
        )
    }

    pub fn verification_path(&self) -> &str {
        &self.verification_path
    }

    pub fn dashboard_path(&self) -> &str {
        &self.dashboard_path
    }
}

impl Default for RoutePolicy {
    fn default() -> Self {
        Self::from_config(&RoutesConfig::default())
    }
}

/// The hot-reloadable part of the configuration, swapped as one unit.
#[derive(Debug, Clone, Default, Serialize)]
pub struct GatePolicy {
    pub routes: RoutePolicy,
    pub bots: BotConfig,
}

impl GatePolicy {
    pub fn from_config(config: &GateConfig) -> Self {
        Self {
            routes: RoutePolicy::from_config(&config.routes),
            bots: config.bots.clone(),
        }
    }
}
