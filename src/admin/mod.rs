//! Admin API.
//!
//! Read-only views of the running gate, served on a separate listener and
//! guarded by a bearer key.

pub mod auth;
pub mod handlers;

use std::sync::Arc;
use std::time::Instant;

use arc_swap::ArcSwap;
use axum::{middleware, routing::get, Router};

use self::auth::admin_auth_middleware;
use self::handlers::*;
use crate::config::RateLimitConfig;
use crate::gate::GatePolicy;
use crate::security::RateLimiter;

#[derive(Clone)]
pub struct AdminState {
    pub api_key: Arc<str>,
    pub limiter: Arc<dyn RateLimiter>,
    pub rate_limit: RateLimitConfig,
    pub policy: Arc<ArcSwap<GatePolicy>>,
    pub started_at: Instant,
}

pub fn setup_admin_router(state: AdminState) -> Router {
    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/rate-limit", get(get_rate_limit))
        .route("/admin/policy", get(get_policy))
        .layer(middleware::from_fn_with_state(state.clone(), admin_auth_middleware))
        .with_state(state)
}
