use axum::{extract::State, Json};
use serde::Serialize;

use crate::admin::AdminState;
use crate::gate::GatePolicy;

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub uptime_secs: u64,
}

#[derive(Serialize)]
pub struct RateLimitStatus {
    pub enabled: bool,
    pub max_requests: u32,
    pub window_secs: u64,
    /// IPs with a live window.
    pub tracked_clients: usize,
}

pub async fn get_status(State(state): State<AdminState>) -> Json<SystemStatus> {
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
        uptime_secs: state.started_at.elapsed().as_secs(),
    })
}

pub async fn get_rate_limit(State(state): State<AdminState>) -> Json<RateLimitStatus> {
    Json(RateLimitStatus {
        enabled: state.rate_limit.enabled,
        max_requests: state.rate_limit.max_requests,
        window_secs: state.rate_limit.window_secs,
        tracked_clients: state.limiter.tracked_clients(),
    })
}

/// The route policy currently in force, including hot-reloaded changes.
pub async fn get_policy(State(state): State<AdminState>) -> Json<GatePolicy> {
    Json(GatePolicy::clone(&state.policy.load()))
}
