//! Gate middleware.
//!
//! Evaluation order for page requests:
//! 1. excluded path → pass through, nothing else checked
//! 2. rate limit exceeded → 429
//! 3. crawler on an allowed public path → pass through
//! 4. session lookup → decision table → redirect or pass through
//!
//! Steps 1-3 run before the session lookup so rejected and asset
//! requests never reach the identity provider.

use std::sync::Arc;

use arc_swap::ArcSwap;
use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, Request},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};

use crate::auth::{extract_access_token, SessionProvider};
use crate::gate::decision::{decide, SessionState};
use crate::gate::policy::GatePolicy;
use crate::http::response::too_many_requests;
use crate::observability::metrics;
use crate::security::{apply_security_headers, should_bypass_auth, ClientIdentity, RateLimiter};

/// Shared state for the gate and rate limit middlewares.
#[derive(Clone)]
pub struct GateState {
    pub policy: Arc<ArcSwap<GatePolicy>>,
    pub limiter: Arc<dyn RateLimiter>,
    pub sessions: Arc<dyn SessionProvider>,
    /// Cookie holding the access token.
    pub cookie_name: String,
}

impl GateState {
    async fn session_state(&self, headers: &HeaderMap) -> SessionState {
        match extract_access_token(headers, &self.cookie_name) {
            Some(token) => SessionState::from_lookup(self.sessions.get_session(&token).await),
            None => SessionState::NoSession,
        }
    }

    fn admit(&self, client: &ClientIdentity, path: &str) -> Option<Response> {
        if self.limiter.check(&client.ip) {
            return None;
        }
        tracing::warn!(
            client_ip = %client.ip,
            unresolved = client.is_unknown(),
            path,
            "Rate limit exceeded"
        );
        metrics::record_rate_limited();
        Some(too_many_requests(&client.ip, self.limiter.retry_after()))
    }
}

pub async fn gate_middleware(
    State(state): State<GateState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();
    let client = ClientIdentity::from_headers(request.headers());
    let policy = state.policy.load_full();

    if policy.routes.is_excluded(&path) {
        metrics::record_decision("excluded");
        return pass_through(request, next, client).await;
    }

    if let Some(rejection) = state.admit(&client, &path) {
        return rejection;
    }

    let user_agent = request
        .headers()
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok());
    if policy.bots.bypass_enabled && should_bypass_auth(&path, user_agent, &policy.bots.allowed_paths) {
        tracing::debug!(path = %path, user_agent, "Crawler allowed on public path");
        metrics::record_decision("bot_bypass");
        return pass_through(request, next, client).await;
    }

    let session_state = state.session_state(request.headers()).await;
    let decision = decide(&policy.routes, session_state, &path);
    metrics::record_decision(decision.label());

    match decision.location(&policy.routes) {
        Some(location) => {
            tracing::debug!(path = %path, state = ?session_state, location = %location, "Redirecting");
            Redirect::temporary(&location).into_response()
        }
        None => {
            request.extensions_mut().insert(session_state);
            pass_through(request, next, client).await
        }
    }
}

/// Rate limiting only, for routes that are not pages (the verification API).
pub async fn rate_limit_middleware(
    State(state): State<GateState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let client = ClientIdentity::from_headers(request.headers());
    let path = request.uri().path().to_string();

    if let Some(rejection) = state.admit(&client, &path) {
        return rejection;
    }
    pass_through(request, next, client).await
}

async fn pass_through(mut request: Request<Body>, next: Next, client: ClientIdentity) -> Response {
    let ip = client.ip.clone();
    request.extensions_mut().insert(client);
    let mut response = next.run(request).await;
    apply_security_headers(response.headers_mut(), &ip);
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{MemorySessionProvider, Session};
    use crate::security::FixedWindowLimiter;
    use axum::{http::StatusCode, middleware, routing::get, Router};
    use chrono::Utc;
    use std::time::Duration;
    use tower::ServiceExt;

    fn app(sessions: Arc<MemorySessionProvider>, limit: u32) -> Router {
        let state = GateState {
            policy: Arc::new(ArcSwap::from_pointee(GatePolicy::default())),
            limiter: Arc::new(FixedWindowLimiter::new(limit, Duration::from_secs(900))),
            sessions,
            cookie_name: "sb-access-token".into(),
        };
        Router::new()
            .route("/{*path}", get(|| async { "page" }))
            .route("/", get(|| async { "home" }))
            .layer(middleware::from_fn_with_state(state, gate_middleware))
    }

    fn get_req(path: &str) -> axum::http::request::Builder {
        Request::builder().uri(path).header("x-forwarded-for", "10.0.0.1, 10.0.0.2")
    }

    fn location(response: &Response) -> &str {
        response.headers()[header::LOCATION].to_str().unwrap()
    }

    fn signed_in(verified: bool) -> Arc<MemorySessionProvider> {
        let sessions = Arc::new(MemorySessionProvider::new());
        sessions.sign_in(
            "tok",
            Session {
                user_id: "u1".into(),
                email: None,
                email_confirmed_at: verified.then(Utc::now),
            },
        );
        sessions
    }

    #[tokio::test]
    async fn test_anonymous_redirected_to_login() {
        let response = app(Arc::new(MemorySessionProvider::new()), 100)
            .oneshot(get_req("/dashboard").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
        assert_eq!(location(&response), "/login?redirect=/dashboard");
    }

    #[tokio::test]
    async fn test_pass_through_sets_security_headers() {
        let response = app(signed_in(true), 100)
            .oneshot(
                get_req("/services")
                    .header(header::COOKIE, "sb-access-token=tok")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["x-frame-options"], "DENY");
        assert_eq!(response.headers()["x-content-type-options"], "nosniff");
        assert_eq!(response.headers()["x-real-ip"], "10.0.0.1");
    }

    #[tokio::test]
    async fn test_unverified_redirected_to_verify() {
        let app = app(signed_in(false), 100);
        let response = app
            .clone()
            .oneshot(get_req("/dashboard").header(header::AUTHORIZATION, "Bearer tok").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(location(&response), "/verify-email");

        let response = app
            .oneshot(get_req("/verify-email").header(header::AUTHORIZATION, "Bearer tok").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_rate_limit_precedes_gate() {
        let app = app(Arc::new(MemorySessionProvider::new()), 1);
        let first = app.clone().oneshot(get_req("/").body(Body::empty()).unwrap()).await.unwrap();
        assert_eq!(first.status(), StatusCode::OK);

        let second = app.oneshot(get_req("/dashboard").body(Body::empty()).unwrap()).await.unwrap();
        assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(second.headers()[header::RETRY_AFTER], "900");
        assert_eq!(second.headers()["x-real-ip"], "10.0.0.1");
    }

    #[tokio::test]
    async fn test_excluded_paths_skip_limiter_and_gate() {
        let app = app(Arc::new(MemorySessionProvider::new()), 1);
        for _ in 0..3 {
            let response = app
                .clone()
                .oneshot(get_req("/_next/static/app.js").body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }
    }

    #[tokio::test]
    async fn test_crawler_bypass_only_on_allowed_paths() {
        let app = app(Arc::new(MemorySessionProvider::new()), 100);
        let bot = "Mozilla/5.0 (compatible; Googlebot/2.1)";

        let home = app
            .clone()
            .oneshot(get_req("/").header(header::USER_AGENT, bot).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(home.status(), StatusCode::OK);

        let dashboard = app
            .oneshot(get_req("/dashboard").header(header::USER_AGENT, bot).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(location(&dashboard), "/login?redirect=/dashboard");
    }

    #[tokio::test]
    async fn test_provider_failure_fails_closed() {
        let sessions = signed_in(true);
        sessions.set_unavailable(true);
        let response = app(sessions, 100)
            .oneshot(get_req("/services").header(header::AUTHORIZATION, "Bearer tok").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(location(&response), "/login?redirect=/services");
    }
}
