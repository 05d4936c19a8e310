//! The access decision table.
//!
//! The gate keeps no state. Each request is classified into a
//! [`SessionState`] and run through the rules below, first match wins:
//!
//! ```text
//! NoSession  + non-public path          → login (?redirect=path)
//! Unverified + not under verify path    → verify
//! Verified   + under verify path        → dashboard
//! Verified   + login / signup           → dashboard
//! NoSession  + public path              → allow (public)
//! otherwise                             → allow
//! ```
//!
//! Excluded paths and the rate limiter are handled before this table,
//! in the middleware.

use crate::auth::{AuthError, Session};
use crate::gate::policy::RoutePolicy;
use crate::observability::metrics;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    NoSession,
    Unverified,
    Verified,
}

impl SessionState {
    pub fn of(session: Option<&Session>) -> Self {
        match session {
            None => SessionState::NoSession,
            Some(s) if s.is_verified() => SessionState::Verified,
            Some(_) => SessionState::Unverified,
        }
    }

    /// Lookup failures count as no session, never as access.
    pub fn from_lookup(lookup: Result<Option<Session>, AuthError>) -> Self {
        match lookup {
            Ok(session) => Self::of(session.as_ref()),
            Err(e) => {
                tracing::warn!(error = %e, "Session lookup failed, treating request as signed out");
                metrics::record_session_lookup_error();
                SessionState::NoSession
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    Allow,
    AllowPublic,
    RedirectToLogin { return_to: String },
    RedirectToVerify,
    RedirectToDashboard,
}

impl GateDecision {
    /// Redirect target, or `None` when the request passes through.
    pub fn location(&self, policy: &RoutePolicy) -> Option<String> {
        match self {
            GateDecision::Allow | GateDecision::AllowPublic => None,
            GateDecision::RedirectToLogin { return_to } => Some(policy.login_location(return_to)),
            GateDecision::RedirectToVerify => Some(policy.verification_path().to_string()),
            GateDecision::RedirectToDashboard => Some(policy.dashboard_path().to_string()),
        }
    }

    /// Metric label.
    pub fn label(&self) -> &'static str {
        match self {
            GateDecision::Allow => "allow",
            GateDecision::AllowPublic => "allow_public",
            GateDecision::RedirectToLogin { .. } => "redirect_login",
            GateDecision::RedirectToVerify => "redirect_verify",
            GateDecision::RedirectToDashboard => "redirect_dashboard",
        }
    }
}

pub fn decide(policy: &RoutePolicy, state: SessionState, path: &str) -> GateDecision {
    match state {
        SessionState::NoSession if !policy.is_public(path) => GateDecision::RedirectToLogin {
            return_to: path.to_string(),
        },
        SessionState::NoSession => GateDecision::AllowPublic,
        SessionState::Unverified if !policy.is_verification_path(path) => {
            GateDecision::RedirectToVerify
        }
        SessionState::Verified if policy.is_verification_path(path) => {
            GateDecision::RedirectToDashboard
        }
        SessionState::Verified if policy.is_auth_page(path) => GateDecision::RedirectToDashboard,
        _ => GateDecision::Allow,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn session(verified: bool) -> Session {
        Session {
            user_id: "u1".into(),
            email: Some("u1@example.com".into()),
            email_confirmed_at: verified.then(Utc::now),
        }
    }

    fn location(state: SessionState, path: &str) -> Option<String> {
        let policy = RoutePolicy::default();
        decide(&policy, state, path).location(&policy)
    }

    #[test]
    fn test_anonymous_private_route_goes_to_login() {
        let policy = RoutePolicy::default();
        assert_eq!(
            decide(&policy, SessionState::NoSession, "/dashboard"),
            GateDecision::RedirectToLogin { return_to: "/dashboard".into() }
        );
        assert_eq!(
            location(SessionState::NoSession, "/dashboard").as_deref(),
            Some("/login?redirect=/dashboard")
        );
        assert_eq!(
            location(SessionState::NoSession, "/verify-email").as_deref(),
            Some("/login?redirect=/verify-email")
        );
    }

    #[test]
    fn test_anonymous_public_route_allowed() {
        let policy = RoutePolicy::default();
        assert_eq!(decide(&policy, SessionState::NoSession, "/"), GateDecision::AllowPublic);
        assert_eq!(decide(&policy, SessionState::NoSession, "/signup"), GateDecision::AllowPublic);
    }

    #[test]
    fn test_unverified_confined_to_verification() {
        let state = SessionState::of(Some(&session(false)));
        assert_eq!(state, SessionState::Unverified);

        assert_eq!(location(state, "/dashboard").as_deref(), Some("/verify-email"));
        assert_eq!(location(state, "/").as_deref(), Some("/verify-email"));
        assert_eq!(location(state, "/verify-email"), None);
        assert_eq!(location(state, "/verify-email/resend"), None);
    }

    #[test]
    fn test_verified_kept_off_auth_and_verification_pages() {
        let state = SessionState::of(Some(&session(true)));
        assert_eq!(state, SessionState::Verified);

        assert_eq!(location(state, "/login").as_deref(), Some("/dashboard"));
        assert_eq!(location(state, "/signup").as_deref(), Some("/dashboard"));
        assert_eq!(location(state, "/verify-email").as_deref(), Some("/dashboard"));
        assert_eq!(location(state, "/services"), None);
        assert_eq!(location(state, "/"), None);
    }

    #[test]
    fn test_lookup_error_fails_closed() {
        let state = SessionState::from_lookup(Err(AuthError::Unavailable("down".into())));
        assert_eq!(state, SessionState::NoSession);
        assert_eq!(
            location(state, "/messages").as_deref(),
            Some("/login?redirect=/messages")
        );
    }
}
