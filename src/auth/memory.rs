//! In-process session provider for local development and tests.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;

use crate::auth::events::{AuthEvent, AuthStateHandler, AuthStateHub, AuthSubscription};
use crate::auth::session::{AuthError, Session, SessionProvider};

/// Access token → session table.
#[derive(Default)]
pub struct MemorySessionProvider {
    sessions: DashMap<String, Session>,
    hub: AuthStateHub,
    unavailable: AtomicBool,
}

impl MemorySessionProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sign_in(&self, access_token: impl Into<String>, session: Session) {
        self.sessions.insert(access_token.into(), session.clone());
        self.hub.emit(&AuthEvent::SignedIn(session));
    }

    pub fn sign_out(&self, access_token: &str) {
        if let Some((_, session)) = self.sessions.remove(access_token) {
            self.hub.emit(&AuthEvent::SignedOut {
                user_id: session.user_id,
            });
        }
    }

    /// Mark every session of `user_id` as email-confirmed.
    pub fn confirm_email(&self, user_id: &str, at: DateTime<Utc>) {
        let mut updated = None;
        for mut entry in self.sessions.iter_mut() {
            if entry.user_id == user_id {
                entry.email_confirmed_at = Some(at);
                updated = Some(entry.value().clone());
            }
        }
        if let Some(session) = updated {
            self.hub.emit(&AuthEvent::UserUpdated(session));
        }
    }

    /// Make every lookup fail, as an unreachable identity provider would.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }
}

#[async_trait]
impl SessionProvider for MemorySessionProvider {
    async fn get_session(&self, access_token: &str) -> Result<Option<Session>, AuthError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(AuthError::Unavailable("memory provider switched off".into()));
        }
        Ok(self.sessions.get(access_token).map(|s| s.value().clone()))
    }

    fn on_auth_state_change(&self, handler: AuthStateHandler) -> AuthSubscription {
        self.hub.subscribe(handler)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn session(user: &str) -> Session {
        Session {
            user_id: user.into(),
            email: Some(format!("{}@example.com", user)),
            email_confirmed_at: None,
        }
    }

    #[tokio::test]
    async fn test_sign_in_confirm_sign_out() {
        let provider = MemorySessionProvider::new();
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        let sub = provider.on_auth_state_change(Box::new(move |e: &AuthEvent| sink.lock().unwrap().push(e.clone())));

        provider.sign_in("t1", session("u1"));
        assert!(!provider.get_session("t1").await.unwrap().unwrap().is_verified());

        provider.confirm_email("u1", Utc::now());
        assert!(provider.get_session("t1").await.unwrap().unwrap().is_verified());

        provider.sign_out("t1");
        assert!(provider.get_session("t1").await.unwrap().is_none());

        sub.unsubscribe();
        provider.sign_in("t2", session("u2"));

        let kinds: Vec<_> = events.lock().unwrap().iter().map(|e| e.kind()).collect();
        assert_eq!(kinds, vec!["signed_in", "user_updated", "signed_out"]);
    }

    #[tokio::test]
    async fn test_unavailable_provider_errors() {
        let provider = MemorySessionProvider::new();
        provider.sign_in("t1", session("u1"));
        provider.set_unavailable(true);
        assert!(matches!(provider.get_session("t1").await, Err(AuthError::Unavailable(_))));
    }
}
