//! Session resolution against a Supabase-compatible auth API.
//!
//! `GET {url}/auth/v1/user` with the project key in `apikey` and the
//! caller's access token as bearer. 401/403 mean "not signed in"; anything
//! else unexpected is an [`AuthError`].

use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use reqwest::StatusCode;
use serde::Deserialize;
use url::Url;

use crate::auth::events::{AuthEvent, AuthStateHandler, AuthStateHub, AuthSubscription};
use crate::auth::session::{AuthError, Session, SessionProvider};
use crate::config::IdentityConfig;

#[derive(Debug, Deserialize)]
struct UserResponse {
    id: String,
    email: Option<String>,
    email_confirmed_at: Option<DateTime<Utc>>,
}

impl From<UserResponse> for Session {
    fn from(user: UserResponse) -> Self {
        Session {
            user_id: user.id,
            email: user.email,
            email_confirmed_at: user.email_confirmed_at,
        }
    }
}

pub struct SupabaseSessionProvider {
    client: reqwest::Client,
    user_url: Url,
    api_key: String,
    hub: AuthStateHub,
    /// Last verification flag observed per user, for change events.
    seen: DashMap<String, SeenUser>,
}

/// Users idle longer than this are forgotten; their next lookup emits
/// `SignedIn` again.
const SEEN_IDLE: Duration = Duration::from_secs(24 * 60 * 60);

/// Map size that triggers an idle sweep on the next observation.
const SEEN_SWEEP_THRESHOLD: usize = 10_000;

#[derive(Debug, Clone, Copy)]
struct SeenUser {
    verified: bool,
    last_seen: Instant,
}

impl SupabaseSessionProvider {
    pub fn new(config: &IdentityConfig) -> Result<Self, AuthError> {
        let user_url = user_endpoint(&config.url)?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            user_url,
            api_key: config.api_key.clone(),
            hub: AuthStateHub::new(),
            seen: DashMap::new(),
        })
    }

    fn observe(&self, session: &Session) {
        self.observe_at(session, Instant::now());
    }

    fn observe_at(&self, session: &Session, now: Instant) {
        if self.seen.len() >= SEEN_SWEEP_THRESHOLD {
            self.prune_seen(now);
        }

        let verified = session.is_verified();
        let entry = SeenUser { verified, last_seen: now };
        match self.seen.insert(session.user_id.clone(), entry) {
            None => self.hub.emit(&AuthEvent::SignedIn(session.clone())),
            Some(previous) if previous.verified != verified => {
                self.hub.emit(&AuthEvent::UserUpdated(session.clone()))
            }
            Some(_) => {}
        }
    }

    /// Drop users not seen within [`SEEN_IDLE`] of `now`.
    fn prune_seen(&self, now: Instant) {
        let before = self.seen.len();
        self.seen
            .retain(|_, user| now.saturating_duration_since(user.last_seen) < SEEN_IDLE);
        tracing::debug!(removed = before - self.seen.len(), remaining = self.seen.len(), "Pruned idle auth users");
    }
}

fn user_endpoint(base: &str) -> Result<Url, AuthError> {
    let endpoint = format!("{}/auth/v1/user", base.trim_end_matches('/'));
    Url::parse(&endpoint).map_err(|e| AuthError::InvalidConfig(format!("{}: {}", base, e)))
}

#[async_trait]
impl SessionProvider for SupabaseSessionProvider {
    async fn get_session(&self, access_token: &str) -> Result<Option<Session>, AuthError> {
        let response = self
            .client
            .get(self.user_url.clone())
            .header("apikey", &self.api_key)
            .bearer_auth(access_token)
            .send()
            .await?;

        match response.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Ok(None),
            status if status.is_success() => {
                let session: Session = response.json::<UserResponse>().await?.into();
                self.observe(&session);
                Ok(Some(session))
            }
            status => Err(AuthError::UnexpectedStatus(status.as_u16())),
        }
    }

    fn on_auth_state_change(&self, handler: AuthStateHandler) -> AuthSubscription {
        self.hub.subscribe(handler)
    }
}
