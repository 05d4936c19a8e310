//! Session model and the identity provider seam.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::auth::events::{AuthStateHandler, AuthSubscription};

/// The parts of an identity provider session the gate consumes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub user_id: String,
    pub email: Option<String>,
    /// Set once the user confirmed their email address.
    pub email_confirmed_at: Option<DateTime<Utc>>,
}

impl Session {
    pub fn is_verified(&self) -> bool {
        self.email_confirmed_at.is_some()
    }
}

/// Failure to resolve a session. The gate treats every variant as "no session".
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("identity provider request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("identity provider returned status {0}")]
    UnexpectedStatus(u16),

    #[error("invalid identity provider configuration: {0}")]
    InvalidConfig(String),

    #[error("identity provider unavailable: {0}")]
    Unavailable(String),
}

/// Source of sessions for access tokens.
#[async_trait]
pub trait SessionProvider: Send + Sync {
    /// Resolve an access token. `Ok(None)` means the token is not (or no
    /// longer) a valid session.
    async fn get_session(&self, access_token: &str) -> Result<Option<Session>, AuthError>;

    /// Register for session changes. Dropping the returned subscription
    /// unregisters the handler.
    fn on_auth_state_change(&self, handler: AuthStateHandler) -> AuthSubscription;
}
