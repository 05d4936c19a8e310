//! Auth state change notifications.
//!
//! Handlers register with an [`AuthStateHub`] and receive every event
//! emitted after registration. Registration returns an [`AuthSubscription`]
//! guard; the handler is removed when the guard is dropped or
//! [`AuthSubscription::unsubscribe`] is called, whichever comes first.
//! No delivery to a handler starts after its removal returns, including
//! deliveries later in an `emit` that is already running. A call that had
//! already started on another thread is allowed to finish.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use crate::auth::session::Session;

/// A change in a user's session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthEvent {
    SignedIn(Session),
    SignedOut { user_id: String },
    /// Session attributes changed, e.g. the email was confirmed.
    UserUpdated(Session),
}

impl AuthEvent {
    pub fn user_id(&self) -> &str {
        match self {
            AuthEvent::SignedIn(s) | AuthEvent::UserUpdated(s) => &s.user_id,
            AuthEvent::SignedOut { user_id } => user_id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            AuthEvent::SignedIn(_) => "signed_in",
            AuthEvent::SignedOut { .. } => "signed_out",
            AuthEvent::UserUpdated(_) => "user_updated",
        }
    }
}

pub type AuthStateHandler = Box<dyn Fn(&AuthEvent) + Send + Sync>;

type SharedHandler = Arc<dyn Fn(&AuthEvent) + Send + Sync>;

#[derive(Clone)]
struct Registration {
    handler: SharedHandler,
    /// Cleared before the registration leaves the map.
    active: Arc<AtomicBool>,
}

#[derive(Default)]
struct HubInner {
    handlers: Mutex<HashMap<u64, Registration>>,
    next_id: AtomicU64,
}

/// Fan-out point for auth events.
#[derive(Clone, Default)]
pub struct AuthStateHub {
    inner: Arc<HubInner>,
}

impl AuthStateHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, handler: AuthStateHandler) -> AuthSubscription {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let active = Arc::new(AtomicBool::new(true));
        self.inner.handlers.lock().expect("auth hub mutex poisoned").insert(
            id,
            Registration {
                handler: Arc::from(handler),
                active: active.clone(),
            },
        );

        AuthSubscription {
            id,
            active,
            hub: Arc::downgrade(&self.inner),
        }
    }

    /// Deliver `event` to every current subscriber, synchronously.
    pub fn emit(&self, event: &AuthEvent) {
        // Handlers run outside the lock so they may subscribe or unsubscribe.
        let registrations: Vec<Registration> = self
            .inner
            .handlers
            .lock()
            .expect("auth hub mutex poisoned")
            .values()
            .cloned()
            .collect();

        tracing::debug!(event = event.kind(), user_id = event.user_id(), subscribers = registrations.len(), "Auth state change");
        for registration in registrations {
            // An earlier handler may have removed this one since the snapshot.
            if registration.active.load(Ordering::Acquire) {
                (registration.handler)(event);
            }
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.handlers.lock().expect("auth hub mutex poisoned").len()
    }
}

/// Registration guard returned by [`AuthStateHub::subscribe`].
#[must_use = "dropping the subscription unsubscribes immediately"]
pub struct AuthSubscription {
    id: u64,
    active: Arc<AtomicBool>,
    hub: Weak<HubInner>,
}

impl AuthSubscription {
    pub fn unsubscribe(mut self) {
        self.detach();
    }

    fn detach(&mut self) {
        self.active.store(false, Ordering::Release);
        if let Some(hub) = self.hub.upgrade() {
            hub.handlers.lock().expect("auth hub mutex poisoned").remove(&self.id);
        }
        self.hub = Weak::new();
    }
}

impl Drop for AuthSubscription {
    fn drop(&mut self) {
        self.detach();
    }
}

impl std::fmt::Debug for AuthSubscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthSubscription").field("id", &self.id).finish()
    }
}
