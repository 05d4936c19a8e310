//! Verification session and user status persistence.
//!
//! The traits are the boundary to the real database. The in-memory store
//! backs local runs and tests and can snapshot itself to a JSON file.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::verification::types::{
    NewVerificationSession, UserVerificationStatus, VerificationSession, VerificationStatus,
    VerificationUpdate,
};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("no verification session for token")]
    NotFound,

    #[error("session token already in use")]
    DuplicateToken,

    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("store file I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("store file is malformed: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[async_trait]
pub trait VerificationStore: Send + Sync {
    async fn create(&self, new: NewVerificationSession) -> Result<VerificationSession, StoreError>;

    async fn update_by_token(
        &self,
        session_token: &str,
        update: VerificationUpdate,
    ) -> Result<VerificationSession, StoreError>;
}

#[async_trait]
pub trait UserStatusStore: Send + Sync {
    async fn update_user_verification_status(
        &self,
        user_id: &str,
        status: UserVerificationStatus,
    ) -> Result<(), StoreError>;
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Snapshot {
    sessions: Vec<VerificationSession>,
    users: HashMap<String, UserVerificationStatus>,
}

/// Both stores on top of concurrent maps.
#[derive(Clone, Default)]
pub struct MemoryVerificationStore {
    /// Sessions keyed by token.
    sessions: Arc<DashMap<String, VerificationSession>>,
    users: Arc<DashMap<String, UserVerificationStatus>>,
    persistence_path: Option<String>,
}

impl MemoryVerificationStore {
    pub fn new(persistence_path: Option<String>) -> Self {
        Self {
            persistence_path,
            ..Self::default()
        }
    }

    /// Load from file if it exists; later saves go to the same file.
    pub fn load_from_file(path: &str) -> Result<Self, StoreError> {
        let store = Self::new(Some(path.to_string()));
        if Path::new(path).exists() {
            let reader = BufReader::new(File::open(path)?);
            let snapshot: Snapshot = serde_json::from_reader(reader)?;
            for session in snapshot.sessions {
                store.sessions.insert(session.session_token.clone(), session);
            }
            for (user_id, status) in snapshot.users {
                store.users.insert(user_id, status);
            }
            tracing::info!(
                sessions = store.sessions.len(),
                users = store.users.len(),
                path,
                "Loaded verification store"
            );
        }
        Ok(store)
    }

    /// Write a snapshot if a persistence path is configured.
    pub fn save_to_file(&self) -> Result<(), StoreError> {
        let Some(path) = &self.persistence_path else {
            return Ok(());
        };
        let snapshot = Snapshot {
            sessions: self.sessions.iter().map(|r| r.value().clone()).collect(),
            users: self.users.iter().map(|r| (r.key().clone(), *r.value())).collect(),
        };
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer(writer, &snapshot)?;
        tracing::info!(sessions = snapshot.sessions.len(), path = %path, "Saved verification store");
        Ok(())
    }

    pub fn session(&self, session_token: &str) -> Option<VerificationSession> {
        self.sessions.get(session_token).map(|r| r.value().clone())
    }

    pub fn user_status(&self, user_id: &str) -> Option<UserVerificationStatus> {
        self.users.get(user_id).map(|r| *r.value())
    }
}

#[async_trait]
impl VerificationStore for MemoryVerificationStore {
    async fn create(&self, new: NewVerificationSession) -> Result<VerificationSession, StoreError> {
        match self.sessions.entry(new.session_token.clone()) {
            Entry::Occupied(_) => Err(StoreError::DuplicateToken),
            Entry::Vacant(slot) => {
                let session = VerificationSession {
                    id: Uuid::new_v4(),
                    user_id: new.user_id,
                    session_token: new.session_token,
                    verification_type: new.verification_type,
                    status: VerificationStatus::Pending,
                    expires_at: new.expires_at,
                    ip_address: new.ip_address,
                    user_agent: new.user_agent,
                    created_at: Utc::now(),
                    completed_at: None,
                };
                slot.insert(session.clone());
                Ok(session)
            }
        }
    }

    async fn update_by_token(
        &self,
        session_token: &str,
        update: VerificationUpdate,
    ) -> Result<VerificationSession, StoreError> {
        let mut session = self.sessions.get_mut(session_token).ok_or(StoreError::NotFound)?;
        session.status = update.status;
        session.completed_at = Some(update.completed_at);
        Ok(session.value().clone())
    }
}

#[async_trait]
impl UserStatusStore for MemoryVerificationStore {
    async fn update_user_verification_status(
        &self,
        user_id: &str,
        status: UserVerificationStatus,
    ) -> Result<(), StoreError> {
        self.users.insert(user_id.to_string(), status);
        Ok(())
    }
}
