//! Verification session records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    Pending,
    Completed,
    Failed,
}

/// Verification flag kept on the user record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserVerificationStatus {
    Unverified,
    Verified,
}

impl UserVerificationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserVerificationStatus::Unverified => "unverified",
            UserVerificationStatus::Verified => "verified",
        }
    }
}

/// A stored verification attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationSession {
    pub id: Uuid,
    pub user_id: String,
    pub session_token: String,
    pub verification_type: String,
    pub status: VerificationStatus,
    pub expires_at: DateTime<Utc>,
    pub ip_address: String,
    pub user_agent: String,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl VerificationSession {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

/// Fields supplied when a verification starts.
#[derive(Debug, Clone)]
pub struct NewVerificationSession {
    pub user_id: String,
    pub session_token: String,
    pub verification_type: String,
    pub expires_at: DateTime<Utc>,
    pub ip_address: String,
    pub user_agent: String,
}

/// Fields written when a verification finishes.
#[derive(Debug, Clone, Copy)]
pub struct VerificationUpdate {
    pub status: VerificationStatus,
    pub completed_at: DateTime<Utc>,
}
