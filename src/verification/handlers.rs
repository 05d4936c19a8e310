//! Verification API handlers.
//!
//! `POST /api/verification/start` opens a pending session for a user.
//! `POST /api/verification/complete` closes it and, on success, marks the
//! user verified.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header, HeaderMap, StatusCode},
    Json,
};
use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::config::VerificationConfig;
use crate::observability::metrics;
use crate::security::resolve_client_ip;
use crate::verification::error::VerificationError;
use crate::verification::store::{UserStatusStore, VerificationStore};
use crate::verification::types::{
    NewVerificationSession, UserVerificationStatus, VerificationStatus, VerificationUpdate,
};

const TOKEN_BYTES: usize = 32;

#[derive(Clone)]
pub struct VerificationState {
    pub sessions: Arc<dyn VerificationStore>,
    pub users: Arc<dyn UserStatusStore>,
    pub session_ttl: Duration,
    pub default_type: String,
}

impl VerificationState {
    pub fn new(
        config: &VerificationConfig,
        sessions: Arc<dyn VerificationStore>,
        users: Arc<dyn UserStatusStore>,
    ) -> Self {
        Self {
            sessions,
            users,
            session_ttl: ttl_from_secs(config.session_ttl_secs),
            default_type: config.default_type.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartVerificationRequest {
    pub user_id: Option<String>,
    pub verification_type: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartVerificationResponse {
    pub session_token: String,
    pub expires_at: DateTime<Utc>,
    pub message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteVerificationRequest {
    pub session_token: Option<String>,
    pub success: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CompleteVerificationResponse {
    pub success: bool,
    pub message: String,
}

/// Saturates instead of panicking; an out-of-range TTL surfaces later as
/// [`VerificationError::InvalidExpiry`].
fn ttl_from_secs(secs: u64) -> Duration {
    i64::try_from(secs)
        .ok()
        .and_then(Duration::try_seconds)
        .unwrap_or_else(Duration::max_value)
}

fn session_expiry(now: DateTime<Utc>, ttl: Duration) -> Result<DateTime<Utc>, VerificationError> {
    now.checked_add_signed(ttl)
        .ok_or(VerificationError::InvalidExpiry { ttl_secs: ttl.num_seconds() })
}

fn generate_session_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

fn required(value: Option<String>, message: &str) -> Result<String, VerificationError> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| VerificationError::Validation(message.to_string()))
}

fn parse_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, VerificationError> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| VerificationError::Validation(format!("Invalid request body: {}", rejection.body_text())))
}

pub async fn start_verification(
    State(state): State<VerificationState>,
    headers: HeaderMap,
    payload: Result<Json<StartVerificationRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<StartVerificationResponse>), VerificationError> {
    let request = parse_body(payload)?;
    let user_id = required(request.user_id, "User ID is required")?;
    let verification_type = request
        .verification_type
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| state.default_type.clone());

    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .unwrap_or("unknown")
        .to_string();

    let expires_at = session_expiry(Utc::now(), state.session_ttl)?;
    let session = state
        .sessions
        .create(NewVerificationSession {
            user_id,
            session_token: generate_session_token(),
            verification_type,
            expires_at,
            ip_address: resolve_client_ip(&headers),
            user_agent,
        })
        .await
        .map_err(VerificationError::SessionCreate)?;

    tracing::info!(
        session_id = %session.id,
        user_id = %session.user_id,
        verification_type = %session.verification_type,
        expires_at = %session.expires_at,
        "Verification session started"
    );
    metrics::record_verification_event("started");

    Ok((
        StatusCode::CREATED,
        Json(StartVerificationResponse {
            session_token: session.session_token,
            expires_at: session.expires_at,
            message: "Verification session created successfully".to_string(),
        }),
    ))
}

pub async fn complete_verification(
    State(state): State<VerificationState>,
    payload: Result<Json<CompleteVerificationRequest>, JsonRejection>,
) -> Result<Json<CompleteVerificationResponse>, VerificationError> {
    let request = parse_body(payload)?;
    let session_token = required(request.session_token, "Session token is required")?;
    let success = request.success.unwrap_or(true);

    let now = Utc::now();
    let status = if success {
        VerificationStatus::Completed
    } else {
        VerificationStatus::Failed
    };
    let session = state
        .sessions
        .update_by_token(
            &session_token,
            VerificationUpdate {
                status,
                completed_at: now,
            },
        )
        .await
        .map_err(VerificationError::SessionUpdate)?;

    // Expiry is reported, not enforced.
    if session.is_expired(now) {
        tracing::warn!(
            session_id = %session.id,
            expires_at = %session.expires_at,
            "Verification session completed after expiry"
        );
    }

    if success {
        state
            .users
            .update_user_verification_status(&session.user_id, UserVerificationStatus::Verified)
            .await
            .map_err(|source| VerificationError::UserStatusUpdate {
                session_id: session.id,
                user_id: session.user_id.clone(),
                source,
            })?;
        tracing::debug!(
            user_id = %session.user_id,
            status = UserVerificationStatus::Verified.as_str(),
            "User verification status updated"
        );
    }

    tracing::info!(
        session_id = %session.id,
        user_id = %session.user_id,
        status = ?session.status,
        "Verification session finished"
    );
    metrics::record_verification_event(if success { "completed" } else { "failed" });

    let message = if success {
        "Verification completed successfully"
    } else {
        "Verification failed"
    };
    Ok(Json(CompleteVerificationResponse {
        success: true,
        message: message.to_string(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_token_shape() {
        let a = generate_session_token();
        let b = generate_session_token();
        assert_eq!(a.len(), TOKEN_BYTES * 2);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[test]
    fn test_required_rejects_blank() {
        assert!(required(Some("  ".into()), "missing").is_err());
        assert!(required(None, "missing").is_err());
        assert_eq!(required(Some("u1".into()), "missing").unwrap(), "u1");
    }

    #[test]
    fn test_expiry_overflow_is_an_error() {
        let ttl = ttl_from_secs(10_000_000_000_000);
        let err = session_expiry(Utc::now(), ttl).unwrap_err();
        assert!(matches!(err, VerificationError::InvalidExpiry { .. }));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.code(), "session_expiry_invalid");

        let ttl = ttl_from_secs(u64::MAX);
        assert!(session_expiry(Utc::now(), ttl).is_err());
    }

    #[test]
    fn test_expiry_within_range() {
        let now = Utc::now();
        let expires_at = session_expiry(now, ttl_from_secs(1800)).unwrap();
        assert_eq!((expires_at - now).num_seconds(), 1800);
    }
}
