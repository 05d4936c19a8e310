//! Verification API errors and their HTTP mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use uuid::Uuid;

use crate::observability::metrics;
use crate::verification::store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum VerificationError {
    /// Bad or incomplete request body. Nothing was written.
    #[error("{0}")]
    Validation(String),

    #[error("failed to create verification session: {0}")]
    SessionCreate(#[source] StoreError),

    /// The configured session TTL does not fit in a timestamp.
    #[error("session expiry out of range for ttl of {ttl_secs}s")]
    InvalidExpiry { ttl_secs: i64 },

    #[error("failed to update verification session: {0}")]
    SessionUpdate(#[source] StoreError),

    /// The session write succeeded but the user write did not. The two
    /// writes are not atomic and nothing is rolled back.
    #[error("verification session {session_id} finished but user {user_id} status update failed: {source}")]
    UserStatusUpdate {
        session_id: Uuid,
        user_id: String,
        #[source]
        source: StoreError,
    },
}

impl VerificationError {
    pub fn status(&self) -> StatusCode {
        match self {
            VerificationError::Validation(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Machine-readable code returned to callers.
    pub fn code(&self) -> &'static str {
        match self {
            VerificationError::Validation(_) => "validation_failed",
            VerificationError::SessionCreate(_) => "session_create_failed",
            VerificationError::InvalidExpiry { .. } => "session_expiry_invalid",
            VerificationError::SessionUpdate(_) => "session_update_failed",
            VerificationError::UserStatusUpdate { .. } => "user_status_update_failed",
        }
    }

    /// Message safe to return to callers; store details stay in the logs.
    fn public_message(&self) -> String {
        match self {
            VerificationError::Validation(msg) => msg.clone(),
            VerificationError::SessionCreate(_) | VerificationError::InvalidExpiry { .. } => {
                "Failed to create verification session".into()
            }
            VerificationError::SessionUpdate(_) => "Failed to update verification session".into(),
            VerificationError::UserStatusUpdate { .. } => "Failed to update user status".into(),
        }
    }
}

impl IntoResponse for VerificationError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, code = self.code(), "Verification request failed");
        } else {
            tracing::debug!(error = %self, "Verification request rejected");
        }
        metrics::record_verification_event(self.code());

        let body = Json(json!({
            "error": self.public_message(),
            "code": self.code(),
        }));
        (status, body).into_response()
    }
}
