//! Verification session API.
//!
//! # Data Flow
//! ```text
//! POST /api/verification/start
//!     → handlers.rs (validate, mint token)
//!     → VerificationStore::create (pending session)
//!
//! POST /api/verification/complete
//!     → VerificationStore::update_by_token (completed | failed)
//!     → UserStatusStore::update_user_verification_status (on success)
//! ```
//!
//! The two completion writes are sequential and not atomic. A failure of
//! the second surfaces as its own error code; the session is left as
//! written.

pub mod error;
pub mod handlers;
pub mod store;
pub mod types;

pub use error::VerificationError;
pub use handlers::{complete_verification, start_verification, VerificationState};
pub use store::{MemoryVerificationStore, StoreError, UserStatusStore, VerificationStore};
pub use types::{UserVerificationStatus, VerificationSession, VerificationStatus};
