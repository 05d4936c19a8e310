//! Session resolution.
//!
//! # Data Flow
//! ```text
//! request headers
//!     → token.rs (bearer header or session cookie)
//!     → SessionProvider (supabase.rs in production, memory.rs in tests)
//!     → Session { user_id, email, email_confirmed_at }
//!     → gate decision
//!
//! Session changes:
//!     provider → events.rs (AuthStateHub) → subscribed handlers
//! ```

pub mod events;
pub mod memory;
pub mod session;
pub mod supabase;
pub mod token;

pub use events::{AuthEvent, AuthStateHandler, AuthStateHub, AuthSubscription};
pub use memory::MemorySessionProvider;
pub use session::{AuthError, Session, SessionProvider};
pub use supabase::SupabaseSessionProvider;
pub use token::extract_access_token;
