//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → client_ip.rs (resolve client IP from proxy headers)
//!     → rate_limit.rs (fixed window per IP)
//!     → bots.rs (crawler allowance for public pages)
//!     → [gate decides allow / redirect]
//!     → headers.rs (security headers on pass-through)
//! ```
//!
//! # Design Decisions
//! - Rate limiting runs before any session lookup
//! - Fail closed: an unresolvable session never unlocks private routes
//! - Forwarded headers are trusted as-is; run behind a proxy that rewrites them

pub mod bots;
pub mod client_ip;
pub mod headers;
pub mod rate_limit;

pub use bots::{is_bot, should_bypass_auth};
pub use client_ip::{resolve_client_ip, ClientIdentity, UNKNOWN_CLIENT};
pub use headers::apply_security_headers;
pub use rate_limit::{FixedWindowLimiter, RateLimiter};
