//! Route access control.
//!
//! # Data Flow
//! ```text
//! request
//!     → middleware.rs (excluded? rate limit? crawler?)
//!     → auth (session lookup)
//!     → decision.rs (session state × path → allow / redirect)
//!     → policy.rs supplies public, excluded and redirect paths
//! ```
//!
//! # Design Decisions
//! - Decisions are a pure function of session state and path
//! - Route policy is swapped atomically on config reload

pub mod decision;
pub mod middleware;
pub mod policy;

pub use decision::{decide, GateDecision, SessionState};
pub use middleware::{gate_middleware, rate_limit_middleware, GateState};
pub use policy::{GatePolicy, RoutePolicy};
