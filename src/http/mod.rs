//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware stack)
//!     → request.rs (request ID)
//!     → gate middleware (allow / redirect / 429)
//!     → server.rs forward_handler (upstream page server)
//!     → response.rs (hop-by-hop stripping, 429 body)
//!     → Send to client
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use request::X_REQUEST_ID;
pub use server::{AppState, GateServices, HttpServer, ServerError};
