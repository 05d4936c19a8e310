//! Marketplace access gate library.
//!
//! Per-IP rate limiting, session-aware route gating and the verification
//! session API, in front of the marketplace page server.

pub mod admin;
pub mod auth;
pub mod config;
pub mod gate;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod security;
pub mod verification;

pub use config::GateConfig;
pub use http::{GateServices, HttpServer};
pub use lifecycle::Shutdown;
