//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! gate.toml
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → GateConfig (validated, immutable)
//!     → shared via Arc to all subsystems
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → server swaps the live RoutePolicy (arc-swap)
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; only route policy hot-reloads
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, ConfigError};
pub use schema::GateConfig;
pub use schema::{
    AdminConfig, BotConfig, IdentityConfig, ListenerConfig, ObservabilityConfig,
    RateLimitConfig, RoutesConfig, UpstreamConfig, VerificationConfig,
};
