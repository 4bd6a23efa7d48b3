//! Server configuration
//!
//! Settings are read once at startup from command-line flags or their
//! environment variables, validated, and then shared immutably.

pub mod settings;

pub use settings::{Config, ConfigError, RateLimitConfig, RpcConfig, ServerArgs};
