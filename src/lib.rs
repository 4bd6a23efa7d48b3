//! FairServer: a hardened REST gateway in front of a FairCoin daemon
//!
//! This crate provides:
//! - A JSON-RPC 1.0 client with basic authentication
//! - Fixed GET endpoints mapped to parameterless daemon calls
//! - Security headers, CORS, access logging and JSON body validation
//! - Per-client-IP rate limiting
//!
//! # Example
//!
//! ```no_run
//! use fairserver::api::{create_router, ApiState};
//! use fairserver::config::Config;
//! use std::sync::Arc;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Arc::new(Config::load()?);
//! let app = create_router(ApiState::new(config.clone())?);
//!
//! let listener = tokio::net::TcpListener::bind(config.listen).await?;
//! axum::serve(
//!     listener,
//!     app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
//! )
//! .await?;
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod config;
pub mod rpc;

// Re-export commonly used types
pub use api::{create_router, ApiState, RateLimiter};
pub use config::{Config, ConfigError};
pub use rpc::{RpcClient, RpcError};
