//! REST API module
//!
//! Exposes a fixed set of daemon info calls over HTTP.
//!
//! # Endpoints
//!
//! - `GET /health` - Liveness check (no daemon call)
//! - `GET /api/networkinfo` - `getnetworkinfo`
//! - `GET /api/blockchaininfo` - `getblockchaininfo`
//! - `GET /api/peerinfo` - `getpeerinfo`
//! - `GET /api/mininginfo` - `getmininginfo`
//!
//! Daemon failures are logged and answered with a generic 500 body.

pub mod handlers;
pub mod middleware;
pub mod rate_limit;
pub mod routes;

pub use handlers::ApiState;
pub use rate_limit::RateLimiter;
pub use routes::{create_router, RpcRoute, RPC_ROUTES};
