//! REST API routes configuration

use crate::api::handlers::{self, ApiState};
use crate::api::middleware;
use axum::{extract::State, middleware::from_fn, middleware::from_fn_with_state, routing::get, Router};
use tower_http::catch_panic::CatchPanicLayer;

/// A GET route answered by a single parameterless daemon call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RpcRoute {
    pub path: &'static str,
    pub method: &'static str,
}

/// Fixed route table
pub const RPC_ROUTES: &[RpcRoute] = &[
    RpcRoute {
        path: "/api/networkinfo",
        method: "getnetworkinfo",
    },
    RpcRoute {
        path: "/api/blockchaininfo",
        method: "getblockchaininfo",
    },
    RpcRoute {
        path: "/api/peerinfo",
        method: "getpeerinfo",
    },
    RpcRoute {
        path: "/api/mininginfo",
        method: "getmininginfo",
    },
];

/// Create the API router with all routes and the middleware chain.
///
/// Layers run outermost first: panic catching, security headers, CORS,
/// access log, JSON body validation, rate limiting.
pub fn create_router(state: ApiState) -> Router {
    let mut router = Router::new().route("/health", get(handlers::health_check));

    for route in RPC_ROUTES {
        router = router.route(
            route.path,
            get(move |State(state): State<ApiState>| async move {
                handlers::forward_rpc(&state, route).await
            }),
        );
    }

    let cors = middleware::cors_layer(state.config.cors_origins.as_deref());
    let limiter = state.limiter.clone();

    router
        .fallback(handlers::not_found)
        .with_state(state)
        .layer(from_fn_with_state(limiter, middleware::rate_limit))
        .layer(from_fn(middleware::json_body))
        .layer(from_fn(middleware::access_log))
        .layer(cors)
        .layer(from_fn(middleware::security_headers))
        .layer(CatchPanicLayer::custom(handlers::handle_panic))
}

// =============================================================================
// Tests
// =============================================================================
