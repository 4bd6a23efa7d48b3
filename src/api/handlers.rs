//! REST API handlers

use crate::api::rate_limit::RateLimiter;
use crate::api::routes::RpcRoute;
use crate::config::Config;
use crate::rpc::{RpcClient, RpcError};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::any::Any;
use std::sync::Arc;

/// Body of every 500 response; daemon detail never reaches clients
pub const INTERNAL_SERVER_ERROR: &str = "Internal server error";

/// Shared application state for API handlers
#[derive(Clone)]
pub struct ApiState {
    pub config: Arc<Config>,
    pub rpc: Arc<RpcClient>,
    pub limiter: Arc<RateLimiter>,
}

impl ApiState {
    /// Build the RPC client and rate limiter from configuration
    pub fn new(config: Arc<Config>) -> Result<Self, RpcError> {
        let rpc = Arc::new(RpcClient::new(&config.rpc)?);
        let limiter = Arc::new(RateLimiter::new(config.rate_limit));

        Ok(Self {
            config,
            rpc,
            limiter,
        })
    }
}

// ============================================================================
// Response Types
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub error: String,
}

impl ApiError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
}

/// Generic 500 response
pub fn internal_error() -> (StatusCode, Json<ApiError>) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ApiError::new(INTERNAL_SERVER_ERROR)),
    )
}

// ============================================================================
// Handlers
// ============================================================================

/// GET on an RPC-backed route - forward to the daemon without parameters
pub async fn forward_rpc(
    state: &ApiState,
    route: &RpcRoute,
) -> Result<Json<Value>, (StatusCode, Json<ApiError>)> {
    match state.rpc.call_no_params(route.method).await {
        Ok(result) => Ok(Json(result)),
        Err(e) => {
            log::error!(
                "Error in {} ({} failure calling {}): {}",
                route.path,
                failure_kind(&e),
                route.method,
                e
            );
            Err(internal_error())
        }
    }
}

fn failure_kind(error: &RpcError) -> &'static str {
    match error {
        RpcError::Http { .. } | RpcError::Network(_) => "transport",
        RpcError::InvalidResponse(_) => "protocol",
        RpcError::Daemon { .. } => "daemon",
    }
}

/// GET /health - Liveness check; never touches the daemon
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "OK".to_string(),
        timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
    })
}

/// Fallback for unknown paths
pub async fn not_found() -> (StatusCode, Json<ApiError>) {
    (StatusCode::NOT_FOUND, Json(ApiError::new("Not Found")))
}

/// Turn a panic escaping the handler stack into a generic 500
pub fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.as_str()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s
    } else {
        "unknown panic payload"
    };
    log::error!("Unhandled error: {}", detail);

    internal_error().into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;

    #[tokio::test]
    async fn test_health_timestamp_is_rfc3339() {
        let Json(health) = health_check().await;

        assert_eq!(health.status, "OK");
        assert!(health.timestamp.ends_with('Z'));
        assert!(DateTime::parse_from_rfc3339(&health.timestamp).is_ok());
    }

    #[test]
    fn test_internal_error_body() {
        let (status, Json(body)) = internal_error();
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            serde_json::to_string(&body).unwrap(),
            r#"{"error":"Internal server error"}"#
        );
    }

    #[test]
    fn test_panic_payloads_masked() {
        let from_str = handle_panic(Box::new("boom"));
        let from_string = handle_panic(Box::new(String::from("boom")));
        let opaque = handle_panic(Box::new(17_u8));

        for response in [from_str, from_string, opaque] {
            assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        }
    }

    #[test]
    fn test_failure_kinds() {
        assert_eq!(
            failure_kind(&RpcError::Http {
                status: StatusCode::FORBIDDEN
            }),
            "transport"
        );
        assert_eq!(
            failure_kind(&RpcError::InvalidResponse("x".to_string())),
            "protocol"
        );
        assert_eq!(
            failure_kind(&RpcError::Daemon {
                code: Some(-28),
                message: "Loading block index...".to_string()
            }),
            "daemon"
        );
    }
}
