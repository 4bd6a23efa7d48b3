//! Daemon RPC client

use crate::config::RpcConfig;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::StatusCode;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

// =============================================================================
// Constants
// =============================================================================

/// Protocol tag sent with every request
pub const JSONRPC_VERSION: &str = "1.0";

/// Requests are never pipelined, so a fixed id is enough
pub const REQUEST_ID: &str = "faircoin";

/// Message used when the daemon's error object carries none
const UNKNOWN_RPC_ERROR: &str = "unknown RPC error";

// =============================================================================
// Errors
// =============================================================================

#[derive(Error, Debug)]
pub enum RpcError {
    /// Daemon answered with a non-success HTTP status
    #[error("RPC request failed with status {status}")]
    Http { status: StatusCode },
    /// Daemon could not be reached or the transfer failed
    #[error("RPC transport error: {0}")]
    Network(#[from] reqwest::Error),
    /// Body was not a JSON-RPC envelope
    #[error("Invalid RPC response: {0}")]
    InvalidResponse(String),
    /// Daemon returned a JSON-RPC error object
    #[error("{message}")]
    Daemon { code: Option<i64>, message: String },
}

// =============================================================================
// Wire types
// =============================================================================

/// JSON-RPC request envelope
#[derive(Debug, Serialize)]
pub struct RpcRequest<'a> {
    pub jsonrpc: &'static str,
    pub id: &'static str,
    pub method: &'a str,
    pub params: &'a [Value],
}

impl<'a> RpcRequest<'a> {
    pub fn new(method: &'a str, params: &'a [Value]) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id: REQUEST_ID,
            method,
            params,
        }
    }
}

// =============================================================================
// Client
// =============================================================================

/// Client for a single daemon endpoint
#[derive(Clone)]
pub struct RpcClient {
    http: reqwest::Client,
    url: String,
    authorization: String,
}

impl RpcClient {
    /// Create a client for the configured daemon
    pub fn new(config: &RpcConfig) -> Result<Self, RpcError> {
        let http = reqwest::Client::builder().build()?;

        Ok(Self {
            http,
            url: format!("http://{}:{}/", config.host, config.port),
            authorization: basic_auth_header(&config.user, &config.password),
        })
    }

    /// Daemon URL (no credentials)
    pub fn endpoint(&self) -> &str {
        &self.url
    }

    /// Call `method` without parameters
    pub async fn call_no_params(&self, method: &str) -> Result<Value, RpcError> {
        self.call(method, &[]).await
    }

    /// Call `method` and return its `result` value.
    ///
    /// Failures are logged with the method name and handed back unchanged.
    pub async fn call(&self, method: &str, params: &[Value]) -> Result<Value, RpcError> {
        log::debug!("RPC call {} ({} params)", method, params.len());

        let outcome = self.send(method, params).await;
        if let Err(e) = &outcome {
            log::error!("RPC call error for method {}: {}", method, e);
        }
        outcome
    }

    async fn send(&self, method: &str, params: &[Value]) -> Result<Value, RpcError> {
        let response = self
            .http
            .post(&self.url)
            .header(CONTENT_TYPE, "application/json")
            .header(AUTHORIZATION, &self.authorization)
            .json(&RpcRequest::new(method, params))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(RpcError::Http { status });
        }

        let body = response.bytes().await?;
        let envelope: Value = serde_json::from_slice(&body)
            .map_err(|e| RpcError::InvalidResponse(e.to_string()))?;

        parse_envelope(envelope)
    }
}

/// `Basic base64(user:password)`
pub fn basic_auth_header(user: &str, password: &str) -> String {
    format!("Basic {}", STANDARD.encode(format!("{}:{}", user, password)))
}

/// Extract `result`, or the daemon error if `error` is non-null
fn parse_envelope(envelope: Value) -> Result<Value, RpcError> {
    let Value::Object(mut fields) = envelope else {
        return Err(RpcError::InvalidResponse(
            "response is not a JSON object".to_string(),
        ));
    };

    match fields.remove("error") {
        None | Some(Value::Null) => Ok(fields.remove("result").unwrap_or(Value::Null)),
        Some(error) => Err(daemon_error(error)),
    }
}

fn daemon_error(error: Value) -> RpcError {
    match error {
        Value::Object(obj) => RpcError::Daemon {
            code: obj.get("code").and_then(Value::as_i64),
            message: obj
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or(UNKNOWN_RPC_ERROR)
                .to_string(),
        },
        Value::String(message) => RpcError::Daemon {
            code: None,
            message,
        },
        _ => RpcError::Daemon {
            code: None,
            message: UNKNOWN_RPC_ERROR.to_string(),
        },
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::mock::{unreachable_config, MockDaemon};
    use serde_json::json;

    #[test]
    fn test_request_serialization() {
        let params = [json!(1), json!("two")];
        let request = RpcRequest::new("getblockhash", &params);

        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({
                "jsonrpc": "1.0",
                "id": "faircoin",
                "method": "getblockhash",
                "params": [1, "two"],
            })
        );
    }

    #[test]
    fn test_basic_auth_header() {
        // "user:pass" in base64
        assert_eq!(basic_auth_header("user", "pass"), "Basic dXNlcjpwYXNz");
    }

    #[test]
    fn test_parse_envelope_variants() {
        assert_eq!(
            parse_envelope(json!({"result": 5, "error": null})).unwrap(),
            json!(5)
        );
        assert_eq!(parse_envelope(json!({"id": "faircoin"})).unwrap(), Value::Null);

        match parse_envelope(json!({"result": null, "error": {"code": -8, "message": "bad"}})) {
            Err(RpcError::Daemon { code, message }) => {
                assert_eq!(code, Some(-8));
                assert_eq!(message, "bad");
            }
            other => panic!("expected daemon error, got {:?}", other),
        }

        assert!(matches!(
            parse_envelope(json!([1, 2, 3])),
            Err(RpcError::InvalidResponse(_))
        ));
    }

    #[tokio::test]
    async fn test_call_returns_result_verbatim() {
        let values = [
            Value::Null,
            json!(42),
            json!(-0.5),
            json!("fair"),
            json!([1, "a", null]),
            json!({"chain": "main", "nested": {"peers": [{"id": 1}], "ok": true}}),
        ];

        for value in values {
            let daemon = MockDaemon::result(value.clone()).await;
            let client = RpcClient::new(&daemon.config).unwrap();

            assert_eq!(client.call("getinfo", &[]).await.unwrap(), value);
        }
    }

    #[tokio::test]
    async fn test_call_surfaces_daemon_error_message() {
        let daemon = MockDaemon::rpc_error("M").await;
        let client = RpcClient::new(&daemon.config).unwrap();

        let err = client.call_no_params("getinfo").await.unwrap_err();
        assert!(matches!(&err, RpcError::Daemon { message, .. } if message == "M"));
        assert_eq!(err.to_string(), "M");
    }

    #[tokio::test]
    async fn test_call_sends_wire_format() {
        let daemon = MockDaemon::result(json!(true)).await;
        let client = RpcClient::new(&daemon.config).unwrap();

        client
            .call("getblock", &[json!("00ab"), json!(1)])
            .await
            .unwrap();

        let calls = daemon.calls().await;
        assert_eq!(calls.len(), 1);
        let call = &calls[0];
        assert_eq!(
            call.body,
            json!({
                "jsonrpc": "1.0",
                "id": "faircoin",
                "method": "getblock",
                "params": ["00ab", 1],
            })
        );
        assert_eq!(
            call.authorization.as_deref(),
            Some(basic_auth_header("fair", "secret").as_str())
        );
        assert_eq!(call.content_type.as_deref(), Some("application/json"));
    }

    #[tokio::test]
    async fn test_http_status_error() {
        let daemon = MockDaemon::respond(StatusCode::UNAUTHORIZED, "").await;
        let client = RpcClient::new(&daemon.config).unwrap();

        match client.call_no_params("getinfo").await {
            Err(RpcError::Http { status }) => assert_eq!(status, StatusCode::UNAUTHORIZED),
            other => panic!("expected HTTP error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_malformed_body() {
        let daemon = MockDaemon::respond(StatusCode::OK, "{not json").await;
        let client = RpcClient::new(&daemon.config).unwrap();

        assert!(matches!(
            client.call_no_params("getinfo").await,
            Err(RpcError::InvalidResponse(_))
        ));
    }

    #[tokio::test]
    async fn test_unreachable_daemon() {
        let config = unreachable_config().await;
        let client = RpcClient::new(&config).unwrap();

        assert!(matches!(
            client.call_no_params("getinfo").await,
            Err(RpcError::Network(_))
        ));
    }

    #[test]
    fn test_endpoint_hides_credentials() {
        let config = RpcConfig {
            host: "10.0.0.5".to_string(),
            port: 40405,
            user: "fair".to_string(),
            password: "secret".to_string(),
        };
        let client = RpcClient::new(&config).unwrap();

        assert_eq!(client.endpoint(), "http://10.0.0.5:40405/");
        assert!(!client.endpoint().contains("secret"));
    }
}
