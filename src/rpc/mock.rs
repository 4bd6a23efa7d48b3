//! In-process stand-in for the daemon's JSON-RPC endpoint, used by tests

use crate::config::RpcConfig;
use axum::{body::Bytes, http::HeaderMap, http::StatusCode, routing::post, Router};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::Mutex;

/// A request as seen by the mock daemon
#[derive(Debug, Clone)]
pub struct ReceivedCall {
    pub authorization: Option<String>,
    pub content_type: Option<String>,
    pub body: Value,
}

/// Mock daemon bound to an ephemeral local port
pub struct MockDaemon {
    pub config: RpcConfig,
    received: Arc<Mutex<Vec<ReceivedCall>>>,
}

impl MockDaemon {
    /// Start a daemon whose reply is computed from each request body
    pub async fn spawn<F>(responder: F) -> Self
    where
        F: Fn(&Value) -> (StatusCode, String) + Clone + Send + Sync + 'static,
    {
        let received = Arc::new(Mutex::new(Vec::new()));
        let log = received.clone();

        let app = Router::new().route(
            "/",
            post(move |headers: HeaderMap, body: Bytes| {
                let log = log.clone();
                let responder = responder.clone();
                async move {
                    let body: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
                    let header = |name: &str| {
                        headers
                            .get(name)
                            .and_then(|v| v.to_str().ok())
                            .map(str::to_string)
                    };
                    let reply = responder(&body);
                    log.lock().await.push(ReceivedCall {
                        authorization: header("authorization"),
                        content_type: header("content-type"),
                        body,
                    });
                    reply
                }
            }),
        );

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            config: RpcConfig {
                host: "127.0.0.1".to_string(),
                port,
                user: "fair".to_string(),
                password: "secret".to_string(),
            },
            received,
        }
    }

    /// Always answer with the given status and raw body
    pub async fn respond(status: StatusCode, body: &str) -> Self {
        let body = body.to_string();
        Self::spawn(move |_| (status, body.clone())).await
    }

    /// Always answer `{"result": value, "error": null}`
    pub async fn result(value: Value) -> Self {
        let body = json!({"result": value, "error": null, "id": "faircoin"}).to_string();
        Self::respond(StatusCode::OK, &body).await
    }

    /// Always answer with a JSON-RPC error object
    pub async fn rpc_error(message: &str) -> Self {
        let body = json!({
            "result": null,
            "error": {"code": -1, "message": message},
            "id": "faircoin",
        })
        .to_string();
        Self::respond(StatusCode::OK, &body).await
    }

    /// Requests received so far
    pub async fn calls(&self) -> Vec<ReceivedCall> {
        self.received.lock().await.clone()
    }
}

/// Settings pointing at a local port nobody listens on
pub async fn unreachable_config() -> RpcConfig {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    RpcConfig {
        host: "127.0.0.1".to_string(),
        port,
        user: "fair".to_string(),
        password: "secret".to_string(),
    }
}
