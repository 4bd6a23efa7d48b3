//! Cross-cutting request processing applied ahead of the routes

use crate::api::handlers::ApiError;
use crate::api::rate_limit::{RateLimitStatus, RateLimiter, RATE_LIMIT_MESSAGE};
use axum::{
    body::{Body, HttpBody},
    extract::{connect_info::MockConnectInfo, ConnectInfo, Request, State},
    http::{header, HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Uri, Version},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

/// Largest JSON request body accepted (100 KiB)
pub const MAX_JSON_BODY: usize = 100 * 1024;

/// Static security header policy
const SECURITY_HEADERS: &[(&str, &str)] = &[
    (
        "content-security-policy",
        "default-src 'self';base-uri 'self';font-src 'self' https: data:;\
         form-action 'self';frame-ancestors 'self';img-src 'self' data:;\
         object-src 'none';script-src 'self';script-src-attr 'none';\
         style-src 'self' https: 'unsafe-inline';upgrade-insecure-requests",
    ),
    ("cross-origin-opener-policy", "same-origin"),
    ("cross-origin-resource-policy", "same-origin"),
    ("origin-agent-cluster", "?1"),
    ("referrer-policy", "no-referrer"),
    ("strict-transport-security", "max-age=31536000; includeSubDomains"),
    ("x-content-type-options", "nosniff"),
    ("x-dns-prefetch-control", "off"),
    ("x-download-options", "noopen"),
    ("x-frame-options", "SAMEORIGIN"),
    ("x-permitted-cross-domain-policies", "none"),
    ("x-xss-protection", "0"),
];

/// Parsed JSON request body, stored in request extensions
#[derive(Debug, Clone)]
pub struct JsonBody(pub Value);

/// Remote address of the connection, if the server was started with connect info
pub fn client_addr(req: &Request) -> Option<SocketAddr> {
    let extensions = req.extensions();
    extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr)
        .or_else(|| {
            extensions
                .get::<MockConnectInfo<SocketAddr>>()
                .map(|MockConnectInfo(addr)| *addr)
        })
}

// =============================================================================
// Security headers
// =============================================================================

pub async fn security_headers(req: Request, next: Next) -> Response {
    let mut response = next.run(req).await;
    apply_security_headers(response.headers_mut());
    response
}

fn apply_security_headers(headers: &mut HeaderMap) {
    for &(name, value) in SECURITY_HEADERS {
        headers
            .entry(HeaderName::from_static(name))
            .or_insert_with(|| HeaderValue::from_static(value));
    }
    headers.remove("x-powered-by");
}

// =============================================================================
// CORS
// =============================================================================

/// Any origin unless a list is configured
pub fn cors_layer(origins: Option<&[HeaderValue]>) -> CorsLayer {
    let allow_origin = match origins {
        Some(list) => AllowOrigin::list(list.iter().cloned()),
        None => AllowOrigin::any(),
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([
            Method::GET,
            Method::HEAD,
            Method::PUT,
            Method::PATCH,
            Method::POST,
            Method::DELETE,
        ])
        .allow_headers(Any)
}

// =============================================================================
// Access log
// =============================================================================

/// Fields of one access log line, in the `combined` layout plus response time
#[derive(Debug)]
pub struct AccessRecord {
    pub remote: String,
    pub method: Method,
    pub uri: Uri,
    pub version: Version,
    pub status: StatusCode,
    pub content_length: Option<u64>,
    pub referrer: Option<String>,
    pub user_agent: Option<String>,
    pub elapsed_ms: f64,
}

impl fmt::Display for AccessRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let length = self
            .content_length
            .map(|len| len.to_string())
            .unwrap_or_else(|| "-".to_string());
        write!(
            f,
            "{} - \"{} {} {:?}\" {} {} \"{}\" \"{}\" {:.3}ms",
            self.remote,
            self.method,
            self.uri,
            self.version,
            self.status.as_u16(),
            length,
            self.referrer.as_deref().unwrap_or("-"),
            self.user_agent.as_deref().unwrap_or("-"),
            self.elapsed_ms
        )
    }
}

fn header_text(headers: &HeaderMap, name: HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

/// One line per request on the `access` target
pub async fn access_log(req: Request, next: Next) -> Response {
    let started = Instant::now();
    let remote = client_addr(&req)
        .map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| "-".to_string());
    let method = req.method().clone();
    let uri = req.uri().clone();
    let version = req.version();
    let referrer = header_text(req.headers(), header::REFERER);
    let user_agent = header_text(req.headers(), header::USER_AGENT);

    let response = next.run(req).await;

    let record = AccessRecord {
        remote,
        method,
        uri,
        version,
        status: response.status(),
        content_length: response.body().size_hint().exact(),
        referrer,
        user_agent,
        elapsed_ms: started.elapsed().as_secs_f64() * 1000.0,
    };
    log::info!(target: "access", "{}", record);

    response
}

// =============================================================================
// JSON body validation
// =============================================================================

fn is_json_content(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .map(|mime| {
            let mime = mime.trim().to_ascii_lowercase();
            mime == "application/json" || (mime.starts_with("application/") && mime.ends_with("+json"))
        })
        .unwrap_or(false)
}

fn body_error(status: StatusCode, message: &str) -> Response {
    (status, Json(ApiError::new(message))).into_response()
}

/// Validate JSON request bodies before they reach the routes.
///
/// Only objects and arrays are accepted at the top level. The parsed value is
/// attached as [`JsonBody`] and the raw bytes are handed on unchanged.
pub async fn json_body(req: Request, next: Next) -> Response {
    if !is_json_content(req.headers()) {
        return next.run(req).await;
    }

    let (mut parts, body) = req.into_parts();
    let bytes = match axum::body::to_bytes(body, MAX_JSON_BODY).await {
        Ok(bytes) => bytes,
        Err(e) => {
            log::warn!("Rejected request body on {}: {}", parts.uri.path(), e);
            return body_error(StatusCode::PAYLOAD_TOO_LARGE, "Request body too large");
        }
    };

    if !bytes.is_empty() {
        match serde_json::from_slice::<Value>(&bytes) {
            Ok(value @ (Value::Object(_) | Value::Array(_))) => {
                parts.extensions.insert(JsonBody(value));
            }
            _ => {
                log::warn!("Rejected malformed JSON body on {}", parts.uri.path());
                return body_error(StatusCode::BAD_REQUEST, "Invalid JSON body");
            }
        }
    }

    next.run(Request::from_parts(parts, Body::from(bytes))).await
}

// =============================================================================
// Rate limiting
// =============================================================================

/// Quota headers in both the legacy `X-RateLimit-*` form (reset as a unix
/// timestamp) and the draft `RateLimit-*` form (reset in seconds)
fn rate_limit_headers(headers: &mut HeaderMap, status: &RateLimitStatus, now: DateTime<Utc>) {
    let reset_secs = status.reset_after.as_secs_f64().ceil() as u64;
    let reset_at = now.timestamp().max(0) as u64 + reset_secs;

    headers.insert("x-ratelimit-limit", HeaderValue::from(status.limit));
    headers.insert("x-ratelimit-remaining", HeaderValue::from(status.remaining));
    headers.insert("x-ratelimit-reset", HeaderValue::from(reset_at));
    headers.insert("ratelimit-limit", HeaderValue::from(status.limit));
    headers.insert("ratelimit-remaining", HeaderValue::from(status.remaining));
    headers.insert("ratelimit-reset", HeaderValue::from(reset_secs));
    if !status.allowed {
        headers.insert(header::RETRY_AFTER, HeaderValue::from(reset_secs));
    }
}

pub async fn rate_limit(
    State(limiter): State<Arc<RateLimiter>>,
    req: Request,
    next: Next,
) -> Response {
    let ip = match client_addr(&req) {
        Some(addr) => addr.ip(),
        None => {
            log::warn!("No client address on request; using shared rate limit bucket");
            IpAddr::V4(Ipv4Addr::UNSPECIFIED)
        }
    };

    let status = limiter.check(ip).await;
    let mut response = if status.allowed {
        next.run(req).await
    } else {
        log::warn!("Rate limit exceeded for {}", ip);
        (StatusCode::TOO_MANY_REQUESTS, RATE_LIMIT_MESSAGE).into_response()
    };

    rate_limit_headers(response.headers_mut(), &status, Utc::now());
    response
}
