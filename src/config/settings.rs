//! Command-line / environment settings and their validation

use axum::http::HeaderValue;
use clap::Parser;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;
use thiserror::Error;

// =============================================================================
// Constants
// =============================================================================

/// Default HTTP listen port
pub const DEFAULT_LISTEN_PORT: u16 = 3000;

/// Default bind address (all interfaces)
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0";

/// Default rate limit window (15 minutes)
pub const DEFAULT_RATE_LIMIT_WINDOW: Duration = Duration::from_secs(15 * 60);

/// Default number of requests allowed per client per window
pub const DEFAULT_RATE_LIMIT_MAX: u32 = 100;

// =============================================================================
// Errors
// =============================================================================

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required environment variables: {}", .0.join(", "))]
    Missing(Vec<&'static str>),
    #[error("Invalid port in {var}: {value:?}")]
    InvalidPort { var: &'static str, value: String },
    #[error("Invalid number in {var}: {value:?}")]
    InvalidNumber { var: &'static str, value: String },
    #[error("Invalid bind address: {0:?}")]
    InvalidBindAddress(String),
    #[error("Invalid CORS origin: {0:?}")]
    InvalidOrigin(String),
}

// =============================================================================
// Raw arguments
// =============================================================================

/// Raw settings as parsed by clap.
///
/// Every field is optional at this level so that missing daemon settings are
/// reported by [`Config::from_args`] rather than by clap's usage error.
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "fairserver")]
#[command(version)]
#[command(about = "REST gateway for FairCoin daemon JSON-RPC info calls", long_about = None)]
pub struct ServerArgs {
    /// Daemon RPC host
    #[arg(long, env = "RPC_HOST")]
    pub rpc_host: Option<String>,

    /// Daemon RPC port
    #[arg(long, env = "RPC_PORT")]
    pub rpc_port: Option<String>,

    /// Daemon RPC username
    #[arg(long, env = "RPC_USER")]
    pub rpc_user: Option<String>,

    /// Daemon RPC password
    #[arg(long, env = "RPC_PASS", hide_env_values = true)]
    pub rpc_pass: Option<String>,

    /// HTTP listen port (default 3000)
    #[arg(short, long, env = "PORT")]
    pub port: Option<String>,

    /// Address to bind the HTTP listener to (default 0.0.0.0)
    #[arg(long, env = "BIND_ADDRESS")]
    pub bind_address: Option<String>,

    /// Comma separated list of allowed CORS origins (default: any)
    #[arg(long, env = "CORS_ORIGIN")]
    pub cors_origin: Option<String>,

    /// Rate limit window in seconds (default 900)
    #[arg(long, env = "RATE_LIMIT_WINDOW_SECS")]
    pub rate_limit_window_secs: Option<String>,

    /// Requests allowed per client per window (default 100)
    #[arg(long, env = "RATE_LIMIT_MAX")]
    pub rate_limit_max: Option<String>,
}

// =============================================================================
// Validated configuration
// =============================================================================

/// Connection settings for the upstream daemon
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RpcConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
}

/// Per-client request quota
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub window: Duration,
    pub max_requests: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window: DEFAULT_RATE_LIMIT_WINDOW,
            max_requests: DEFAULT_RATE_LIMIT_MAX,
        }
    }
}

/// Validated, immutable server configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub rpc: RpcConfig,
    pub listen: SocketAddr,
    /// `None` allows any origin
    pub cors_origins: Option<Vec<HeaderValue>>,
    pub rate_limit: RateLimitConfig,
}

impl Config {
    /// Parse flags and environment, then validate
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_args(ServerArgs::parse())
    }

    /// Validate raw arguments into a configuration.
    ///
    /// All four daemon settings must be present and non-blank; every missing
    /// one is reported at once.
    pub fn from_args(args: ServerArgs) -> Result<Self, ConfigError> {
        let user = non_blank(args.rpc_user);
        let pass = non_blank(args.rpc_pass);
        let port = non_blank(args.rpc_port);
        let host = non_blank(args.rpc_host);

        let missing: Vec<&'static str> = [
            ("RPC_USER", user.is_none()),
            ("RPC_PASS", pass.is_none()),
            ("RPC_PORT", port.is_none()),
            ("RPC_HOST", host.is_none()),
        ]
        .into_iter()
        .filter_map(|(name, absent)| absent.then_some(name))
        .collect();

        let (Some(user), Some(password), Some(port), Some(host)) = (user, pass, port, host) else {
            return Err(ConfigError::Missing(missing));
        };

        let rpc = RpcConfig {
            host,
            port: parse_port("RPC_PORT", &port)?,
            user,
            password,
        };

        let listen_port = match non_blank(args.port) {
            Some(value) => parse_port("PORT", &value)?,
            None => DEFAULT_LISTEN_PORT,
        };

        let bind = non_blank(args.bind_address).unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string());
        let bind_ip: IpAddr = bind
            .parse()
            .map_err(|_| ConfigError::InvalidBindAddress(bind.clone()))?;

        let cors_origins = non_blank(args.cors_origin)
            .map(|list| parse_origins(&list))
            .transpose()?;

        let mut rate_limit = RateLimitConfig::default();
        if let Some(value) = non_blank(args.rate_limit_window_secs) {
            let secs = parse_positive("RATE_LIMIT_WINDOW_SECS", &value)?;
            rate_limit.window = Duration::from_secs(secs);
        }
        if let Some(value) = non_blank(args.rate_limit_max) {
            let max = parse_positive("RATE_LIMIT_MAX", &value)?;
            rate_limit.max_requests =
                u32::try_from(max).map_err(|_| ConfigError::InvalidNumber {
                    var: "RATE_LIMIT_MAX",
                    value,
                })?;
        }

        Ok(Self {
            rpc,
            listen: SocketAddr::new(bind_ip, listen_port),
            cors_origins,
            rate_limit,
        })
    }

    /// URL announced in the startup log line
    pub fn public_url(&self) -> String {
        format!("http://localhost:{}", self.listen.port())
    }
}

/// Trimmed value of a setting; blank counts as unset
fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_port(var: &'static str, value: &str) -> Result<u16, ConfigError> {
    match value.parse::<u16>() {
        Ok(port) if port != 0 => Ok(port),
        _ => Err(ConfigError::InvalidPort {
            var,
            value: value.to_string(),
        }),
    }
}

fn parse_positive(var: &'static str, value: &str) -> Result<u64, ConfigError> {
    match value.parse::<u64>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(ConfigError::InvalidNumber {
            var,
            value: value.to_string(),
        }),
    }
}

fn parse_origins(list: &str) -> Result<Vec<HeaderValue>, ConfigError> {
    list.split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .map(|origin| {
            HeaderValue::from_str(origin).map_err(|_| ConfigError::InvalidOrigin(origin.to_string()))
        })
        .collect()
}

// =============================================================================
// Tests
// =============================================================================
