//! Per-client request rate limiting
//!
//! Each client IP gets a window that opens with its first request. Requests
//! beyond the configured maximum inside that window are rejected until the
//! window expires.

use crate::config::RateLimitConfig;
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

/// Body of a 429 response
pub const RATE_LIMIT_MESSAGE: &str = "Too many requests from this IP, please try again later.";

/// Outcome of a single rate-limit check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitStatus {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    /// Time until the client's window resets
    pub reset_after: Duration,
}

#[derive(Debug, Clone, Copy)]
struct ClientWindow {
    started: Instant,
    hits: u32,
}

/// Request counters keyed by client IP
#[derive(Debug)]
pub struct RateLimiter {
    config: RateLimitConfig,
    clients: Mutex<HashMap<IpAddr, ClientWindow>>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            clients: Mutex::new(HashMap::new()),
        }
    }

    /// Count a request from `client` and decide whether it may proceed
    pub async fn check(&self, client: IpAddr) -> RateLimitStatus {
        self.check_at(client, Instant::now()).await
    }

    async fn check_at(&self, client: IpAddr, now: Instant) -> RateLimitStatus {
        let window = self.config.window;
        let max = self.config.max_requests;

        let mut clients = self.clients.lock().await;
        let entry = clients
            .entry(client.to_canonical())
            .or_insert(ClientWindow { started: now, hits: 0 });

        if now.duration_since(entry.started) >= window {
            *entry = ClientWindow { started: now, hits: 0 };
        }
        entry.hits = entry.hits.saturating_add(1);

        RateLimitStatus {
            allowed: entry.hits <= max,
            limit: max,
            remaining: max.saturating_sub(entry.hits),
            reset_after: window.saturating_sub(now.duration_since(entry.started)),
        }
    }

    /// Drop clients whose window has expired; returns how many were removed
    pub async fn prune_expired(&self) -> usize {
        self.prune_expired_at(Instant::now()).await
    }

    async fn prune_expired_at(&self, now: Instant) -> usize {
        let window = self.config.window;
        let mut clients = self.clients.lock().await;
        let before = clients.len();
        clients.retain(|_, w| now.duration_since(w.started) < window);
        before - clients.len()
    }

    /// Number of clients currently tracked
    pub async fn tracked_clients(&self) -> usize {
        self.clients.lock().await.len()
    }

    /// Prune expired clients once per window, for as long as the process runs
    pub fn spawn_sweeper(self: &Arc<Self>) -> JoinHandle<()> {
        let limiter = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(limiter.config.window);
            // First tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let removed = limiter.prune_expired().await;
                if removed > 0 {
                    log::debug!("Rate limiter pruned {} idle clients", removed);
                }
            }
        })
    }
}

// =============================================================================
// Tests
// =============================================================================
