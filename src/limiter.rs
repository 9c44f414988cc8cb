// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Fixed-window rate limiter for the form endpoints.
//!
//! Each [`RateLimiter`] owns its own counter store keyed by client identity.
//! A window opens on the first request from an identity and lasts
//! `window_ms`; inside it at most `max_requests` checks succeed. Expired
//! entries are evicted by a background sweeper started with
//! [`RateLimiter::spawn_sweeper`].

use crate::config::RateLimitConfig;
use axum::http::HeaderMap;
use chrono::Utc;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Header carrying the proxy chain, client first.
pub const FORWARDED_FOR_HEADER: &str = "x-forwarded-for";
/// Header carrying the client address as seen by the edge proxy.
pub const REAL_IP_HEADER: &str = "x-real-ip";
/// Identity shared by every request that carries neither header.
pub const UNKNOWN_IDENTITY: &str = "unknown";

/// Source of "now" in epoch milliseconds.
pub trait Clock: Send + Sync + fmt::Debug {
    fn now_ms(&self) -> u64;
}

/// Wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        u64::try_from(Utc::now().timestamp_millis()).unwrap_or(0)
    }
}

/// Clock that only moves when told to. Clones share the same time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new(start_ms: u64) -> Self {
        Self {
            now: Arc::new(AtomicU64::new(start_ms)),
        }
    }

    pub fn advance(&self, by: Duration) {
        let millis = u64::try_from(by.as_millis()).unwrap_or(u64::MAX);
        self.now.fetch_add(millis, Ordering::SeqCst);
    }

    pub fn set(&self, now_ms: u64) {
        self.now.store(now_ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// Outcome of a single rate limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    /// Whether the request may proceed
    pub success: bool,
    /// Configured maximum per window
    pub limit: u32,
    /// Requests left in the current window (0 when denied)
    pub remaining: u32,
    /// Epoch milliseconds at which the current window expires
    pub reset_time: u64,
}

impl RateLimitDecision {
    /// Time from `now_ms` until the window resets.
    pub fn retry_after(&self, now_ms: u64) -> Duration {
        Duration::from_millis(self.reset_time.saturating_sub(now_ms))
    }
}

/// Counter for one client identity.
#[derive(Debug, Clone, Copy)]
struct RateLimitEntry {
    /// Requests observed in the current window
    count: u32,
    /// When the current window expires
    reset_time: u64,
}

/// Thread-safe fixed-window rate limiter.
///
/// Cloning is cheap and clones share the same counter store.
#[derive(Clone)]
pub struct RateLimiter {
    /// Configuration
    config: RateLimitConfig,
    /// Per-identity counters
    entries: Arc<RwLock<HashMap<String, RateLimitEntry>>>,
    /// Time source
    clock: Arc<dyn Clock>,
}

impl fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RateLimiter")
            .field("config", &self.config)
            .field("clock", &self.clock)
            .finish_non_exhaustive()
    }
}

impl RateLimiter {
    /// Create a new rate limiter on the wall clock.
    pub fn new(config: RateLimitConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Create a new rate limiter on the given clock.
    pub fn with_clock(mut config: RateLimitConfig, clock: Arc<dyn Clock>) -> Self {
        if config.max_requests == 0 {
            warn!("max_requests of 0 would reject everything, using 1");
            config.max_requests = 1;
        }
        if config.window_ms == 0 {
            warn!("window_ms of 0 is degenerate, using 1");
            config.window_ms = 1;
        }

        Self {
            config,
            entries: Arc::new(RwLock::new(HashMap::new())),
            clock,
        }
    }

    /// Effective configuration after clamping.
    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Current time on this limiter's clock.
    pub fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }

    /// Check and count one request for `identity`.
    pub async fn check(&self, identity: &str) -> RateLimitDecision {
        let now = self.clock.now_ms();
        let limit = self.config.max_requests;

        let mut entries = self.entries.write().await;

        if let Some(entry) = entries.get_mut(identity) {
            if now <= entry.reset_time {
                if entry.count >= limit {
                    debug!(identity, reset_time = entry.reset_time, "Rate limit exceeded");
                    return RateLimitDecision {
                        success: false,
                        limit,
                        remaining: 0,
                        reset_time: entry.reset_time,
                    };
                }

                entry.count += 1;
                return RateLimitDecision {
                    success: true,
                    limit,
                    remaining: limit.saturating_sub(entry.count),
                    reset_time: entry.reset_time,
                };
            }
        }

        // First request, or the previous window has elapsed
        let reset_time = now.saturating_add(self.config.window_ms);
        entries.insert(
            identity.to_string(),
            RateLimitEntry {
                count: 1,
                reset_time,
            },
        );

        RateLimitDecision {
            success: true,
            limit,
            remaining: limit - 1,
            reset_time,
        }
    }

    /// Derive the client identity from `headers` and check it.
    pub async fn check_headers(&self, headers: &HeaderMap) -> RateLimitDecision {
        let identity = client_identity(headers);
        self.check(&identity).await
    }

    /// Remove every entry whose window has already expired.
    ///
    /// Returns the number of entries evicted.
    pub async fn sweep(&self) -> usize {
        let now = self.clock.now_ms();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| entry.reset_time >= now);
        before - entries.len()
    }

    /// Number of identities currently tracked.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Start a background task that sweeps every `every`.
    ///
    /// The task stops when the returned handle is shut down or dropped.
    pub fn spawn_sweeper(&self, every: Duration) -> SweeperHandle {
        let limiter = self.clone();
        let every = every.max(Duration::from_millis(1));
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            // The first tick completes immediately
            interval.tick().await;

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        let evicted = limiter.sweep().await;
                        if evicted > 0 {
                            debug!(evicted, "Swept expired rate limit entries");
                        }
                    }
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                }
            }

            debug!("Rate limit sweeper stopped");
        });

        SweeperHandle {
            shutdown: shutdown_tx,
            task,
        }
    }
}

/// Owner of a running sweeper task.
#[derive(Debug)]
pub struct SweeperHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SweeperHandle {
    /// Signal the sweeper to stop and wait for it to exit.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        if let Err(err) = self.task.await {
            warn!(error = %err, "Rate limit sweeper ended abnormally");
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

/// Derive the rate limit key for a request.
///
/// Uses the first `X-Forwarded-For` entry, then `X-Real-IP`, then
/// [`UNKNOWN_IDENTITY`]. Every request without either header shares the
/// `"unknown"` counter.
pub fn client_identity(headers: &HeaderMap) -> String {
    let header_value = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };

    header_value(FORWARDED_FOR_HEADER)
        .and_then(|chain| chain.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .or_else(|| header_value(REAL_IP_HEADER))
        .unwrap_or(UNKNOWN_IDENTITY)
        .to_string()
}
