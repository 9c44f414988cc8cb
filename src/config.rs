// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Configuration for the intake service.
//!
//! Every value can be supplied through the environment; anything missing or
//! unparseable falls back to its default.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

/// Configuration for the intake service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server bind address (default: 0.0.0.0:8080)
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Origins allowed to post forms cross-origin (default: none)
    #[serde(default)]
    pub cors_allowed_origins: Vec<String>,

    /// Rate limiting configuration, applied to each form route independently
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// Form validation thresholds
    #[serde(default)]
    pub validation: ValidationConfig,

    /// Hosted database connection
    #[serde(default)]
    pub store: StoreConfig,

    /// Metrics configuration
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Fixed-window rate limiting configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Maximum requests per window per client identity (default: 5)
    #[serde(default = "default_max_requests")]
    pub max_requests: u32,

    /// Window length in milliseconds (default: 60000)
    #[serde(default = "default_window_ms")]
    pub window_ms: u64,

    /// Interval between sweeps of expired entries in milliseconds (default: 60000)
    #[serde(default = "default_sweep_interval_ms")]
    pub sweep_interval_ms: u64,

    /// Also throttle the contact route; the waitlist route is always throttled (default: false)
    #[serde(default)]
    pub limit_contact: bool,
}

/// Minimum lengths applied to free-text form fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationConfig {
    /// Minimum characters in a name (default: 2)
    #[serde(default = "default_min_name_chars")]
    pub min_name_chars: usize,

    /// Minimum characters in an organization (default: 2)
    #[serde(default = "default_min_organization_chars")]
    pub min_organization_chars: usize,

    /// Minimum characters in a contact message (default: 20)
    #[serde(default = "default_min_message_chars")]
    pub min_message_chars: usize,
}

/// Hosted database (PostgREST) connection settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Project base URL, e.g. `https://abc.supabase.co`
    #[serde(default)]
    pub url: Option<String>,

    /// API key sent as both `apikey` and bearer token
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
}

/// Metrics configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Enable Prometheus metrics endpoint (default: true)
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Metrics endpoint path (default: /metrics)
    #[serde(default = "default_metrics_path")]
    pub path: String,
}

// Default value functions
fn default_bind_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_max_requests() -> u32 {
    5
}

fn default_window_ms() -> u64 {
    60_000
}

fn default_sweep_interval_ms() -> u64 {
    60_000
}

fn default_min_name_chars() -> usize {
    2
}

fn default_min_organization_chars() -> usize {
    2
}

fn default_min_message_chars() -> usize {
    20
}

fn default_true() -> bool {
    true
}

fn default_metrics_path() -> String {
    "/metrics".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            cors_allowed_origins: Vec::new(),
            rate_limit: RateLimitConfig::default(),
            validation: ValidationConfig::default(),
            store: StoreConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: default_max_requests(),
            window_ms: default_window_ms(),
            sweep_interval_ms: default_sweep_interval_ms(),
            limit_contact: false,
        }
    }
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            min_name_chars: default_min_name_chars(),
            min_organization_chars: default_min_organization_chars(),
            min_message_chars: default_min_message_chars(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            path: default_metrics_path(),
        }
    }
}

impl Config {
    /// Load configuration from process environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// Recognised variables: `BIND_ADDR`, `CORS_ALLOWED_ORIGINS` (comma
    /// separated), `RATE_LIMIT_MAX_REQUESTS`, `RATE_LIMIT_WINDOW_MS`,
    /// `RATE_LIMIT_SWEEP_INTERVAL_MS`, `CONTACT_RATE_LIMIT_ENABLED`,
    /// `METRICS_ENABLED`, `METRICS_PATH`.
    ///
    /// Both routes share one database connection. The URL is read from
    /// `SUPABASE_URL`, then `NEXT_PUBLIC_SUPABASE_URL`. The key is read from
    /// `SUPABASE_SERVICE_ROLE_KEY`, then `SUPABASE_ANON_KEY`, then
    /// `NEXT_PUBLIC_SUPABASE_ANON_KEY`.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Self {
            bind_addr: non_empty("BIND_ADDR").unwrap_or_else(default_bind_addr),
            cors_allowed_origins: lookup("CORS_ALLOWED_ORIGINS")
                .map(|v| {
                    v.split(',')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(String::from)
                        .collect()
                })
                .unwrap_or_default(),
            rate_limit: RateLimitConfig {
                max_requests: parse_var(&lookup, "RATE_LIMIT_MAX_REQUESTS")
                    .unwrap_or_else(default_max_requests),
                window_ms: parse_var(&lookup, "RATE_LIMIT_WINDOW_MS").unwrap_or_else(default_window_ms),
                sweep_interval_ms: parse_var(&lookup, "RATE_LIMIT_SWEEP_INTERVAL_MS")
                    .unwrap_or_else(default_sweep_interval_ms),
                limit_contact: parse_var(&lookup, "CONTACT_RATE_LIMIT_ENABLED").unwrap_or(false),
            },
            validation: ValidationConfig::default(),
            store: StoreConfig {
                url: non_empty("SUPABASE_URL").or_else(|| non_empty("NEXT_PUBLIC_SUPABASE_URL")),
                api_key: non_empty("SUPABASE_SERVICE_ROLE_KEY")
                    .or_else(|| non_empty("SUPABASE_ANON_KEY"))
                    .or_else(|| non_empty("NEXT_PUBLIC_SUPABASE_ANON_KEY")),
            },
            metrics: MetricsConfig {
                enabled: parse_var(&lookup, "METRICS_ENABLED").unwrap_or_else(default_true),
                path: non_empty("METRICS_PATH").unwrap_or_else(default_metrics_path),
            },
        }
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Option<T>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    lookup(key).and_then(|v| v.trim().parse().ok())
}

impl RateLimitConfig {
    /// Get the window duration
    pub fn window_duration(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }

    /// Get the sweep interval
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }
}

impl StoreConfig {
    /// Base URL and key, when both are configured.
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (&self.url, &self.api_key) {
            (Some(url), Some(key)) => Some((url.as_str(), key.as_str())),
            _ => None,
        }
    }
}
