// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Attack simulation patterns for security testing.

use std::time::Duration;

/// How a simulated client presents its address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentitySource {
    /// `X-Forwarded-For: <client>`
    ForwardedFor,
    /// `X-Real-IP: <client>`
    RealIp,
    /// No address headers at all
    Anonymous,
    /// `X-Forwarded-For: <client>, <rotating hops>`
    ProxyChain,
    /// `X-Forwarded-For` whose first entry changes on every request
    SpoofedFirstHop,
}

/// Attack pattern configuration.
#[derive(Debug, Clone)]
pub struct AttackConfig {
    /// Total number of requests to send
    pub total_requests: usize,
    /// Requests per second rate (simulated time)
    pub requests_per_second: f64,
    /// Number of unique client addresses to rotate through
    pub unique_clients: usize,
    /// How each request identifies its client
    pub identity: IdentitySource,
    /// Whether the form payload passes validation
    pub valid_payload: bool,
}

impl Default for AttackConfig {
    fn default() -> Self {
        Self {
            total_requests: 100,
            requests_per_second: 10.0,
            unique_clients: 1,
            identity: IdentitySource::ForwardedFor,
            valid_payload: true,
        }
    }
}

/// Predefined attack patterns.
impl AttackConfig {
    /// Single client flood - basic form spam from one address.
    pub fn single_client_flood() -> Self {
        Self {
            total_requests: 200,
            requests_per_second: 100.0,
            ..Default::default()
        }
    }

    /// Distributed attack - many addresses, few requests each.
    pub fn distributed_attack() -> Self {
        Self {
            total_requests: 500,
            requests_per_second: 50.0,
            unique_clients: 100,
            ..Default::default()
        }
    }

    /// Clients that strip every address header.
    pub fn anonymous_flood() -> Self {
        Self {
            total_requests: 60,
            unique_clients: 20,
            identity: IdentitySource::Anonymous,
            ..Default::default()
        }
    }

    /// One client appending random hops after its own address.
    pub fn proxy_chain_rotation() -> Self {
        Self {
            total_requests: 50,
            identity: IdentitySource::ProxyChain,
            ..Default::default()
        }
    }

    /// One client forging the first forwarded hop.
    pub fn spoofed_first_hop() -> Self {
        Self {
            total_requests: 50,
            identity: IdentitySource::SpoofedFirstHop,
            ..Default::default()
        }
    }

    /// Invalid submissions from a handful of addresses.
    pub fn invalid_payload_flood() -> Self {
        Self {
            total_requests: 50,
            unique_clients: 5,
            identity: IdentitySource::RealIp,
            valid_payload: false,
            ..Default::default()
        }
    }

    /// Slow drip - five requests spread over just more than a minute.
    pub fn slow_drip() -> Self {
        Self {
            total_requests: 100,
            requests_per_second: 1.0 / 13.0,
            ..Default::default()
        }
    }

    /// Simulated time between consecutive requests.
    pub fn interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.requests_per_second)
    }

    /// Calculate expected duration for the attack.
    pub fn expected_duration(&self) -> Duration {
        Duration::from_secs_f64(self.total_requests as f64 / self.requests_per_second)
    }
}
