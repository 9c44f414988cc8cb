// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Test data generators for attack simulation.

use super::attacks::IdentitySource;
use axum::http::{HeaderMap, HeaderValue};
use serde_json::{json, Value};
use std::net::{IpAddr, Ipv4Addr};

/// Generate a pool of IP addresses for testing.
pub fn generate_ips(count: usize) -> Vec<IpAddr> {
    (0..count)
        .map(|i| {
            // Use 10.x.x.x private range
            let a = ((i >> 16) & 0xFF) as u8;
            let b = ((i >> 8) & 0xFF) as u8;
            let c = (i & 0xFF) as u8;
            IpAddr::V4(Ipv4Addr::new(10, a, b, c))
        })
        .collect()
}

/// Address headers for request number `index` from `client`.
pub fn identity_headers(source: IdentitySource, client: IpAddr, index: usize) -> HeaderMap {
    let value = match source {
        IdentitySource::Anonymous => return HeaderMap::new(),
        IdentitySource::ForwardedFor | IdentitySource::RealIp => client.to_string(),
        IdentitySource::ProxyChain => format!("{client}, 172.16.{}.{}", index % 256, index % 7),
        IdentitySource::SpoofedFirstHop => {
            format!("203.0.{}.{}, {client}", (index >> 8) & 0xFF, index & 0xFF)
        }
    };
    let name = match source {
        IdentitySource::RealIp => "x-real-ip",
        _ => "x-forwarded-for",
    };

    let mut headers = HeaderMap::new();
    if let Ok(value) = HeaderValue::from_str(&value) {
        headers.insert(name, value);
    }
    headers
}

/// Waitlist form body, valid or not. Valid bodies use a fresh email per index.
pub fn waitlist_payload(valid: bool, index: usize) -> Value {
    if valid {
        json!({
            "email": format!("visitor{index}@example.com"),
            "name": format!("Visitor {index}"),
            "role": "student",
        })
    } else {
        json!({
            "email": "not-an-email",
            "name": "x",
        })
    }
}

/// Email variations the form must reject.
pub fn generate_malformed_emails() -> Vec<&'static str> {
    vec![
        "",
        "   ",
        "plainaddress",
        "@missing-local.org",
        "missing-at.example.com",
        "missing-tld@example",
        "two@@example.com",
        "spaced out@example.com",
        " leading@example.com",
        "trailing@example.com ",
        "a@b.",
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_ips() {
        let ips = generate_ips(256);
        assert_eq!(ips.len(), 256);
        // All should be unique
        let unique: std::collections::HashSet<_> = ips.iter().collect();
        assert_eq!(unique.len(), 256);
    }

    #[test]
    fn test_identity_headers() {
        let client: IpAddr = "10.0.0.1".parse().unwrap();

        assert!(identity_headers(IdentitySource::Anonymous, client, 0).is_empty());
        let headers = identity_headers(IdentitySource::RealIp, client, 0);
        assert_eq!(headers["x-real-ip"], "10.0.0.1");
        let headers = identity_headers(IdentitySource::ProxyChain, client, 3);
        assert!(headers["x-forwarded-for"]
            .to_str()
            .unwrap()
            .starts_with("10.0.0.1,"));
    }
}
