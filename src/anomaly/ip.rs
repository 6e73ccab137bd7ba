// ReqCrab - GPL-3.0-or-later
// This file is part of ReqCrab.
//
// Copyright (C) 2025 Daniel Freiermuth
//
// ReqCrab is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// ReqCrab is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with ReqCrab.  If not, see <https://www.gnu.org/licenses/>.

use super::{DetectionInput, DetectorKind, DetectorResult, Reason, RequestDetector};
use crate::core::signatures::SignatureSets;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

const MISSING_SCORE: f64 = 0.1;
const BLACKLIST_WEIGHT: f64 = 0.9;
const WHITELIST_WEIGHT: f64 = -0.2;
const PRIVATE_WEIGHT: f64 = -0.1;
const PUBLIC_WEIGHT: f64 = 0.1;
const SUSPICIOUS_RANGE_WEIGHT: f64 = 0.5;
const INVALID_WEIGHT: f64 = 0.3;

/// IP reputation: allow/deny lists, address class and suspicious ranges
pub struct IpDetector<'a> {
    signatures: &'a SignatureSets,
}

impl<'a> IpDetector<'a> {
    pub const fn new(signatures: &'a SignatureSets) -> Self {
        Self { signatures }
    }
}

impl RequestDetector for IpDetector<'_> {
    fn kind(&self) -> DetectorKind {
        DetectorKind::Ip
    }

    fn analyze(&self, input: &DetectionInput<'_>) -> DetectorResult {
        let ip = input.record.ip_address.trim();
        if ip.is_empty() {
            return DetectorResult::bounded(MISSING_SCORE, vec![Reason::new("Missing IP address")]);
        }

        let mut score = 0.0;
        let mut reasons = Vec::new();

        if self.signatures.blacklist.contains(ip) {
            score += BLACKLIST_WEIGHT;
            reasons.push(Reason::new(format!("IP {ip} is blacklisted")));
        }
        if self.signatures.whitelist.contains(ip) {
            score += WHITELIST_WEIGHT;
            reasons.push(Reason::new(format!("IP {ip} is whitelisted")));
        }

        match ip.parse::<IpAddr>() {
            Ok(addr) => {
                score += if is_private(addr) {
                    PRIVATE_WEIGHT
                } else {
                    PUBLIC_WEIGHT
                };
                for range in &self.signatures.suspicious_ranges {
                    if range.contains(addr) {
                        score += SUSPICIOUS_RANGE_WEIGHT;
                        reasons.push(Reason::new(format!("IP {ip} is in suspicious range {range}")));
                    }
                }
            }
            Err(_) => {
                score += INVALID_WEIGHT;
                reasons.push(Reason::new(format!("Invalid IP address format: {ip}")));
            }
        }

        tracing::trace!("IP score for {ip}: {score:.2}");
        DetectorResult::bounded(score, reasons)
    }
}

/// Non-globally-routable addresses, including loopback, link-local and
/// documentation ranges
pub fn is_private(addr: IpAddr) -> bool {
    match addr {
        IpAddr::V4(v4) => is_private_v4(v4),
        IpAddr::V6(v6) => match v6.to_ipv4_mapped() {
            Some(v4) => is_private_v4(v4),
            None => is_private_v6(v6),
        },
    }
}

fn is_private_v4(addr: Ipv4Addr) -> bool {
    let [a, b, ..] = addr.octets();
    addr.is_private()
        || addr.is_loopback()
        || addr.is_link_local()
        || addr.is_unspecified()
        || addr.is_documentation()
        || addr.is_broadcast()
        // 0.0.0.0/8
        || a == 0
        // 198.18.0.0/15 benchmarking
        || (a == 198 && (b & 0xfe) == 18)
        // 240.0.0.0/4 reserved
        || a >= 240
}

fn is_private_v6(addr: Ipv6Addr) -> bool {
    let first = addr.segments()[0];
    addr.is_loopback()
        || addr.is_unspecified()
        // fc00::/7 unique local
        || (first & 0xfe00) == 0xfc00
        // fe80::/10 link local
        || (first & 0xffc0) == 0xfe80
        // 2001:db8::/32 documentation
        || (first == 0x2001 && addr.segments()[1] == 0x0db8)
}
