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

//! Static attack signatures and IP reputation lists.

use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeSet;
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

/// Substring signatures per attack category. Matching is case-insensitive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttackSignatures {
    pub sql_injection_keywords: Vec<String>,
    pub xss_patterns: Vec<String>,
    pub path_traversal: Vec<String>,
    pub suspicious_user_agents: Vec<String>,
    pub admin_paths: Vec<String>,
}

fn owned(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_string()).collect()
}

impl Default for AttackSignatures {
    fn default() -> Self {
        Self {
            sql_injection_keywords: owned(&[
                "union", "select", "drop", "insert", "update", "delete", "or 1=1", "or 1=2", "--",
                ";--", "/*", "*/", "xp_", "sp_", "exec", "execute", "cast", "convert",
            ]),
            xss_patterns: owned(&[
                "<script",
                "</script>",
                "javascript:",
                "onload=",
                "onerror=",
                "onclick=",
                "alert(",
                "document.cookie",
            ]),
            path_traversal: owned(&[
                "../",
                "..\\",
                "/etc/passwd",
                "/etc/shadow",
                "boot.ini",
                "win.ini",
                "system32",
            ]),
            suspicious_user_agents: owned(&[
                "sqlmap", "nikto", "nmap", "masscan", "zap", "burp", "w3af", "acunetix", "nessus",
            ]),
            admin_paths: owned(&[
                "/admin",
                "/administrator",
                "/wp-admin",
                "/phpmyadmin",
                "/config",
                "/backup",
                "/test",
                "/debug",
            ]),
        }
    }
}

impl AttackSignatures {
    /// Lower-case and de-duplicate every list, keeping first-seen order
    fn normalized(&self) -> Self {
        fn fold(list: &[String]) -> Vec<String> {
            let mut seen = BTreeSet::new();
            list.iter()
                .map(|s| s.to_lowercase())
                .filter(|s| !s.is_empty() && seen.insert(s.clone()))
                .collect()
        }
        Self {
            sql_injection_keywords: fold(&self.sql_injection_keywords),
            xss_patterns: fold(&self.xss_patterns),
            path_traversal: fold(&self.path_traversal),
            suspicious_user_agents: fold(&self.suspicious_user_agents),
            admin_paths: fold(&self.admin_paths),
        }
    }
}

/// An IPv4 or IPv6 network in CIDR notation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CidrBlock {
    network: IpAddr,
    prefix: u8,
}

impl CidrBlock {
    pub fn contains(&self, ip: IpAddr) -> bool {
        match (self.network, ip) {
            (IpAddr::V4(net), IpAddr::V4(addr)) => {
                let mask = u32::MAX.checked_shl(32 - u32::from(self.prefix)).unwrap_or(0);
                u32::from(net) & mask == u32::from(addr) & mask
            }
            (IpAddr::V6(net), IpAddr::V6(addr)) => {
                let mask = u128::MAX.checked_shl(128 - u32::from(self.prefix)).unwrap_or(0);
                u128::from(net) & mask == u128::from(addr) & mask
            }
            _ => false,
        }
    }
}

impl FromStr for CidrBlock {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (addr, prefix) = s.trim().split_once('/').unwrap_or((s.trim(), ""));
        let network: IpAddr = addr
            .parse()
            .map_err(|e| format!("invalid network address in {s:?}: {e}"))?;
        let max = if network.is_ipv4() { 32 } else { 128 };
        let prefix = if prefix.is_empty() {
            max
        } else {
            prefix
                .parse::<u8>()
                .ok()
                .filter(|p| *p <= max)
                .ok_or_else(|| format!("invalid prefix length in {s:?}"))?
        };
        Ok(Self { network, prefix })
    }
}

impl fmt::Display for CidrBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.network, self.prefix)
    }
}

impl Serialize for CidrBlock {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// The complete signature catalog, immutable once built
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SignatureSets {
    pub attacks: AttackSignatures,
    pub whitelist: BTreeSet<String>,
    pub blacklist: BTreeSet<String>,
    pub suspicious_ranges: Vec<CidrBlock>,
}

impl Default for SignatureSets {
    fn default() -> Self {
        let config = EngineConfig::default();
        Self {
            attacks: AttackSignatures::default().normalized(),
            whitelist: config.ip_whitelist.into_iter().collect(),
            blacklist: config.ip_blacklist.into_iter().collect(),
            suspicious_ranges: config
                .suspicious_ranges
                .iter()
                .filter_map(|s| s.parse().ok())
                .collect(),
        }
    }
}

impl SignatureSets {
    pub fn from_config(config: &EngineConfig) -> EngineResult<Self> {
        let suspicious_ranges = config
            .suspicious_ranges
            .iter()
            .map(|s| s.parse::<CidrBlock>().map_err(EngineError::InvalidConfig))
            .collect::<EngineResult<Vec<_>>>()?;

        let trimmed = |list: &[String]| -> BTreeSet<String> {
            list.iter()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        };

        Ok(Self {
            attacks: config
                .signatures
                .clone()
                .unwrap_or_default()
                .normalized(),
            whitelist: trimmed(&config.ip_whitelist),
            blacklist: trimmed(&config.ip_blacklist),
            suspicious_ranges,
        })
    }
}
