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

//! Canned attack requests for demonstrating detection.

use crate::core::analysis::AnalysisResult;
use crate::parser::request::{HttpMethod, RequestRecord};
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum AttackScenario {
    #[value(name = "sql_injection")]
    SqlInjection,
    Xss,
    #[value(name = "brute_force")]
    BruteForce,
    Ddos,
}

impl AttackScenario {
    pub const ALL: [Self; 4] = [Self::SqlInjection, Self::Xss, Self::BruteForce, Self::Ddos];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SqlInjection => "sql_injection",
            Self::Xss => "xss",
            Self::BruteForce => "brute_force",
            Self::Ddos => "ddos",
        }
    }

    /// The scenario's request, stamped at `at`
    pub fn request(self, at: DateTime<Utc>) -> RequestRecord {
        let base = RequestRecord::empty(at);
        match self {
            Self::SqlInjection => RequestRecord {
                ip_address: "192.168.1.100".to_string(),
                user_agent: "sqlmap/1.0".to_string(),
                method: HttpMethod::Get,
                path: "/api/products".to_string(),
                query_params: r#"{"id": "1' OR 1=1--"}"#.to_string(),
                status_code: 500,
                response_time_ms: 1500.0,
                request_size_bytes: 2048,
                response_size_bytes: 512,
                ..base
            },
            Self::Xss => RequestRecord {
                ip_address: "10.0.0.50".to_string(),
                user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64)".to_string(),
                method: HttpMethod::Post,
                path: "/api/comments".to_string(),
                query_params: r#"{"content": "<script>alert(document.cookie)</script>"}"#
                    .to_string(),
                status_code: 400,
                response_time_ms: 300.0,
                request_size_bytes: 1024,
                response_size_bytes: 256,
                user_id: Some("user_123".to_string()),
                ..base
            },
            Self::BruteForce => RequestRecord {
                ip_address: "203.0.113.10".to_string(),
                user_agent: "Mozilla/5.0 (X11; Linux x86_64)".to_string(),
                method: HttpMethod::Post,
                path: "/api/auth/login".to_string(),
                query_params: r#"{"username": "admin", "password": "password123"}"#.to_string(),
                status_code: 401,
                response_time_ms: 200.0,
                request_size_bytes: 512,
                response_size_bytes: 128,
                ..base
            },
            Self::Ddos => RequestRecord {
                ip_address: "198.51.100.25".to_string(),
                user_agent: "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7)".to_string(),
                method: HttpMethod::Get,
                path: "/api/products".to_string(),
                status_code: 200,
                response_time_ms: 5000.0,
                request_size_bytes: 4096,
                response_size_bytes: 8192,
                ..base
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulationReport {
    pub attack_type: AttackScenario,
    pub simulated_request: RequestRecord,
    pub analysis_result: AnalysisResult,
    pub demonstration: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anomaly::fusion::RiskLevel;
    use crate::config::EngineConfig;
    use crate::core::signatures::SignatureSets;
    use crate::core::snapshot::Snapshot;
    use chrono::TimeZone;

    fn analyze(scenario: AttackScenario) -> AnalysisResult {
        let snapshot = Snapshot::empty(EngineConfig::default(), SignatureSets::default());
        let at = Utc.with_ymd_and_hms(2025, 3, 12, 14, 0, 0).unwrap();
        snapshot.analyze(&scenario.request(at), Vec::new())
    }

    #[test]
    fn test_single_request_scenarios_are_flagged() {
        for scenario in [AttackScenario::SqlInjection, AttackScenario::Xss, AttackScenario::Ddos] {
            let result = analyze(scenario);
            assert!(result.risk_level >= RiskLevel::Medium, "{scenario:?}: {result:?}");
        }
        // One failed login on its own is not conclusive
        assert_eq!(analyze(AttackScenario::BruteForce).risk_level, RiskLevel::Low);
    }

    #[test]
    fn test_xss_scenario() {
        let result = analyze(AttackScenario::Xss);
        assert!(result.is_anomaly);
        assert!(result
            .recommendations
            .contains(&"Implement output encoding and CSP headers".to_string()));
    }

    #[test]
    fn test_brute_force_hits_public_login_without_penalty() {
        let result = analyze(AttackScenario::BruteForce);
        assert!(result
            .reasons
            .contains(&"Authentication/authorization error: 401".to_string()));
        assert!(!result
            .reasons
            .contains(&"Unauthenticated access to protected endpoint".to_string()));
    }

    #[test]
    fn test_names() {
        assert_eq!(AttackScenario::BruteForce.as_str(), "brute_force");
        assert_eq!(
            serde_json::to_string(&AttackScenario::SqlInjection).unwrap(),
            "\"sql_injection\""
        );
    }
}
