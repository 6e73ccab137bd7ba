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

//! Additive fusion of the detector scores and risk classification.
//!
//! The total is the plain sum of the five bounded sub-scores, floored at zero
//! and not capped above 1.0. It is rounded to three decimals once, here, and
//! that value drives the thresholds and every report built from it.

use super::DetectorResults;
use crate::core::analysis::round3;
use serde::Serialize;
use std::fmt;

pub const CRITICAL_THRESHOLD: f64 = 0.8;
pub const HIGH_THRESHOLD: f64 = 0.6;
pub const MEDIUM_THRESHOLD: f64 = 0.4;

/// Totals strictly above this are anomalies
pub const ANOMALY_THRESHOLD: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    pub const ALL: [Self; 4] = [Self::Low, Self::Medium, Self::High, Self::Critical];

    pub fn from_score(total: f64) -> Self {
        if total >= CRITICAL_THRESHOLD {
            Self::Critical
        } else if total >= HIGH_THRESHOLD {
            Self::High
        } else if total >= MEDIUM_THRESHOLD {
            Self::Medium
        } else {
            Self::Low
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }

    /// Score range covered by this level, as shown in reports
    pub const fn range_label(self) -> &'static str {
        match self {
            Self::Low => "0.0-0.4",
            Self::Medium => "0.4-0.6",
            Self::High => "0.6-0.8",
            Self::Critical => "0.8+",
        }
    }

    pub const fn is_high_risk(self) -> bool {
        matches!(self, Self::High | Self::Critical)
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fused verdict for one request
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Fusion {
    pub total: f64,
    pub risk_level: RiskLevel,
    pub is_anomaly: bool,
}

pub fn fuse(results: &DetectorResults) -> Fusion {
    let sum: f64 = results.iter().map(|(_, r)| r.score).sum();
    let total = round3(sum.max(0.0));
    Fusion {
        total,
        risk_level: RiskLevel::from_score(total),
        is_anomaly: total > ANOMALY_THRESHOLD,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anomaly::test_support::result;

    fn results(scores: [f64; 5]) -> DetectorResults {
        DetectorResults {
            ip: result(scores[0], 0),
            pattern: result(scores[1], 0),
            statistical: result(scores[2], 0),
            machine_learning: result(scores[3], 0),
            behavioral: result(scores[4], 0),
        }
    }

    #[test]
    fn test_thresholds() {
        assert_eq!(RiskLevel::from_score(0.0), RiskLevel::Low);
        assert_eq!(RiskLevel::from_score(0.39), RiskLevel::Low);
        assert_eq!(RiskLevel::from_score(0.4), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_score(0.6), RiskLevel::High);
        assert_eq!(RiskLevel::from_score(0.8), RiskLevel::Critical);
        assert_eq!(RiskLevel::from_score(3.5), RiskLevel::Critical);
    }

    #[test]
    fn test_risk_is_monotonic() {
        let mut previous = RiskLevel::Low;
        for step in 0..=300 {
            let level = RiskLevel::from_score(f64::from(step) / 100.0);
            assert!(level >= previous);
            previous = level;
        }
    }

    #[test]
    fn test_total_is_not_capped() {
        let fusion = fuse(&results([1.0, 1.0, 0.5, 0.4, 0.3]));
        assert!((fusion.total - 3.2).abs() < 1e-9);
        assert_eq!(fusion.risk_level, RiskLevel::Critical);
        assert!(fusion.is_anomaly);
    }

    #[test]
    fn test_anomaly_boundary_is_strict() {
        let at = fuse(&results([0.0, 0.3, 0.2, 0.0, 0.0]));
        assert!(!at.is_anomaly);
        assert_eq!(at.risk_level, RiskLevel::Medium);
        let above = fuse(&results([0.1, 0.3, 0.2, 0.0, 0.0]));
        assert!(above.is_anomaly);
    }

    #[test]
    fn test_float_drift_does_not_cross_thresholds() {
        // 0.1 + 0.5 + 0.0 + 0.1 + 0.1 sums to 0.7999999999999999 in f64
        let fusion = fuse(&results([0.1, 0.5, 0.0, 0.1, 0.1]));
        assert!((fusion.total - 0.8).abs() < f64::EPSILON);
        assert_eq!(fusion.risk_level, RiskLevel::Critical);

        let medium = fuse(&results([0.1, 0.1, 0.1, 0.1, 0.0]));
        assert_eq!(medium.risk_level, RiskLevel::Medium);
    }

    #[test]
    fn test_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&RiskLevel::Critical).unwrap(), "\"critical\"");
    }
}
