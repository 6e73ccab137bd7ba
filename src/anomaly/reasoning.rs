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

//! Explanation of a fused verdict.
//!
//! Everything here is derived from the same [`DetectorResults`] and
//! [`Fusion`] the score came from; nothing is recomputed.

use super::fusion::{Fusion, RiskLevel, CRITICAL_THRESHOLD, HIGH_THRESHOLD, MEDIUM_THRESHOLD};
use super::{AttackCategory, DetectorKind, DetectorResult, DetectorResults};
use indexmap::IndexMap;
use serde::Serialize;

const HIGH_CONFIDENCE_SCORE: f64 = 0.7;
const HIGH_CONFIDENCE_REASONS: usize = 3;
const MEDIUM_CONFIDENCE_SCORE: f64 = 0.4;
const MEDIUM_CONFIDENCE_REASONS: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum Confidence {
    Low,
    Medium,
    High,
}

impl Confidence {
    pub fn assess(total: f64, reason_count: usize) -> Self {
        if total > HIGH_CONFIDENCE_SCORE && reason_count >= HIGH_CONFIDENCE_REASONS {
            Self::High
        } else if total > MEDIUM_CONFIDENCE_SCORE && reason_count >= MEDIUM_CONFIDENCE_REASONS {
            Self::Medium
        } else {
            Self::Low
        }
    }
}

/// Share of the total contributed by one detector
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Contribution {
    pub score: f64,
    /// Percent of the fused total, 0 when the total is 0
    pub percentage: f64,
    pub reasons_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TechnicalDetails {
    pub algorithm: &'static str,
    pub methods_used: Vec<&'static str>,
    pub scoring_method: &'static str,
    pub risk_thresholds: IndexMap<&'static str, &'static str>,
    pub baseline_established: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectionTimeline {
    pub analysis_order: Vec<&'static str>,
    pub primary_trigger: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReasoningReport {
    pub method: &'static str,
    pub primary_method: DetectorKind,
    pub explanation: String,
    pub confidence: Confidence,
    pub factors: Vec<String>,
    pub technical_details: TechnicalDetails,
    pub analysis_breakdown: IndexMap<&'static str, Contribution>,
    pub detection_timeline: DetectionTimeline,
}

/// The detector with the highest sub-score; the earliest in analysis order wins ties
pub fn primary_detector(results: &DetectorResults) -> (DetectorKind, &DetectorResult) {
    results.iter().fold(
        (DetectorKind::Ip, &results.ip),
        |best, candidate| {
            if candidate.1.score > best.1.score {
                candidate
            } else {
                best
            }
        },
    )
}

impl ReasoningReport {
    pub fn build(results: &DetectorResults, fusion: &Fusion, baseline_established: bool) -> Self {
        let (primary, primary_result) = primary_detector(results);
        let reason_count = results.reason_count();
        let triggered = results.iter().filter(|(_, r)| r.score > 0.0).count();

        let analysis_breakdown = results
            .iter()
            .map(|(kind, result)| {
                let percentage = if fusion.total > 0.0 {
                    result.score / fusion.total * 100.0
                } else {
                    0.0
                };
                (
                    kind.key(),
                    Contribution {
                        score: result.score,
                        percentage,
                        reasons_count: result.reasons.len(),
                    },
                )
            })
            .collect();

        Self {
            method: "Multi-Layered Anomaly Detection",
            primary_method: primary,
            explanation: format!(
                "Primary detection via {} (score: {:.3})",
                primary.description(),
                primary_result.score
            ),
            confidence: Confidence::assess(fusion.total, reason_count),
            factors: vec![
                format!("Total anomaly score: {:.3}", fusion.total),
                format!("Risk level: {}", fusion.risk_level.as_str().to_uppercase()),
                format!("Detection methods triggered: {triggered}"),
                format!("Primary method: {}", primary.label()),
            ],
            technical_details: TechnicalDetails {
                algorithm: "Ensemble of 5 detection methods",
                methods_used: DetectorKind::ALL.iter().map(|k| k.key()).collect(),
                scoring_method: "Additive scoring across all methods",
                risk_thresholds: RiskLevel::ALL
                    .iter()
                    .map(|level| (level.as_str(), level.range_label()))
                    .collect(),
                baseline_established,
            },
            analysis_breakdown,
            detection_timeline: DetectionTimeline {
                analysis_order: DetectorKind::ALL.iter().map(|k| k.label()).collect(),
                primary_trigger: primary.label(),
            },
        }
    }
}

/// Mitigations for the score band, then per attack family found
pub fn recommendations(total: f64, results: &DetectorResults) -> Vec<String> {
    let band: &[&str] = if total >= CRITICAL_THRESHOLD {
        &[
            "IMMEDIATE ACTION: Block this IP address",
            "Review and strengthen authentication mechanisms",
            "Implement additional monitoring for this request pattern",
        ]
    } else if total >= HIGH_THRESHOLD {
        &[
            "Increase monitoring for this IP address",
            "Consider implementing CAPTCHA for suspicious requests",
            "Review access logs for similar patterns",
        ]
    } else if total >= MEDIUM_THRESHOLD {
        &[
            "Monitor this request pattern",
            "Consider rate limiting for this IP",
            "Review security policies",
        ]
    } else {
        &[]
    };

    let found = |category: AttackCategory| results.reasons().any(|r| r.category == Some(category));
    let specific = [
        (
            AttackCategory::SqlInjection,
            "Implement parameterized queries and input validation",
        ),
        (
            AttackCategory::Xss,
            "Implement output encoding and CSP headers",
        ),
        (
            AttackCategory::AttackTool,
            "Block known attack tool user agents",
        ),
    ];

    band.iter()
        .copied()
        .chain(
            specific
                .into_iter()
                .filter(|(category, _)| found(*category))
                .map(|(_, text)| text),
        )
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anomaly::fusion::fuse;
    use crate::anomaly::test_support::result;
    use crate::anomaly::Reason;

    fn results(scores: [f64; 5]) -> DetectorResults {
        DetectorResults {
            ip: result(scores[0], usize::from(scores[0] > 0.0)),
            pattern: result(scores[1], usize::from(scores[1] > 0.0)),
            statistical: result(scores[2], usize::from(scores[2] > 0.0)),
            machine_learning: result(scores[3], usize::from(scores[3] > 0.0)),
            behavioral: result(scores[4], usize::from(scores[4] > 0.0)),
        }
    }

    #[test]
    fn test_confidence_levels() {
        assert_eq!(Confidence::assess(0.9, 3), Confidence::High);
        assert_eq!(Confidence::assess(0.9, 2), Confidence::Medium);
        assert_eq!(Confidence::assess(0.7, 5), Confidence::Medium);
        assert_eq!(Confidence::assess(0.4, 5), Confidence::Low);
        assert_eq!(Confidence::assess(0.45, 1), Confidence::Low);
    }

    #[test]
    fn test_primary_is_max_and_first_on_ties() {
        let r = results([0.2, 0.6, 0.6, 0.1, 0.0]);
        assert_eq!(primary_detector(&r).0, DetectorKind::Pattern);

        let zero = results([0.0; 5]);
        assert_eq!(primary_detector(&zero).0, DetectorKind::Ip);
    }

    #[test]
    fn test_report_matches_scores() {
        let r = results([0.0, 0.6, 0.2, 0.0, 0.2]);
        let fusion = fuse(&r);
        let report = ReasoningReport::build(&r, &fusion, true);

        assert_eq!(report.primary_method, DetectorKind::Pattern);
        assert_eq!(report.detection_timeline.primary_trigger, "Pattern Recognition");
        assert_eq!(
            report.explanation,
            "Primary detection via Known attack pattern recognition (score: 0.600)"
        );
        assert_eq!(report.confidence, Confidence::High);
        assert_eq!(report.factors[1], "Risk level: CRITICAL");
        assert_eq!(report.factors[2], "Detection methods triggered: 3");

        let pattern = report.analysis_breakdown["pattern_analysis"];
        assert!((pattern.percentage - 60.0).abs() < 1e-9);
        let total: f64 = report.analysis_breakdown.values().map(|c| c.percentage).sum();
        assert!((total - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_zero_total_has_zero_percentages() {
        let r = results([0.0; 5]);
        let report = ReasoningReport::build(&r, &fuse(&r), false);
        assert!(report
            .analysis_breakdown
            .values()
            .all(|c| c.percentage.abs() < f64::EPSILON));
        assert_eq!(report.confidence, Confidence::Low);
        assert_eq!(report.technical_details.risk_thresholds["critical"], "0.8+");
    }

    #[test]
    fn test_recommendations_by_band_and_family() {
        let mut r = results([0.0; 5]);
        assert!(recommendations(0.1, &r).is_empty());

        r.pattern = DetectorResult {
            score: 0.8,
            reasons: vec![
                Reason::tagged(AttackCategory::SqlInjection, "SQL injection pattern detected: union"),
                Reason::tagged(AttackCategory::AttackTool, "Suspicious user agent detected: sqlmap"),
            ],
        };
        let recs = recommendations(0.85, &r);
        assert_eq!(recs[0], "IMMEDIATE ACTION: Block this IP address");
        assert_eq!(recs.len(), 5);
        assert!(recs.contains(&"Implement parameterized queries and input validation".to_string()));
        assert!(recs.contains(&"Block known attack tool user agents".to_string()));
        assert!(!recs.contains(&"Implement output encoding and CSP headers".to_string()));

        assert_eq!(recommendations(0.45, &results([0.0; 5]))[1], "Consider rate limiting for this IP");
    }
}
