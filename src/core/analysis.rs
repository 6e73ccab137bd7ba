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

use crate::anomaly::fusion::RiskLevel;
use crate::anomaly::reasoning::ReasoningReport;
use crate::anomaly::DetectorResults;
use serde::Serialize;

/// Round to three decimals for reporting
pub fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

/// Verdict for one request
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisResult {
    /// The record's `id`, or `"unknown"`
    pub request_id: String,
    /// Fused total, rounded to three decimals
    pub anomaly_score: f64,
    pub risk_level: RiskLevel,
    pub is_anomaly: bool,
    /// Detector reasons in analysis order, then degraded-input notes
    pub reasons: Vec<String>,
    pub recommendations: Vec<String>,
    pub reasoning: ReasoningReport,
    pub detailed_analysis: DetectorResults,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub input_issues: Vec<String>,
    /// Version of the snapshot that produced this result
    pub snapshot_version: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BatchSummary {
    pub total_requests: usize,
    pub anomalous_requests: usize,
    pub high_risk_requests: usize,
    /// `anomalous / total` rounded to three decimals, 0 for an empty batch
    pub anomaly_rate: f64,
}

impl BatchSummary {
    pub fn from_results(results: &[AnalysisResult]) -> Self {
        let total_requests = results.len();
        let anomalous_requests = results.iter().filter(|r| r.is_anomaly).count();
        let high_risk_requests = results
            .iter()
            .filter(|r| r.risk_level.is_high_risk())
            .count();
        let anomaly_rate = if total_requests == 0 {
            0.0
        } else {
            round3(anomalous_requests as f64 / total_requests as f64)
        };
        Self {
            total_requests,
            anomalous_requests,
            high_risk_requests,
            anomaly_rate,
        }
    }
}

/// Results in input order plus their summary
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchReport {
    pub results: Vec<AnalysisResult>,
    pub summary: BatchSummary,
}

impl BatchReport {
    pub fn new(results: Vec<AnalysisResult>) -> Self {
        let summary = BatchSummary::from_results(&results);
        Self { results, summary }
    }
}
