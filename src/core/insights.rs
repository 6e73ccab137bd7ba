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

use crate::core::analysis::round3;
use crate::core::snapshot::Snapshot;
use crate::parser::request::RequestRecord;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Error share above which a warning is raised
pub const HIGH_ERROR_RATE: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InsightKind {
    Warning,
    Info,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Insight {
    #[serde(rename = "type")]
    pub kind: InsightKind,
    pub title: &'static str,
    pub description: String,
    pub recommendation: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct InsightSummary {
    pub total_requests_analyzed: usize,
    pub error_rate: f64,
    pub baseline_established: bool,
    pub models_trained: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InsightReport {
    pub insights: Vec<Insight>,
    pub summary: InsightSummary,
    pub generated_at: DateTime<Utc>,
}

/// Share of requests with status >= 400, 0 for an empty window
pub fn error_rate(window: &[RequestRecord]) -> f64 {
    if window.is_empty() {
        return 0.0;
    }
    window.iter().filter(|r| r.is_error()).count() as f64 / window.len() as f64
}

/// Traffic is irregular when the spread of per-hour counts exceeds their mean.
/// Only hours that saw traffic are considered; fewer than two is never irregular.
pub fn is_irregular(hourly_pattern: &[usize]) -> bool {
    let active: Vec<f64> = hourly_pattern
        .iter()
        .filter(|&&count| count > 0)
        .map(|&count| count as f64)
        .collect();
    if active.len() < 2 {
        return false;
    }
    let n = active.len() as f64;
    let mean = active.iter().sum::<f64>() / n;
    let variance = active.iter().map(|c| (c - mean).powi(2)).sum::<f64>() / (n - 1.0);
    variance.sqrt() > mean
}

impl InsightReport {
    pub fn build(snapshot: &Snapshot, generated_at: DateTime<Utc>) -> Self {
        profiling::scope!("InsightReport::build");
        let rate = error_rate(&snapshot.window);
        let mut insights = Vec::new();

        if rate > HIGH_ERROR_RATE {
            insights.push(Insight {
                kind: InsightKind::Warning,
                title: "High Error Rate Detected",
                description: format!(
                    "Error rate is {:.1}%, which is above normal threshold",
                    rate * 100.0
                ),
                recommendation: "Investigate server issues or potential attacks",
            });
        }

        if is_irregular(&snapshot.baseline.hourly_pattern) {
            insights.push(Insight {
                kind: InsightKind::Info,
                title: "Irregular Traffic Patterns",
                description: "Traffic distribution shows unusual patterns".to_string(),
                recommendation: "Review traffic sources and implement rate limiting",
            });
        }

        Self {
            insights,
            summary: InsightSummary {
                total_requests_analyzed: snapshot.window.len(),
                error_rate: round3(rate),
                baseline_established: snapshot.baseline.is_established(),
                models_trained: snapshot.is_trained(),
            },
            generated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anomaly::test_support::benign_record;
    use crate::config::EngineConfig;
    use chrono::{TimeZone, Timelike};

    fn window(statuses: &[u16], hours: &[u32]) -> Vec<RequestRecord> {
        statuses
            .iter()
            .zip(hours.iter().cycle())
            .map(|(&status_code, &hour)| RequestRecord {
                status_code,
                timestamp: benign_record().timestamp.with_hour(hour).unwrap(),
                ..benign_record()
            })
            .collect()
    }

    #[test]
    fn test_error_rate() {
        assert!(error_rate(&[]).abs() < f64::EPSILON);
        let w = window(&[200, 404, 500, 200], &[10]);
        assert!((error_rate(&w) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_irregular_traffic() {
        let mut hours = [0usize; 24];
        assert!(!is_irregular(&hours));
        hours[3] = 40;
        assert!(!is_irregular(&hours));
        hours[4] = 40;
        hours[5] = 40;
        assert!(!is_irregular(&hours));
        hours[6] = 1;
        hours[7] = 1;
        hours[8] = 300;
        assert!(is_irregular(&hours));
    }

    #[test]
    fn test_report_flags_high_error_rate() {
        let history = window(&[200, 500, 503, 401, 200, 200], &[9, 10]);
        let snapshot = Snapshot::build(1, EngineConfig::default(), history).unwrap();
        let at = Utc.with_ymd_and_hms(2025, 3, 20, 0, 0, 0).unwrap();
        let report = InsightReport::build(&snapshot, at);

        assert_eq!(report.insights.len(), 1);
        assert_eq!(report.insights[0].kind, InsightKind::Warning);
        assert_eq!(
            report.insights[0].description,
            "Error rate is 50.0%, which is above normal threshold"
        );
        assert!((report.summary.error_rate - 0.5).abs() < 1e-12);
        assert_eq!(report.summary.total_requests_analyzed, 6);
        assert!(report.summary.baseline_established);
        assert_eq!(report.generated_at, at);

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["insights"][0]["type"], "warning");
    }
}
