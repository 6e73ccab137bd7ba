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

//! The five request detectors and the fusion/reasoning layers on top of them.

pub mod behavioral;
pub mod fusion;
pub mod ip;
pub mod outlier;
pub mod pattern;
pub mod reasoning;
pub mod statistical;

use crate::core::features::FeatureVector;
use crate::parser::request::RequestRecord;
use serde::{Serialize, Serializer};
use std::fmt;

/// What a detector looks at for one request
#[derive(Debug, Clone, Copy)]
pub struct DetectionInput<'a> {
    pub record: &'a RequestRecord,
    pub features: &'a FeatureVector,
}

/// Trait for the request scoring components
pub trait RequestDetector: Sync {
    fn kind(&self) -> DetectorKind;

    /// Score a request. Returns a score in [0.0, 1.0] where higher = more anomalous.
    fn analyze(&self, input: &DetectionInput<'_>) -> DetectorResult;
}

/// The fixed set of detectors, in analysis order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectorKind {
    Ip,
    Pattern,
    Statistical,
    MachineLearning,
    Behavioral,
}

impl DetectorKind {
    pub const ALL: [Self; 5] = [
        Self::Ip,
        Self::Pattern,
        Self::Statistical,
        Self::MachineLearning,
        Self::Behavioral,
    ];

    /// Key used in structured output
    pub const fn key(self) -> &'static str {
        match self {
            Self::Ip => "ip_analysis",
            Self::Pattern => "pattern_analysis",
            Self::Statistical => "stats_analysis",
            Self::MachineLearning => "ml_analysis",
            Self::Behavioral => "behavior_analysis",
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Ip => "IP Analysis",
            Self::Pattern => "Pattern Recognition",
            Self::Statistical => "Statistical Analysis",
            Self::MachineLearning => "ML Detection",
            Self::Behavioral => "Behavioral Analysis",
        }
    }

    pub const fn description(self) -> &'static str {
        match self {
            Self::Ip => "IP address reputation and range analysis",
            Self::Pattern => "Known attack pattern recognition",
            Self::Statistical => "Statistical deviation from normal behavior",
            Self::MachineLearning => "Machine learning anomaly detection",
            Self::Behavioral => "Behavioral pattern analysis",
        }
    }
}

impl fmt::Display for DetectorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Attack family a reason points at, used to pick mitigations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AttackCategory {
    SqlInjection,
    Xss,
    PathTraversal,
    AttackTool,
    AdminProbe,
}

/// A human-readable reason, optionally tagged with an attack family.
///
/// Serializes as its message only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reason {
    pub category: Option<AttackCategory>,
    pub message: String,
}

impl Reason {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            category: None,
            message: message.into(),
        }
    }

    pub fn tagged(category: AttackCategory, message: impl Into<String>) -> Self {
        Self {
            category: Some(category),
            message: message.into(),
        }
    }
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl Serialize for Reason {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.message)
    }
}

/// Bounded sub-score and its reasons, in the order they were found
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectorResult {
    pub score: f64,
    pub reasons: Vec<Reason>,
}

impl DetectorResult {
    /// Clamp an accumulated score into [0, 1]
    pub fn bounded(score: f64, reasons: Vec<Reason>) -> Self {
        let score = if score.is_nan() { 0.0 } else { score.clamp(0.0, 1.0) };
        Self { score, reasons }
    }

    pub const fn empty() -> Self {
        Self {
            score: 0.0,
            reasons: Vec::new(),
        }
    }
}

/// One result per detector; fusion is exhaustive over these fields
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectorResults {
    #[serde(rename = "ip_analysis")]
    pub ip: DetectorResult,
    #[serde(rename = "pattern_analysis")]
    pub pattern: DetectorResult,
    #[serde(rename = "stats_analysis")]
    pub statistical: DetectorResult,
    #[serde(rename = "ml_analysis")]
    pub machine_learning: DetectorResult,
    #[serde(rename = "behavior_analysis")]
    pub behavioral: DetectorResult,
}

impl DetectorResults {
    pub const fn get(&self, kind: DetectorKind) -> &DetectorResult {
        match kind {
            DetectorKind::Ip => &self.ip,
            DetectorKind::Pattern => &self.pattern,
            DetectorKind::Statistical => &self.statistical,
            DetectorKind::MachineLearning => &self.machine_learning,
            DetectorKind::Behavioral => &self.behavioral,
        }
    }

    /// Results in analysis order
    pub fn iter(&self) -> impl Iterator<Item = (DetectorKind, &DetectorResult)> {
        DetectorKind::ALL.into_iter().map(move |kind| (kind, self.get(kind)))
    }

    /// All reasons, detector by detector, each in insertion order
    pub fn reasons(&self) -> impl Iterator<Item = &Reason> {
        self.iter().flat_map(|(_, result)| result.reasons.iter())
    }

    pub fn reason_count(&self) -> usize {
        self.iter().map(|(_, result)| result.reasons.len()).sum()
    }
}

/// The five detectors wired to one snapshot
pub struct DetectorSet<'a> {
    pub ip: ip::IpDetector<'a>,
    pub pattern: pattern::PatternDetector<'a>,
    pub statistical: statistical::StatisticalDetector<'a>,
    pub machine_learning: outlier::OutlierDetector<'a>,
    pub behavioral: behavioral::BehavioralDetector<'a>,
}

impl DetectorSet<'_> {
    /// Run all detectors concurrently and join their results.
    ///
    /// No detector reads another's output.
    pub fn run(&self, input: &DetectionInput<'_>) -> DetectorResults {
        profiling::scope!("DetectorSet::run");
        let ((ip, pattern), (statistical, (machine_learning, behavioral))) = rayon::join(
            || {
                rayon::join(
                    || self.ip.analyze(input),
                    || self.pattern.analyze(input),
                )
            },
            || {
                rayon::join(
                    || self.statistical.analyze(input),
                    || {
                        rayon::join(
                            || self.machine_learning.analyze(input),
                            || self.behavioral.analyze(input),
                        )
                    },
                )
            },
        );

        DetectorResults {
            ip,
            pattern,
            statistical,
            machine_learning,
            behavioral,
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::parser::request::HttpMethod;
    use chrono::{TimeZone, Utc};

    /// An unremarkable authenticated request during business hours
    pub fn benign_record() -> RequestRecord {
        RequestRecord {
            id: Some("req-1".to_string()),
            ip_address: "192.168.1.50".to_string(),
            user_agent: "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36".to_string(),
            method: HttpMethod::Get,
            path: "/api/products".to_string(),
            query_params: "{}".to_string(),
            status_code: 200,
            response_time_ms: 200.0,
            request_size_bytes: 1024,
            response_size_bytes: 5120,
            timestamp: Utc.with_ymd_and_hms(2025, 3, 12, 14, 0, 0).unwrap(),
            user_id: Some("user_7".to_string()),
        }
    }

    pub fn result(score: f64, reasons: usize) -> DetectorResult {
        DetectorResult {
            score,
            reasons: (0..reasons).map(|i| Reason::new(format!("reason {i}"))).collect(),
        }
    }
}
