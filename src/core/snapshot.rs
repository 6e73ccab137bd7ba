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

//! Immutable bundle of everything one analysis reads.
//!
//! A snapshot is built off the request path and never mutated afterwards.
//! The engine replaces it wholesale on retrain.

use crate::anomaly::behavioral::BehavioralDetector;
use crate::anomaly::fusion::fuse;
use crate::anomaly::ip::IpDetector;
use crate::anomaly::outlier::OutlierDetector;
use crate::anomaly::pattern::PatternDetector;
use crate::anomaly::reasoning::{recommendations, ReasoningReport};
use crate::anomaly::statistical::StatisticalDetector;
use crate::anomaly::{DetectionInput, DetectorSet};
use crate::config::EngineConfig;
use crate::core::analysis::AnalysisResult;
use crate::core::baseline::{select_window, BaselineMetrics};
use crate::core::features::{extract, FeatureEncoders};
use crate::core::signatures::SignatureSets;
use crate::error::EngineResult;
use crate::model::OutlierModel;
use crate::parser::request::RequestRecord;
use chrono::{DateTime, Utc};
use rayon::prelude::*;

pub const UNKNOWN_REQUEST_ID: &str = "unknown";

#[derive(Debug)]
pub struct Snapshot {
    /// 0 until the first successful initialization
    pub version: u64,
    pub built_at: DateTime<Utc>,
    pub config: EngineConfig,
    pub baseline: BaselineMetrics,
    pub signatures: SignatureSets,
    pub encoders: FeatureEncoders,
    pub model: Option<OutlierModel>,
    /// Baseline window, newest first
    pub window: Vec<RequestRecord>,
}

impl Snapshot {
    /// Serving state before any history has been loaded: fallback baseline, no model
    pub fn empty(config: EngineConfig, signatures: SignatureSets) -> Self {
        Self {
            version: 0,
            built_at: Utc::now(),
            config,
            baseline: BaselineMetrics::default(),
            signatures,
            encoders: FeatureEncoders::default(),
            model: None,
            window: Vec::new(),
        }
    }

    /// Build baseline, encoders and model from a raw history dump
    pub fn build(version: u64, config: EngineConfig, history: Vec<RequestRecord>) -> EngineResult<Self> {
        profiling::scope!("Snapshot::build");

        let signatures = SignatureSets::from_config(&config)?;
        let loaded = history.len();
        let window = select_window(history, &config.baseline);
        tracing::debug!("Baseline window: {} of {loaded} records", window.len());

        let baseline = BaselineMetrics::compute(&window, &config.baseline);
        let encoders = FeatureEncoders::fit(&window);
        let features: Vec<_> = window
            .par_iter()
            .map(|record| extract(record, &baseline, &encoders))
            .collect();

        let model = OutlierModel::train(&features, &config.model);
        if model.is_none() {
            tracing::warn!(
                "Not enough history to train the outlier model ({} records), using fallback scoring",
                window.len()
            );
        }

        Ok(Self {
            version,
            built_at: Utc::now(),
            config,
            baseline,
            signatures,
            encoders,
            model,
            window,
        })
    }

    pub const fn is_initialized(&self) -> bool {
        self.version > 0
    }

    pub const fn is_trained(&self) -> bool {
        self.model.is_some()
    }

    fn detectors(&self) -> DetectorSet<'_> {
        DetectorSet {
            ip: IpDetector::new(&self.signatures),
            pattern: PatternDetector::new(&self.signatures.attacks),
            statistical: StatisticalDetector::new(&self.baseline),
            machine_learning: OutlierDetector::new(self.model.as_ref()),
            behavioral: BehavioralDetector::new(
                self.config.business_hours,
                &self.config.public_endpoints,
            ),
        }
    }

    /// Run the full pipeline for one record. Pure with respect to the snapshot.
    pub fn analyze(&self, record: &RequestRecord, input_issues: Vec<String>) -> AnalysisResult {
        profiling::scope!("Snapshot::analyze");

        let features = extract(record, &self.baseline, &self.encoders);
        let input = DetectionInput {
            record,
            features: &features,
        };
        let results = self.detectors().run(&input);
        let fusion = fuse(&results);
        let reasoning = ReasoningReport::build(&results, &fusion, self.baseline.is_established());

        let reasons = results
            .reasons()
            .map(|r| r.message.clone())
            .chain(input_issues.iter().cloned())
            .collect();

        tracing::trace!(
            "Request {:?} scored {:.3} ({})",
            record.id,
            fusion.total,
            fusion.risk_level
        );

        AnalysisResult {
            request_id: record
                .id
                .clone()
                .unwrap_or_else(|| UNKNOWN_REQUEST_ID.to_string()),
            anomaly_score: fusion.total,
            risk_level: fusion.risk_level,
            is_anomaly: fusion.is_anomaly,
            reasons,
            recommendations: recommendations(fusion.total, &results),
            reasoning,
            detailed_analysis: results,
            input_issues,
            snapshot_version: self.version,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anomaly::fusion::RiskLevel;
    use crate::anomaly::test_support::benign_record;
    use crate::anomaly::DetectorKind;
    use crate::core::analysis::round3;
    use chrono::Timelike;

    fn untrained() -> Snapshot {
        Snapshot::empty(EngineConfig::default(), SignatureSets::default())
    }

    #[test]
    fn test_empty_snapshot_still_analyzes() {
        let snapshot = untrained();
        assert!(!snapshot.is_initialized());
        assert!(!snapshot.is_trained());

        let result = snapshot.analyze(&benign_record(), Vec::new());
        assert_eq!(result.request_id, "req-1");
        assert_eq!(result.snapshot_version, 0);
        assert_eq!(
            result.reasons,
            vec!["ML model unavailable - using fallback detection".to_string()]
        );
        assert_eq!(result.risk_level, RiskLevel::Low);
        assert!(!result.is_anomaly);
    }

    #[test]
    fn test_input_issues_follow_detector_reasons() {
        let record = RequestRecord {
            id: None,
            ..benign_record()
        };
        let result = untrained().analyze(&record, vec!["Degraded input: x".to_string()]);
        assert_eq!(result.request_id, "unknown");
        assert_eq!(result.reasons.last().map(String::as_str), Some("Degraded input: x"));
        assert_eq!(result.input_issues.len(), 1);
        // Confidence only counts detector reasons
        assert_eq!(result.reasoning.analysis_breakdown.values().map(|c| c.reasons_count).sum::<usize>(), 1);
    }

    #[test]
    fn test_blacklisted_ip_alone_is_critical() {
        let record = RequestRecord {
            ip_address: "9.10.11.12".to_string(),
            ..benign_record()
        };
        let result = untrained().analyze(&record, Vec::new());
        assert_eq!(result.risk_level, RiskLevel::Critical);
        assert_eq!(result.reasoning.primary_method, DetectorKind::Ip);
        assert_eq!(result.recommendations[0], "IMMEDIATE ACTION: Block this IP address");
    }

    #[test]
    fn test_primary_trigger_is_highest_sub_score() {
        let record = RequestRecord {
            query_params: "<script>alert(document.cookie)</script>".to_string(),
            status_code: 503,
            ..benign_record()
        };
        let result = untrained().analyze(&record, Vec::new());
        let max = result
            .detailed_analysis
            .iter()
            .map(|(_, r)| r.score)
            .fold(0.0, f64::max);
        let primary = result.detailed_analysis.get(result.reasoning.primary_method);
        assert!((primary.score - max).abs() < f64::EPSILON);
        assert_eq!(result.reasoning.primary_method, DetectorKind::Pattern);
    }

    #[test]
    fn test_scores_stay_bounded_on_random_traffic() {
        use rand::rngs::StdRng;
        use rand::seq::SliceRandom;
        use rand::{Rng, SeedableRng};

        let ips = ["1.2.3.4", "192.168.1.10", "8.8.8.8", "not-an-ip", "", "::1", "5.6.7.99"];
        let agents = ["Mozilla/5.0", "sqlmap/1.5", "NIKTO", "curl/8.0", ""];
        let paths = ["/api/products", "/admin", "/../../etc/passwd", "/api/auth/login", "/"];
        let queries = ["{}", "id=1 union select", "<script>", "q=shoes"];

        let mut rng = StdRng::seed_from_u64(7);
        let snapshot = untrained();
        for _ in 0..500 {
            let record = RequestRecord {
                ip_address: ips.choose(&mut rng).unwrap().to_string(),
                user_agent: agents.choose(&mut rng).unwrap().to_string(),
                path: paths.choose(&mut rng).unwrap().to_string(),
                query_params: queries.choose(&mut rng).unwrap().to_string(),
                status_code: *[200u16, 401, 403, 404, 500, 503].choose(&mut rng).unwrap(),
                response_time_ms: rng.gen_range(0.0..10_000.0),
                request_size_bytes: rng.gen_range(0..100_000),
                timestamp: benign_record()
                    .timestamp
                    .with_hour(rng.gen_range(0..24))
                    .unwrap(),
                user_id: rng.gen_bool(0.5).then(|| "user_1".to_string()),
                ..benign_record()
            };
            let result = snapshot.analyze(&record, Vec::new());
            let sum: f64 = result.detailed_analysis.iter().map(|(_, r)| r.score).sum();
            for (kind, detector) in result.detailed_analysis.iter() {
                assert!((0.0..=1.0).contains(&detector.score), "{kind}: {}", detector.score);
            }
            assert!(result.anomaly_score >= 0.0);
            assert!((result.anomaly_score - round3(sum.max(0.0))).abs() < 1e-9);
            assert_eq!(result.is_anomaly, result.anomaly_score > 0.5);
        }
    }

    #[test]
    fn test_reported_score_and_risk_agree_at_critical_boundary() {
        let record = RequestRecord {
            ip_address: "8.8.8.8".to_string(),
            user_agent: "sqlmap/1.7".to_string(),
            timestamp: benign_record().timestamp.with_hour(2).unwrap(),
            ..benign_record()
        };
        let result = untrained().analyze(&record, Vec::new());
        let scores: Vec<f64> = result.detailed_analysis.iter().map(|(_, r)| r.score).collect();
        assert_eq!(scores, vec![0.1, 0.5, 0.0, 0.1, 0.1]);
        assert!((result.anomaly_score - 0.8).abs() < f64::EPSILON);
        assert_eq!(result.risk_level, RiskLevel::Critical);
        assert_eq!(result.reasoning.factors[0], "Total anomaly score: 0.800");
        assert_eq!(result.reasoning.factors[1], "Risk level: CRITICAL");
    }

    #[test]
    fn test_build_from_empty_history() {
        let snapshot = Snapshot::build(1, EngineConfig::default(), Vec::new()).unwrap();
        assert!(snapshot.is_initialized());
        assert!(!snapshot.is_trained());
        assert_eq!(snapshot.baseline, BaselineMetrics::default());
    }
}
