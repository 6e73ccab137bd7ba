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
use crate::config::EngineConfig;
use crate::core::analysis::{AnalysisResult, BatchReport};
use crate::core::baseline::BaselineMetrics;
use crate::core::dashboard::Dashboard;
use crate::core::insights::InsightReport;
use crate::core::scenarios::{AttackScenario, SimulationReport};
use crate::core::signatures::{AttackSignatures, SignatureSets};
use crate::core::snapshot::Snapshot;
use crate::error::{EngineError, EngineResult};
use crate::parser::history::HistorySource;
use crate::parser::request::RequestRecord;
use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, PoisonError};

pub const SERVICE_NAME: &str = "anomaly_detection";
const SERVICE_DESCRIPTION: &str =
    "Request Analysis for Anomalies - Security monitoring and threat detection";

/// Anomaly engine with a swappable snapshot.
///
/// `analyze*` calls load the current snapshot once and never block.
/// `initialize`/`retrain` build a replacement off to the side and publish it
/// with a single pointer swap; retrains are serialized.
pub struct Engine {
    config: EngineConfig,
    snapshot: ArcSwap<Snapshot>,
    retrain_lock: Mutex<()>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EngineStatus {
    pub service: &'static str,
    pub status: &'static str,
    pub is_trained: bool,
    pub baseline_established: bool,
    pub snapshot_version: u64,
    pub description: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BaselineReport {
    pub baseline_metrics: BaselineMetrics,
    pub suspicious_patterns: AttackSignatures,
    pub whitelist_ips: BTreeSet<String>,
    pub blacklist_ips: BTreeSet<String>,
    pub suspicious_ranges: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttackPatternCatalog {
    pub detection_methods: Vec<&'static str>,
    pub attack_types_detected: Vec<&'static str>,
    pub suspicious_patterns: AttackSignatures,
    pub risk_levels: Vec<RiskLevel>,
}

/// Outcome of a successful (re)initialization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct InitSummary {
    pub snapshot_version: u64,
    pub requests_analyzed: usize,
    pub baseline_established: bool,
    pub is_trained: bool,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    /// Engine with the built-in configuration, serving fallback values until initialized
    pub fn new() -> Self {
        let config = EngineConfig::default();
        let snapshot = Snapshot::empty(config.clone(), SignatureSets::default());
        Self {
            config,
            snapshot: ArcSwap::from_pointee(snapshot),
            retrain_lock: Mutex::new(()),
        }
    }

    pub fn with_config(config: EngineConfig) -> EngineResult<Self> {
        config.validate()?;
        let signatures = SignatureSets::from_config(&config)?;
        let snapshot = Snapshot::empty(config.clone(), signatures);
        Ok(Self {
            config,
            snapshot: ArcSwap::from_pointee(snapshot),
            retrain_lock: Mutex::new(()),
        })
    }

    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The snapshot currently serving requests
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.snapshot.load_full()
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Load the history window and build the first serving snapshot
    pub fn initialize(&self, source: &dyn HistorySource) -> EngineResult<InitSummary> {
        self.retrain(source)
    }

    /// Rebuild baseline, signatures and model and swap them in atomically.
    ///
    /// On error the serving snapshot is left untouched.
    pub fn retrain(&self, source: &dyn HistorySource) -> EngineResult<InitSummary> {
        profiling::scope!("Engine::retrain");
        let _guard = self
            .retrain_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let current_version = self.snapshot.load().version;
        tracing::info!("Building snapshot {} from history", current_version + 1);

        let history = source.load_window().map_err(|e| {
            tracing::warn!("History unavailable, keeping snapshot {current_version}: {e}");
            EngineError::HistoryUnavailable(e)
        })?;
        let next = Snapshot::build(current_version + 1, self.config.clone(), history)?;

        let summary = InitSummary {
            snapshot_version: next.version,
            requests_analyzed: next.window.len(),
            baseline_established: next.baseline.is_established(),
            is_trained: next.is_trained(),
        };
        self.snapshot.store(Arc::new(next));
        tracing::info!(
            "Swapped snapshot {current_version} -> {} ({} records, model trained: {})",
            summary.snapshot_version,
            summary.requests_analyzed,
            summary.is_trained
        );
        Ok(summary)
    }

    // ========================================================================
    // Analysis
    // ========================================================================

    pub fn analyze(&self, record: &RequestRecord) -> AnalysisResult {
        self.snapshot.load().analyze(record, Vec::new())
    }

    /// Analyze an untyped payload, coercing odd values instead of rejecting them
    pub fn analyze_json(&self, payload: &Value) -> AnalysisResult {
        let ingested = RequestRecord::from_json(payload, Utc::now());
        self.snapshot.load().analyze(&ingested.record, ingested.issues)
    }

    /// Analyze records in parallel against one snapshot, keeping input order
    pub fn analyze_batch(&self, records: &[RequestRecord]) -> BatchReport {
        profiling::scope!("Engine::analyze_batch");
        let snapshot = self.snapshot.load_full();
        let results = records
            .par_iter()
            .map(|record| snapshot.analyze(record, Vec::new()))
            .collect();
        BatchReport::new(results)
    }

    pub fn analyze_json_batch(&self, payloads: &[Value]) -> BatchReport {
        profiling::scope!("Engine::analyze_json_batch");
        let snapshot = self.snapshot.load_full();
        let received_at = Utc::now();
        let results = payloads
            .par_iter()
            .map(|payload| {
                let ingested = RequestRecord::from_json(payload, received_at);
                snapshot.analyze(&ingested.record, ingested.issues)
            })
            .collect();
        BatchReport::new(results)
    }

    /// Analyze one of the canned attack requests, stamped at `at`
    pub fn simulate(&self, scenario: AttackScenario, at: DateTime<Utc>) -> SimulationReport {
        let request = scenario.request(at);
        let analysis_result = self.analyze(&request);
        SimulationReport {
            attack_type: scenario,
            simulated_request: request,
            analysis_result,
            demonstration: format!(
                "This simulates a {} attack and shows how the system detects it",
                scenario.as_str()
            ),
        }
    }

    // ========================================================================
    // Reports
    // ========================================================================

    pub fn status(&self) -> EngineStatus {
        let snapshot = self.snapshot.load();
        EngineStatus {
            service: SERVICE_NAME,
            status: "active",
            is_trained: snapshot.is_trained(),
            baseline_established: snapshot.baseline.is_established(),
            snapshot_version: snapshot.version,
            description: SERVICE_DESCRIPTION,
        }
    }

    pub fn baseline_report(&self) -> BaselineReport {
        let snapshot = self.snapshot.load();
        BaselineReport {
            baseline_metrics: snapshot.baseline.clone(),
            suspicious_patterns: snapshot.signatures.attacks.clone(),
            whitelist_ips: snapshot.signatures.whitelist.clone(),
            blacklist_ips: snapshot.signatures.blacklist.clone(),
            suspicious_ranges: snapshot
                .signatures
                .suspicious_ranges
                .iter()
                .map(ToString::to_string)
                .collect(),
        }
    }

    pub fn attack_patterns(&self) -> AttackPatternCatalog {
        AttackPatternCatalog {
            detection_methods: vec![
                "IP-based analysis (blacklists, whitelists, suspicious ranges)",
                "Pattern-based detection (SQL injection, XSS, path traversal)",
                "Statistical analysis (response times, request sizes, error rates)",
                "Machine Learning (Isolation Forest for outlier detection)",
                "Behavioral analysis (time patterns, authentication context)",
            ],
            attack_types_detected: vec![
                "SQL Injection",
                "Cross-Site Scripting (XSS)",
                "Path Traversal",
                "Brute Force Attacks",
                "DDoS/High Volume Attacks",
                "Admin Panel Access Attempts",
                "Suspicious User Agents",
                "Unusual Traffic Patterns",
            ],
            suspicious_patterns: self.snapshot.load().signatures.attacks.clone(),
            risk_levels: RiskLevel::ALL.to_vec(),
        }
    }

    pub fn insights(&self, generated_at: DateTime<Utc>) -> InsightReport {
        InsightReport::build(&self.snapshot.load(), generated_at)
    }

    pub fn dashboard(&self, generated_at: DateTime<Utc>) -> Dashboard {
        Dashboard::build(&self.snapshot.load(), generated_at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anomaly::test_support::benign_record;
    use crate::error::SourceError;
    use chrono::{Duration, TimeZone};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration as StdDuration;

    fn history(response_time_ms: f64, count: u32) -> Vec<RequestRecord> {
        let start = Utc.with_ymd_and_hms(2025, 3, 10, 8, 0, 0).unwrap();
        (0..count)
            .map(|i| RequestRecord {
                id: Some(format!("h{i}")),
                response_time_ms: response_time_ms + f64::from(i % 20),
                request_size_bytes: 1000 + u64::from(i % 25) * 8,
                timestamp: start + Duration::minutes(i64::from(i) * 3),
                ..benign_record()
            })
            .collect()
    }

    /// Sleeps before handing out its window
    struct DelayedSource {
        records: Vec<RequestRecord>,
        delay: StdDuration,
    }

    impl HistorySource for DelayedSource {
        fn load_window(&self) -> Result<Vec<RequestRecord>, SourceError> {
            thread::sleep(self.delay);
            Ok(self.records.clone())
        }
    }

    /// Records how many loads run at the same time
    struct CountingSource {
        records: Vec<RequestRecord>,
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    impl HistorySource for CountingSource {
        fn load_window(&self) -> Result<Vec<RequestRecord>, SourceError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            thread::sleep(StdDuration::from_millis(20));
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(self.records.clone())
        }
    }

    struct BrokenSource;

    impl HistorySource for BrokenSource {
        fn load_window(&self) -> Result<Vec<RequestRecord>, SourceError> {
            Err(SourceError::Unreachable("database offline".to_string()))
        }
    }

    #[test]
    fn test_lifecycle() {
        let engine = Engine::new();
        assert!(!engine.status().is_trained);
        assert_eq!(engine.status().snapshot_version, 0);

        let summary = engine.initialize(&history(200.0, 300)).unwrap();
        assert_eq!(summary.snapshot_version, 1);
        assert_eq!(summary.requests_analyzed, 300);
        assert!(summary.is_trained);

        let status = engine.status();
        assert!(status.is_trained);
        assert!(status.baseline_established);
        assert_eq!(status.service, "anomaly_detection");

        assert_eq!(engine.retrain(&history(200.0, 300)).unwrap().snapshot_version, 2);
    }

    #[test]
    fn test_analyze_is_deterministic() {
        let engine = Engine::new();
        engine.initialize(&history(200.0, 300)).unwrap();
        let record = RequestRecord {
            response_time_ms: 900.0,
            ..benign_record()
        };
        let first = engine.analyze(&record);
        for _ in 0..5 {
            assert_eq!(engine.analyze(&record), first);
        }
    }

    #[test]
    fn test_whitelisted_clean_ip() {
        let engine = Engine::new();
        engine.initialize(&history(200.0, 300)).unwrap();
        let record = RequestRecord {
            ip_address: "10.0.0.1".to_string(),
            ..benign_record()
        };
        let result = engine.analyze(&record);
        assert!(result.detailed_analysis.ip.score <= 0.0);
        assert!(result
            .reasons
            .contains(&"IP 10.0.0.1 is whitelisted".to_string()));
    }

    #[test]
    fn test_sql_injection_is_anomalous() {
        let engine = Engine::new();
        engine.initialize(&history(200.0, 300)).unwrap();
        let record = RequestRecord {
            path: "/api/products".to_string(),
            query_params: r#"{"id":"1' OR 1=1--"}"#.to_string(),
            ..benign_record()
        };
        let result = engine.analyze(&record);
        assert!(result.is_anomaly);
        assert!(result
            .reasons
            .iter()
            .any(|r| r.starts_with("SQL injection pattern detected")));
        assert!(result
            .recommendations
            .contains(&"Implement parameterized queries and input validation".to_string()));
    }

    #[test]
    fn test_failed_retrain_keeps_snapshot() {
        let engine = Engine::new();
        engine.initialize(&history(200.0, 300)).unwrap();
        let before = engine.snapshot();

        let err = engine.retrain(&BrokenSource).unwrap_err();
        assert!(matches!(err, EngineError::HistoryUnavailable(_)));
        assert!(Arc::ptr_eq(&before, &engine.snapshot()));
        assert!(engine.status().is_trained);
    }

    #[test]
    fn test_failed_initialize_never_reports_trained() {
        let engine = Engine::new();
        assert!(engine.initialize(&BrokenSource).is_err());
        assert!(!engine.status().is_trained);
        assert_eq!(engine.status().snapshot_version, 0);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let mut config = EngineConfig::default();
        config.suspicious_ranges = vec!["10.0.0.0/99".to_string()];
        assert!(matches!(
            Engine::with_config(config),
            Err(EngineError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_batch_keeps_order_and_rate() {
        let engine = Engine::new();
        engine.initialize(&history(200.0, 300)).unwrap();

        let mut records: Vec<RequestRecord> = (0..7)
            .map(|i| RequestRecord {
                id: Some(format!("b{i}")),
                ..benign_record()
            })
            .collect();
        records[2].ip_address = "5.6.7.8".to_string();
        records[5].query_params = "1 union select password".to_string();

        let report = engine.analyze_batch(&records);
        let ids: Vec<_> = report.results.iter().map(|r| r.request_id.as_str()).collect();
        assert_eq!(ids, vec!["b0", "b1", "b2", "b3", "b4", "b5", "b6"]);
        assert_eq!(report.summary.total_requests, 7);
        assert_eq!(report.summary.anomalous_requests, 2);
        assert!((report.summary.anomaly_rate - 0.286).abs() < 1e-12);
        assert!(engine.analyze_batch(&[]).summary.anomaly_rate.abs() < f64::EPSILON);
    }

    #[test]
    fn test_malformed_payload_still_gets_a_result() {
        let engine = Engine::new();
        let result = engine.analyze_json(&serde_json::json!(["not", "an", "object"]));
        assert_eq!(result.risk_level, RiskLevel::Low);
        assert!(result.reasons.iter().any(|r| r.starts_with("Degraded input")));

        let coerced = engine.analyze_json(&serde_json::json!({
            "ip_address": "8.8.8.8",
            "path": "/api/products",
            "status_code": "500",
            "response_time": "abc",
            "user_id": "u1",
            "timestamp": "2025-03-12T14:00:00Z"
        }));
        assert_eq!(coerced.input_issues.len(), 1);
        assert!(coerced
            .reasons
            .contains(&"Server error status code: 500".to_string()));
    }

    #[test]
    fn test_retrain_is_atomic_for_concurrent_readers() {
        let engine = Engine::new();
        engine.initialize(&history(200.0, 300)).unwrap();

        // A 900ms request is slow against the first baseline but not the second
        let probe = RequestRecord {
            response_time_ms: 900.0,
            ..benign_record()
        };
        let old = engine.analyze(&probe);
        assert_eq!(old.snapshot_version, 1);

        let slow = DelayedSource {
            records: history(1000.0, 300),
            delay: StdDuration::from_millis(50),
        };
        let done = AtomicBool::new(false);
        let observed = thread::scope(|scope| {
            let readers: Vec<_> = (0..4)
                .map(|_| {
                    scope.spawn(|| {
                        let mut seen = Vec::new();
                        while !done.load(Ordering::SeqCst) {
                            seen.push(engine.analyze(&probe));
                        }
                        seen.push(engine.analyze(&probe));
                        seen
                    })
                })
                .collect();

            engine.retrain(&slow).unwrap();
            done.store(true, Ordering::SeqCst);
            readers
                .into_iter()
                .flat_map(|r| r.join().unwrap())
                .collect::<Vec<_>>()
        });

        let new = engine.analyze(&probe);
        assert_eq!(new.snapshot_version, 2);
        assert_ne!(old.detailed_analysis.statistical, new.detailed_analysis.statistical);

        assert!(!observed.is_empty());
        for result in observed {
            assert!(matches!(result.snapshot_version, 1 | 2));
            let expected = if result.snapshot_version == 1 { &old } else { &new };
            assert_eq!(&result, expected);
        }
    }

    #[test]
    fn test_concurrent_retrains_run_one_at_a_time() {
        const RETRAINS: usize = 4;
        let engine = Engine::new();
        engine.initialize(&history(200.0, 120)).unwrap();

        let source = CountingSource {
            records: history(250.0, 120),
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        };
        let mut versions: Vec<u64> = thread::scope(|scope| {
            let workers: Vec<_> = (0..RETRAINS)
                .map(|_| scope.spawn(|| engine.retrain(&source).unwrap().snapshot_version))
                .collect();
            workers.into_iter().map(|w| w.join().unwrap()).collect()
        });

        assert_eq!(source.peak.load(Ordering::SeqCst), 1);
        versions.sort_unstable();
        assert_eq!(versions, vec![2, 3, 4, 5]);
        assert_eq!(engine.status().snapshot_version, 1 + RETRAINS as u64);
    }

    #[test]
    fn test_simulated_sql_injection_is_detected() {
        let engine = Engine::new();
        engine.initialize(&history(200.0, 300)).unwrap();
        let at = Utc.with_ymd_and_hms(2025, 3, 12, 14, 0, 0).unwrap();
        let report = engine.simulate(AttackScenario::SqlInjection, at);
        assert!(report.analysis_result.is_anomaly);
        assert_eq!(report.analysis_result.risk_level, RiskLevel::Critical);
        assert!(report
            .analysis_result
            .recommendations
            .contains(&"Block known attack tool user agents".to_string()));
    }

    #[test]
    fn test_catalog_reflects_signatures() {
        let engine = Engine::new();
        let catalog = engine.attack_patterns();
        assert_eq!(catalog.risk_levels.len(), 4);
        assert!(catalog
            .suspicious_patterns
            .suspicious_user_agents
            .contains(&"sqlmap".to_string()));

        let report = engine.baseline_report();
        assert!(report.blacklist_ips.contains("1.2.3.4"));
        assert_eq!(report.suspicious_ranges, vec!["1.2.3.0/24", "5.6.7.0/24"]);
    }
}
