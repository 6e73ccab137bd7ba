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
use crate::model::{ModelVerdict, OutlierModel};

const OUTLIER_WEIGHT: f64 = 0.4;
const FALLBACK_WEIGHT: f64 = 0.1;

/// Wraps the trained outlier model. The only detector allowed to degrade:
/// without a model it contributes a fixed low score.
pub struct OutlierDetector<'a> {
    model: Option<&'a OutlierModel>,
}

impl<'a> OutlierDetector<'a> {
    pub const fn new(model: Option<&'a OutlierModel>) -> Self {
        Self { model }
    }

    pub fn verdict(&self, input: &DetectionInput<'_>) -> ModelVerdict {
        self.model
            .map_or(ModelVerdict::Unavailable, |model| model.evaluate(input.features))
    }
}

impl RequestDetector for OutlierDetector<'_> {
    fn kind(&self) -> DetectorKind {
        DetectorKind::MachineLearning
    }

    fn analyze(&self, input: &DetectionInput<'_>) -> DetectorResult {
        match self.verdict(input) {
            ModelVerdict::Outlier { score } => DetectorResult::bounded(
                OUTLIER_WEIGHT,
                vec![Reason::new(format!(
                    "ML model detected anomaly (score: {score:.3})"
                ))],
            ),
            ModelVerdict::Inlier { .. } => DetectorResult::empty(),
            ModelVerdict::Unavailable => DetectorResult::bounded(
                FALLBACK_WEIGHT,
                vec![Reason::new("ML model unavailable - using fallback detection")],
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anomaly::test_support::benign_record;
    use crate::config::ModelConfig;
    use crate::core::baseline::BaselineMetrics;
    use crate::core::features::{extract, FeatureEncoders};
    use crate::parser::request::RequestRecord;
    use chrono::{Duration, TimeZone, Utc};

    fn training_window() -> Vec<RequestRecord> {
        let start = Utc.with_ymd_and_hms(2025, 3, 10, 9, 0, 0).unwrap();
        (0u32..240)
            .map(|i| RequestRecord {
                response_time_ms: 180.0 + f64::from(i % 40),
                request_size_bytes: 900 + u64::from(i % 50) * 4,
                response_size_bytes: 4000 + u64::from(i % 30) * 10,
                timestamp: start + Duration::minutes(i64::from(i) * 2),
                ..benign_record()
            })
            .collect()
    }

    fn analyze(model: Option<&OutlierModel>, record: &RequestRecord) -> DetectorResult {
        let features = extract(record, &BaselineMetrics::default(), &FeatureEncoders::default());
        OutlierDetector::new(model).analyze(&DetectionInput {
            record,
            features: &features,
        })
    }

    #[test]
    fn test_unavailable_model_falls_back() {
        let result = analyze(None, &benign_record());
        assert!((result.score - 0.1).abs() < 1e-9);
        assert_eq!(
            result.reasons[0].message,
            "ML model unavailable - using fallback detection"
        );
    }

    #[test]
    fn test_outlier_is_flagged_with_score() {
        let window = training_window();
        let baseline = BaselineMetrics::default();
        let encoders = FeatureEncoders::default();
        let features: Vec<_> = window.iter().map(|r| extract(r, &baseline, &encoders)).collect();
        let model = OutlierModel::train(&features, &ModelConfig::default()).unwrap();

        let extreme = RequestRecord {
            response_time_ms: 30_000.0,
            request_size_bytes: 500_000,
            response_size_bytes: 1,
            timestamp: Utc.with_ymd_and_hms(2025, 3, 11, 3, 0, 0).unwrap(),
            ..benign_record()
        };
        let result = analyze(Some(&model), &extreme);
        assert!((result.score - 0.4).abs() < 1e-9);
        assert!(result.reasons[0]
            .message
            .starts_with("ML model detected anomaly (score: -0."));
    }
}
