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
use crate::core::baseline::BaselineMetrics;

const SLOW_RESPONSE_WEIGHT: f64 = 0.3;
const LARGE_REQUEST_WEIGHT: f64 = 0.2;
const SERVER_ERROR_WEIGHT: f64 = 0.2;
const AUTH_ERROR_WEIGHT: f64 = 0.1;

/// Deviation from the baseline population (three-sigma rule) and error statuses
pub struct StatisticalDetector<'a> {
    baseline: &'a BaselineMetrics,
}

impl<'a> StatisticalDetector<'a> {
    pub const fn new(baseline: &'a BaselineMetrics) -> Self {
        Self { baseline }
    }
}

impl RequestDetector for StatisticalDetector<'_> {
    fn kind(&self) -> DetectorKind {
        DetectorKind::Statistical
    }

    fn analyze(&self, input: &DetectionInput<'_>) -> DetectorResult {
        let record = input.record;
        let mut score = 0.0;
        let mut reasons = Vec::new();

        if record.response_time_ms > self.baseline.response_time_limit() {
            score += SLOW_RESPONSE_WEIGHT;
            reasons.push(Reason::new(format!(
                "Unusually high response time: {}ms",
                record.response_time_ms
            )));
        }

        if record.request_size_bytes as f64 > self.baseline.request_size_limit() {
            score += LARGE_REQUEST_WEIGHT;
            reasons.push(Reason::new(format!(
                "Unusually large request size: {} bytes",
                record.request_size_bytes
            )));
        }

        match record.status_code {
            status @ 500.. => {
                score += SERVER_ERROR_WEIGHT;
                reasons.push(Reason::new(format!("Server error status code: {status}")));
            }
            status @ (401 | 403) => {
                score += AUTH_ERROR_WEIGHT;
                reasons.push(Reason::new(format!(
                    "Authentication/authorization error: {status}"
                )));
            }
            _ => {}
        }

        DetectorResult::bounded(score, reasons)
    }
}
