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

//! Feature extraction shared by model training and online scoring.
//!
//! The same [`FeatureEncoders`] instance built during initialization is used
//! for every request until the next retrain; it is never mutated.

use crate::core::baseline::BaselineMetrics;
use crate::parser::request::RequestRecord;
use chrono::{Datelike, Timelike};
use indexmap::IndexMap;
use serde::Serialize;
use std::collections::BTreeSet;

/// Code assigned to categories absent from the training window
pub const UNKNOWN_CODE: i64 = -1;

/// Lower bound for the z-score denominator
pub const ZSCORE_EPSILON: f64 = 1e-9;

/// Number of features the outlier model consumes
pub const NUMERIC_FEATURES: usize = 4;

/// Frozen label encoding: sorted vocabulary, index = code
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CategoryEncoder {
    classes: IndexMap<String, i64>,
}

impl CategoryEncoder {
    pub fn fit<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let vocabulary: BTreeSet<String> = values
            .into_iter()
            .map(|v| v.as_ref().to_string())
            .collect();
        Self {
            classes: vocabulary
                .into_iter()
                .enumerate()
                .map(|(code, class)| (class, code as i64))
                .collect(),
        }
    }

    pub fn encode(&self, value: &str) -> i64 {
        self.classes.get(value).copied().unwrap_or(UNKNOWN_CODE)
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

/// Encoders for the categorical request fields
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FeatureEncoders {
    pub method: CategoryEncoder,
    pub path: CategoryEncoder,
}

impl FeatureEncoders {
    pub fn fit(window: &[RequestRecord]) -> Self {
        Self {
            method: CategoryEncoder::fit(window.iter().map(|r| r.method.as_str())),
            path: CategoryEncoder::fit(window.iter().map(|r| r.path.as_str())),
        }
    }
}

/// Numeric projection of a request in the context of a baseline
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FeatureVector {
    pub response_time: f64,
    pub request_size: f64,
    pub response_size: f64,
    pub hour_of_day: u32,
    /// Monday = 0
    pub day_of_week: u32,
    pub method_code: i64,
    pub path_code: i64,
    pub is_error: bool,
    pub response_time_zscore: f64,
}

impl FeatureVector {
    /// The subset fed to the outlier model, in training order
    pub fn numeric(&self) -> [f64; NUMERIC_FEATURES] {
        [
            self.response_time,
            self.request_size,
            self.response_size,
            f64::from(self.hour_of_day),
        ]
    }
}

/// Project a record onto the feature space. Pure and infallible.
pub fn extract(
    record: &RequestRecord,
    baseline: &BaselineMetrics,
    encoders: &FeatureEncoders,
) -> FeatureVector {
    let zscore = (record.response_time_ms - baseline.avg_response_time).abs()
        / baseline.std_response_time.max(ZSCORE_EPSILON);

    FeatureVector {
        response_time: record.response_time_ms,
        request_size: record.request_size_bytes as f64,
        response_size: record.response_size_bytes as f64,
        hour_of_day: record.timestamp.hour(),
        day_of_week: record.timestamp.weekday().num_days_from_monday(),
        method_code: encoders.method.encode(record.method.as_str()),
        path_code: encoders.path.encode(&record.path),
        is_error: record.is_error(),
        response_time_zscore: zscore,
    }
}
