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

//! Population statistics of the historical request window.

use crate::config::BaselineConfig;
use crate::parser::request::RequestRecord;
use chrono::{Duration, Timelike};
use indexmap::IndexMap;
use serde::Serialize;
use std::collections::HashMap;
use std::hash::Hash;

/// Number of hourly buckets in the traffic histogram
pub const HOURS_PER_DAY: usize = 24;

pub const FALLBACK_RESPONSE_TIME_MEAN: f64 = 200.0;
pub const FALLBACK_RESPONSE_TIME_STD: f64 = 50.0;
pub const FALLBACK_REQUEST_SIZE_MEAN: f64 = 1024.0;
pub const FALLBACK_REQUEST_SIZE_STD: f64 = 200.0;

/// Reference statistics describing "normal" traffic
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BaselineMetrics {
    /// Number of records the statistics were computed from
    pub population: usize,
    pub avg_response_time: f64,
    pub std_response_time: f64,
    pub avg_request_size: f64,
    pub std_request_size: f64,
    /// Most frequent paths, most common first
    pub common_paths: IndexMap<String, usize>,
    pub common_user_agents: IndexMap<String, usize>,
    pub status_code_distribution: IndexMap<u16, usize>,
    pub method_distribution: IndexMap<String, usize>,
    /// Request count per hour of day (UTC)
    pub hourly_pattern: [usize; HOURS_PER_DAY],
}

impl Default for BaselineMetrics {
    fn default() -> Self {
        Self {
            population: 0,
            avg_response_time: FALLBACK_RESPONSE_TIME_MEAN,
            std_response_time: FALLBACK_RESPONSE_TIME_STD,
            avg_request_size: FALLBACK_REQUEST_SIZE_MEAN,
            std_request_size: FALLBACK_REQUEST_SIZE_STD,
            common_paths: IndexMap::new(),
            common_user_agents: IndexMap::new(),
            status_code_distribution: IndexMap::new(),
            method_distribution: IndexMap::new(),
            hourly_pattern: [0; HOURS_PER_DAY],
        }
    }
}

impl BaselineMetrics {
    pub fn compute(window: &[RequestRecord], config: &BaselineConfig) -> Self {
        profiling::scope!("BaselineMetrics::compute");

        if window.is_empty() {
            return Self::default();
        }

        let response_times: Vec<f64> = window.iter().map(|r| r.response_time_ms).collect();
        let request_sizes: Vec<f64> = window
            .iter()
            .map(|r| r.request_size_bytes as f64)
            .collect();

        let (avg_response_time, std_response_time) =
            mean_and_std(&response_times, FALLBACK_RESPONSE_TIME_STD);
        let (avg_request_size, std_request_size) =
            mean_and_std(&request_sizes, FALLBACK_REQUEST_SIZE_STD);

        let mut hourly_pattern = [0; HOURS_PER_DAY];
        for record in window {
            hourly_pattern[record.timestamp.hour() as usize] += 1;
        }

        Self {
            population: window.len(),
            avg_response_time,
            std_response_time,
            avg_request_size,
            std_request_size,
            common_paths: value_counts(window.iter().map(|r| r.path.clone()), Some(config.top_paths)),
            common_user_agents: value_counts(
                window.iter().map(|r| r.user_agent.clone()),
                Some(config.top_user_agents),
            ),
            status_code_distribution: value_counts(window.iter().map(|r| r.status_code), None),
            method_distribution: value_counts(
                window.iter().map(|r| r.method.as_str().to_string()),
                None,
            ),
            hourly_pattern,
        }
    }

    pub const fn is_established(&self) -> bool {
        self.population > 0
    }

    /// Upper bound of normal response times (`mean + 3 * std`)
    pub fn response_time_limit(&self) -> f64 {
        3.0f64.mul_add(self.std_response_time, self.avg_response_time)
    }

    /// Upper bound of normal request sizes (`mean + 3 * std`)
    pub fn request_size_limit(&self) -> f64 {
        3.0f64.mul_add(self.std_request_size, self.avg_request_size)
    }
}

/// Mean and sample standard deviation; `fallback_std` when fewer than two values
fn mean_and_std(values: &[f64], fallback_std: f64) -> (f64, f64) {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    if values.len() < 2 {
        return (mean, fallback_std);
    }
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
    (mean, variance.sqrt())
}

/// Frequency table sorted by count (descending), ties broken by key
pub fn value_counts<K, I>(items: I, limit: Option<usize>) -> IndexMap<K, usize>
where
    K: Hash + Eq + Ord,
    I: IntoIterator<Item = K>,
{
    let mut counts: HashMap<K, usize> = HashMap::new();
    for item in items {
        *counts.entry(item).or_insert(0) += 1;
    }
    let mut sorted: Vec<(K, usize)> = counts.into_iter().collect();
    sorted.sort_by(|(ka, ca), (kb, cb)| cb.cmp(ca).then_with(|| ka.cmp(kb)));
    if let Some(limit) = limit {
        sorted.truncate(limit);
    }
    sorted.into_iter().collect()
}

/// Restrict a raw history dump to the configured sliding window.
///
/// Keeps records no older than `window_days` before the newest record, newest
/// first, capped at `max_window_records`.
pub fn select_window(mut records: Vec<RequestRecord>, config: &BaselineConfig) -> Vec<RequestRecord> {
    let Some(newest) = records.iter().map(|r| r.timestamp).max() else {
        return records;
    };
    let cutoff = newest - Duration::days(config.window_days);
    records.retain(|r| r.timestamp >= cutoff);
    records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    records.truncate(config.max_window_records);
    records
}
