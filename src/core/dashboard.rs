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

use crate::core::baseline::value_counts;
use crate::core::insights::error_rate;
use crate::core::snapshot::Snapshot;
use chrono::{DateTime, NaiveDate, Utc};
use indexmap::IndexMap;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};

const TOP_N: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DashboardSummary {
    pub total_requests: usize,
    pub unique_ips: usize,
    pub error_rate: f64,
    pub avg_response_time: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Distributions {
    pub status_codes: IndexMap<u16, usize>,
    pub top_ips: IndexMap<String, usize>,
    pub top_paths: IndexMap<String, usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trends {
    pub error_rate_by_date: BTreeMap<NaiveDate, f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SecurityStatus {
    pub models_trained: bool,
    pub baseline_established: bool,
    pub last_updated: DateTime<Utc>,
}

/// Aggregate view of the baseline window
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dashboard {
    pub summary: DashboardSummary,
    pub distributions: Distributions,
    pub trends: Trends,
    pub security_status: SecurityStatus,
}

impl Dashboard {
    pub fn build(snapshot: &Snapshot, generated_at: DateTime<Utc>) -> Self {
        profiling::scope!("Dashboard::build");
        let window = &snapshot.window;

        let avg_response_time = if window.is_empty() {
            0.0
        } else {
            window.iter().map(|r| r.response_time_ms).sum::<f64>() / window.len() as f64
        };
        let unique_ips = window
            .iter()
            .map(|r| r.ip_address.as_str())
            .collect::<HashSet<_>>()
            .len();

        let mut daily: BTreeMap<NaiveDate, (usize, usize)> = BTreeMap::new();
        for record in window {
            let (errors, total) = daily.entry(record.timestamp.date_naive()).or_default();
            *total += 1;
            if record.is_error() {
                *errors += 1;
            }
        }
        let error_rate_by_date = daily
            .into_iter()
            .map(|(date, (errors, total))| (date, errors as f64 / total as f64))
            .collect();

        Self {
            summary: DashboardSummary {
                total_requests: window.len(),
                unique_ips,
                error_rate: error_rate(window),
                avg_response_time,
            },
            distributions: Distributions {
                status_codes: value_counts(window.iter().map(|r| r.status_code), None),
                top_ips: value_counts(window.iter().map(|r| r.ip_address.clone()), Some(TOP_N)),
                top_paths: value_counts(window.iter().map(|r| r.path.clone()), Some(TOP_N)),
            },
            trends: Trends { error_rate_by_date },
            security_status: SecurityStatus {
                models_trained: snapshot.is_trained(),
                baseline_established: snapshot.baseline.is_established(),
                last_updated: generated_at,
            },
        }
    }
}
