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
use crate::config::BusinessHours;

const OFF_HOURS_WEIGHT: f64 = 0.1;
const UNAUTHENTICATED_WEIGHT: f64 = 0.2;

const PROTECTED_PREFIX: &str = "/api/";

/// Stateless behavioral heuristics. Time of day comes from the request timestamp.
pub struct BehavioralDetector<'a> {
    business_hours: BusinessHours,
    public_endpoints: &'a [String],
}

impl<'a> BehavioralDetector<'a> {
    pub const fn new(business_hours: BusinessHours, public_endpoints: &'a [String]) -> Self {
        Self {
            business_hours,
            public_endpoints,
        }
    }

    fn is_public(&self, path: &str) -> bool {
        self.public_endpoints.iter().any(|p| p == path)
    }
}

impl RequestDetector for BehavioralDetector<'_> {
    fn kind(&self) -> DetectorKind {
        DetectorKind::Behavioral
    }

    fn analyze(&self, input: &DetectionInput<'_>) -> DetectorResult {
        let record = input.record;
        let mut score = 0.0;
        let mut reasons = Vec::new();

        if !self.business_hours.contains(input.features.hour_of_day) {
            score += OFF_HOURS_WEIGHT;
            reasons.push(Reason::new("Request outside normal business hours"));
        }

        let anonymous = !record.user_id.as_deref().is_some_and(|u| !u.trim().is_empty());
        if record.path.contains(PROTECTED_PREFIX) && anonymous && !self.is_public(&record.path) {
            score += UNAUTHENTICATED_WEIGHT;
            reasons.push(Reason::new("Unauthenticated access to protected endpoint"));
        }

        DetectorResult::bounded(score, reasons)
    }
}
