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

//! Signature matching against known attack patterns.
//!
//! Signature lists are lower-cased when the catalog is built, so only the
//! request side needs case folding here. Reasons name the matched token,
//! never the surrounding payload.

use super::{AttackCategory, DetectionInput, DetectorKind, DetectorResult, Reason, RequestDetector};
use crate::core::signatures::AttackSignatures;

const SQL_INJECTION_WEIGHT: f64 = 0.3;
const XSS_WEIGHT: f64 = 0.3;
const PATH_TRAVERSAL_WEIGHT: f64 = 0.4;
const ATTACK_TOOL_WEIGHT: f64 = 0.5;
const ADMIN_PATH_WEIGHT: f64 = 0.2;

pub struct PatternDetector<'a> {
    signatures: &'a AttackSignatures,
}

impl<'a> PatternDetector<'a> {
    pub const fn new(signatures: &'a AttackSignatures) -> Self {
        Self { signatures }
    }
}

/// One signature family scanned over one haystack
struct Rule<'s> {
    category: AttackCategory,
    tokens: &'s [String],
    weight: f64,
    label: &'static str,
}

impl RequestDetector for PatternDetector<'_> {
    fn kind(&self) -> DetectorKind {
        DetectorKind::Pattern
    }

    fn analyze(&self, input: &DetectionInput<'_>) -> DetectorResult {
        let record = input.record;
        let path = record.path.to_lowercase();
        let target = format!("{path} {}", record.query_params.to_lowercase());
        let user_agent = record.user_agent.to_lowercase();

        let sig = self.signatures;
        let rules = [
            (
                &target,
                Rule {
                    category: AttackCategory::SqlInjection,
                    tokens: &sig.sql_injection_keywords,
                    weight: SQL_INJECTION_WEIGHT,
                    label: "SQL injection pattern detected",
                },
            ),
            (
                &target,
                Rule {
                    category: AttackCategory::Xss,
                    tokens: &sig.xss_patterns,
                    weight: XSS_WEIGHT,
                    label: "XSS pattern detected",
                },
            ),
            (
                &target,
                Rule {
                    category: AttackCategory::PathTraversal,
                    tokens: &sig.path_traversal,
                    weight: PATH_TRAVERSAL_WEIGHT,
                    label: "Path traversal pattern detected",
                },
            ),
            (
                &user_agent,
                Rule {
                    category: AttackCategory::AttackTool,
                    tokens: &sig.suspicious_user_agents,
                    weight: ATTACK_TOOL_WEIGHT,
                    label: "Suspicious user agent detected",
                },
            ),
            (
                &path,
                Rule {
                    category: AttackCategory::AdminProbe,
                    tokens: &sig.admin_paths,
                    weight: ADMIN_PATH_WEIGHT,
                    label: "Admin path access detected",
                },
            ),
        ];

        let mut score = 0.0;
        let mut reasons = Vec::new();
        for (haystack, rule) in &rules {
            for token in rule.tokens.iter().filter(|t| haystack.contains(t.as_str())) {
                score += rule.weight;
                reasons.push(Reason::tagged(rule.category, format!("{}: {token}", rule.label)));
            }
        }

        DetectorResult::bounded(score, reasons)
    }
}
