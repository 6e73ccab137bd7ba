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

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// HTTP request method
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
    Patch,
    Head,
    Options,
    Other(String),
}

impl HttpMethod {
    pub fn parse(s: &str) -> Self {
        match s.trim().to_uppercase().as_str() {
            "GET" => Self::Get,
            "POST" => Self::Post,
            "PUT" => Self::Put,
            "DELETE" => Self::Delete,
            "PATCH" => Self::Patch,
            "HEAD" => Self::Head,
            "OPTIONS" => Self::Options,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
            Self::Patch => "PATCH",
            Self::Head => "HEAD",
            Self::Options => "OPTIONS",
            Self::Other(s) => s,
        }
    }
}

impl From<String> for HttpMethod {
    fn from(s: String) -> Self {
        Self::parse(&s)
    }
}

impl From<HttpMethod> for String {
    fn from(m: HttpMethod) -> Self {
        m.as_str().to_string()
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single HTTP request as recorded by the ingestion layer.
///
/// Immutable once received. Field names accept both the `_ms`/`_bytes`
/// spelling and the short log-table spelling (`response_time`, `request_size`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub ip_address: String,
    pub user_agent: String,
    pub method: HttpMethod,
    pub path: String,
    #[serde(default = "empty_query")]
    pub query_params: String,
    pub status_code: u16,
    #[serde(alias = "response_time")]
    pub response_time_ms: f64,
    #[serde(default, alias = "request_size")]
    pub request_size_bytes: u64,
    #[serde(default, alias = "response_size")]
    pub response_size_bytes: u64,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub user_id: Option<String>,
}

fn empty_query() -> String {
    "{}".to_string()
}

impl RequestRecord {
    /// Placeholder record used when a payload cannot be read at all
    pub fn empty(timestamp: DateTime<Utc>) -> Self {
        Self {
            id: None,
            ip_address: String::new(),
            user_agent: String::new(),
            method: HttpMethod::Get,
            path: String::new(),
            query_params: empty_query(),
            status_code: 0,
            response_time_ms: 0.0,
            request_size_bytes: 0,
            response_size_bytes: 0,
            timestamp,
            user_id: None,
        }
    }

    pub fn is_error(&self) -> bool {
        self.status_code >= 400
    }

    /// Best-effort conversion from an untyped JSON payload.
    ///
    /// Never fails: unusable values fall back to zero/empty and are reported
    /// in [`Ingested::issues`]. `received_at` stamps records without a usable
    /// timestamp.
    pub fn from_json(value: &Value, received_at: DateTime<Utc>) -> Ingested {
        let Some(obj) = value.as_object() else {
            return Ingested {
                record: Self::empty(received_at),
                stamped_on_receipt: true,
                issues: vec![format!(
                    "Degraded input: expected a JSON object, got {}",
                    json_kind(value)
                )],
            };
        };

        let mut coercer = Coercer {
            obj,
            issues: Vec::new(),
            stamped_on_receipt: false,
        };

        let status = coercer.number("status_code", &[]);
        let status_code = if (0.0..=f64::from(u16::MAX)).contains(&status) {
            status as u16
        } else {
            coercer
                .issues
                .push(format!("Degraded input: status_code {status} out of range"));
            0
        };

        let record = Self {
            id: coercer.optional_text("id", &[]),
            ip_address: coercer.text("ip_address", &["ip"]),
            user_agent: coercer.text("user_agent", &[]),
            method: HttpMethod::parse(&coercer.text("method", &[])),
            path: coercer.text("path", &[]),
            query_params: coercer.query("query_params"),
            status_code,
            response_time_ms: coercer.number("response_time_ms", &["response_time"]),
            request_size_bytes: coercer.size("request_size_bytes", &["request_size"]),
            response_size_bytes: coercer.size("response_size_bytes", &["response_size"]),
            timestamp: coercer.timestamp("timestamp", received_at),
            user_id: coercer.optional_text("user_id", &[]),
        };

        Ingested {
            record,
            stamped_on_receipt: coercer.stamped_on_receipt,
            issues: coercer.issues,
        }
    }
}

/// Outcome of lenient ingestion
#[derive(Debug, Clone)]
pub struct Ingested {
    pub record: RequestRecord,
    /// The payload had no usable timestamp and `received_at` was used instead
    pub stamped_on_receipt: bool,
    /// Human-readable notes about coerced or discarded values
    pub issues: Vec<String>,
}

const fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

struct Coercer<'a> {
    obj: &'a Map<String, Value>,
    issues: Vec<String>,
    stamped_on_receipt: bool,
}

impl<'a> Coercer<'a> {
    fn get(&self, key: &str, aliases: &[&str]) -> Option<&'a Value> {
        let obj = self.obj;
        std::iter::once(key)
            .chain(aliases.iter().copied())
            .find_map(|k| obj.get(k))
            .filter(|v| !v.is_null())
    }

    fn text(&mut self, key: &str, aliases: &[&str]) -> String {
        match self.get(key, aliases) {
            None => String::new(),
            Some(Value::String(s)) => s.clone(),
            Some(v @ (Value::Number(_) | Value::Bool(_))) => v.to_string(),
            Some(other) => {
                self.issues.push(format!(
                    "Degraded input: {key} should be text, got {}",
                    json_kind(other)
                ));
                String::new()
            }
        }
    }

    fn optional_text(&mut self, key: &str, aliases: &[&str]) -> Option<String> {
        Some(self.text(key, aliases)).filter(|s| !s.trim().is_empty())
    }

    fn query(&self, key: &str) -> String {
        match self.get(key, &[]) {
            None => empty_query(),
            Some(Value::String(s)) => s.clone(),
            // Structured query payloads are kept in their JSON text form
            Some(v) => v.to_string(),
        }
    }

    fn number(&mut self, key: &str, aliases: &[&str]) -> f64 {
        let parsed = match self.get(key, aliases) {
            None => return 0.0,
            Some(Value::Number(n)) => n.as_f64(),
            Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
            Some(_) => None,
        };
        match parsed {
            Some(n) if n.is_finite() => n,
            _ => {
                self.issues
                    .push(format!("Degraded input: {key} is not numeric, using 0"));
                0.0
            }
        }
    }

    fn size(&mut self, key: &str, aliases: &[&str]) -> u64 {
        let n = self.number(key, aliases);
        if n < 0.0 {
            self.issues
                .push(format!("Degraded input: {key} is negative, using 0"));
            0
        } else {
            n as u64
        }
    }

    fn timestamp(&mut self, key: &str, fallback: DateTime<Utc>) -> DateTime<Utc> {
        let parsed = match self.get(key, &[]) {
            None => {
                self.stamped_on_receipt = true;
                return fallback;
            }
            Some(Value::String(s)) => parse_timestamp(s),
            Some(Value::Number(n)) => n
                .as_i64()
                .and_then(|secs| Utc.timestamp_opt(secs, 0).single()),
            Some(_) => None,
        };
        parsed.unwrap_or_else(|| {
            self.issues.push(format!(
                "Degraded input: {key} is not a recognised timestamp, using receive time"
            ));
            self.stamped_on_receipt = true;
            fallback
        })
    }
}

/// Parse RFC 3339 or a naive `YYYY-MM-DD HH:MM:SS[.f]` timestamp (taken as UTC)
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
        return Some(ts.with_timezone(&Utc));
    }
    ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(|naive| naive.and_utc())
}
