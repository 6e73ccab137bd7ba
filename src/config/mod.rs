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

use crate::core::signatures::AttackSignatures;
use crate::error::{EngineError, EngineResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Engine configuration stored in the config directory
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Known-good addresses (internal infrastructure)
    pub ip_whitelist: Vec<String>,

    /// Known-bad addresses from threat intelligence
    pub ip_blacklist: Vec<String>,

    /// CIDR blocks that raise suspicion, e.g. `1.2.3.0/24`
    pub suspicious_ranges: Vec<String>,

    pub business_hours: BusinessHours,

    /// `/api/` paths that legitimately see unauthenticated traffic
    pub public_endpoints: Vec<String>,

    /// Replaces the built-in signature catalog when set
    pub signatures: Option<AttackSignatures>,

    pub baseline: BaselineConfig,

    pub model: ModelConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            ip_whitelist: ["192.168.1.1", "192.168.1.10", "192.168.1.20", "10.0.0.1", "172.16.0.1"]
                .map(String::from)
                .to_vec(),
            ip_blacklist: ["1.2.3.4", "5.6.7.8", "9.10.11.12"].map(String::from).to_vec(),
            suspicious_ranges: ["1.2.3.0/24", "5.6.7.0/24"].map(String::from).to_vec(),
            business_hours: BusinessHours::default(),
            public_endpoints: ["/api/auth/login", "/api/auth/register"]
                .map(String::from)
                .to_vec(),
            signatures: None,
            baseline: BaselineConfig::default(),
            model: ModelConfig::default(),
        }
    }
}

/// Inclusive hour window considered normal activity (UTC hours).
///
/// A start after the end wraps past midnight, e.g. 22..=6.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusinessHours {
    pub start_hour: u32,
    pub end_hour: u32,
}

impl Default for BusinessHours {
    fn default() -> Self {
        Self {
            start_hour: 6,
            end_hour: 22,
        }
    }
}

impl BusinessHours {
    pub const fn contains(&self, hour: u32) -> bool {
        if self.start_hour <= self.end_hour {
            hour >= self.start_hour && hour <= self.end_hour
        } else {
            hour >= self.start_hour || hour <= self.end_hour
        }
    }
}

/// History window and frequency table sizes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BaselineConfig {
    pub top_paths: usize,
    pub top_user_agents: usize,
    pub max_window_records: usize,
    pub window_days: i64,
}

impl Default for BaselineConfig {
    fn default() -> Self {
        Self {
            top_paths: 20,
            top_user_agents: 10,
            max_window_records: 10_000,
            window_days: 30,
        }
    }
}

/// Isolation forest hyperparameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub n_estimators: usize,
    pub max_samples: usize,
    /// Expected share of outliers in the baseline window
    pub contamination: f64,
    pub seed: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_samples: 256,
            contamination: 0.1,
            seed: 42,
        }
    }
}

impl EngineConfig {
    /// Get the path to the default config file
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("reqcrab").join("config.json"))
    }

    /// Load the default config file, returning defaults if it is absent or unreadable
    pub fn load() -> Self {
        let Some(path) = Self::config_path() else {
            return Self::default();
        };
        if !path.exists() {
            tracing::info!("No config found at {}, using defaults", path.display());
            return Self::default();
        }
        match Self::load_from(&path) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("Ignoring config {}: {e}", path.display());
                Self::default()
            }
        }
    }

    /// Load and validate an explicit config file
    pub fn load_from(path: &Path) -> EngineResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            EngineError::InvalidConfig(format!("cannot read {}: {e}", path.display()))
        })?;
        let config: Self = serde_json::from_str(&contents).map_err(|e| {
            EngineError::InvalidConfig(format!("cannot parse {}: {e}", path.display()))
        })?;
        config.validate()?;
        tracing::info!("Loaded engine config from {}", path.display());
        Ok(config)
    }

    /// Reject values the engine cannot work with
    pub fn validate(&self) -> EngineResult<()> {
        let hours = self.business_hours;
        if hours.start_hour > 23 || hours.end_hour > 23 {
            return Err(EngineError::InvalidConfig(format!(
                "business hours {}..={} outside 0..=23",
                hours.start_hour, hours.end_hour
            )));
        }
        let model = self.model;
        if model.n_estimators == 0 || model.max_samples < 2 {
            return Err(EngineError::InvalidConfig(
                "model needs at least one tree and two samples per tree".to_string(),
            ));
        }
        if !(model.contamination > 0.0 && model.contamination <= 0.5) {
            return Err(EngineError::InvalidConfig(format!(
                "contamination {} outside (0, 0.5]",
                model.contamination
            )));
        }
        if self.baseline.window_days <= 0 {
            return Err(EngineError::InvalidConfig(
                "baseline window must span at least one day".to_string(),
            ));
        }
        Ok(())
    }
}
