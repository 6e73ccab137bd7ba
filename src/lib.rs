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

//! HTTP request anomaly engine.
//!
//! Five detectors (IP reputation, attack signatures, baseline statistics, an
//! isolation forest and behavioral heuristics) score every request. Their
//! sub-scores are fused into one risk level with an explanation attached.

pub mod anomaly;
pub mod config;
pub mod core;
pub mod error;
pub mod model;
pub mod parser;

pub use crate::anomaly::fusion::RiskLevel;
pub use crate::config::EngineConfig;
pub use crate::core::analysis::{AnalysisResult, BatchReport};
pub use crate::core::scenarios::AttackScenario;
pub use crate::core::Engine;
pub use crate::error::{EngineError, EngineResult, SourceError};
pub use crate::parser::history::{HistorySource, JsonFileSource};
pub use crate::parser::request::RequestRecord;
