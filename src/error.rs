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

//! Error types for engine initialization and history loading.
//!
//! Request analysis itself never fails; only building a snapshot can.

use std::path::PathBuf;
use thiserror::Error;

/// Failure to obtain the historical request window
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("I/O error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed history record at line {line}: {source}")]
    Parse {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("History source unreachable: {0}")]
    Unreachable(String),
}

/// Errors surfaced by `initialize`/`retrain` and configuration loading
#[derive(Debug, Error)]
pub enum EngineError {
    /// The history source could not supply a window. The serving snapshot is unchanged.
    #[error("Historical request window unavailable: {0}")]
    HistoryUnavailable(#[from] SourceError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type EngineResult<T> = Result<T, EngineError>;
