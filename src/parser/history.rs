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

//! Sources of the historical request window used to build a baseline.
//!
//! Loading happens only during `initialize`/`retrain`, never while analyzing.

use crate::error::SourceError;
use crate::parser::request::RequestRecord;
use chrono::Utc;
use serde_json::Value;
use std::path::{Path, PathBuf};

/// Supplies the historical request window
pub trait HistorySource: Send + Sync {
    fn load_window(&self) -> Result<Vec<RequestRecord>, SourceError>;
}

/// A fixed in-memory window
impl HistorySource for Vec<RequestRecord> {
    fn load_window(&self) -> Result<Vec<RequestRecord>, SourceError> {
        Ok(self.clone())
    }
}

impl<S: HistorySource + ?Sized> HistorySource for std::sync::Arc<S> {
    fn load_window(&self) -> Result<Vec<RequestRecord>, SourceError> {
        (**self).load_window()
    }
}

/// Request log exported as a JSON array or as JSON lines
#[derive(Debug, Clone)]
pub struct JsonFileSource {
    path: PathBuf,
}

impl JsonFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl HistorySource for JsonFileSource {
    fn load_window(&self) -> Result<Vec<RequestRecord>, SourceError> {
        profiling::scope!("JsonFileSource::load_window");
        let content = std::fs::read_to_string(&self.path).map_err(|source| SourceError::Io {
            path: self.path.clone(),
            source,
        })?;
        let records = parse_history(&content)?;
        tracing::info!(
            "Loaded {} history records from {}",
            records.len(),
            self.path.display()
        );
        Ok(records)
    }
}

/// Parse a JSON array or JSON-lines document into records.
///
/// Structural JSON errors are fatal; odd field values are coerced. Rows without
/// a usable timestamp are dropped, since the baseline window is anchored on the
/// newest recorded time.
pub fn parse_history(content: &str) -> Result<Vec<RequestRecord>, SourceError> {
    let received_at = Utc::now();
    let values: Vec<Value> = if content.trim_start().starts_with('[') {
        serde_json::from_str(content).map_err(|source| SourceError::Parse {
            line: source.line(),
            source,
        })?
    } else {
        content
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(idx, line)| {
                serde_json::from_str(line).map_err(|source| SourceError::Parse {
                    line: idx + 1,
                    source,
                })
            })
            .collect::<Result<_, _>>()?
    };

    let mut coerced = 0usize;
    let mut undated = 0usize;
    let records = values
        .iter()
        .filter_map(|value| {
            let ingested = RequestRecord::from_json(value, received_at);
            if ingested.stamped_on_receipt {
                undated += 1;
                return None;
            }
            if !ingested.issues.is_empty() {
                coerced += 1;
                tracing::trace!("History record coerced: {:?}", ingested.issues);
            }
            Some(ingested.record)
        })
        .collect();

    if undated > 0 {
        tracing::warn!("Dropped {undated} history records without a usable timestamp");
    }
    if coerced > 0 {
        tracing::debug!("{coerced} history records needed value coercion");
    }
    Ok(records)
}
