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

pub mod isolation_forest;
pub mod scaler;

use crate::config::ModelConfig;
use crate::core::features::FeatureVector;
use isolation_forest::{percentile, IsolationForest};
use scaler::StandardScaler;

/// Outcome of asking the outlier model about one request
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ModelVerdict {
    /// `score` is the decision value; negative means outlier
    Outlier { score: f64 },
    Inlier { score: f64 },
    /// No trained model in the current snapshot
    Unavailable,
}

/// Scaler and isolation forest trained together on one baseline window
#[derive(Debug, Clone)]
pub struct OutlierModel {
    scaler: StandardScaler,
    forest: IsolationForest,
    /// Decision threshold: the `contamination` percentile of training scores
    offset: f64,
    trained_on: usize,
}

impl OutlierModel {
    /// Train on the baseline window's feature vectors.
    ///
    /// Returns `None` when the window is too small to learn from.
    pub fn train(features: &[FeatureVector], config: &ModelConfig) -> Option<Self> {
        profiling::scope!("OutlierModel::train");

        let rows: Vec<Vec<f64>> = features.iter().map(|f| f.numeric().to_vec()).collect();
        let scaler = StandardScaler::fit(&rows);
        let scaled: Vec<Vec<f64>> = rows.iter().map(|r| scaler.transform(r)).collect();

        let forest = IsolationForest::fit(
            &scaled,
            config.n_estimators,
            config.max_samples,
            config.seed,
        )?;

        let training_scores: Vec<f64> = scaled.iter().map(|r| -forest.anomaly_score(r)).collect();
        let offset = percentile(&training_scores, config.contamination);

        tracing::info!(
            "Trained isolation forest: {} trees on {} samples (offset {offset:.4})",
            forest.len(),
            rows.len()
        );

        Some(Self {
            scaler,
            forest,
            offset,
            trained_on: rows.len(),
        })
    }

    /// Signed distance from the outlier threshold; negative means outlier
    pub fn decision(&self, features: &FeatureVector) -> f64 {
        let scaled = self.scaler.transform(&features.numeric());
        -self.forest.anomaly_score(&scaled) - self.offset
    }

    pub fn evaluate(&self, features: &FeatureVector) -> ModelVerdict {
        let score = self.decision(features);
        if score < 0.0 {
            ModelVerdict::Outlier { score }
        } else {
            ModelVerdict::Inlier { score }
        }
    }

    pub const fn trained_on(&self) -> usize {
        self.trained_on
    }
}
