use ndarray::Array1;
use serde_json::json;

use super::{check_inputs, rank_by_score, FeatureSelector};
use crate::error::{EnergyError, Result};
use crate::frame::Frame;
use crate::models::tree::{RandomForest, TreeParams};
use crate::models::Regressor;
use crate::types::{SelectionMethod, SelectionResult};

/// Важность признаков случайного леса; отбираются признаки с важностью не ниже средней
#[derive(Debug, Clone)]
pub struct ImportanceSelector {
    pub n_trees: usize,
    pub max_depth: usize,
    pub seed: u64,
}

impl ImportanceSelector {
    pub fn new(n_trees: usize, max_depth: usize, seed: u64) -> Self {
        Self {
            n_trees,
            max_depth,
            seed,
        }
    }
}

impl FeatureSelector for ImportanceSelector {
    fn method(&self) -> SelectionMethod {
        SelectionMethod::ImportanceThreshold
    }

    fn select(&self, X: &Frame, y: &Array1<f64>) -> Result<SelectionResult> {
        check_inputs(X, y)?;

        let params = TreeParams {
            max_depth: self.max_depth,
            ..TreeParams::default()
        };
        let mut forest = RandomForest::new(self.n_trees, params, self.seed);
        forest.fit(X.data(), y)?;
        let importances = forest
            .feature_importances()
            .ok_or(EnergyError::NotFitted("RandomForest"))?;

        let threshold = importances.mean().unwrap_or(0.0);
        let ranking = rank_by_score(X.columns(), &importances);
        let selected: Vec<String> = ranking
            .iter()
            .filter(|s| s.score >= threshold)
            .map(|s| s.feature.clone())
            .collect();

        tracing::info!(
            "Importance selection kept {} of {} features (threshold {:.4})",
            selected.len(),
            X.ncols(),
            threshold
        );

        Ok(SelectionResult {
            method: self.method(),
            ranking,
            selected,
            details: Some(json!({ "threshold": threshold })),
        })
    }
}
