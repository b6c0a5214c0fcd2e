use ndarray::Array1;
use serde_json::json;

use super::{check_inputs, rank_by_score, FeatureSelector};
use crate::error::{EnergyError, Result};
use crate::frame::Frame;
use crate::models::linear::LassoCv;
use crate::models::{LinearModel, Regressor};
use crate::types::{SelectionMethod, SelectionResult};

/// Lasso с подбором alpha по k-fold; ранжирование по |коэффициенту|,
/// отбираются ненулевые коэффициенты
#[derive(Debug, Clone)]
pub struct LassoSelector {
    pub alphas: Vec<f64>,
    pub folds: usize,
}

impl LassoSelector {
    pub fn new(alphas: Vec<f64>, folds: usize) -> Self {
        Self { alphas, folds }
    }
}

impl FeatureSelector for LassoSelector {
    fn method(&self) -> SelectionMethod {
        SelectionMethod::Lasso
    }

    fn select(&self, X: &Frame, y: &Array1<f64>) -> Result<SelectionResult> {
        check_inputs(X, y)?;

        let mut model = LassoCv::new(self.alphas.clone(), self.folds);
        model.fit(X.data(), y)?;
        let coef = model
            .coefficients()
            .ok_or(EnergyError::NotFitted("LassoCV"))?;
        let alpha = model.alpha().ok_or(EnergyError::NotFitted("LassoCV"))?;

        let ranking = rank_by_score(X.columns(), &coef.mapv(f64::abs));
        let selected: Vec<String> = ranking
            .iter()
            .filter(|s| s.score > 0.0)
            .map(|s| s.feature.clone())
            .collect();

        let best_path = model.path().iter().find(|p| p.alpha == alpha);
        let rmse_cv: Vec<f64> = best_path
            .map(|p| p.fold_mse.iter().map(|m| m.sqrt()).collect())
            .unwrap_or_default();
        let coefficients: serde_json::Map<String, serde_json::Value> = X
            .columns()
            .iter()
            .zip(coef.iter())
            .map(|(name, c)| (name.clone(), json!(c)))
            .collect();

        tracing::info!(
            "Lasso selection: alpha={} kept {} of {} features",
            alpha,
            selected.len(),
            X.ncols()
        );

        Ok(SelectionResult {
            method: self.method(),
            ranking,
            selected,
            details: Some(json!({
                "alpha": alpha,
                "intercept": model.intercept(),
                "coefficients": coefficients,
                "rmse_cv": rmse_cv,
                "path": model.path(),
            })),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    #[test]
    fn irrelevant_features_are_dropped() {
        let mut rng = StdRng::seed_from_u64(9);
        let n = 150;
        let data = Array2::from_shape_fn((n, 3), |_| rng.gen_range(-1.0..1.0));
        let y = Array1::from_iter(
            (0..n).map(|i| 4.0 * data[[i, 1]] + rng.gen_range(-0.01..0.01)),
        );
        let X = Frame::new(vec!["a".into(), "b".into(), "c".into()], data).unwrap();

        let result = LassoSelector::new(vec![1.0, 0.1], 5).select(&X, &y).unwrap();
        assert_eq!(result.ranking[0].feature, "b");
        assert_eq!(result.selected, vec!["b".to_string()]);

        let details = result.details.unwrap();
        assert_eq!(details["alpha"], json!(0.1));
        assert_eq!(details["rmse_cv"].as_array().unwrap().len(), 5);
    }
}
