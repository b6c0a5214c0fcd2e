use ndarray::{Array1, Axis};
use serde_json::json;

use super::{check_inputs, FeatureSelector};
use crate::error::{EnergyError, Result};
use crate::frame::Frame;
use crate::models::linear::LinearSvr;
use crate::models::{LinearModel, Regressor};
use crate::types::{FeatureScore, SelectionMethod, SelectionResult};

/// Рекурсивное исключение признаков (RFE) с линейным SVR.
///
/// На каждом шаге модель переобучается на оставшихся признаках и удаляется
/// признак с наименьшим |коэффициентом|, пока не останется `n_features`.
/// Ранг 1 у отобранных признаков, у исключенных ранг растет в обратном порядке исключения.
#[derive(Debug, Clone)]
pub struct RecursiveElimination {
    pub n_features: usize,
    pub c: f64,
    pub epsilon: f64,
    pub max_epochs: usize,
    pub seed: u64,
}

impl RecursiveElimination {
    pub fn new(n_features: usize, max_epochs: usize, seed: u64) -> Self {
        Self {
            n_features,
            c: 1.0,
            epsilon: 0.0,
            max_epochs,
            seed,
        }
    }

    fn abs_coefficients(
        &self,
        X: &Frame,
        y: &Array1<f64>,
        columns: &[usize],
    ) -> Result<Array1<f64>> {
        let mut model = LinearSvr::new(self.c, self.epsilon, self.max_epochs, self.seed);
        model.fit(&X.data().select(Axis(1), columns), y)?;
        model
            .coefficients()
            .map(|c| c.mapv(f64::abs))
            .ok_or(EnergyError::NotFitted("LinearSVR"))
    }
}

impl FeatureSelector for RecursiveElimination {
    fn method(&self) -> SelectionMethod {
        SelectionMethod::RecursiveElimination
    }

    fn select(&self, X: &Frame, y: &Array1<f64>) -> Result<SelectionResult> {
        check_inputs(X, y)?;
        if self.n_features == 0 {
            return Err(EnergyError::InvalidParameter(
                "RFE needs to keep at least one feature".to_string(),
            ));
        }

        let names = X.columns();
        let mut remaining: Vec<usize> = (0..X.ncols()).collect();
        let mut eliminated: Vec<(usize, f64)> = Vec::new();

        while remaining.len() > self.n_features {
            let coef = self.abs_coefficients(X, y, &remaining)?;
            let mut weakest = 0;
            for (pos, value) in coef.iter().enumerate() {
                if *value < coef[weakest] {
                    weakest = pos;
                }
            }
            let column = remaining.remove(weakest);
            tracing::debug!("RFE eliminated {} (|coef| = {:.5})", names[column], coef[weakest]);
            eliminated.push((column, coef[weakest]));
        }

        let final_coef = self.abs_coefficients(X, y, &remaining)?;
        let mut kept: Vec<FeatureScore> = remaining
            .iter()
            .zip(final_coef.iter())
            .map(|(&column, &score)| FeatureScore {
                feature: names[column].clone(),
                score,
            })
            .collect();
        kept.sort_by(|a, b| b.score.total_cmp(&a.score));
        let selected: Vec<String> = kept.iter().map(|s| s.feature.clone()).collect();

        let mut rank = vec![1usize; X.ncols()];
        let n_eliminated = eliminated.len();
        for (order, &(column, _)) in eliminated.iter().enumerate() {
            rank[column] = n_eliminated - order + 1;
        }
        let support: Vec<bool> = rank.iter().map(|&r| r == 1).collect();

        let mut ranking = kept;
        ranking.extend(eliminated.iter().rev().map(|&(column, score)| FeatureScore {
            feature: names[column].clone(),
            score,
        }));

        tracing::info!(
            "RFE kept {} of {} features: {:?}",
            selected.len(),
            X.ncols(),
            selected
        );

        Ok(SelectionResult {
            method: self.method(),
            ranking,
            selected,
            details: Some(json!({
                "columns": names,
                "support": support,
                "ranking": rank,
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

    fn frame() -> (Frame, Array1<f64>) {
        let mut rng = StdRng::seed_from_u64(21);
        let n = 200;
        let data = Array2::from_shape_fn((n, 4), |_| rng.gen_range(-1.0..1.0));
        let y = Array1::from_iter(
            (0..n).map(|i| 5.0 * data[[i, 0]] - 3.0 * data[[i, 2]] + 0.5 * data[[i, 3]]),
        );
        let X = Frame::new(
            vec!["strong".into(), "noise".into(), "medium".into(), "weak".into()],
            data,
        )
        .unwrap();
        (X, y)
    }

    #[test]
    fn eliminates_weakest_features_first() {
        let (X, y) = frame();
        let result = RecursiveElimination::new(2, 200, 194).select(&X, &y).unwrap();

        assert_eq!(result.selected, vec!["strong".to_string(), "medium".to_string()]);
        let details = result.details.unwrap();
        assert_eq!(details["support"], json!([true, false, true, false]));
        assert_eq!(details["ranking"], json!([1, 3, 1, 2]));
        assert_eq!(result.ranking.len(), 4);
        assert_eq!(result.ranking[3].feature, "noise");
    }

    #[test]
    fn keeping_all_features_eliminates_nothing() {
        let (X, y) = frame();
        let result = RecursiveElimination::new(8, 50, 194).select(&X, &y).unwrap();
        assert_eq!(result.selected.len(), 4);
        assert_eq!(result.details.unwrap()["ranking"], json!([1, 1, 1, 1]));
    }
}
