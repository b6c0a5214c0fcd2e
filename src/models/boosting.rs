//! Градиентный бустинг над регрессионными деревьями (RMSE)
//!
//! Симметричные деревья и упорядоченный бустинг не реализованы: используются обычные
//! CART-деревья заданной глубины с L2-регуляризацией листьев и подвыборкой строк.

use ndarray::{Array1, Array2, Axis};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use super::metrics::root_mean_squared_error;
use super::tree::{RegressionTree, TreeParams};
use super::validation::train_test_split;
use super::{Regressor, Tunable};
use crate::error::{EnergyError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoostingParams {
    pub iterations: usize,
    pub learning_rate: f64,
    pub depth: usize,
    pub l2_leaf_reg: f64,
    pub subsample: f64,
    pub random_seed: u64,
    /// Остановка, если метрика на eval-выборке не улучшалась `od_wait` итераций
    pub od_wait: Option<usize>,
    /// Доля обучающих данных, отводимая под eval-выборку при `od_wait`
    pub eval_fraction: f64,
}

impl Default for BoostingParams {
    fn default() -> Self {
        Self {
            iterations: 1000,
            learning_rate: 0.03,
            depth: 6,
            l2_leaf_reg: 3.0,
            subsample: 0.8,
            random_seed: 194,
            od_wait: Some(20),
            eval_fraction: 0.2,
        }
    }
}

impl BoostingParams {
    pub fn validate(&self) -> Result<()> {
        if self.iterations == 0 {
            return Err(EnergyError::InvalidParameter(
                "boosting needs at least one iteration".to_string(),
            ));
        }
        if !(self.learning_rate > 0.0) {
            return Err(EnergyError::InvalidParameter(format!(
                "learning_rate must be positive, got {}",
                self.learning_rate
            )));
        }
        if !(self.subsample > 0.0 && self.subsample <= 1.0) {
            return Err(EnergyError::InvalidParameter(format!(
                "subsample must be in (0, 1], got {}",
                self.subsample
            )));
        }
        if self.l2_leaf_reg < 0.0 {
            return Err(EnergyError::InvalidParameter(format!(
                "l2_leaf_reg must be non-negative, got {}",
                self.l2_leaf_reg
            )));
        }
        Ok(())
    }

    fn tree_params(&self) -> TreeParams {
        TreeParams {
            max_depth: self.depth,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
            l2_leaf_reg: self.l2_leaf_reg,
        }
    }
}

/// Сетка гиперпараметров для grid search; порядок перебора: depth, learning_rate,
/// iterations, l2_leaf_reg, subsample
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BoostingGrid {
    pub depth: Vec<usize>,
    pub learning_rate: Vec<f64>,
    pub iterations: Vec<usize>,
    pub l2_leaf_reg: Vec<f64>,
    pub subsample: Vec<f64>,
    pub random_seed: u64,
    pub od_wait: Option<usize>,
    pub eval_fraction: f64,
}

impl Default for BoostingGrid {
    fn default() -> Self {
        Self {
            depth: vec![6, 8],
            learning_rate: vec![0.05, 0.1],
            iterations: vec![500],
            l2_leaf_reg: vec![3.0],
            subsample: vec![0.8],
            random_seed: 194,
            od_wait: Some(20),
            eval_fraction: 0.2,
        }
    }
}

impl BoostingGrid {
    pub fn candidates(&self) -> Vec<BoostingParams> {
        let mut out = Vec::new();
        for &depth in &self.depth {
            for &learning_rate in &self.learning_rate {
                for &iterations in &self.iterations {
                    for &l2_leaf_reg in &self.l2_leaf_reg {
                        for &subsample in &self.subsample {
                            out.push(BoostingParams {
                                iterations,
                                learning_rate,
                                depth,
                                l2_leaf_reg,
                                subsample,
                                random_seed: self.random_seed,
                                od_wait: self.od_wait,
                                eval_fraction: self.eval_fraction,
                            });
                        }
                    }
                }
            }
        }
        out
    }
}

#[derive(Debug, Clone)]
pub struct GradientBoosting {
    params: BoostingParams,
    base: f64,
    trees: Vec<RegressionTree>,
    eval_history: Vec<f64>,
    best_iteration: Option<usize>,
}

impl GradientBoosting {
    pub fn new(params: BoostingParams) -> Self {
        Self {
            params,
            base: 0.0,
            trees: Vec::new(),
            eval_history: Vec::new(),
            best_iteration: None,
        }
    }

    pub fn params(&self) -> &BoostingParams {
        &self.params
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// RMSE на eval-выборке по итерациям
    pub fn eval_history(&self) -> &[f64] {
        &self.eval_history
    }

    pub fn best_iteration(&self) -> Option<usize> {
        self.best_iteration
    }

    /// Обучение с явной eval-выборкой; модель обрезается до лучшей итерации
    pub fn fit_with_eval(
        &mut self,
        X: &Array2<f64>,
        y: &Array1<f64>,
        eval: Option<(&Array2<f64>, &Array1<f64>)>,
    ) -> Result<()> {
        self.params.validate()?;
        let n = X.nrows();
        if n == 0 || X.ncols() == 0 {
            return Err(EnergyError::EmptyData("boosting needs data".to_string()));
        }
        if n != y.len() {
            return Err(EnergyError::ShapeMismatch {
                expected: format!("{} targets", n),
                found: format!("{} targets", y.len()),
            });
        }

        let mut rng = StdRng::seed_from_u64(self.params.random_seed);
        let lr = self.params.learning_rate;
        let sample_size = ((n as f64 * self.params.subsample).round() as usize).clamp(1, n);

        self.base = y.mean().unwrap_or(0.0);
        self.trees.clear();
        self.eval_history.clear();
        self.best_iteration = None;

        let mut current = Array1::from_elem(n, self.base);
        let mut eval_current = eval.map(|(Xe, _)| Array1::from_elem(Xe.nrows(), self.base));
        let mut best_score = f64::INFINITY;
        let mut best_iteration = 0;

        for iteration in 0..self.params.iterations {
            let residual = y - &current;
            let rows: Vec<usize> = if sample_size < n {
                rand::seq::index::sample(&mut rng, n, sample_size).into_vec()
            } else {
                (0..n).collect()
            };

            let mut tree = RegressionTree::new(self.params.tree_params(), self.params.random_seed);
            tree.fit_rows(X, &residual, rows, &mut rng)?;
            current.scaled_add(lr, &tree.predict(X)?);

            if let (Some((Xe, ye)), Some(eval_pred)) = (eval, eval_current.as_mut()) {
                eval_pred.scaled_add(lr, &tree.predict(Xe)?);
                let score = root_mean_squared_error(ye, eval_pred);
                self.eval_history.push(score);
                if score < best_score {
                    best_score = score;
                    best_iteration = iteration;
                }
            }
            self.trees.push(tree);

            if let Some(wait) = self.params.od_wait {
                if eval.is_some() && iteration - best_iteration >= wait {
                    tracing::debug!(
                        "Overfitting detector stopped boosting at iteration {}",
                        iteration
                    );
                    break;
                }
            }
        }

        if eval.is_some() {
            self.trees.truncate(best_iteration + 1);
            self.best_iteration = Some(best_iteration);
            tracing::debug!(
                "Boosting best iteration {} (eval RMSE {:.4})",
                best_iteration,
                best_score
            );
        }

        Ok(())
    }
}

impl Regressor for GradientBoosting {
    fn name(&self) -> &'static str {
        "GradientBoosting"
    }

    /// При заданном `od_wait` часть обучающих данных отводится под eval-выборку
    fn fit(&mut self, X: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        let use_eval = self.params.od_wait.is_some()
            && self.params.eval_fraction > 0.0
            && self.params.eval_fraction < 1.0
            && X.nrows() >= 10;

        if !use_eval {
            return self.fit_with_eval(X, y, None);
        }

        let split = train_test_split(X.nrows(), self.params.eval_fraction, self.params.random_seed)?;
        let X_train = X.select(Axis(0), &split.train);
        let y_train = y.select(Axis(0), &split.train);
        let X_eval = X.select(Axis(0), &split.test);
        let y_eval = y.select(Axis(0), &split.test);
        self.fit_with_eval(&X_train, &y_train, Some((&X_eval, &y_eval)))
    }

    fn predict(&self, X: &Array2<f64>) -> Result<Array1<f64>> {
        if self.trees.is_empty() {
            return Err(EnergyError::NotFitted("GradientBoosting"));
        }
        let mut out = Array1::from_elem(X.nrows(), self.base);
        for tree in &self.trees {
            out.scaled_add(self.params.learning_rate, &tree.predict(X)?);
        }
        Ok(out)
    }
}

impl Tunable for GradientBoosting {
    type Params = BoostingParams;

    fn with_params(params: &BoostingParams) -> Result<Self> {
        params.validate()?;
        Ok(Self::new(params.clone()))
    }
}
