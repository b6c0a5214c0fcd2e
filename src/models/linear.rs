//! Линейные модели: OLS (linfa-linear), Lasso с кросс-валидацией и линейный SVR

use linfa::traits::Fit;
use linfa::Dataset;
use linfa_linear::{FittedLinearRegression, LinearRegression};
use ndarray::{Array1, Array2, ArrayView1, Axis};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::Serialize;

use super::metrics::{mean_squared_error, r2_score};
use super::validation::k_fold;
use super::{LinearModel, Regressor};
use crate::error::{EnergyError, Result};

fn check_training_data(X: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
    if X.nrows() == 0 || X.ncols() == 0 {
        return Err(EnergyError::EmptyData("training matrix is empty".to_string()));
    }
    if X.nrows() != y.len() {
        return Err(EnergyError::ShapeMismatch {
            expected: format!("{} targets", X.nrows()),
            found: format!("{} targets", y.len()),
        });
    }
    Ok(())
}

fn check_features(expected: usize, X: &Array2<f64>) -> Result<()> {
    if X.ncols() != expected {
        return Err(EnergyError::ShapeMismatch {
            expected: format!("{} features", expected),
            found: format!("{} features", X.ncols()),
        });
    }
    Ok(())
}

fn centered(X: &Array2<f64>, y: &Array1<f64>) -> Result<(Array2<f64>, Array1<f64>, Array1<f64>, f64)> {
    let x_mean = X
        .mean_axis(Axis(0))
        .ok_or_else(|| EnergyError::EmptyData("training matrix is empty".to_string()))?;
    let y_mean = y.mean().unwrap_or(0.0);
    let Xc = X - &x_mean.view().insert_axis(Axis(0));
    let yc = y.mapv(|v| v - y_mean);
    Ok((Xc, yc, x_mean, y_mean))
}

/// Обычная линейная регрессия со свободным членом
pub struct OrdinaryLeastSquares {
    model: FittedLinearRegression<f64>,
}

impl OrdinaryLeastSquares {
    pub fn fit(X: &Array2<f64>, y: &Array1<f64>) -> Result<Self> {
        check_training_data(X, y)?;
        let dataset = Dataset::new(X.clone(), y.clone());
        let model = LinearRegression::new()
            .fit(&dataset)
            .map_err(|e| EnergyError::Training(e.to_string()))?;
        Ok(Self { model })
    }

    pub fn predict(&self, X: &Array2<f64>) -> Array1<f64> {
        linfa::traits::Predict::predict(&self.model, X)
    }

    pub fn coefficients(&self) -> &Array1<f64> {
        self.model.params()
    }

    pub fn intercept(&self) -> f64 {
        self.model.intercept()
    }

    pub fn r2(&self, X: &Array2<f64>, y: &Array1<f64>) -> f64 {
        r2_score(y, &self.predict(X))
    }
}

fn soft_threshold(value: f64, threshold: f64) -> f64 {
    if value > threshold {
        value - threshold
    } else if value < -threshold {
        value + threshold
    } else {
        0.0
    }
}

/// Lasso: (1 / 2n)·||y - Xw - b||² + alpha·||w||₁, покоординатный спуск
#[derive(Debug, Clone)]
pub struct Lasso {
    pub alpha: f64,
    pub max_iter: usize,
    pub tol: f64,
    coef: Option<Array1<f64>>,
    intercept: f64,
    n_iter: usize,
}

impl Lasso {
    pub fn new(alpha: f64) -> Self {
        Self {
            alpha,
            max_iter: 1000,
            tol: 1e-4,
            coef: None,
            intercept: 0.0,
            n_iter: 0,
        }
    }

    pub fn intercept(&self) -> f64 {
        self.intercept
    }

    pub fn n_iter(&self) -> usize {
        self.n_iter
    }
}

impl Regressor for Lasso {
    fn name(&self) -> &'static str {
        "Lasso"
    }

    fn fit(&mut self, X: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_training_data(X, y)?;
        if self.alpha < 0.0 {
            return Err(EnergyError::InvalidParameter(format!(
                "lasso alpha must be non-negative, got {}",
                self.alpha
            )));
        }

        let (Xc, yc, x_mean, y_mean) = centered(X, y)?;
        let n = X.nrows() as f64;
        let col_sq: Vec<f64> = Xc.columns().into_iter().map(|c| c.dot(&c)).collect();

        let mut w = Array1::<f64>::zeros(X.ncols());
        let mut residual = yc;
        let penalty = n * self.alpha;
        self.n_iter = 0;

        for iter in 0..self.max_iter {
            self.n_iter = iter + 1;
            let mut max_delta: f64 = 0.0;
            let mut max_weight: f64 = 0.0;

            for j in 0..X.ncols() {
                if col_sq[j] == 0.0 {
                    continue;
                }
                let column = Xc.column(j);
                let w_old = w[j];
                let rho = column.dot(&residual) + col_sq[j] * w_old;
                let w_new = soft_threshold(rho, penalty) / col_sq[j];

                if w_new != w_old {
                    residual.scaled_add(w_old - w_new, &column);
                    w[j] = w_new;
                }
                max_delta = max_delta.max((w_new - w_old).abs());
                max_weight = max_weight.max(w_new.abs());
            }

            if max_delta <= self.tol * max_weight.max(1.0) {
                break;
            }
        }

        self.intercept = y_mean - x_mean.dot(&w);
        self.coef = Some(w);
        Ok(())
    }

    fn predict(&self, X: &Array2<f64>) -> Result<Array1<f64>> {
        let coef = self.coef.as_ref().ok_or(EnergyError::NotFitted("Lasso"))?;
        check_features(coef.len(), X)?;
        Ok(X.dot(coef) + self.intercept)
    }
}

impl LinearModel for Lasso {
    fn coefficients(&self) -> Option<&Array1<f64>> {
        self.coef.as_ref()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AlphaScore {
    pub alpha: f64,
    pub fold_mse: Vec<f64>,
    pub mean_mse: f64,
}

/// Lasso с подбором alpha по k-fold (без перемешивания) и переобучением на всех данных
#[derive(Debug, Clone)]
pub struct LassoCv {
    pub alphas: Vec<f64>,
    pub folds: usize,
    path: Vec<AlphaScore>,
    best: Option<Lasso>,
}

impl LassoCv {
    pub fn new(alphas: Vec<f64>, folds: usize) -> Self {
        Self {
            alphas,
            folds,
            path: Vec::new(),
            best: None,
        }
    }

    pub fn alpha(&self) -> Option<f64> {
        self.best.as_ref().map(|m| m.alpha)
    }

    pub fn path(&self) -> &[AlphaScore] {
        &self.path
    }

    pub fn intercept(&self) -> Option<f64> {
        self.best.as_ref().map(Lasso::intercept)
    }
}

impl Regressor for LassoCv {
    fn name(&self) -> &'static str {
        "LassoCV"
    }

    fn fit(&mut self, X: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_training_data(X, y)?;
        if self.alphas.is_empty() {
            return Err(EnergyError::InvalidParameter(
                "LassoCV needs at least one alpha".to_string(),
            ));
        }

        let splits = k_fold(X.nrows(), self.folds)?;
        let mut path = Vec::with_capacity(self.alphas.len());

        for &alpha in &self.alphas {
            let mut fold_mse = Vec::with_capacity(splits.len());
            for split in &splits {
                let X_train = X.select(Axis(0), &split.train);
                let y_train = y.select(Axis(0), &split.train);
                let X_test = X.select(Axis(0), &split.test);
                let y_test = y.select(Axis(0), &split.test);

                let mut model = Lasso::new(alpha);
                model.fit(&X_train, &y_train)?;
                let pred = model.predict(&X_test)?;
                fold_mse.push(mean_squared_error(&y_test, &pred));
            }
            let mean_mse = fold_mse.iter().sum::<f64>() / fold_mse.len() as f64;
            tracing::debug!("LassoCV alpha={} mean MSE={:.4}", alpha, mean_mse);
            path.push(AlphaScore {
                alpha,
                fold_mse,
                mean_mse,
            });
        }

        let mut best_idx = 0;
        for (idx, score) in path.iter().enumerate() {
            if score.mean_mse < path[best_idx].mean_mse {
                best_idx = idx;
            }
        }

        let mut best = Lasso::new(path[best_idx].alpha);
        best.fit(X, y)?;
        tracing::info!(
            "LassoCV selected alpha={} ({} coordinate descent iterations)",
            best.alpha,
            best.n_iter()
        );

        self.path = path;
        self.best = Some(best);
        Ok(())
    }

    fn predict(&self, X: &Array2<f64>) -> Result<Array1<f64>> {
        self.best
            .as_ref()
            .ok_or(EnergyError::NotFitted("LassoCV"))?
            .predict(X)
    }
}

impl LinearModel for LassoCv {
    fn coefficients(&self) -> Option<&Array1<f64>> {
        self.best.as_ref().and_then(|m| m.coefficients())
    }
}

/// Линейный SVR: epsilon-нечувствительная потеря + L2, стохастический субградиентный спуск.
///
/// Шаг eta_t = eta0 / (1 + eta0·lambda·t), lambda = 1 / (C·n).
/// Итоговые веса усредняются по последней эпохе.
#[derive(Debug, Clone)]
pub struct LinearSvr {
    pub c: f64,
    pub epsilon: f64,
    pub eta0: f64,
    pub max_epochs: usize,
    pub tol: f64,
    pub seed: u64,
    coef: Option<Array1<f64>>,
    intercept: f64,
}

impl LinearSvr {
    pub fn new(c: f64, epsilon: f64, max_epochs: usize, seed: u64) -> Self {
        Self {
            c,
            epsilon,
            eta0: 0.01,
            max_epochs,
            tol: 1e-4,
            seed,
            coef: None,
            intercept: 0.0,
        }
    }

    pub fn intercept(&self) -> f64 {
        self.intercept
    }

    fn residual(w: &Array1<f64>, b: f64, row: ArrayView1<f64>, target: f64) -> f64 {
        target - row.dot(w) - b
    }
}

impl Regressor for LinearSvr {
    fn name(&self) -> &'static str {
        "LinearSVR"
    }

    fn fit(&mut self, X: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_training_data(X, y)?;
        if self.c <= 0.0 || self.epsilon < 0.0 || self.max_epochs == 0 {
            return Err(EnergyError::InvalidParameter(format!(
                "LinearSVR needs C > 0, epsilon >= 0 and epochs > 0 (C={}, epsilon={}, epochs={})",
                self.c, self.epsilon, self.max_epochs
            )));
        }

        let (Xc, yc, x_mean, y_mean) = centered(X, y)?;
        let n = X.nrows();
        let p = X.ncols();
        let lambda = 1.0 / (self.c * n as f64);

        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut order: Vec<usize> = (0..n).collect();
        let mut w = Array1::<f64>::zeros(p);
        let mut b = 0.0;
        let mut avg_w = w.clone();
        let mut avg_b = 0.0;
        let mut t = 0usize;

        for epoch in 0..self.max_epochs {
            order.shuffle(&mut rng);
            let previous = avg_w.clone();
            let mut sum_w = Array1::<f64>::zeros(p);
            let mut sum_b = 0.0;

            for &i in &order {
                let eta = self.eta0 / (1.0 + self.eta0 * lambda * t as f64);
                let row = Xc.row(i);
                let r = Self::residual(&w, b, row, yc[i]);

                w *= 1.0 - eta * lambda;
                if r.abs() > self.epsilon {
                    let direction = r.signum();
                    w.scaled_add(eta * direction, &row);
                    b += eta * direction;
                }

                sum_w += &w;
                sum_b += b;
                t += 1;
            }

            avg_w = sum_w / n as f64;
            avg_b = sum_b / n as f64;

            let max_delta = (&avg_w - &previous)
                .iter()
                .fold(0.0f64, |acc, d| acc.max(d.abs()));
            if epoch > 0 && max_delta < self.tol {
                tracing::debug!("LinearSVR converged after {} epochs", epoch + 1);
                break;
            }
        }

        self.intercept = y_mean + avg_b - x_mean.dot(&avg_w);
        self.coef = Some(avg_w);
        Ok(())
    }

    fn predict(&self, X: &Array2<f64>) -> Result<Array1<f64>> {
        let coef = self.coef.as_ref().ok_or(EnergyError::NotFitted("LinearSVR"))?;
        check_features(coef.len(), X)?;
        Ok(X.dot(coef) + self.intercept)
    }
}

impl LinearModel for LinearSvr {
    fn coefficients(&self) -> Option<&Array1<f64>> {
        self.coef.as_ref()
    }
}
