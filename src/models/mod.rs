//! ML модели

#![allow(non_snake_case)]

use ndarray::{Array1, Array2};
use serde::Serialize;

use crate::error::Result;

pub mod boosting;
pub mod linear;
pub mod metrics;
pub mod svr;
pub mod tree;
pub mod tuning;
pub mod validation;

pub use boosting::{BoostingGrid, BoostingParams, GradientBoosting};
pub use linear::{Lasso, LassoCv, LinearSvr, OrdinaryLeastSquares};
pub use svr::{Gamma, KernelKind, Svr, SvrGrid, SvrParams};
pub use tree::{RandomForest, RegressionTree, TreeParams};

/// Общий контракт регрессионных моделей
pub trait Regressor {
    fn name(&self) -> &'static str;

    fn fit(&mut self, X: &Array2<f64>, y: &Array1<f64>) -> Result<()>;

    fn predict(&self, X: &Array2<f64>) -> Result<Array1<f64>>;
}

/// Модель, которую можно построить из набора гиперпараметров (для grid search)
pub trait Tunable: Regressor + Sized {
    type Params: Clone + std::fmt::Debug + Serialize;

    fn with_params(params: &Self::Params) -> Result<Self>;
}

/// Линейная модель с доступом к коэффициентам (для RFE)
pub trait LinearModel: Regressor {
    fn coefficients(&self) -> Option<&Array1<f64>>;
}
