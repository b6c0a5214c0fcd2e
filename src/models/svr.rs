//! Ядерный SVR (epsilon-SVR из linfa-svm)

use linfa::traits::Fit;
use linfa::Dataset;
use linfa_svm::Svm;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use super::{Regressor, Tunable};
use crate::error::{EnergyError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KernelKind {
    Linear,
    Poly,
    Rbf,
    Sigmoid,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gamma {
    /// 1 / (n_features · Var(X))
    Scale,
    /// 1 / n_features
    Auto,
    Value(f64),
}

impl Gamma {
    pub fn resolve(&self, X: &Array2<f64>) -> Result<f64> {
        let n_features = X.ncols() as f64;
        let gamma = match self {
            Gamma::Auto => 1.0 / n_features,
            Gamma::Scale => {
                let variance = X.var(0.0);
                if variance > 0.0 {
                    1.0 / (n_features * variance)
                } else {
                    1.0
                }
            }
            Gamma::Value(value) => *value,
        };
        if !(gamma > 0.0 && gamma.is_finite()) {
            return Err(EnergyError::InvalidParameter(format!(
                "gamma must be a positive number, got {}",
                gamma
            )));
        }
        Ok(gamma)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SvrParams {
    pub kernel: KernelKind,
    pub c: f64,
    pub gamma: Gamma,
    pub epsilon: f64,
}

impl Default for SvrParams {
    fn default() -> Self {
        Self {
            kernel: KernelKind::Rbf,
            c: 1.0,
            gamma: Gamma::Scale,
            epsilon: 0.1,
        }
    }
}

impl SvrParams {
    pub fn validate(&self) -> Result<()> {
        if self.kernel == KernelKind::Sigmoid {
            return Err(EnergyError::InvalidParameter(
                "sigmoid kernel is not supported".to_string(),
            ));
        }
        if !(self.c > 0.0) {
            return Err(EnergyError::InvalidParameter(format!(
                "C must be positive, got {}",
                self.c
            )));
        }
        if self.epsilon < 0.0 {
            return Err(EnergyError::InvalidParameter(format!(
                "epsilon must be non-negative, got {}",
                self.epsilon
            )));
        }
        Ok(())
    }
}

/// Сетка гиперпараметров; порядок перебора: kernel, C, gamma, epsilon
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SvrGrid {
    pub kernel: Vec<KernelKind>,
    pub c: Vec<f64>,
    pub gamma: Vec<Gamma>,
    #[serde(default = "default_epsilons")]
    pub epsilon: Vec<f64>,
}

fn default_epsilons() -> Vec<f64> {
    vec![0.1]
}

impl SvrGrid {
    pub fn candidates(&self) -> Vec<SvrParams> {
        let mut out = Vec::new();
        for &kernel in &self.kernel {
            for &c in &self.c {
                for &gamma in &self.gamma {
                    for &epsilon in &self.epsilon {
                        out.push(SvrParams {
                            kernel,
                            c,
                            gamma,
                            epsilon,
                        });
                    }
                }
            }
        }
        out
    }
}

/// Полиномиальное ядро (gamma·<x, z>)^3 получается масштабированием признаков на sqrt(gamma).
///
/// linfa-svm строит плотную матрицу ядра n×n (`f64`), память растет как 8·n² байт:
/// около 1.5 ГБ на ~13.8 тыс. обучающих строк и около 1 ГБ на каждый фолд CV.
/// Для полного набора данных сетку SVR стоит держать маленькой или обучать на подвыборке.
pub struct Svr {
    params: SvrParams,
    model: Option<Svm<f64, f64>>,
    input_scale: f64,
    n_features: usize,
}

impl Svr {
    pub fn new(params: SvrParams) -> Self {
        Self {
            params,
            model: None,
            input_scale: 1.0,
            n_features: 0,
        }
    }

    pub fn params(&self) -> &SvrParams {
        &self.params
    }

    pub fn n_support_vectors(&self) -> Option<usize> {
        self.model.as_ref().map(|m| m.nsupport())
    }
}

impl Regressor for Svr {
    fn name(&self) -> &'static str {
        "SVR"
    }

    fn fit(&mut self, X: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        self.params.validate()?;
        if X.nrows() == 0 || X.ncols() == 0 {
            return Err(EnergyError::EmptyData("SVR needs data".to_string()));
        }
        if X.nrows() != y.len() {
            return Err(EnergyError::ShapeMismatch {
                expected: format!("{} targets", X.nrows()),
                found: format!("{} targets", y.len()),
            });
        }

        let gamma = self.params.gamma.resolve(X)?;
        let base = Svm::<f64, f64>::params().c_svr(self.params.c, Some(self.params.epsilon));
        let (params, input_scale) = match self.params.kernel {
            KernelKind::Linear => (base.linear_kernel(), 1.0),
            KernelKind::Rbf => (base.gaussian_kernel(1.0 / gamma), 1.0),
            KernelKind::Poly => (base.polynomial_kernel(0.0, 3.0), gamma.sqrt()),
            KernelKind::Sigmoid => {
                return Err(EnergyError::InvalidParameter(
                    "sigmoid kernel is not supported".to_string(),
                ))
            }
        };

        let records = if input_scale == 1.0 {
            X.clone()
        } else {
            X.mapv(|v| v * input_scale)
        };
        let dataset = Dataset::new(records, y.clone());
        let model = params
            .fit(&dataset)
            .map_err(|e| EnergyError::Training(e.to_string()))?;

        tracing::debug!(
            "SVR fitted: kernel={:?} C={} gamma={:.5} support vectors={}",
            self.params.kernel,
            self.params.c,
            gamma,
            model.nsupport()
        );

        self.model = Some(model);
        self.input_scale = input_scale;
        self.n_features = X.ncols();
        Ok(())
    }

    fn predict(&self, X: &Array2<f64>) -> Result<Array1<f64>> {
        let model = self.model.as_ref().ok_or(EnergyError::NotFitted("SVR"))?;
        if X.ncols() != self.n_features {
            return Err(EnergyError::ShapeMismatch {
                expected: format!("{} features", self.n_features),
                found: format!("{} features", X.ncols()),
            });
        }
        let records = if self.input_scale == 1.0 {
            X.clone()
        } else {
            X.mapv(|v| v * self.input_scale)
        };
        Ok(linfa::traits::Predict::predict(model, &records))
    }
}

impl Tunable for Svr {
    type Params = SvrParams;

    fn with_params(params: &SvrParams) -> Result<Self> {
        params.validate()?;
        Ok(Self::new(params.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::metrics::r2_score;
    use ndarray::Axis;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    #[test]
    fn gamma_resolution() {
        let X = Array2::from_shape_vec((2, 2), vec![0.0, 2.0, 2.0, 0.0]).unwrap();
        assert!((Gamma::Auto.resolve(&X).unwrap() - 0.5).abs() < 1e-12);
        // Var = 1
        assert!((Gamma::Scale.resolve(&X).unwrap() - 0.5).abs() < 1e-12);
        assert!(Gamma::Value(-1.0).resolve(&X).is_err());
    }

    #[test]
    fn gamma_serde_format() {
        let grid: SvrGrid = serde_json::from_str(
            r#"{"kernel": ["rbf", "linear"], "c": [1.0], "gamma": ["auto", {"value": 0.5}]}"#,
        )
        .unwrap();
        assert_eq!(grid.gamma, vec![Gamma::Auto, Gamma::Value(0.5)]);
        assert_eq!(grid.epsilon, vec![0.1]);
        assert_eq!(grid.candidates().len(), 4);
    }

    #[test]
    fn sigmoid_kernel_is_rejected() {
        let params = SvrParams {
            kernel: KernelKind::Sigmoid,
            ..SvrParams::default()
        };
        assert!(matches!(
            Svr::with_params(&params),
            Err(EnergyError::InvalidParameter(_))
        ));
    }

    #[test]
    fn rbf_svr_fits_smooth_function() {
        let mut rng = StdRng::seed_from_u64(5);
        let X = Array2::from_shape_fn((120, 1), |_| rng.gen_range(-3.0f64..3.0));
        let y = X.map_axis(Axis(1), |row| row[0].sin());

        let params = SvrParams {
            kernel: KernelKind::Rbf,
            c: 10.0,
            gamma: Gamma::Value(1.0),
            epsilon: 0.01,
        };
        let mut model = Svr::new(params);
        model.fit(&X, &y).unwrap();
        let pred = model.predict(&X).unwrap();
        assert!(r2_score(&y, &pred) > 0.95);
        let n_support = model.n_support_vectors().unwrap();
        assert!(n_support > 0 && n_support <= 120);
    }
}
