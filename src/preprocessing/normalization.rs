//! Стандартизация признаков

#![allow(non_snake_case)]

use ndarray::{Array2, Axis};
use serde::{Deserialize, Serialize};

use crate::error::{EnergyError, Result};
use crate::frame::Frame;
use crate::types::SkipReason;

const MIN_STD: f64 = 1e-10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ColumnScaling {
    Scaled { mean: f64, std: f64 },
    Skipped { reason: SkipReason },
}

/// Параметры, вычисленные один раз на эталонной таблице
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalerParams {
    pub columns: Vec<String>,
    pub scaling: Vec<ColumnScaling>,
}

impl ScalerParams {
    pub fn get(&self, column: &str) -> Option<&ColumnScaling> {
        self.columns
            .iter()
            .position(|c| c == column)
            .map(|i| &self.scaling[i])
    }

    pub fn skipped(&self) -> Vec<&str> {
        self.columns
            .iter()
            .zip(&self.scaling)
            .filter(|(_, s)| matches!(s, ColumnScaling::Skipped { .. }))
            .map(|(c, _)| c.as_str())
            .collect()
    }
}

pub struct DataNormalizer {
    params: Option<ScalerParams>,
}

impl DataNormalizer {
    pub fn new() -> Self {
        Self { params: None }
    }

    pub fn from_params(params: ScalerParams) -> Self {
        Self {
            params: Some(params),
        }
    }

    pub fn params(&self) -> Option<&ScalerParams> {
        self.params.as_ref()
    }

    /// Среднее и генеральное стандартное отклонение по каждому столбцу
    pub fn fit(&mut self, X: &Frame) -> Result<&ScalerParams> {
        if X.nrows() == 0 {
            return Err(EnergyError::EmptyData("cannot fit scaler on empty table".to_string()));
        }

        let data = X.data();
        let mean = data
            .mean_axis(Axis(0))
            .ok_or_else(|| EnergyError::EmptyData("failed to compute mean".to_string()))?;
        let std = data.std_axis(Axis(0), 0.0);

        let scaling = mean
            .iter()
            .zip(std.iter())
            .map(|(&mean, &std)| {
                // Постоянный столбец не делим на ноль
                if std < MIN_STD {
                    ColumnScaling::Skipped {
                        reason: SkipReason::ZeroVariance,
                    }
                } else {
                    ColumnScaling::Scaled { mean, std }
                }
            })
            .collect();

        let params = ScalerParams {
            columns: X.columns().to_vec(),
            scaling,
        };
        let skipped = params.skipped();
        if !skipped.is_empty() {
            tracing::warn!("Zero variance columns left unscaled: {}", skipped.join(", "));
        }

        Ok(self.params.insert(params))
    }

    /// (X - mean) / std с параметрами, полученными в `fit`
    pub fn transform(&self, X: &Frame) -> Result<Frame> {
        let params = self.checked_params(X)?;
        let data = Self::map_columns(X.data(), &params.scaling, |x, mean, std| (x - mean) / std);
        Frame::new(X.columns().to_vec(), data)
    }

    pub fn inverse_transform(&self, X: &Frame) -> Result<Frame> {
        let params = self.checked_params(X)?;
        let data = Self::map_columns(X.data(), &params.scaling, |x, mean, std| x * std + mean);
        Frame::new(X.columns().to_vec(), data)
    }

    pub fn fit_transform(&mut self, X: &Frame) -> Result<Frame> {
        self.fit(X)?;
        self.transform(X)
    }

    fn checked_params(&self, X: &Frame) -> Result<&ScalerParams> {
        let params = self.params.as_ref().ok_or(EnergyError::NotFitted("scaler"))?;
        if params.columns.as_slice() != X.columns() {
            return Err(EnergyError::ShapeMismatch {
                expected: params.columns.join(","),
                found: X.columns().join(","),
            });
        }
        Ok(params)
    }

    fn map_columns(
        data: &Array2<f64>,
        scaling: &[ColumnScaling],
        f: impl Fn(f64, f64, f64) -> f64,
    ) -> Array2<f64> {
        let mut out = data.clone();
        for (mut column, scale) in out.columns_mut().into_iter().zip(scaling) {
            if let ColumnScaling::Scaled { mean, std } = *scale {
                column.mapv_inplace(|x| f(x, mean, std));
            }
        }
        out
    }
}

impl Default for DataNormalizer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn frame(data: Array2<f64>) -> Frame {
        Frame::new(vec!["a".into(), "b".into()], data).unwrap()
    }

    #[test]
    fn standardizes_to_zero_mean_unit_variance() {
        let mut scaler = DataNormalizer::new();
        let scaled = scaler
            .fit_transform(&frame(array![[1.0, 10.0], [2.0, 20.0], [3.0, 30.0], [4.0, 40.0]]))
            .unwrap();

        for column in scaled.data().columns() {
            assert!(column.mean().unwrap().abs() < 1e-12);
            assert!((column.std(0.0) - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn inverse_restores_original_values() {
        let original = frame(array![[0.5, -3.0], [2.25, 7.0], [9.0, 1.5], [4.0, 0.0]]);
        let mut scaler = DataNormalizer::new();
        let scaled = scaler.fit_transform(&original).unwrap();
        let restored = scaler.inverse_transform(&scaled).unwrap();

        for (a, b) in original.data().iter().zip(restored.data().iter()) {
            assert!((a - b).abs() < 1e-9);
        }
    }

    #[test]
    fn reuses_fitted_parameters_on_other_tables() {
        let train = frame(array![[1.0, 0.0], [3.0, 2.0], [5.0, 4.0]]);
        let first = frame(array![[10.0, 10.0], [20.0, 30.0]]);
        let second = frame(array![[-7.0, 1.0], [0.0, 2.0], [7.0, 3.0]]);

        let mut scaler = DataNormalizer::new();
        scaler.fit(&train).unwrap();
        let fitted = scaler.params().cloned().unwrap();

        let a = scaler.transform(&first).unwrap();
        let b = scaler.transform(&second).unwrap();
        assert_eq!(scaler.params(), Some(&fitted));

        let (mean, std) = match fitted.scaling[0] {
            ColumnScaling::Scaled { mean, std } => (mean, std),
            _ => panic!("column should be scaled"),
        };
        assert!((a.data()[[0, 0]] - (10.0 - mean) / std).abs() < 1e-12);
        assert!((b.data()[[0, 0]] - (-7.0 - mean) / std).abs() < 1e-12);

        // параметры, полученные на другой таблице, отличаются
        let mut other = DataNormalizer::new();
        other.fit(&second).unwrap();
        assert_ne!(other.params(), Some(&fitted));
    }

    #[test]
    fn stored_parameters_transform_later_tables() {
        let train = frame(array![[1.0, 0.0], [3.0, 2.0], [5.0, 4.0]]);
        let later = frame(array![[10.0, 10.0], [-2.0, 30.0]]);

        let mut scaler = DataNormalizer::new();
        scaler.fit(&train).unwrap();
        let expected = scaler.transform(&later).unwrap();

        let stored = serde_json::to_string(scaler.params().unwrap()).unwrap();
        let params: ScalerParams = serde_json::from_str(&stored).unwrap();
        let restored = DataNormalizer::from_params(params);

        assert_eq!(restored.params(), scaler.params());
        assert_eq!(restored.transform(&later).unwrap(), expected);
        let back = restored.inverse_transform(&expected).unwrap();
        for (a, b) in later.data().iter().zip(back.data().iter()) {
            assert!((a - b).abs() < 1e-9);
        }
    }

    #[test]
    fn constant_column_is_skipped() {
        let mut scaler = DataNormalizer::new();
        let scaled = scaler
            .fit_transform(&frame(array![[1.0, 5.0], [2.0, 5.0], [3.0, 5.0]]))
            .unwrap();

        let params = scaler.params().unwrap();
        assert_eq!(
            params.get("b"),
            Some(&ColumnScaling::Skipped {
                reason: SkipReason::ZeroVariance
            })
        );
        assert_eq!(scaled.column("b").unwrap().to_vec(), vec![5.0, 5.0, 5.0]);
        assert!(scaled.data().iter().all(|v| v.is_finite()));
    }

    #[test]
    fn rejects_unfitted_or_mismatched_tables() {
        let scaler = DataNormalizer::new();
        assert!(scaler.transform(&frame(array![[1.0, 2.0]])).is_err());

        let mut scaler = DataNormalizer::new();
        scaler.fit(&frame(array![[1.0, 2.0], [3.0, 4.0]])).unwrap();
        let other = Frame::new(vec!["b".into(), "a".into()], array![[1.0, 2.0]]).unwrap();
        assert!(scaler.transform(&other).is_err());
    }
}
