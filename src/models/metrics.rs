//! Метрики качества регрессии

use ndarray::Array1;

use crate::error::{EnergyError, Result};
use crate::types::RegressionReport;

pub fn mean_absolute_error(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> f64 {
    (y_true - y_pred).mapv(f64::abs).mean().unwrap_or(0.0)
}

pub fn mean_squared_error(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> f64 {
    (y_true - y_pred).mapv(|e| e * e).mean().unwrap_or(0.0)
}

pub fn root_mean_squared_error(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> f64 {
    mean_squared_error(y_true, y_pred).sqrt()
}

/// Коэффициент детерминации; для постоянной цели 1.0 при точном совпадении, иначе 0.0
pub fn r2_score(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> f64 {
    let mean = y_true.mean().unwrap_or(0.0);
    let ss_res: f64 = (y_true - y_pred).mapv(|e| e * e).sum();
    let ss_tot: f64 = y_true.mapv(|v| (v - mean).powi(2)).sum();
    if ss_tot == 0.0 {
        return if ss_res == 0.0 { 1.0 } else { 0.0 };
    }
    1.0 - ss_res / ss_tot
}

/// MAPE в процентах; нулевые значения цели пропускаются
pub fn mean_absolute_percentage_error(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> f64 {
    let (sum, count) = y_true
        .iter()
        .zip(y_pred.iter())
        .filter(|(t, _)| **t != 0.0)
        .fold((0.0, 0usize), |(sum, count), (t, p)| {
            (sum + ((p - t) / t).abs(), count + 1)
        });
    if count == 0 {
        return 0.0;
    }
    100.0 * sum / count as f64
}

pub fn adjusted_r2(r2: f64, n_samples: usize, n_features: usize) -> Option<f64> {
    let n = n_samples as f64;
    let p = n_features as f64;
    if n - p - 1.0 <= 0.0 {
        return None;
    }
    Some(1.0 - (1.0 - r2) * (n - 1.0) / (n - p - 1.0))
}

pub fn evaluate(
    y_true: &Array1<f64>,
    y_pred: &Array1<f64>,
    n_features: usize,
) -> Result<RegressionReport> {
    if y_true.len() != y_pred.len() {
        return Err(EnergyError::ShapeMismatch {
            expected: format!("{} predictions", y_true.len()),
            found: format!("{} predictions", y_pred.len()),
        });
    }
    if y_true.is_empty() {
        return Err(EnergyError::EmptyData("nothing to evaluate".to_string()));
    }

    let r2 = r2_score(y_true, y_pred);
    let mse = mean_squared_error(y_true, y_pred);

    Ok(RegressionReport {
        r2,
        adjusted_r2: adjusted_r2(r2, y_true.len(), n_features),
        accuracy: 100.0 - mean_absolute_percentage_error(y_true, y_pred),
        mae: mean_absolute_error(y_true, y_pred),
        mse,
        rmse: mse.sqrt(),
        n_samples: y_true.len(),
        n_features,
    })
}
