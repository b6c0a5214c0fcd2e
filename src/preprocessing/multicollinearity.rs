//! Анализ мультиколлинеарности (VIF)

#![allow(non_snake_case)]

use ndarray::Axis;

use crate::error::Result;
use crate::frame::Frame;
use crate::models::linear::OrdinaryLeastSquares;
use crate::types::{SkipReason, VifEntry, VifOutcome};

const MIN_VARIANCE: f64 = 1e-12;

/// VIF_j = 1 / (1 - R²_j), где R²_j — регрессия признака j на остальные.
/// Постоянные столбцы не участвуют в расчете и помечаются как пропущенные.
pub fn variance_inflation_factors(X: &Frame) -> Result<Vec<VifEntry>> {
    let data = X.data();
    let variances = data.var_axis(Axis(0), 0.0);

    let informative: Vec<usize> = (0..X.ncols())
        .filter(|&j| variances[j] >= MIN_VARIANCE)
        .collect();

    let mut entries = Vec::with_capacity(X.ncols());
    for (j, name) in X.columns().iter().enumerate() {
        if variances[j] < MIN_VARIANCE {
            entries.push(VifEntry {
                feature: name.clone(),
                vif: VifOutcome::Skipped {
                    reason: SkipReason::ZeroVariance,
                },
            });
            continue;
        }

        let others: Vec<usize> = informative.iter().copied().filter(|&k| k != j).collect();
        let value = if others.is_empty() {
            1.0
        } else {
            let x = data.select(Axis(1), &others);
            let y = data.column(j).to_owned();
            let model = OrdinaryLeastSquares::fit(&x, &y)?;
            let r2 = model.r2(&x, &y);
            if r2 >= 1.0 {
                f64::INFINITY
            } else {
                1.0 / (1.0 - r2)
            }
        };

        entries.push(VifEntry {
            feature: name.clone(),
            vif: VifOutcome::Computed { value },
        });
    }

    Ok(entries)
}
