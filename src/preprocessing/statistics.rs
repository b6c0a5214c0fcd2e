//! Описательная статистика столбцов

use ndarray::{Array2, ArrayView1};

use crate::error::{EnergyError, Result};
use crate::frame::Frame;
use crate::types::ColumnSummary;

/// Квантиль с линейной интерполяцией между порядковыми статистиками
pub fn quantile(values: ArrayView1<'_, f64>, q: f64) -> Option<f64> {
    if values.is_empty() || !(0.0..=1.0).contains(&q) {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    Some(quantile_sorted(&sorted, q))
}

pub(crate) fn quantile_sorted(sorted: &[f64], q: f64) -> f64 {
    let pos = (sorted.len() - 1) as f64 * q;
    let lower = pos.floor() as usize;
    let upper = pos.ceil() as usize;
    let frac = pos - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * frac
}

/// Стандартное отклонение; `ddof = 0` — генеральное, `ddof = 1` — выборочное
pub fn std_dev(values: ArrayView1<'_, f64>, ddof: f64) -> Option<f64> {
    if values.len() as f64 <= ddof {
        return None;
    }
    Some(values.std(ddof))
}

/// Несмещенный коэффициент асимметрии (как в pandas)
pub fn skewness(values: ArrayView1<'_, f64>) -> Option<f64> {
    let n = values.len() as f64;
    if n < 3.0 {
        return None;
    }
    let m = values.mean()?;
    let m2 = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / n;
    let m3 = values.iter().map(|v| (v - m).powi(3)).sum::<f64>() / n;
    if m2 < 1e-14 {
        return None;
    }
    let g1 = m3 / m2.powf(1.5);
    Some(g1 * (n * (n - 1.0)).sqrt() / (n - 2.0))
}

/// Несмещенный эксцесс (excess kurtosis, как в pandas)
pub fn kurtosis(values: ArrayView1<'_, f64>) -> Option<f64> {
    let n = values.len() as f64;
    if n < 4.0 {
        return None;
    }
    let m = values.mean()?;
    let m2 = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / n;
    let m4 = values.iter().map(|v| (v - m).powi(4)).sum::<f64>() / n;
    if m2 < 1e-14 {
        return None;
    }
    let g2 = m4 / (m2 * m2) - 3.0;
    Some(((n + 1.0) * g2 + 6.0) * (n - 1.0) / ((n - 2.0) * (n - 3.0)))
}

pub fn summarize(name: &str, values: ArrayView1<'_, f64>) -> Result<ColumnSummary> {
    if values.is_empty() {
        return Err(EnergyError::EmptyData(format!("column '{}' is empty", name)));
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    Ok(ColumnSummary {
        column: name.to_string(),
        count: sorted.len(),
        mean: values.mean().unwrap_or(f64::NAN),
        std: std_dev(values, 1.0).unwrap_or(f64::NAN),
        min: sorted[0],
        q1: quantile_sorted(&sorted, 0.25),
        median: quantile_sorted(&sorted, 0.5),
        q3: quantile_sorted(&sorted, 0.75),
        max: sorted[sorted.len() - 1],
        skewness: skewness(values),
        kurtosis: kurtosis(values),
    })
}

/// Аналог `describe()` для всех столбцов таблицы
pub fn describe(frame: &Frame) -> Result<Vec<ColumnSummary>> {
    frame
        .columns()
        .iter()
        .enumerate()
        .map(|(j, name)| summarize(name, frame.data().column(j)))
        .collect()
}

/// Матрица корреляций Пирсона; для постоянного столбца корреляция равна NaN
pub fn correlation_matrix(frame: &Frame) -> Array2<f64> {
    let data = frame.data();
    let n = data.ncols();
    let mut corr = Array2::from_elem((n, n), f64::NAN);

    let centered: Vec<Vec<f64>> = (0..n)
        .map(|j| {
            let col = data.column(j);
            let m = col.mean().unwrap_or(0.0);
            col.iter().map(|v| v - m).collect()
        })
        .collect();
    let norms: Vec<f64> = centered
        .iter()
        .map(|c| c.iter().map(|v| v * v).sum::<f64>().sqrt())
        .collect();

    for i in 0..n {
        for j in i..n {
            if norms[i] < 1e-12 || norms[j] < 1e-12 {
                continue;
            }
            let dot: f64 = centered[i].iter().zip(&centered[j]).map(|(a, b)| a * b).sum();
            let r = dot / (norms[i] * norms[j]);
            corr[[i, j]] = r;
            corr[[j, i]] = r;
        }
    }

    corr
}
