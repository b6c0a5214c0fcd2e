//! Отбор признаков
//!
//! Три взаимозаменяемые стратегии с общим контрактом: по признакам `X` и цели `y`
//! вернуть упорядоченный список признаков и отобранное подмножество.
//! Входная таблица не изменяется.

#![allow(non_snake_case)]

use ndarray::Array1;

use crate::error::{EnergyError, Result};
use crate::frame::Frame;
use crate::types::{FeatureScore, SelectionMethod, SelectionResult};

pub mod importance;
pub mod lasso;
pub mod rfe;

pub use importance::ImportanceSelector;
pub use lasso::LassoSelector;
pub use rfe::RecursiveElimination;

pub trait FeatureSelector {
    fn method(&self) -> SelectionMethod;

    fn select(&self, X: &Frame, y: &Array1<f64>) -> Result<SelectionResult>;
}

fn check_inputs(X: &Frame, y: &Array1<f64>) -> Result<()> {
    if X.nrows() == 0 || X.ncols() == 0 {
        return Err(EnergyError::EmptyData(
            "feature selection needs a non-empty table".to_string(),
        ));
    }
    if X.nrows() != y.len() {
        return Err(EnergyError::ShapeMismatch {
            expected: format!("{} targets", X.nrows()),
            found: format!("{} targets", y.len()),
        });
    }
    Ok(())
}

/// Сортировка по убыванию оценки; при равенстве сохраняется порядок столбцов
fn rank_by_score(columns: &[String], scores: &Array1<f64>) -> Vec<FeatureScore> {
    let mut ranking: Vec<FeatureScore> = columns
        .iter()
        .zip(scores.iter())
        .map(|(feature, &score)| FeatureScore {
            feature: feature.clone(),
            score,
        })
        .collect();
    ranking.sort_by(|a, b| b.score.total_cmp(&a.score));
    ranking
}
