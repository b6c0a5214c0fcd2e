//! Подбор гиперпараметров: grid search по k-fold и итоговая оценка модели

use ndarray::{Array1, Array2, Axis};
use serde::Serialize;

use super::metrics::{evaluate, root_mean_squared_error};
use super::validation::{k_fold, Split, TrainTest};
use super::{Regressor, Tunable};
use crate::error::{EnergyError, Result};
use crate::types::ModelReport;

#[derive(Debug, Clone, Serialize)]
pub struct CandidateScore<P> {
    pub params: P,
    /// -RMSE на каждом фолде
    pub fold_scores: Vec<f64>,
    pub mean_score: f64,
    pub std_score: f64,
    pub rank: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct GridSearchResult<P> {
    pub candidates: Vec<CandidateScore<P>>,
    pub best_index: usize,
}

impl<P> GridSearchResult<P> {
    pub fn best(&self) -> &CandidateScore<P> {
        &self.candidates[self.best_index]
    }

    pub fn best_params(&self) -> &P {
        &self.best().params
    }
}

/// Grid search с метрикой -RMSE; при равенстве побеждает более ранний кандидат.
/// Ошибка обучения любого кандидата прерывает поиск.
#[derive(Debug, Clone, Copy)]
pub struct GridSearch {
    pub folds: usize,
}

impl GridSearch {
    pub fn new(folds: usize) -> Self {
        Self { folds }
    }

    fn score_candidate<M: Tunable>(
        params: &M::Params,
        X: &Array2<f64>,
        y: &Array1<f64>,
        splits: &[Split],
    ) -> Result<Vec<f64>> {
        let mut scores = Vec::with_capacity(splits.len());
        for split in splits {
            let mut model = M::with_params(params)?;
            model.fit(
                &X.select(Axis(0), &split.train),
                &y.select(Axis(0), &split.train),
            )?;
            let pred = model.predict(&X.select(Axis(0), &split.test))?;
            let truth = y.select(Axis(0), &split.test);
            scores.push(-root_mean_squared_error(&truth, &pred));
        }
        Ok(scores)
    }

    pub fn run<M: Tunable>(
        &self,
        candidates: &[M::Params],
        X: &Array2<f64>,
        y: &Array1<f64>,
    ) -> Result<GridSearchResult<M::Params>> {
        if candidates.is_empty() {
            return Err(EnergyError::InvalidParameter(
                "grid search needs at least one candidate".to_string(),
            ));
        }
        let splits = k_fold(X.nrows(), self.folds)?;

        let mut scored = Vec::with_capacity(candidates.len());
        for params in candidates {
            let fold_scores = Self::score_candidate::<M>(params, X, y, &splits).map_err(|e| {
                tracing::error!("Grid candidate {:?} failed: {}", params, e);
                e
            })?;
            let k = fold_scores.len() as f64;
            let mean = fold_scores.iter().sum::<f64>() / k;
            let std = (fold_scores.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / k).sqrt();
            tracing::debug!("Grid candidate {:?}: mean score {:.4}", params, mean);
            scored.push(CandidateScore {
                params: params.clone(),
                fold_scores,
                mean_score: mean,
                std_score: std,
                rank: 0,
            });
        }

        // стабильная сортировка сохраняет порядок кандидатов при равных оценках
        let mut order: Vec<usize> = (0..scored.len()).collect();
        order.sort_by(|&a, &b| scored[b].mean_score.total_cmp(&scored[a].mean_score));
        // равные оценки получают одинаковый (минимальный) ранг
        let mut previous: Option<(f64, usize)> = None;
        for (pos, &idx) in order.iter().enumerate() {
            let score = scored[idx].mean_score;
            let rank = match previous {
                Some((prev_score, prev_rank)) if prev_score == score => prev_rank,
                _ => pos + 1,
            };
            scored[idx].rank = rank;
            previous = Some((score, rank));
        }

        Ok(GridSearchResult {
            best_index: order[0],
            candidates: scored,
        })
    }
}

/// Метрики модели на тестовой (и опционально обучающей) выборке
pub fn report_model<M: Regressor>(
    model: &M,
    params: serde_json::Value,
    data: &TrainTest,
    report_train: bool,
) -> Result<ModelReport> {
    let n_features = data.X_test.ncols();
    let test = evaluate(&data.y_test, &model.predict(&data.X_test)?, n_features)?;
    let train = if report_train {
        Some(evaluate(
            &data.y_train,
            &model.predict(&data.X_train)?,
            n_features,
        )?)
    } else {
        None
    };

    tracing::info!("{} test metrics:\n{}", model.name(), test);
    Ok(ModelReport {
        model: model.name().to_string(),
        params,
        test,
        train,
    })
}

#[derive(Debug, Clone, Serialize)]
pub struct TunedModelReport<P> {
    pub search: GridSearchResult<P>,
    pub report: ModelReport,
}

/// Grid search на обучающей части, переобучение лучшего кандидата и оценка на тесте
pub fn tune_and_evaluate<M: Tunable>(
    candidates: &[M::Params],
    data: &TrainTest,
    folds: usize,
    report_train: bool,
) -> Result<(M, TunedModelReport<M::Params>)> {
    let search = GridSearch::new(folds).run::<M>(candidates, &data.X_train, &data.y_train)?;
    let best_params = search.best_params().clone();

    let mut model = M::with_params(&best_params)?;
    model.fit(&data.X_train, &data.y_train)?;
    tracing::info!("{} best params: {:?}", model.name(), best_params);

    let params = serde_json::to_value(&best_params)?;
    let report = report_model(&model, params, data, report_train)?;
    Ok((model, TunedModelReport { search, report }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::validation::{train_test_split, TrainTest};

    /// Предсказывает среднее обучающей цели плюс смещение
    struct OffsetMean {
        offset: f64,
        mean: Option<f64>,
    }

    impl Regressor for OffsetMean {
        fn name(&self) -> &'static str {
            "OffsetMean"
        }

        fn fit(&mut self, _X: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
            self.mean = y.mean();
            Ok(())
        }

        fn predict(&self, X: &Array2<f64>) -> Result<Array1<f64>> {
            let mean = self.mean.ok_or(EnergyError::NotFitted("OffsetMean"))?;
            Ok(Array1::from_elem(X.nrows(), mean + self.offset))
        }
    }

    impl Tunable for OffsetMean {
        type Params = f64;

        fn with_params(params: &f64) -> Result<Self> {
            if params.is_nan() {
                return Err(EnergyError::InvalidParameter("nan offset".to_string()));
            }
            Ok(Self {
                offset: *params,
                mean: None,
            })
        }
    }

    fn data() -> (Array2<f64>, Array1<f64>) {
        let X = Array2::from_shape_fn((20, 1), |(i, _)| i as f64);
        let y = Array1::from_iter((0..20).map(|i| (i % 5) as f64));
        (X, y)
    }

    #[test]
    fn best_candidate_has_highest_score() {
        let (X, y) = data();
        let result = GridSearch::new(5)
            .run::<OffsetMean>(&[3.0, 0.0, -2.0], &X, &y)
            .unwrap();
        assert_eq!(result.best_index, 1);
        assert_eq!(*result.best_params(), 0.0);
        assert_eq!(result.candidates[1].rank, 1);
        assert_eq!(result.candidates[0].rank, 3);
        assert!(result.candidates.iter().all(|c| c.fold_scores.len() == 5));
        assert!(result.best().mean_score <= 0.0);
    }

    #[test]
    fn ties_keep_first_candidate() {
        let (X, y) = data();
        let result = GridSearch::new(4)
            .run::<OffsetMean>(&[1.0, -1.0], &X, &y)
            .unwrap();
        // в каждом фолде значения 0..4, поэтому смещения ±1 дают одинаковый RMSE
        assert_eq!(
            result.candidates[0].mean_score,
            result.candidates[1].mean_score
        );
        assert_eq!(result.best_index, 0);
        assert_eq!(result.candidates[0].rank, 1);
        assert_eq!(result.candidates[1].rank, 1);
    }

    #[test]
    fn rank_after_tie_skips_tied_positions() {
        let (X, y) = data();
        let result = GridSearch::new(4)
            .run::<OffsetMean>(&[3.0, 1.0, -1.0], &X, &y)
            .unwrap();
        let ranks: Vec<usize> = result.candidates.iter().map(|c| c.rank).collect();
        assert_eq!(ranks, vec![3, 1, 1]);
        assert_eq!(result.best_index, 1);
    }

    #[test]
    fn failed_candidate_aborts_search() {
        let (X, y) = data();
        let result = GridSearch::new(5).run::<OffsetMean>(&[0.5, f64::NAN], &X, &y);
        assert!(matches!(result, Err(EnergyError::InvalidParameter(_))));
    }

    #[test]
    fn tune_and_evaluate_reports_test_and_train() {
        let (X, y) = data();
        let split = train_test_split(X.nrows(), 0.3, 194).unwrap();
        let data = TrainTest::from_split(&X, &y, &split);
        let (model, tuned) = tune_and_evaluate::<OffsetMean>(&[5.0, 0.0], &data, 3, true).unwrap();

        assert_eq!(model.offset, 0.0);
        assert_eq!(tuned.report.model, "OffsetMean");
        assert_eq!(tuned.report.test.n_samples, 6);
        assert_eq!(tuned.report.train.as_ref().unwrap().n_samples, 14);
        assert_eq!(tuned.report.params, serde_json::json!(0.0));
    }
}
