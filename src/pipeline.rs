//! Пайплайн: загрузка → типы → календарные признаки → выбросы → стандартизация →
//! праздники → отбор признаков → обучение и оценка моделей
//!
//! Каждый этап принимает результат предыдущего и возвращает новую структуру.

#![allow(non_snake_case)]

use ndarray::Array1;
use serde::Serialize;

use crate::config::PipelineConfig;
use crate::error::{EnergyError, Result};
use crate::frame::Frame;
use crate::loader::{load_partitions, normalize_types};
use crate::models::boosting::{BoostingParams, GradientBoosting};
use crate::models::svr::{Svr, SvrParams};
use crate::models::tree::{RandomForest, TreeParams};
use crate::models::tuning::{report_model, tune_and_evaluate, TunedModelReport};
use crate::models::validation::{train_test_split, TrainTest};
use crate::models::Regressor;
use crate::preprocessing::multicollinearity::variance_inflation_factors;
use crate::preprocessing::statistics::{correlation_matrix, describe};
use crate::preprocessing::{
    ClipSides, DataNormalizer, FeatureEngineer, HolidayCalendar, OutlierClipper, ScalerParams,
};
use crate::selection::{FeatureSelector, ImportanceSelector, LassoSelector, RecursiveElimination};
use crate::types::{
    ColumnBounds, ColumnSummary, FeatureScore, ModelReport, ObservationTable, RawTable,
    SelectionResult, VifEntry,
};

/// Результат предобработки: итоговая таблица и все вычисленные параметры
#[derive(Debug, Clone)]
pub struct PreparedData {
    pub frame: Frame,
    pub exploration: Exploration,
    pub clip_bounds: Vec<ColumnBounds>,
    pub scaler: ScalerParams,
    pub holiday_rows: usize,
}

/// Разведочный анализ таблицы до обработки выбросов
#[derive(Debug, Clone, Serialize)]
pub struct Exploration {
    pub summary: Vec<ColumnSummary>,
    /// Корреляция Пирсона с целевой переменной, по убыванию |r|
    pub target_correlation: Vec<FeatureScore>,
    pub vif: Vec<VifEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SelectionComparison {
    pub result: SelectionResult,
    /// Случайный лес на отобранных признаках
    pub report: ModelReport,
}

#[derive(Debug, Clone, Serialize)]
pub struct SelectionReport {
    /// Случайный лес на всех признаках
    pub all_features: ModelReport,
    pub strategies: Vec<SelectionComparison>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TrainingReport {
    pub features: Vec<String>,
    pub n_train: usize,
    pub n_test: usize,
    pub svr: Option<TunedModelReport<SvrParams>>,
    pub boosting: Option<TunedModelReport<BoostingParams>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    pub rows: usize,
    pub columns: Vec<String>,
    pub holiday_rows: usize,
    pub exploration: Exploration,
    pub clip_bounds: Vec<ColumnBounds>,
    pub scaler: ScalerParams,
    pub selection: Option<SelectionReport>,
    pub training: TrainingReport,
}

pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Полный прогон по файлам из конфигурации
    pub fn run(&self) -> Result<PipelineReport> {
        tracing::info!(
            "Loading partitions {} and {}",
            self.config.training_path.display(),
            self.config.testing_path.display()
        );
        let raw = load_partitions(&self.config.training_path, &self.config.testing_path)?;
        self.run_table(raw)
    }

    pub fn run_table(&self, raw: RawTable) -> Result<PipelineReport> {
        let prepared = self.prepare(raw)?;

        let selection = if self.config.selection.enabled {
            Some(self.select_features(&prepared.frame)?)
        } else {
            None
        };
        let training = self.train(&prepared.frame)?;

        Ok(PipelineReport {
            rows: prepared.frame.nrows(),
            columns: prepared.frame.columns().to_vec(),
            holiday_rows: prepared.holiday_rows,
            exploration: prepared.exploration,
            clip_bounds: prepared.clip_bounds,
            scaler: prepared.scaler,
            selection,
            training,
        })
    }

    /// Предобработка: таблица с признаками, готовая к отбору и обучению
    pub fn prepare(&self, raw: RawTable) -> Result<PreparedData> {
        let table = normalize_types(raw)?;
        if table.timestamps.is_empty() {
            return Err(EnergyError::EmptyData("no observations loaded".to_string()));
        }
        let table = self.drop_initial_columns(table)?;
        let original_numeric: Vec<String> = table.numeric.columns().to_vec();

        let holidays = HolidayCalendar::belgium(FeatureEngineer::years(&table.timestamps));
        let calendar = FeatureEngineer::calendar(&table.timestamps, &holidays);
        let frame = FeatureEngineer::with_time_features(&table, &calendar)?;
        tracing::info!(
            "Time features added: {} rows, {} columns",
            frame.nrows(),
            frame.ncols()
        );

        let exploration = self.explore(&frame)?;

        let clip_columns: Vec<&str> = frame
            .columns()
            .iter()
            .map(String::as_str)
            .filter(|c| !self.config.clip_exclude.iter().any(|e| e.as_str() == *c))
            .collect();
        let sides = ClipSides {
            lower: self.config.clip_lower,
            upper: self.config.clip_upper,
        };
        let clipped = OutlierClipper::clip_frame(&frame, Some(&clip_columns[..]), sides)?;

        let scale_columns: Vec<&str> = original_numeric
            .iter()
            .map(String::as_str)
            .filter(|c| *c != self.config.target && clipped.frame.has_column(c))
            .collect();
        let mut normalizer = DataNormalizer::new();
        let scaled = normalizer.fit_transform(&clipped.frame.select(&scale_columns)?)?;
        let mut frame = clipped.frame;
        for name in scaled.columns() {
            frame = frame.with_column(name, scaled.column(name)?.to_owned())?;
        }
        let scaler = normalizer
            .params()
            .cloned()
            .ok_or(EnergyError::NotFitted("DataNormalizer"))?;

        let frame = FeatureEngineer::with_holiday(&frame, &calendar)?;
        let holiday_rows = calendar.iter().filter(|c| c.holiday).count();

        let final_drop = present(&frame, &self.config.final_drop);
        let frame = frame.drop(&final_drop)?;
        tracing::info!(
            "Preprocessing finished: {} rows, {} columns, {} holiday rows",
            frame.nrows(),
            frame.ncols(),
            holiday_rows
        );

        Ok(PreparedData {
            frame,
            exploration,
            clip_bounds: clipped.bounds,
            scaler,
            holiday_rows,
        })
    }

    fn drop_initial_columns(&self, table: ObservationTable) -> Result<ObservationTable> {
        let to_drop = present(&table.numeric, &self.config.drop_columns);
        Ok(ObservationTable {
            numeric: table.numeric.drop(&to_drop)?,
            ..table
        })
    }

    fn explore(&self, frame: &Frame) -> Result<Exploration> {
        let summary = describe(frame)?;

        let target_idx = frame.column_index(&self.config.target)?;
        let corr = correlation_matrix(frame);
        let mut target_correlation: Vec<FeatureScore> = frame
            .columns()
            .iter()
            .enumerate()
            .filter(|(j, _)| *j != target_idx && !corr[[*j, target_idx]].is_nan())
            .map(|(j, name)| FeatureScore {
                feature: name.clone(),
                score: corr[[j, target_idx]],
            })
            .collect();
        target_correlation.sort_by(|a, b| b.score.abs().total_cmp(&a.score.abs()));

        let (features, _) = frame.split_target(&self.config.target)?;
        let vif = variance_inflation_factors(&features)?;

        Ok(Exploration {
            summary,
            target_correlation,
            vif,
        })
    }

    fn selectors(&self) -> Vec<Box<dyn FeatureSelector>> {
        let cfg = &self.config.selection;
        vec![
            Box::new(ImportanceSelector::new(
                cfg.forest_trees,
                cfg.forest_max_depth,
                self.config.seed,
            )),
            Box::new(LassoSelector::new(
                cfg.lasso_alphas.clone(),
                self.config.cv_folds,
            )),
            Box::new(RecursiveElimination::new(
                cfg.rfe_features,
                cfg.rfe_max_iter,
                self.config.seed,
            )),
        ]
    }

    /// Три стратегии отбора и сравнение случайного леса на всех и на отобранных признаках
    pub fn select_features(&self, frame: &Frame) -> Result<SelectionReport> {
        let (X, y) = frame.split_target(&self.config.target)?;
        let all_features = self.forest_report(&X, &y)?;

        let mut strategies = Vec::new();
        for selector in self.selectors() {
            let result = selector.select(&X, &y)?;
            tracing::info!("{:?} selected {:?}", result.method, result.selected);
            let report = if result.selected.is_empty() {
                tracing::warn!("{:?} selected no features", result.method);
                all_features.clone()
            } else {
                self.forest_report(&X.select(&result.selected)?, &y)?
            };
            strategies.push(SelectionComparison { result, report });
        }

        Ok(SelectionReport {
            all_features,
            strategies,
        })
    }

    fn forest_report(&self, X: &Frame, y: &Array1<f64>) -> Result<ModelReport> {
        let data = self.split(X, y)?;
        let params = TreeParams {
            max_depth: self.config.selection.forest_max_depth,
            ..TreeParams::default()
        };
        let mut forest = RandomForest::new(
            self.config.selection.forest_trees,
            params.clone(),
            self.config.seed,
        );
        forest.fit(&data.X_train, &data.y_train)?;
        let params = serde_json::json!({
            "n_trees": self.config.selection.forest_trees,
            "tree": params,
            "features": X.columns(),
        });
        report_model(&forest, params, &data, false)
    }

    fn split(&self, X: &Frame, y: &Array1<f64>) -> Result<TrainTest> {
        let split = train_test_split(X.nrows(), self.config.test_size, self.config.seed)?;
        Ok(TrainTest::from_split(X.data(), y, &split))
    }

    /// Обучение SVR и градиентного бустинга на выбранных признаках
    pub fn train(&self, frame: &Frame) -> Result<TrainingReport> {
        let (X_all, y) = frame.split_target(&self.config.target)?;
        let X = if self.config.features.is_empty() {
            X_all
        } else {
            X_all.select(&self.config.features)?
        };
        let data = self.split(&X, &y)?;
        tracing::info!(
            "Training on {} features: {} train rows, {} test rows",
            X.ncols(),
            data.y_train.len(),
            data.y_test.len()
        );

        let svr = match &self.config.svr {
            Some(grid) => {
                let (model, report) = tune_and_evaluate::<Svr>(
                    &grid.candidates(),
                    &data,
                    self.config.cv_folds,
                    self.config.report_train,
                )?;
                if let Some(n_support) = model.n_support_vectors() {
                    tracing::info!("{} kept {} support vectors", model.name(), n_support);
                }
                Some(report)
            }
            None => None,
        };

        let boosting = match &self.config.boosting {
            Some(grid) => {
                let (model, report) = tune_and_evaluate::<GradientBoosting>(
                    &grid.candidates(),
                    &data,
                    self.config.cv_folds,
                    self.config.report_train,
                )?;
                tracing::info!("{} kept {} trees", model.name(), model.n_trees());
                Some(report)
            }
            None => None,
        };

        Ok(TrainingReport {
            features: X.columns().to_vec(),
            n_train: data.y_train.len(),
            n_test: data.y_test.len(),
            svr,
            boosting,
        })
    }
}

/// Имена из списка, присутствующие в таблице; отсутствующие логируются
fn present(frame: &Frame, names: &[String]) -> Vec<String> {
    names
        .iter()
        .filter(|name| {
            let found = frame.has_column(name);
            if !found {
                tracing::warn!("Column '{}' not present, skipping", name);
            }
            found
        })
        .cloned()
        .collect()
}
