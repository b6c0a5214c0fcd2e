//! Конфигурация пайплайна
//!
//! Все поля имеют значения по умолчанию, поэтому JSON-конфигурация может
//! содержать только переопределяемые параметры.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{EnergyError, Result};
use crate::models::boosting::BoostingGrid;
use crate::models::svr::{Gamma, KernelKind, SvrGrid};

pub const CONFIG_ENV: &str = "ENERGY_ML_CONFIG";
pub const ADDR_ENV: &str = "ENERGY_ML_ADDR";
pub const DEFAULT_ADDR: &str = "0.0.0.0:8000";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub training_path: PathBuf,
    pub testing_path: PathBuf,
    pub target: String,
    pub seed: u64,
    pub test_size: f64,
    pub cv_folds: usize,
    /// Столбцы, удаляемые сразу после загрузки (случайные переменные)
    pub drop_columns: Vec<String>,
    /// Столбцы, к которым не применяется IQR
    pub clip_exclude: Vec<String>,
    pub clip_lower: bool,
    pub clip_upper: bool,
    /// Столбцы, удаляемые перед отбором признаков
    pub final_drop: Vec<String>,
    /// Признаки для обучения моделей; пусто = все
    pub features: Vec<String>,
    pub selection: SelectionConfig,
    pub svr: Option<SvrGrid>,
    pub boosting: Option<BoostingGrid>,
    pub report_train: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            training_path: PathBuf::from("data/training.csv"),
            testing_path: PathBuf::from("data/testing.csv"),
            target: "Appliances".to_string(),
            seed: 194,
            test_size: 0.3,
            cv_folds: 5,
            drop_columns: vec!["rv1".to_string(), "rv2".to_string()],
            clip_exclude: ["lights", "Weekend", "Day_of_week", "Month", "Day", "Hour"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            clip_lower: true,
            clip_upper: true,
            final_drop: vec!["lights".to_string()],
            features: ["T3", "RH_3", "T8", "Press_mm_hg", "NSM", "Hour"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            selection: SelectionConfig::default(),
            svr: Some(SvrGrid {
                kernel: vec![KernelKind::Rbf],
                c: vec![0.1, 1.0, 10.0],
                gamma: vec![Gamma::Auto],
                epsilon: vec![0.1],
            }),
            boosting: Some(BoostingGrid::default()),
            report_train: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionConfig {
    pub enabled: bool,
    pub forest_trees: usize,
    pub forest_max_depth: usize,
    pub lasso_alphas: Vec<f64>,
    pub rfe_features: usize,
    /// Число эпох SGD для LinearSvr внутри RFE
    pub rfe_max_iter: usize,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            forest_trees: 100,
            forest_max_depth: 12,
            lasso_alphas: vec![10.0, 1.0, 0.1, 0.01, 0.001],
            rfe_features: 8,
            rfe_max_iter: 200,
        }
    }
}

impl PipelineConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Конфигурация из файла, указанного в `ENERGY_ML_CONFIG`, иначе значения по умолчанию
    pub fn from_env() -> Result<Self> {
        match std::env::var(CONFIG_ENV) {
            Ok(path) => {
                tracing::info!("Loading pipeline config from {}", path);
                Self::from_file(Path::new(&path))
            }
            Err(_) => Ok(Self::default()),
        }
    }

    /// Конфигурация из тела запроса; пустое тело дает `fallback`
    pub fn from_request_body(body: &[u8], fallback: &Self) -> Result<Self> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(fallback.clone());
        }
        let config: Self = serde_json::from_slice(body)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.test_size > 0.0 && self.test_size < 1.0) {
            return Err(EnergyError::InvalidParameter(format!(
                "test_size must be in (0, 1), got {}",
                self.test_size
            )));
        }
        if self.cv_folds < 2 {
            return Err(EnergyError::InvalidParameter(format!(
                "cv_folds must be at least 2, got {}",
                self.cv_folds
            )));
        }
        if self.selection.rfe_features == 0 {
            return Err(EnergyError::InvalidParameter(
                "rfe_features must be positive".to_string(),
            ));
        }
        if self.selection.lasso_alphas.iter().any(|a| *a < 0.0) {
            return Err(EnergyError::InvalidParameter(
                "lasso alphas must be non-negative".to_string(),
            ));
        }
        Ok(())
    }
}

pub fn server_addr() -> String {
    std::env::var(ADDR_ENV).unwrap_or_else(|_| DEFAULT_ADDR.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let config: PipelineConfig =
            serde_json::from_str(r#"{"seed": 7, "selection": {"rfe_features": 4}}"#).unwrap();
        assert_eq!(config.seed, 7);
        assert_eq!(config.selection.rfe_features, 4);
        assert_eq!(config.selection.lasso_alphas.len(), 5);
        assert_eq!(config.target, "Appliances");
        assert!((config.test_size - 0.3).abs() < 1e-12);
    }

    #[test]
    fn request_body_falls_back_only_when_empty() {
        let fallback = PipelineConfig {
            seed: 42,
            ..PipelineConfig::default()
        };
        assert_eq!(PipelineConfig::from_request_body(b"", &fallback).unwrap().seed, 42);
        assert_eq!(PipelineConfig::from_request_body(b" \n", &fallback).unwrap().seed, 42);
        assert_eq!(PipelineConfig::from_request_body(b"{}", &fallback).unwrap().seed, 194);
        assert_eq!(
            PipelineConfig::from_request_body(br#"{"seed": 7}"#, &fallback).unwrap().seed,
            7
        );
    }

    #[test]
    fn malformed_request_body_is_an_error() {
        let fallback = PipelineConfig::default();
        assert!(matches!(
            PipelineConfig::from_request_body(br#"{"seed":"not-a-number"}"#, &fallback),
            Err(EnergyError::Json(_))
        ));
        assert!(matches!(
            PipelineConfig::from_request_body(b"{seed: 7", &fallback),
            Err(EnergyError::Json(_))
        ));
        assert!(matches!(
            PipelineConfig::from_request_body(br#"{"test_size": 5}"#, &fallback),
            Err(EnergyError::InvalidParameter(_))
        ));
    }

    #[test]
    fn validate_rejects_bad_split() {
        let config = PipelineConfig {
            test_size: 1.5,
            ..PipelineConfig::default()
        };
        assert!(config.validate().is_err());
        assert!(PipelineConfig::default().validate().is_ok());
    }
}
