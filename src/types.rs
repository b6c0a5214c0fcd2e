/// Типы данных пайплайна

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::frame::Frame;

pub const TIMESTAMP_COLUMN: &str = "date";
pub const WEEK_STATUS_COLUMN: &str = "WeekStatus";
pub const DAY_OF_WEEK_COLUMN: &str = "Day_of_week";

/// Производные календарные столбцы
pub const WEEKEND_COLUMN: &str = "Weekend";
pub const MONTH_COLUMN: &str = "Month";
pub const DAY_COLUMN: &str = "Day";
pub const HOUR_COLUMN: &str = "Hour";
pub const NSM_COLUMN: &str = "NSM";
pub const HOLIDAY_COLUMN: &str = "Holiday";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawTimestamp {
    pub line: usize,
    pub value: String,
}

/// Объединенные партиции CSV до приведения типов
#[derive(Debug, Clone)]
pub struct RawTable {
    pub timestamps: Vec<RawTimestamp>,
    pub numeric: Frame,
    pub week_status: Vec<String>,
    pub day_of_week: Vec<String>,
}

/// Наблюдения с разобранной временной меткой
#[derive(Debug, Clone)]
pub struct ObservationTable {
    pub timestamps: Vec<NaiveDateTime>,
    pub numeric: Frame,
    pub week_status: Vec<String>,
    pub day_of_week: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarFeatures {
    pub day_of_week: u32, // 0 = понедельник
    pub weekend: bool,
    pub month: u32,
    pub day: u32,
    pub hour: u32,
    pub nsm: u32, // секунды с полуночи
    pub holiday: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    ZeroVariance,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnBounds {
    pub column: String,
    pub q1: f64,
    pub q3: f64,
    pub iqr: f64,
    pub lower: f64,
    pub upper: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnSummary {
    pub column: String,
    pub count: usize,
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    pub max: f64,
    pub skewness: Option<f64>,
    pub kurtosis: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum VifOutcome {
    Computed { value: f64 },
    Skipped { reason: SkipReason },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VifEntry {
    pub feature: String,
    pub vif: VifOutcome,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionMethod {
    ImportanceThreshold,
    Lasso,
    RecursiveElimination,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureScore {
    pub feature: String,
    pub score: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectionResult {
    pub method: SelectionMethod,
    pub ranking: Vec<FeatureScore>, // по убыванию значимости
    pub selected: Vec<String>,
    #[serde(default)]
    pub details: Option<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionReport {
    pub r2: f64,
    pub adjusted_r2: Option<f64>,
    pub accuracy: f64, // 100 - MAPE
    pub mae: f64,
    pub mse: f64,
    pub rmse: f64,
    pub n_samples: usize,
    pub n_features: usize,
}

impl std::fmt::Display for RegressionReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "R^2                 : {:0.2}%", self.r2 * 100.0)?;
        if let Some(adjusted) = self.adjusted_r2 {
            writeln!(f, "Adjusted R^2        : {:0.2}%", adjusted * 100.0)?;
        }
        writeln!(f, "Accuracy            : {:0.2}%", self.accuracy)?;
        writeln!(f, "MAE                 : {:0.2}", self.mae)?;
        writeln!(f, "MSE                 : {:0.2}", self.mse)?;
        write!(f, "RMSE                : {:0.2}", self.rmse)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelReport {
    pub model: String,
    pub params: serde_json::Value,
    pub test: RegressionReport,
    pub train: Option<RegressionReport>,
}
