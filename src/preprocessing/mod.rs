/// Модуль предобработки данных

pub mod calendar;
pub mod feature_engineering;
pub mod multicollinearity;
pub mod normalization;
pub mod outliers;
pub mod statistics;

pub use calendar::HolidayCalendar;
pub use feature_engineering::FeatureEngineer;
pub use normalization::{ColumnScaling, DataNormalizer, ScalerParams};
pub use outliers::{ClipSides, ClippedFrame, OutlierClipper};
