//! Energy ML - прогноз энергопотребления бытовых приборов

pub mod config;
pub mod error;
pub mod frame;
pub mod loader;
pub mod models;
pub mod pipeline;
pub mod preprocessing;
pub mod selection;
pub mod types;

pub use types::*;

// Re-export для удобства
pub use config::PipelineConfig;
pub use error::{EnergyError, Result};
pub use frame::Frame;
pub use models::{Regressor, Tunable};
pub use pipeline::{Pipeline, PipelineReport, PreparedData};
pub use selection::FeatureSelector;
