//! Ошибки пайплайна

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EnergyError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to parse timestamp '{value}' at line {line}: {reason}")]
    TimestampParse {
        line: usize,
        value: String,
        reason: String,
    },

    #[error("Invalid value '{value}' in column '{column}' at line {line}")]
    InvalidValue {
        line: usize,
        column: String,
        value: String,
    },

    #[error("Schema mismatch in {path}: {reason}")]
    SchemaMismatch { path: PathBuf, reason: String },

    #[error("Unknown column: {0}")]
    UnknownColumn(String),

    #[error("Empty data: {0}")]
    EmptyData(String),

    #[error("Shape mismatch: expected {expected}, found {found}")]
    ShapeMismatch { expected: String, found: String },

    #[error("{0} is not fitted")]
    NotFitted(&'static str),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Training failed: {0}")]
    Training(String),
}

pub type Result<T> = std::result::Result<T, EnergyError>;
