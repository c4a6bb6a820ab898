//! Animal shelter outcome prediction
//!
//! Derives features from shelter intake records, fits a multinomial logistic
//! model on them and serves per-outcome probabilities over a CLI and HTTP.

pub mod data;
pub mod features;
pub mod model;
pub mod predict;
pub mod serve;
pub mod training;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

use crate::features::preprocess::{FeatureSpec, Imputation};

/// Backend used to run a fitted model
pub type InferenceBackend = burn::backend::NdArray<f32>;

/// Backend used while fitting (inference backend plus autodiff)
pub type TrainingBackend = burn::backend::Autodiff<InferenceBackend>;

/// Column used to key prediction rows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyColumn {
    #[default]
    Name,
    Id,
}

impl KeyColumn {
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyColumn::Name => "name",
            KeyColumn::Id => "id",
        }
    }
}

impl fmt::Display for KeyColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for KeyColumn {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "name" => Ok(KeyColumn::Name),
            "id" => Ok(KeyColumn::Id),
            _ => Err(format!("Unknown key column: {}. Use name or id.", s)),
        }
    }
}

/// Application-wide errors
#[derive(Debug, Error)]
pub enum ShelterError {
    #[error("Column name is not a valid string: {0:?}")]
    InvalidColumnName(Vec<u8>),

    #[error("Duplicate column after name normalization: {0}")]
    DuplicateColumn(String),

    #[error("Missing column: {0}")]
    MissingColumn(String),

    #[error("Column {column} has {found} rows, table has {expected}")]
    ColumnLength {
        column: String,
        expected: usize,
        found: usize,
    },

    #[error("Found pets that are not dogs or cats: {0:?}")]
    UnknownAnimalType(Vec<String>),

    #[error("Feature schema mismatch: {0}")]
    SchemaMismatch(String),

    #[error("Model not found at {0} - run `shelter train` first")]
    ModelNotFound(PathBuf),

    #[error("Model artifact is unreadable: {0}")]
    ModelFormat(String),

    #[error("Training failed: {0}")]
    Training(String),

    #[error("Probabilities for row {row} sum to {sum}, expected 1")]
    ProbabilityContract { row: usize, sum: f64 },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Prediction task failed: {0}")]
    Task(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ShelterError {
    /// True for errors caused by the caller's input table
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            ShelterError::InvalidColumnName(_)
                | ShelterError::DuplicateColumn(_)
                | ShelterError::MissingColumn(_)
                | ShelterError::ColumnLength { .. }
                | ShelterError::UnknownAnimalType(_)
                | ShelterError::SchemaMismatch(_)
                | ShelterError::Csv(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, ShelterError>;

/// Application configuration loaded from config.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub training: TrainingConfig,
    #[serde(default)]
    pub features: FeatureSpec,
    #[serde(default)]
    pub data: DataConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingConfig {
    /// Candidate inverse regularization strengths (C)
    pub regularization_grid: Vec<f64>,
    /// Folds for cross-validated grid search
    pub cv_folds: usize,
    pub epochs: usize,
    pub learning_rate: f64,
    /// Mini-batch size, 0 for full batch
    pub batch_size: usize,
    pub seed: u64,
    /// Missing-value strategy for numeric features
    pub imputation: Imputation,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        TrainingConfig {
            regularization_grid: vec![1e-3, 1e-2, 1e-1],
            cv_folds: 5,
            epochs: 200,
            learning_rate: 0.05,
            batch_size: 0,
            seed: 42,
            imputation: Imputation::Mean,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    pub model_path: String,
    pub key_column: KeyColumn,
}

impl Default for DataConfig {
    fn default() -> Self {
        DataConfig {
            model_path: "output/outcome_model.json".to_string(),
            key_column: KeyColumn::Name,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub listen_addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            listen_addr: "127.0.0.1:8000".to_string(),
        }
    }
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ShelterError::Config(format!("Failed to read config file {}: {}", path, e))
        })?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| ShelterError::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &str) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| ShelterError::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Reject settings the training pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        let training = &self.training;
        if training.regularization_grid.is_empty() {
            return Err(ShelterError::Config(
                "training.regularization_grid must not be empty".to_string(),
            ));
        }
        if let Some(c) = training
            .regularization_grid
            .iter()
            .find(|c| !c.is_finite() || **c <= 0.0)
        {
            return Err(ShelterError::Config(format!(
                "regularization strength must be positive, got {}",
                c
            )));
        }
        if training.regularization_grid.len() > 1 && training.cv_folds < 2 {
            return Err(ShelterError::Config(format!(
                "training.cv_folds must be at least 2, got {}",
                training.cv_folds
            )));
        }
        if training.epochs == 0 {
            return Err(ShelterError::Config("training.epochs must be positive".to_string()));
        }
        if self.features.is_empty() {
            return Err(ShelterError::Config("no features configured".to_string()));
        }
        Ok(())
    }
}
