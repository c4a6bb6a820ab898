//! Prediction and inference
//!
//! Load trained models, generate class probabilities and render them.

pub mod inference;
pub mod output;

pub use inference::{predict_from_path, PredictionTable, Predictor};
pub use output::{CsvFormat, JsonFormat, OutputFormat, PredictionFormat};
