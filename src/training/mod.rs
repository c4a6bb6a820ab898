//! Model training
//!
//! Training loop, regularization search and metrics tracking.

pub mod metrics;
pub mod pipeline;
pub mod trainer;
pub mod tuning;

pub use metrics::{GridPoint, Metrics};
pub use pipeline::{fit_pipeline, train_from_path, TrainingReport};
pub use trainer::ClassifierTrainer;
pub use tuning::{GridSearch, KFold};
