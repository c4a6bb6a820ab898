//! Classifier and persisted pipeline
//!
//! - classifier: softmax regression built with Burn
//! - artifact: preprocessing + classifier saved as one file

pub mod artifact;
pub mod classifier;

pub use artifact::TrainedModel;
pub use classifier::{ClassifierConfig, OutcomeClassifier};
