//! Feature extraction and encoding
//!
//! Converts raw intake records into model-ready features.

pub mod animal;
pub mod preprocess;

pub use animal::{add_features, HairType, Neutered, Sex};
pub use preprocess::{FeatureSpec, Imputation, Preprocessor};
