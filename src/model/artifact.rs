//! Fitted pipeline and its single-file artifact
//!
//! The artifact is a JSON envelope holding the preprocessor, class labels,
//! the chosen regularization strength and the classifier's Burn record bytes.

use std::path::Path;

use burn::module::Module;
use burn::record::{BinBytesRecorder, FullPrecisionSettings, Recorder};
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;
use serde::{Deserialize, Serialize};

use crate::data::Table;
use crate::features::{FeatureSpec, Preprocessor};
use crate::model::classifier::{ClassifierConfig, OutcomeClassifier};
use crate::{Result, ShelterError};

/// Bumped whenever the envelope layout changes
const FORMAT_VERSION: u32 = 1;

#[derive(Serialize, Deserialize)]
struct ArtifactEnvelope {
    format_version: u32,
    classes: Vec<String>,
    regularization: f64,
    preprocessor: Preprocessor,
    classifier: Vec<u8>,
}

/// Preprocessing + classifier fitted together
#[derive(Debug, Clone)]
pub struct TrainedModel<B: Backend> {
    preprocessor: Preprocessor,
    classifier: OutcomeClassifier<B>,
    classes: Vec<String>,
    regularization: f64,
    device: B::Device,
}

impl<B: Backend> TrainedModel<B> {
    pub fn new(
        preprocessor: Preprocessor,
        classifier: OutcomeClassifier<B>,
        classes: Vec<String>,
        regularization: f64,
        device: B::Device,
    ) -> Self {
        TrainedModel {
            preprocessor,
            classifier,
            classes,
            regularization,
            device,
        }
    }

    /// Class labels in output order
    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn feature_spec(&self) -> &FeatureSpec {
        self.preprocessor.spec()
    }

    pub fn regularization(&self) -> f64 {
        self.regularization
    }

    /// Fail unless `spec` is exactly the schema the model was fitted on
    pub fn check_schema(&self, spec: &FeatureSpec) -> Result<()> {
        if spec == self.feature_spec() {
            Ok(())
        } else {
            Err(ShelterError::SchemaMismatch(format!(
                "model was fitted on {:?}, got {:?}",
                self.feature_spec(),
                spec
            )))
        }
    }

    /// Per-row class probabilities for a feature table
    pub fn predict_proba(&self, table: &Table) -> Result<Vec<Vec<f64>>> {
        let rows = self.preprocessor.transform(table)?;
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let n_rows = rows.len();
        let dim = self.preprocessor.output_dim();
        let flat: Vec<f32> = rows.into_iter().flatten().collect();
        let features =
            Tensor::<B, 1>::from_floats(flat.as_slice(), &self.device).reshape([n_rows, dim]);

        let probs = self
            .classifier
            .probabilities(features)
            .into_data()
            .to_vec::<f32>()
            .map_err(|e| ShelterError::ModelFormat(format!("{:?}", e)))?;

        Ok(probs
            .chunks(self.classes.len())
            .map(|row| {
                // Renormalize in f64 so rows sum to 1 well inside tolerance
                let sum: f64 = row.iter().map(|p| *p as f64).sum();
                row.iter().map(|p| *p as f64 / sum).collect()
            })
            .collect())
    }

    /// Write the artifact to `path`
    pub fn save(&self, path: &Path) -> Result<()>
    where
        B::FloatElem: serde::Serialize + serde::de::DeserializeOwned,
        B::IntElem: serde::Serialize + serde::de::DeserializeOwned,
    {
        let recorder = BinBytesRecorder::<FullPrecisionSettings>::default();
        let classifier = recorder
            .record(self.classifier.clone().into_record(), ())
            .map_err(|e| ShelterError::ModelFormat(e.to_string()))?;

        let envelope = ArtifactEnvelope {
            format_version: FORMAT_VERSION,
            classes: self.classes.clone(),
            regularization: self.regularization,
            preprocessor: self.preprocessor.clone(),
            classifier,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_vec(&envelope)?)?;
        log::info!("Saving model at {}", path.display());
        Ok(())
    }

    /// Read an artifact written by [`TrainedModel::save`]
    pub fn load(path: &Path, device: &B::Device) -> Result<Self>
    where
        B::FloatElem: serde::Serialize + serde::de::DeserializeOwned,
        B::IntElem: serde::Serialize + serde::de::DeserializeOwned,
    {
        if !path.exists() {
            return Err(ShelterError::ModelNotFound(path.to_path_buf()));
        }

        let bytes = std::fs::read(path)?;
        let envelope: ArtifactEnvelope = serde_json::from_slice(&bytes)
            .map_err(|e| ShelterError::ModelFormat(e.to_string()))?;
        if envelope.format_version != FORMAT_VERSION {
            return Err(ShelterError::ModelFormat(format!(
                "unsupported format version {}",
                envelope.format_version
            )));
        }
        if envelope.classes.is_empty() {
            return Err(ShelterError::ModelFormat("artifact has no classes".to_string()));
        }

        let config = ClassifierConfig {
            input_dim: envelope.preprocessor.output_dim(),
            n_classes: envelope.classes.len(),
        };
        let recorder = BinBytesRecorder::<FullPrecisionSettings>::default();
        let record = recorder
            .load(envelope.classifier, device)
            .map_err(|e| ShelterError::ModelFormat(e.to_string()))?;
        let classifier = OutcomeClassifier::new(device, config).load_record(record);

        log::debug!(
            "Loaded model with classes {:?} (C={})",
            envelope.classes,
            envelope.regularization
        );

        Ok(TrainedModel {
            preprocessor: envelope.preprocessor,
            classifier,
            classes: envelope.classes,
            regularization: envelope.regularization,
            device: device.clone(),
        })
    }
}
