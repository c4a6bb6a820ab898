//! Model inference for predictions

use std::path::Path;

use burn::tensor::backend::Backend;

use crate::data::{load_table, Table};
use crate::features::{add_features, FeatureSpec};
use crate::model::TrainedModel;
use crate::{InferenceBackend, KeyColumn, Result, ShelterError};

/// Largest accepted distance between a probability row sum and 1
pub const PROBABILITY_TOLERANCE: f64 = 1e-6;

/// Per-row class probabilities keyed by an identifier column
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionTable {
    /// Name of the key column (`name` or `id`)
    pub key_column: String,
    pub keys: Vec<String>,
    /// Lower-cased class labels in model order
    pub classes: Vec<String>,
    pub probabilities: Vec<Vec<f64>>,
}

impl PredictionTable {
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Column headers: key first, then one per class
    pub fn header(&self) -> Vec<String> {
        std::iter::once(self.key_column.clone())
            .chain(self.classes.iter().cloned())
            .collect()
    }

    /// Check every row is a probability distribution
    pub fn validate(&self) -> Result<()> {
        for (row, probs) in self.probabilities.iter().enumerate() {
            let sum: f64 = probs.iter().sum();
            let in_range = probs.iter().all(|p| (0.0..=1.0).contains(p));
            if !in_range || (sum - 1.0).abs() > PROBABILITY_TOLERANCE {
                return Err(ShelterError::ProbabilityContract { row, sum });
            }
        }
        Ok(())
    }

    /// Most probable class of each row
    pub fn predicted_classes(&self) -> Vec<&str> {
        self.probabilities
            .iter()
            .map(|probs| {
                let best = probs
                    .iter()
                    .enumerate()
                    .fold(0, |best, (i, p)| if *p > probs[best] { i } else { best });
                self.classes[best].as_str()
            })
            .collect()
    }
}

/// Applies a trained model to raw shelter records
pub struct Predictor<B: Backend> {
    model: TrainedModel<B>,
    key: KeyColumn,
}

impl<B: Backend> Predictor<B>
where
    B::FloatElem: serde::Serialize + serde::de::DeserializeOwned,
    B::IntElem: serde::Serialize + serde::de::DeserializeOwned,
{
    /// Load predictor from a saved artifact
    pub fn load(model_path: &Path, device: &B::Device) -> Result<Self> {
        let model = TrainedModel::load(model_path, device)?;
        log::info!(
            "Loaded model from {} with classes {:?}",
            model_path.display(),
            model.classes()
        );
        Ok(Self::from_model(model))
    }
}

impl<B: Backend> Predictor<B> {
    pub fn from_model(model: TrainedModel<B>) -> Self {
        Predictor {
            model,
            key: KeyColumn::default(),
        }
    }

    /// Key predictions by `key` instead of `name`
    pub fn with_key(mut self, key: KeyColumn) -> Self {
        self.key = key;
        self
    }

    /// Fail unless `spec` matches the model's fitted schema
    pub fn check_schema(&self, spec: &FeatureSpec) -> Result<()> {
        self.model.check_schema(spec)
    }

    /// Class probabilities for every row of a raw (unlabelled) table
    pub fn predict(&self, table: &Table) -> Result<PredictionTable> {
        let keys = table.text(self.key.as_str())?;
        let with_features = add_features(table)?;
        let probabilities = self.model.predict_proba(&with_features)?;

        log::debug!("Predicted {} rows", probabilities.len());

        Ok(PredictionTable {
            key_column: self.key.as_str().to_string(),
            keys,
            classes: self.model.classes().iter().map(|c| c.to_lowercase()).collect(),
            probabilities,
        })
    }
}

/// Predict the CSV at `input` with the artifact at `model_path`
pub fn predict_from_path(input: &Path, model_path: &Path, key: KeyColumn) -> Result<PredictionTable> {
    let predictor = Predictor::<InferenceBackend>::load(model_path, &Default::default())?.with_key(key);
    let table = load_table(input)?;
    predictor.predict(&table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::{Imputation, Preprocessor};
    use crate::model::{ClassifierConfig, OutcomeClassifier};

    fn raw_table() -> Table {
        Table::from_text_rows(
            ["id", "name", "animal_type", "sex_upon_outcome", "breed", "age_upon_outcome"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            vec![
                vec!["1", "Rex", "Dog", "Neutered Male", "Pit Bull Mix", "2 years"],
                vec!["2", "Unknown", "Cat", "Intact Female", "Domestic Shorthair Mix", "3 weeks"],
                vec!["3", "Tom", "cat", "Unknown", "Siamese", "Unknown"],
            ]
            .into_iter()
            .map(|row| row.into_iter().map(String::from).collect())
            .collect(),
        )
        .unwrap()
    }

    fn predictor() -> Predictor<InferenceBackend> {
        let device = Default::default();
        let features = add_features(&raw_table()).unwrap();
        let preprocessor =
            Preprocessor::fit(&features, &FeatureSpec::default(), Imputation::Mean).unwrap();
        let classifier = OutcomeClassifier::new(
            &device,
            ClassifierConfig {
                input_dim: preprocessor.output_dim(),
                n_classes: 2,
            },
        );
        Predictor::from_model(TrainedModel::new(
            preprocessor,
            classifier,
            vec!["Adoption".to_string(), "Return_to_owner".to_string()],
            0.1,
            device,
        ))
    }

    #[test]
    fn test_predict_keys_and_classes() {
        let predictions = predictor().predict(&raw_table()).unwrap();

        assert_eq!(predictions.key_column, "name");
        assert_eq!(predictions.keys, vec!["Rex", "Unknown", "Tom"]);
        assert_eq!(predictions.classes, vec!["adoption", "return_to_owner"]);
        assert_eq!(predictions.header(), vec!["name", "adoption", "return_to_owner"]);
        assert_eq!(predictions.len(), 3);
        assert!(predictions.validate().is_ok());
    }

    #[test]
    fn test_predict_keyed_by_id() {
        let predictions = predictor()
            .with_key(KeyColumn::Id)
            .predict(&raw_table())
            .unwrap();
        assert_eq!(predictions.key_column, "id");
        assert_eq!(predictions.keys, vec!["1", "2", "3"]);
    }

    #[test]
    fn test_predict_missing_feature_column() {
        let table = raw_table()
            .select(&[
                "name".to_string(),
                "animal_type".to_string(),
                "sex_upon_outcome".to_string(),
                "age_upon_outcome".to_string(),
            ])
            .unwrap();
        let err = predictor().predict(&table).unwrap_err();
        assert!(matches!(err, ShelterError::MissingColumn(ref c) if c == "breed"));
    }

    #[test]
    fn test_predict_rejects_other_animals() {
        let mut rows = vec![vec!["9", "Polly", "Bird", "Unknown", "Parrot", "1 year"]];
        rows.push(vec!["8", "Rex", "Dog", "Neutered Male", "Pit Bull Mix", "2 years"]);
        let table = Table::from_text_rows(
            ["id", "name", "animal_type", "sex_upon_outcome", "breed", "age_upon_outcome"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            rows.into_iter()
                .map(|row| row.into_iter().map(String::from).collect())
                .collect(),
        )
        .unwrap();

        let err = predictor().predict(&table).unwrap_err();
        assert!(matches!(err, ShelterError::UnknownAnimalType(ref v) if v == &["Bird"]));
    }

    #[test]
    fn test_check_schema_mismatch() {
        let spec = FeatureSpec {
            categorical: vec!["sex".to_string()],
            numeric: vec![],
        };
        assert!(matches!(
            predictor().check_schema(&spec),
            Err(ShelterError::SchemaMismatch(_))
        ));
        assert!(predictor().check_schema(&FeatureSpec::default()).is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_rows() {
        let mut table = PredictionTable {
            key_column: "name".to_string(),
            keys: vec!["a".to_string(), "b".to_string()],
            classes: vec!["x".to_string(), "y".to_string()],
            probabilities: vec![vec![0.5, 0.5], vec![0.7, 0.7]],
        };
        assert!(matches!(
            table.validate(),
            Err(ShelterError::ProbabilityContract { row: 1, .. })
        ));

        table.probabilities[1] = vec![1.5, -0.5];
        assert!(table.validate().is_err());

        table.probabilities[1] = vec![0.25, 0.75];
        assert!(table.validate().is_ok());
        assert_eq!(table.predicted_classes(), vec!["x", "y"]);
    }

    #[test]
    fn test_predict_from_path_missing_model() {
        let err = predict_from_path(
            Path::new("missing.csv"),
            Path::new("no/such/model.json"),
            KeyColumn::Name,
        )
        .unwrap_err();
        assert!(matches!(err, ShelterError::ModelNotFound(_)));
    }
}
