//! Training loop for the outcome classifier

use burn::data::dataloader::DataLoaderBuilder;
use burn::data::dataset::Dataset;
use burn::module::AutodiffModule;
use burn::nn::loss::CrossEntropyLossConfig;
use burn::optim::{AdamConfig, GradientsParams, Optimizer};
use burn::tensor::backend::{AutodiffBackend, Backend};
use burn::tensor::ElementConversion;

use crate::data::dataset::{OutcomeBatcher, OutcomeDataset};
use crate::model::classifier::{ClassifierConfig, OutcomeClassifier};
use crate::training::metrics::Metrics;
use crate::{Result, ShelterError, TrainingConfig};

/// Fits the classifier by minimising cross-entropy + L2 penalty
///
/// The penalty is `||W||² / (2·C·n)`, so `regularization` (C) is an inverse
/// strength: smaller C, stronger shrinkage.
pub struct ClassifierTrainer<B: AutodiffBackend> {
    device: B::Device,
    epochs: usize,
    learning_rate: f64,
    batch_size: usize,
    seed: u64,
}

impl<B: AutodiffBackend> ClassifierTrainer<B> {
    /// Create a new trainer
    pub fn new(device: B::Device, config: &TrainingConfig) -> Self {
        ClassifierTrainer {
            device,
            epochs: config.epochs,
            learning_rate: config.learning_rate,
            batch_size: config.batch_size,
            seed: config.seed,
        }
    }

    pub fn device(&self) -> &B::Device {
        &self.device
    }

    /// Train a fresh classifier on `dataset`
    pub fn fit(
        &self,
        dataset: &OutcomeDataset,
        n_classes: usize,
        regularization: f64,
    ) -> Result<OutcomeClassifier<B::InnerBackend>> {
        let n = dataset.len();
        if n == 0 {
            return Err(ShelterError::Training("no rows to train on".to_string()));
        }

        let config = ClassifierConfig {
            input_dim: dataset.feature_dim(),
            n_classes,
        };
        let mut model = OutcomeClassifier::<B>::new(&self.device, config);
        let mut optimizer = AdamConfig::new().init();
        let loss_fn = CrossEntropyLossConfig::new().init(&self.device);
        let penalty = 1.0 / (2.0 * regularization * n as f64);

        let batch_size = if self.batch_size == 0 {
            n // Full batch
        } else {
            self.batch_size.min(n)
        };
        let batcher = OutcomeBatcher::<B>::new(self.device.clone(), dataset.feature_dim());
        let loader = DataLoaderBuilder::new(batcher)
            .batch_size(batch_size)
            .shuffle(self.seed)
            .build(dataset.clone());

        log::debug!(
            "Fitting classifier: {} rows, {} features, {} classes, C={}",
            n,
            config.input_dim,
            n_classes,
            regularization
        );

        for epoch in 0..self.epochs {
            let mut epoch_loss = 0.0f64;
            let mut batches = 0usize;

            for batch in loader.iter() {
                let logits = model.forward(batch.features);
                let loss = loss_fn.forward(logits, batch.labels) + model.weight_norm_sq() * penalty;
                let loss_val: f32 = loss.clone().into_scalar().elem();

                let grads = loss.backward();
                let grads = GradientsParams::from_grads(grads, &model);
                model = optimizer.step(self.learning_rate, model, grads);

                epoch_loss += loss_val as f64;
                batches += 1;
            }

            if epoch % 50 == 0 || epoch == self.epochs - 1 {
                log::debug!(
                    "Epoch {}/{}: loss={:.4}",
                    epoch + 1,
                    self.epochs,
                    epoch_loss / batches.max(1) as f64
                );
            }
        }

        Ok(model.valid())
    }
}

/// Class probabilities for every row of `dataset`
pub fn predict_dataset<B: Backend>(
    model: &OutcomeClassifier<B>,
    dataset: &OutcomeDataset,
    device: &B::Device,
) -> Result<Vec<Vec<f64>>> {
    if dataset.is_empty() {
        return Ok(Vec::new());
    }

    let batch = dataset.full_batch::<B>(device);
    let probs = model.probabilities(batch.features);
    let [_, n_classes] = probs.dims();
    let values = probs
        .into_data()
        .to_vec::<f32>()
        .map_err(|e| ShelterError::Training(format!("{:?}", e)))?;

    Ok(values
        .chunks(n_classes)
        .map(|row| row.iter().map(|p| *p as f64).collect())
        .collect())
}

/// Evaluate a fitted classifier on a labelled dataset
pub fn evaluate<B: Backend>(
    model: &OutcomeClassifier<B>,
    dataset: &OutcomeDataset,
    device: &B::Device,
) -> Result<Metrics> {
    let probs = predict_dataset(model, dataset, device)?;
    let mut metrics = Metrics::new();
    metrics.update(&probs, &dataset.labels());
    Ok(metrics)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TrainingBackend;

    /// Two well separated classes on the first feature
    fn separable() -> OutcomeDataset {
        let mut features = Vec::new();
        let mut labels = Vec::new();
        for i in 0..20 {
            let x = if i % 2 == 0 { -1.0 } else { 1.0 };
            features.push(vec![x, 0.1 * (i % 3) as f32]);
            labels.push(i % 2);
        }
        OutcomeDataset::new(features, &labels, 2)
    }

    fn config() -> TrainingConfig {
        TrainingConfig {
            epochs: 150,
            learning_rate: 0.1,
            ..TrainingConfig::default()
        }
    }

    #[test]
    fn test_fit_learns_separable_data() {
        let device = Default::default();
        let trainer = ClassifierTrainer::<TrainingBackend>::new(device, &config());
        let dataset = separable();

        let model = trainer.fit(&dataset, 2, 10.0).unwrap();
        let metrics = evaluate(&model, &dataset, trainer.device()).unwrap();

        assert_eq!(metrics.accuracy(), 1.0);
        assert!(metrics.avg_log_loss() < 2.0f64.ln());
    }

    #[test]
    fn test_strong_regularization_shrinks_towards_uniform() {
        let device = Default::default();
        let trainer = ClassifierTrainer::<TrainingBackend>::new(device, &config());
        let dataset = separable();

        let weak = trainer.fit(&dataset, 2, 10.0).unwrap();
        let strong = trainer.fit(&dataset, 2, 1e-4).unwrap();

        let weak_norm: f32 = weak.weight_norm_sq().into_scalar().elem();
        let strong_norm: f32 = strong.weight_norm_sq().into_scalar().elem();
        assert!(strong_norm < weak_norm);
    }

    #[test]
    fn test_mini_batches() {
        let device = Default::default();
        let config = TrainingConfig {
            batch_size: 4,
            ..config()
        };
        let trainer = ClassifierTrainer::<TrainingBackend>::new(device, &config);
        let dataset = separable();

        let model = trainer.fit(&dataset, 2, 10.0).unwrap();
        let probs = predict_dataset(&model, &dataset, trainer.device()).unwrap();
        assert_eq!(probs.len(), 20);
        assert!(probs.iter().all(|row| row.len() == 2));
    }

    #[test]
    fn test_fit_rejects_empty_dataset() {
        let device = Default::default();
        let trainer = ClassifierTrainer::<TrainingBackend>::new(device, &config());
        let empty = OutcomeDataset::new(vec![], &[], 2);
        assert!(matches!(trainer.fit(&empty, 2, 1.0), Err(ShelterError::Training(_))));
    }
}
