//! Burn Dataset implementation for encoded outcome samples

use burn::data::dataloader::batcher::Batcher;
use burn::data::dataset::Dataset;
use burn::tensor::backend::Backend;
use burn::tensor::{Int, Tensor};

/// One encoded row and its class index
#[derive(Debug, Clone)]
pub struct OutcomeSample {
    pub features: Vec<f32>,
    pub label: usize,
}

/// In-memory dataset of encoded rows
#[derive(Debug, Clone, Default)]
pub struct OutcomeDataset {
    samples: Vec<OutcomeSample>,
    feature_dim: usize,
}

impl OutcomeDataset {
    /// Build from a row-major feature matrix and class indices
    pub fn new(features: Vec<Vec<f32>>, labels: &[usize], feature_dim: usize) -> Self {
        let samples = features
            .into_iter()
            .zip(labels.iter().copied())
            .map(|(features, label)| OutcomeSample { features, label })
            .collect();

        OutcomeDataset {
            samples,
            feature_dim,
        }
    }

    /// Subset by row indices (used for cross-validation folds)
    pub fn subset(&self, indices: &[usize]) -> Self {
        OutcomeDataset {
            samples: indices
                .iter()
                .filter_map(|&i| self.samples.get(i).cloned())
                .collect(),
            feature_dim: self.feature_dim,
        }
    }

    pub fn feature_dim(&self) -> usize {
        self.feature_dim
    }

    pub fn labels(&self) -> Vec<usize> {
        self.samples.iter().map(|s| s.label).collect()
    }

    /// All samples as one batch
    pub fn full_batch<B: Backend>(&self, device: &B::Device) -> OutcomeBatch<B> {
        OutcomeBatcher::<B>::new(device.clone(), self.feature_dim)
            .batch(self.samples.clone(), device)
    }
}

impl Dataset<OutcomeSample> for OutcomeDataset {
    fn get(&self, index: usize) -> Option<OutcomeSample> {
        self.samples.get(index).cloned()
    }

    fn len(&self) -> usize {
        self.samples.len()
    }
}

/// Batch of encoded rows
#[derive(Debug, Clone)]
pub struct OutcomeBatch<B: Backend> {
    /// Encoded features: [batch, feature_dim]
    pub features: Tensor<B, 2>,
    /// Class indices: [batch]
    pub labels: Tensor<B, 1, Int>,
}

/// Batcher turning samples into tensors
#[derive(Clone)]
pub struct OutcomeBatcher<B: Backend> {
    device: B::Device,
    feature_dim: usize,
}

impl<B: Backend> OutcomeBatcher<B> {
    pub fn new(device: B::Device, feature_dim: usize) -> Self {
        OutcomeBatcher {
            device,
            feature_dim,
        }
    }
}

impl<B: Backend> Batcher<B, OutcomeSample, OutcomeBatch<B>> for OutcomeBatcher<B> {
    fn batch(&self, items: Vec<OutcomeSample>, _device: &B::Device) -> OutcomeBatch<B> {
        let batch_size = items.len();

        let mut feature_data = Vec::with_capacity(batch_size * self.feature_dim);
        let mut label_data = Vec::with_capacity(batch_size);
        for sample in &items {
            feature_data.extend(sample.features.iter().copied());
            label_data.push(sample.label as i64);
        }

        let features = Tensor::<B, 1>::from_floats(feature_data.as_slice(), &self.device)
            .reshape([batch_size, self.feature_dim]);
        let labels = Tensor::<B, 1, Int>::from_ints(label_data.as_slice(), &self.device);

        OutcomeBatch { features, labels }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray<f32>;

    fn dataset() -> OutcomeDataset {
        OutcomeDataset::new(
            vec![vec![0.0, 1.0], vec![1.0, 0.0], vec![0.5, 0.5]],
            &[0, 1, 2],
            2,
        )
    }

    #[test]
    fn test_dataset_access() {
        let ds = dataset();
        assert_eq!(ds.len(), 3);
        assert_eq!(ds.get(1).unwrap().label, 1);
        assert!(ds.get(3).is_none());
    }

    #[test]
    fn test_subset() {
        let ds = dataset().subset(&[2, 0]);
        assert_eq!(ds.labels(), vec![2, 0]);
        assert_eq!(ds.feature_dim(), 2);
    }

    #[test]
    fn test_full_batch_shapes() {
        let device = Default::default();
        let batch = dataset().full_batch::<TestBackend>(&device);

        assert_eq!(batch.features.dims(), [3, 2]);
        assert_eq!(batch.labels.dims(), [3]);
    }
}
