//! Multinomial logistic regression
//!
//! Architecture: Input(encoded features) → Linear(n_classes) → softmax

use burn::module::Module;
use burn::nn::{Linear, LinearConfig};
use burn::tensor::activation::softmax;
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

/// Configuration for the classifier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassifierConfig {
    /// Encoded feature dimension
    pub input_dim: usize,
    pub n_classes: usize,
}

/// Softmax regression over the preprocessed features
#[derive(Module, Debug)]
pub struct OutcomeClassifier<B: Backend> {
    linear: Linear<B>,
}

impl<B: Backend> OutcomeClassifier<B> {
    pub fn new(device: &B::Device, config: ClassifierConfig) -> Self {
        OutcomeClassifier {
            linear: LinearConfig::new(config.input_dim, config.n_classes).init(device),
        }
    }

    /// Class logits [batch, n_classes]
    pub fn forward(&self, features: Tensor<B, 2>) -> Tensor<B, 2> {
        self.linear.forward(features)
    }

    /// Class probabilities [batch, n_classes]
    pub fn probabilities(&self, features: Tensor<B, 2>) -> Tensor<B, 2> {
        softmax(self.forward(features), 1)
    }

    /// Sum of squared weights (bias excluded), for the L2 penalty
    pub fn weight_norm_sq(&self) -> Tensor<B, 1> {
        self.linear.weight.val().powf_scalar(2.0).sum()
    }
}
