//! Training metrics and evaluation

use std::fmt;

/// Probabilities are clipped to this distance from 0 and 1 before taking logs
const LOG_LOSS_EPS: f64 = 1e-15;

fn argmax(row: &[f64]) -> usize {
    row.iter()
        .enumerate()
        .fold((0, f64::NEG_INFINITY), |best, (i, p)| {
            if *p > best.1 {
                (i, *p)
            } else {
                best
            }
        })
        .0
}

/// Metrics accumulated over evaluated rows
#[derive(Debug, Clone, Default)]
pub struct Metrics {
    /// Sum of per-row negative log-likelihoods
    pub log_loss_sum: f64,
    /// Rows whose most probable class is the label
    pub correct: usize,
    pub total: usize,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accumulate a block of probability rows and their labels
    pub fn update(&mut self, probs: &[Vec<f64>], labels: &[usize]) {
        for (row, &label) in probs.iter().zip(labels) {
            let p = row
                .get(label)
                .copied()
                .unwrap_or(0.0)
                .clamp(LOG_LOSS_EPS, 1.0 - LOG_LOSS_EPS);
            self.log_loss_sum -= p.ln();
            if argmax(row) == label {
                self.correct += 1;
            }
            self.total += 1;
        }
    }

    pub fn avg_log_loss(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.log_loss_sum / self.total as f64
        }
    }

    pub fn accuracy(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.correct as f64 / self.total as f64
        }
    }

    /// Merge another metrics instance
    pub fn merge(&mut self, other: &Metrics) {
        self.log_loss_sum += other.log_loss_sum;
        self.correct += other.correct;
        self.total += other.total;
    }
}

impl fmt::Display for Metrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Log-loss: {:.4} | Acc: {:.2}% | Rows: {}",
            self.avg_log_loss(),
            self.accuracy() * 100.0,
            self.total
        )
    }
}

/// Cross-validation outcome for one regularization strength
#[derive(Debug, Clone)]
pub struct GridPoint {
    pub regularization: f64,
    /// Mean validation log-loss of each fold
    pub fold_losses: Vec<f64>,
    /// Validation metrics pooled over all folds
    pub pooled: Metrics,
}

impl GridPoint {
    pub fn mean_log_loss(&self) -> f64 {
        if self.fold_losses.is_empty() {
            return f64::INFINITY;
        }
        self.fold_losses.iter().sum::<f64>() / self.fold_losses.len() as f64
    }

    /// Score in the "higher is better" convention (negated log-loss)
    pub fn score(&self) -> f64 {
        -self.mean_log_loss()
    }

    pub fn std_log_loss(&self) -> f64 {
        if self.fold_losses.is_empty() {
            return 0.0;
        }
        let mean = self.mean_log_loss();
        let variance = self
            .fold_losses
            .iter()
            .map(|l| (l - mean).powi(2))
            .sum::<f64>()
            / self.fold_losses.len() as f64;
        variance.sqrt()
    }
}

impl fmt::Display for GridPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "C={:<8} log-loss {:.4} ± {:.4} | acc {:.2}%",
            self.regularization,
            self.mean_log_loss(),
            self.std_log_loss(),
            self.pooled.accuracy() * 100.0
        )
    }
}
