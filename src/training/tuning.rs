//! Regularization grid search with k-fold cross-validation

use burn::data::dataset::Dataset;
use burn::tensor::backend::AutodiffBackend;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::data::OutcomeDataset;
use crate::training::metrics::{GridPoint, Metrics};
use crate::training::trainer::{predict_dataset, ClassifierTrainer};
use crate::{Result, ShelterError};

/// Stratified, shuffled k-fold partition of row indices
///
/// Rows of each class are shuffled and dealt across the folds in turn, so
/// every fold keeps roughly the class proportions of the whole set and a
/// class with at least `k` rows appears in every fold.
#[derive(Debug, Clone)]
pub struct KFold {
    folds: Vec<Vec<usize>>,
}

impl KFold {
    /// Partition the rows behind `labels` into `k` folds whose sizes differ
    /// by at most one
    pub fn new(labels: &[usize], k: usize, seed: u64) -> Result<Self> {
        let n_rows = labels.len();
        if k < 2 {
            return Err(ShelterError::Config(format!(
                "cross-validation needs at least 2 folds, got {}",
                k
            )));
        }
        if k > n_rows {
            return Err(ShelterError::Training(format!(
                "cannot split {} rows into {} folds",
                n_rows, k
            )));
        }

        let n_classes = labels.iter().max().map_or(0, |m| m + 1);
        let mut by_class: Vec<Vec<usize>> = vec![Vec::new(); n_classes];
        for (row, &label) in labels.iter().enumerate() {
            by_class[label].push(row);
        }

        let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
        let mut folds = vec![Vec::with_capacity(n_rows / k + 1); k];
        let mut next = 0;
        for rows in &mut by_class {
            rows.shuffle(&mut rng);
            for &row in rows.iter() {
                folds[next % k].push(row);
                next += 1;
            }
        }

        for (class, rows) in by_class.iter().enumerate() {
            if !rows.is_empty() && rows.len() < k {
                log::warn!(
                    "class {} has {} rows, fewer than the {} folds",
                    class,
                    rows.len(),
                    k
                );
            }
        }

        Ok(KFold { folds })
    }

    pub fn len(&self) -> usize {
        self.folds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.folds.is_empty()
    }

    /// (train indices, validation indices) for every fold
    pub fn splits(&self) -> impl Iterator<Item = (Vec<usize>, &[usize])> + '_ {
        (0..self.folds.len()).map(move |held_out| {
            let train = self
                .folds
                .iter()
                .enumerate()
                .filter(|(i, _)| *i != held_out)
                .flat_map(|(_, fold)| fold.iter().copied())
                .collect();
            (train, self.folds[held_out].as_slice())
        })
    }
}

/// Cross-validated search over the inverse regularization strength
pub struct GridSearch<'a, B: AutodiffBackend> {
    trainer: &'a ClassifierTrainer<B>,
    folds: usize,
    seed: u64,
}

impl<'a, B: AutodiffBackend> GridSearch<'a, B> {
    pub fn new(trainer: &'a ClassifierTrainer<B>, folds: usize, seed: u64) -> Self {
        GridSearch {
            trainer,
            folds,
            seed,
        }
    }

    /// Score every candidate; the same folds are reused for each
    pub fn run(
        &self,
        dataset: &OutcomeDataset,
        n_classes: usize,
        grid: &[f64],
    ) -> Result<Vec<GridPoint>> {
        let kfold = KFold::new(&dataset.labels(), self.folds, self.seed)?;
        let mut results = Vec::with_capacity(grid.len());

        for &regularization in grid {
            log::info!("Testing C={} with {}-fold cross-validation", regularization, kfold.len());

            let mut fold_losses = Vec::with_capacity(kfold.len());
            let mut pooled = Metrics::new();
            for (train_idx, val_idx) in kfold.splits() {
                let train = dataset.subset(&train_idx);
                let val = dataset.subset(val_idx);

                let model = self.trainer.fit(&train, n_classes, regularization)?;
                let probs = predict_dataset(&model, &val, self.trainer.device())?;

                let mut fold = Metrics::new();
                fold.update(&probs, &val.labels());
                fold_losses.push(fold.avg_log_loss());
                pooled.merge(&fold);
            }

            let point = GridPoint {
                regularization,
                fold_losses,
                pooled,
            };
            log::info!("  {}", point);
            results.push(point);
        }

        Ok(results)
    }
}

/// Lowest mean log-loss; ties keep the earlier candidate
pub fn best_point(points: &[GridPoint]) -> Option<&GridPoint> {
    points.iter().fold(None, |best: Option<&GridPoint>, point| match best {
        Some(b) if b.mean_log_loss() <= point.mean_log_loss() => Some(b),
        _ => Some(point),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{TrainingBackend, TrainingConfig};

    #[test]
    fn test_kfold_covers_every_row_once() {
        let labels: Vec<usize> = (0..23).map(|i| i % 3).collect();
        let kfold = KFold::new(&labels, 5, 7).unwrap();
        assert_eq!(kfold.len(), 5);

        let mut seen: Vec<usize> = kfold.splits().flat_map(|(_, val)| val.to_vec()).collect();
        seen.sort();
        assert_eq!(seen, (0..23).collect::<Vec<_>>());

        for (train, val) in kfold.splits() {
            assert_eq!(train.len() + val.len(), 23);
            assert!(val.len() == 4 || val.len() == 5);
            assert!(val.iter().all(|v| !train.contains(v)));
        }
    }

    #[test]
    fn test_kfold_keeps_rare_class_in_every_fold() {
        // 45 common rows and 5 rare ones
        let mut labels = vec![0usize; 45];
        labels.extend([1, 1, 1, 1, 1]);
        let kfold = KFold::new(&labels, 5, 3).unwrap();

        for (train, val) in kfold.splits() {
            assert_eq!(val.iter().filter(|&&r| labels[r] == 1).count(), 1);
            assert_eq!(train.iter().filter(|&&r| labels[r] == 1).count(), 4);
            assert_eq!(val.len(), 10);
        }
    }

    #[test]
    fn test_kfold_is_seeded() {
        let labels: Vec<usize> = (0..10).map(|i| i % 2).collect();
        let a: Vec<Vec<usize>> = KFold::new(&labels, 3, 1).unwrap().splits().map(|(t, _)| t).collect();
        let b: Vec<Vec<usize>> = KFold::new(&labels, 3, 1).unwrap().splits().map(|(t, _)| t).collect();
        assert_eq!(a, b);
    }

    #[test]
    fn test_kfold_rejects_bad_sizes() {
        assert!(matches!(KFold::new(&[0; 10], 1, 0), Err(ShelterError::Config(_))));
        assert!(matches!(KFold::new(&[0, 1, 0], 5, 0), Err(ShelterError::Training(_))));
    }

    #[test]
    fn test_best_point_prefers_lowest_loss() {
        let point = |c: f64, loss: f64| GridPoint {
            regularization: c,
            fold_losses: vec![loss],
            pooled: Metrics::new(),
        };
        let points = vec![point(0.001, 1.2), point(0.01, 0.9), point(0.1, 0.9)];
        assert_eq!(best_point(&points).unwrap().regularization, 0.01);
        assert!(best_point(&[]).is_none());
    }

    #[test]
    fn test_grid_search_scores_each_candidate() {
        let mut features = Vec::new();
        let mut labels = Vec::new();
        for i in 0..12 {
            features.push(vec![if i % 2 == 0 { -1.0 } else { 1.0 }]);
            labels.push(i % 2);
        }
        let dataset = OutcomeDataset::new(features, &labels, 1);

        let config = TrainingConfig {
            epochs: 50,
            learning_rate: 0.1,
            ..TrainingConfig::default()
        };
        let trainer = ClassifierTrainer::<TrainingBackend>::new(Default::default(), &config);
        let results = GridSearch::new(&trainer, 3, 42)
            .run(&dataset, 2, &[1e-4, 10.0])
            .unwrap();

        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.fold_losses.len() == 3));
        assert_eq!(results[1].pooled.total, 12);
        // Separable data: the weakly regularized model scores better
        assert_eq!(best_point(&results).unwrap().regularization, 10.0);
    }
}
