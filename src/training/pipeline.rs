//! Training entry point: raw table in, fitted pipeline out

use std::path::Path;

use burn::tensor::backend::AutodiffBackend;

use crate::data::{load_table, OutcomeDataset, Table};
use crate::features::{add_features, Preprocessor};
use crate::model::TrainedModel;
use crate::training::metrics::{GridPoint, Metrics};
use crate::training::trainer::{evaluate, ClassifierTrainer};
use crate::training::tuning::{best_point, GridSearch};
use crate::{Config, Result, ShelterError, TrainingBackend};

/// Column holding the training label
pub const LABEL_COLUMN: &str = "outcome_type";

/// Summary of a training run
#[derive(Debug, Clone)]
pub struct TrainingReport {
    pub n_rows: usize,
    pub classes: Vec<String>,
    /// Encoded model inputs, in order
    pub feature_names: Vec<String>,
    /// Chosen inverse regularization strength
    pub regularization: f64,
    /// Cross-validation scores; empty when the grid had a single entry
    pub grid: Vec<GridPoint>,
    /// Fit quality of the final model on its own training rows
    pub train_metrics: Metrics,
}

/// Sorted class labels and per-row class indices
fn encode_labels(table: &Table) -> Result<(Vec<String>, Vec<usize>)> {
    let raw = table.text(LABEL_COLUMN)?;

    let empty = raw.iter().filter(|l| l.trim().is_empty()).count();
    if empty > 0 {
        return Err(ShelterError::Training(format!(
            "{} rows have no {}",
            empty, LABEL_COLUMN
        )));
    }

    let mut classes = raw.clone();
    classes.sort();
    classes.dedup();
    if classes.len() < 2 {
        return Err(ShelterError::Training(format!(
            "need at least 2 outcome classes, found {:?}",
            classes
        )));
    }

    let labels = raw
        .iter()
        .map(|l| classes.binary_search(l).unwrap_or_default())
        .collect();
    Ok((classes, labels))
}

/// Fit preprocessing and classifier on a raw labelled table
pub fn fit_pipeline<B: AutodiffBackend>(
    table: &Table,
    config: &Config,
    device: B::Device,
) -> Result<(TrainedModel<B::InnerBackend>, TrainingReport)> {
    let (classes, labels) = encode_labels(table)?;
    let with_features = add_features(table)?;

    let preprocessor =
        Preprocessor::fit(&with_features, &config.features, config.training.imputation)?;
    let rows = preprocessor.transform(&with_features)?;
    let dataset = OutcomeDataset::new(rows, &labels, preprocessor.output_dim());
    log::info!(
        "Encoded {} rows into {} features: {:?}",
        table.len(),
        preprocessor.output_dim(),
        preprocessor.output_names()
    );

    let trainer = ClassifierTrainer::<B>::new(device.clone(), &config.training);
    let grid_values = &config.training.regularization_grid;

    let (regularization, grid) = if grid_values.len() == 1 {
        (grid_values[0], Vec::new())
    } else {
        let grid = GridSearch::new(&trainer, config.training.cv_folds, config.training.seed)
            .run(&dataset, classes.len(), grid_values)?;
        let best = best_point(&grid)
            .ok_or_else(|| ShelterError::Training("empty regularization grid".to_string()))?;
        log::info!("Best score: {:.4} (C={})", best.score(), best.regularization);
        (best.regularization, grid)
    };

    log::info!("Training model");
    let classifier = trainer.fit(&dataset, classes.len(), regularization)?;
    let train_metrics = evaluate(&classifier, &dataset, &device)?;
    log::info!("Training fit: {}", train_metrics);

    let report = TrainingReport {
        n_rows: table.len(),
        classes: classes.clone(),
        feature_names: preprocessor.output_names(),
        regularization,
        grid,
        train_metrics,
    };
    let model = TrainedModel::new(preprocessor, classifier, classes, regularization, device);

    Ok((model, report))
}

/// Train on the CSV at `input` and write the artifact to `model_path`
pub fn train_from_path(input: &Path, model_path: &Path, config: &Config) -> Result<TrainingReport> {
    let table = load_table(input)?;
    let (model, report) = fit_pipeline::<TrainingBackend>(&table, config, Default::default())?;
    model.save(model_path)?;
    log::info!("Wrote model to {}", model_path.display());
    Ok(report)
}
