//! Column-wise preprocessing fitted on training data
//!
//! Numeric columns are imputed then z-score standardized, categorical columns
//! are one-hot encoded with the first (sorted) level dropped. Output columns
//! are all numeric features followed by all categorical indicators.

use serde::{Deserialize, Serialize};

use crate::data::Table;
use crate::{Result, ShelterError};

/// Columns a model is fitted on
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureSpec {
    pub categorical: Vec<String>,
    pub numeric: Vec<String>,
}

impl Default for FeatureSpec {
    fn default() -> Self {
        FeatureSpec {
            categorical: ["animal_type", "is_dog", "has_name", "sex", "hair_type"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            numeric: vec!["days_upon_outcome".to_string()],
        }
    }
}

impl FeatureSpec {
    pub fn is_empty(&self) -> bool {
        self.categorical.is_empty() && self.numeric.is_empty()
    }

    /// Every input column, categorical first
    pub fn columns(&self) -> Vec<String> {
        self.categorical
            .iter()
            .chain(self.numeric.iter())
            .cloned()
            .collect()
    }

    /// Fail with a schema mismatch if the table lacks any feature column
    pub fn check_table(&self, table: &Table) -> Result<()> {
        let missing: Vec<String> = self
            .columns()
            .into_iter()
            .filter(|c| table.column(c).is_none())
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(ShelterError::SchemaMismatch(format!(
                "table is missing feature columns {:?}",
                missing
            )))
        }
    }
}

/// Missing-value strategy for numeric columns
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Imputation {
    /// Fill with the mean of observed values
    Mean,
    /// Fill with a fixed value
    Constant(f64),
}

/// Imputation + z-score for one numeric column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NumericScaler {
    pub column: String,
    pub fill: f64,
    pub mean: f64,
    pub std: f64,
}

impl NumericScaler {
    pub fn fit(column: &str, values: &[Option<f64>], imputation: Imputation) -> Self {
        let observed: Vec<f64> = values.iter().flatten().copied().collect();
        let fill = match imputation {
            Imputation::Mean if observed.is_empty() => {
                log::warn!("Column {} has no observed values, imputing 0", column);
                0.0
            }
            Imputation::Mean => mean(&observed),
            Imputation::Constant(value) => value,
        };

        let imputed: Vec<f64> = values.iter().map(|v| v.unwrap_or(fill)).collect();
        let mean = mean(&imputed);
        let std = std(&imputed, mean);

        NumericScaler {
            column: column.to_string(),
            fill,
            mean,
            // Constant columns are centred but not scaled
            std: if std > 1e-12 { std } else { 1.0 },
        }
    }

    pub fn transform(&self, value: Option<f64>) -> f64 {
        (value.unwrap_or(self.fill) - self.mean) / self.std
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation
fn std(values: &[f64], mean: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let variance = values.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

/// One-hot encoding for one categorical column, reference level dropped
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OneHotEncoder {
    pub column: String,
    /// Sorted levels seen during fitting; the first is the reference
    pub categories: Vec<String>,
}

impl OneHotEncoder {
    pub fn fit(column: &str, values: &[String]) -> Self {
        let mut categories = values.to_vec();
        categories.sort();
        categories.dedup();

        OneHotEncoder {
            column: column.to_string(),
            categories,
        }
    }

    /// Number of indicator columns produced
    pub fn width(&self) -> usize {
        self.categories.len().saturating_sub(1)
    }

    pub fn output_names(&self) -> Vec<String> {
        self.categories
            .iter()
            .skip(1)
            .map(|c| format!("{}_{}", self.column, c))
            .collect()
    }

    /// Push indicators for `value`; returns false for a level not seen in fitting
    pub fn encode_into(&self, value: &str, out: &mut Vec<f32>) -> bool {
        for category in self.categories.iter().skip(1) {
            out.push(if category == value { 1.0 } else { 0.0 });
        }
        self.categories.iter().any(|c| c == value)
    }
}

/// Fitted column transformer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preprocessor {
    spec: FeatureSpec,
    numeric: Vec<NumericScaler>,
    categorical: Vec<OneHotEncoder>,
}

impl Preprocessor {
    /// Fit imputation, scaling and encodings on a feature table
    pub fn fit(table: &Table, spec: &FeatureSpec, imputation: Imputation) -> Result<Self> {
        spec.check_table(table)?;

        let mut numeric = Vec::with_capacity(spec.numeric.len());
        for name in &spec.numeric {
            let column = table.require(name)?;
            let values: Vec<Option<f64>> = (0..table.len()).map(|r| column.number_at(r)).collect();
            numeric.push(NumericScaler::fit(name, &values, imputation));
        }

        let mut categorical = Vec::with_capacity(spec.categorical.len());
        for name in &spec.categorical {
            let encoder = OneHotEncoder::fit(name, &table.text(name)?);
            log::debug!("{} levels: {:?}", name, encoder.categories);
            categorical.push(encoder);
        }

        Ok(Preprocessor {
            spec: spec.clone(),
            numeric,
            categorical,
        })
    }

    pub fn spec(&self) -> &FeatureSpec {
        &self.spec
    }

    pub fn output_dim(&self) -> usize {
        self.numeric.len() + self.categorical.iter().map(|e| e.width()).sum::<usize>()
    }

    pub fn output_names(&self) -> Vec<String> {
        self.numeric
            .iter()
            .map(|s| s.column.clone())
            .chain(self.categorical.iter().flat_map(|e| e.output_names()))
            .collect()
    }

    /// Encode a feature table into row-major model input
    pub fn transform(&self, table: &Table) -> Result<Vec<Vec<f32>>> {
        self.spec.check_table(table)?;

        let numeric_columns = self
            .numeric
            .iter()
            .map(|s| table.require(&s.column))
            .collect::<Result<Vec<_>>>()?;
        let categorical_columns = self
            .categorical
            .iter()
            .map(|e| table.text(&e.column))
            .collect::<Result<Vec<_>>>()?;

        let dim = self.output_dim();
        let mut unseen = 0usize;
        let mut rows = Vec::with_capacity(table.len());
        for row in 0..table.len() {
            let mut encoded = Vec::with_capacity(dim);
            for (scaler, column) in self.numeric.iter().zip(&numeric_columns) {
                encoded.push(scaler.transform(column.number_at(row)) as f32);
            }
            for (encoder, values) in self.categorical.iter().zip(&categorical_columns) {
                if !encoder.encode_into(&values[row], &mut encoded) {
                    unseen += 1;
                }
            }
            rows.push(encoded);
        }

        if unseen > 0 {
            log::debug!("{} categorical values were not seen during fitting", unseen);
        }
        Ok(rows)
    }
}
