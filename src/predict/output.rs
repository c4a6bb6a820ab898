//! Rendering prediction tables for the CLI and HTTP responses

use std::str::FromStr;

use serde_json::{Map, Value};

use crate::predict::inference::PredictionTable;
use crate::Result;

/// A way of turning a [`PredictionTable`] into bytes
pub trait PredictionFormat: Send + Sync {
    /// MIME type of the rendered output
    fn content_type(&self) -> &'static str;

    fn render(&self, predictions: &PredictionTable) -> Result<Vec<u8>>;
}

/// Header line plus one CSV line per row
#[derive(Debug, Clone, Copy, Default)]
pub struct CsvFormat;

impl PredictionFormat for CsvFormat {
    fn content_type(&self) -> &'static str {
        "text/csv"
    }

    fn render(&self, predictions: &PredictionTable) -> Result<Vec<u8>> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(predictions.header())?;
        for (key, probs) in predictions.keys.iter().zip(&predictions.probabilities) {
            let mut record = Vec::with_capacity(probs.len() + 1);
            record.push(key.clone());
            record.extend(probs.iter().map(|p| p.to_string()));
            writer.write_record(&record)?;
        }
        writer
            .into_inner()
            .map_err(|e| crate::ShelterError::Io(e.into_error()))
    }
}

/// Array of `{key, class: probability, ...}` records
///
/// Every row is checked to be a probability distribution before rendering.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonFormat;

impl JsonFormat {
    pub fn records(&self, predictions: &PredictionTable) -> Result<Vec<Value>> {
        predictions.validate()?;

        Ok(predictions
            .keys
            .iter()
            .zip(&predictions.probabilities)
            .map(|(key, probs)| {
                let mut record = Map::new();
                record.insert(predictions.key_column.clone(), Value::String(key.clone()));
                for (class, p) in predictions.classes.iter().zip(probs) {
                    record.insert(class.clone(), Value::from(*p));
                }
                Value::Object(record)
            })
            .collect())
    }
}

impl PredictionFormat for JsonFormat {
    fn content_type(&self) -> &'static str {
        "application/json"
    }

    fn render(&self, predictions: &PredictionTable) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(&self.records(predictions)?)?)
    }
}

/// Output format selectable from the command line
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Csv,
    Json,
}

impl OutputFormat {
    pub fn formatter(&self) -> Box<dyn PredictionFormat> {
        match self {
            OutputFormat::Csv => Box::new(CsvFormat),
            OutputFormat::Json => Box::new(JsonFormat),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "csv" => Ok(OutputFormat::Csv),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("Unknown format: {}. Use csv or json.", s)),
        }
    }
}
