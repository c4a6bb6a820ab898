//! CSV loading with column-name normalization
//!
//! Raw shelter exports use CamelCase headers (`AnimalType`, `SexuponOutcome`).
//! Every header is converted to lower_snake_case and a few known spellings
//! are mapped onto the names the feature builder expects.

use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;

use crate::data::table::Table;
use crate::{Result, ShelterError};

/// Raw dataset spellings that do not convert to the expected names
const COLUMN_ALIASES: &[(&str, &str)] = &[
    ("sexupon_outcome", "sex_upon_outcome"),
    ("ageupon_outcome", "age_upon_outcome"),
    ("animal_id", "id"),
];

fn camel_boundary() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"([a-z0-9])([A-Z])").expect("valid regex"))
}

fn separators() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"[^A-Za-z0-9]+").expect("valid regex"))
}

/// Convert a column name to lower_snake_case
///
/// An underscore goes before every uppercase letter that follows a lowercase
/// letter or digit, runs of other characters collapse to one underscore.
pub fn convert_camel_case(name: &str) -> String {
    let split = camel_boundary().replace_all(name, "${1}_${2}");
    let joined = separators().replace_all(&split, "_");
    joined.trim_matches('_').to_lowercase()
}

/// Normalize a raw CSV header, which must be valid UTF-8
pub fn normalize_column_name(raw: &[u8]) -> Result<String> {
    let name = std::str::from_utf8(raw)
        .map_err(|_| ShelterError::InvalidColumnName(raw.to_vec()))?;
    let converted = convert_camel_case(name);

    Ok(COLUMN_ALIASES
        .iter()
        .find(|(from, _)| *from == converted)
        .map(|(_, to)| to.to_string())
        .unwrap_or(converted))
}

/// Read delimited data into a table of text columns
pub fn read_table<R: Read>(reader: R) -> Result<Table> {
    let mut csv_reader = csv::ReaderBuilder::new().flexible(false).from_reader(reader);

    let names = csv_reader
        .byte_headers()?
        .iter()
        .map(normalize_column_name)
        .collect::<Result<Vec<_>>>()?;

    let mut rows = Vec::new();
    for record in csv_reader.records() {
        let record = record?;
        rows.push(record.iter().map(str::to_string).collect());
    }

    log::debug!("Read {} rows with columns {:?}", rows.len(), names);
    Table::from_text_rows(names, rows)
}

/// Load a CSV file from disk
pub fn load_table(path: &Path) -> Result<Table> {
    log::info!("Loading input dataset from {}", path.display());
    let file = File::open(path)?;
    let table = read_table(file)?;
    log::info!("Found {} rows", table.len());
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_convert_camel_case() {
        assert_eq!(convert_camel_case("CamelCase"), "camel_case");
        assert_eq!(convert_camel_case("CamelCASE"), "camel_case");
        assert_eq!(convert_camel_case("camel_case"), "camel_case");
    }

    #[test]
    fn test_convert_camel_case_is_idempotent() {
        for name in ["AnimalType", "OutcomeSubtype", "DateTime", "ID"] {
            let once = convert_camel_case(name);
            assert_eq!(convert_camel_case(&once), once);
        }
    }

    #[test]
    fn test_separators_collapse() {
        assert_eq!(convert_camel_case("camel-case"), "camel_case");
        assert_eq!(convert_camel_case("camel  case"), "camel_case");
        assert_eq!(convert_camel_case(" Animal Type "), "animal_type");
        assert_eq!(convert_camel_case("Age2Days"), "age2_days");
    }

    #[test]
    fn test_non_string_column_name() {
        let err = normalize_column_name(&[0x66, 0xff, 0xfe]).unwrap_err();
        assert!(matches!(err, ShelterError::InvalidColumnName(_)));
    }

    #[test]
    fn test_aliases_for_raw_headers() {
        assert_eq!(normalize_column_name(b"SexuponOutcome").unwrap(), "sex_upon_outcome");
        assert_eq!(normalize_column_name(b"AgeuponOutcome").unwrap(), "age_upon_outcome");
        assert_eq!(normalize_column_name(b"AnimalID").unwrap(), "id");
        assert_eq!(normalize_column_name(b"ID").unwrap(), "id");
        assert_eq!(normalize_column_name(b"AnimalType").unwrap(), "animal_type");
    }

    #[test]
    fn test_read_table() {
        let csv = "Name,AnimalType,AgeuponOutcome\nIvo,Dog,1 year\nUnknown,Cat,2 weeks\n";
        let table = read_table(csv.as_bytes()).unwrap();

        assert_eq!(table.len(), 2);
        assert_eq!(table.names(), ["name", "animal_type", "age_upon_outcome"]);
        assert_eq!(table.text("animal_type").unwrap(), vec!["Dog", "Cat"]);
    }

    #[test]
    fn test_read_table_rejects_ragged_rows() {
        let csv = "Name,AnimalType\nIvo,Dog,extra\n";
        assert!(matches!(read_table(csv.as_bytes()), Err(ShelterError::Csv(_))));
    }

    #[test]
    fn test_read_table_rejects_colliding_headers() {
        let csv = "AnimalType,animal_type\nDog,Dog\n";
        let err = read_table(csv.as_bytes()).unwrap_err();
        assert!(matches!(err, ShelterError::DuplicateColumn(c) if c == "animal_type"));
    }

    #[test]
    fn test_read_table_header_only() {
        let table = read_table("Name,AnimalType\n".as_bytes()).unwrap();
        assert!(table.is_empty());
        assert_eq!(table.names().len(), 2);
    }
}
