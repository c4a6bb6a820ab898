//! Derived features from raw intake columns
//!
//! Each rule works on a single raw value so it can be checked in isolation;
//! [`add_features`] applies all of them to a table.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::data::{Column, Table};
use crate::{Result, ShelterError};

/// Sex recovered from `sex_upon_outcome`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sex {
    Male,
    Female,
    Unknown,
}

impl Sex {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sex::Male => "male",
            Sex::Female => "female",
            Sex::Unknown => "unknown",
        }
    }

    /// Suffix match on the raw casing: "Neutered Male", "Spayed Female"
    pub fn from_sex_upon_outcome(value: &str) -> Self {
        if value.ends_with("Female") {
            Sex::Female
        } else if value.ends_with("Male") {
            Sex::Male
        } else {
            Sex::Unknown
        }
    }
}

/// Whether the animal was neutered/spayed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Neutered {
    Fixed,
    Intact,
    Unknown,
}

impl Neutered {
    pub fn as_str(&self) -> &'static str {
        match self {
            Neutered::Fixed => "fixed",
            Neutered::Intact => "intact",
            Neutered::Unknown => "unknown",
        }
    }

    pub fn from_sex_upon_outcome(value: &str) -> Self {
        let lower = value.to_lowercase();
        if lower.contains("neutered") || lower.contains("spayed") {
            Neutered::Fixed
        } else if lower.contains("intact") {
            Neutered::Intact
        } else {
            Neutered::Unknown
        }
    }
}

/// Coat length parsed from the breed description
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HairType {
    Shorthair,
    MediumHair,
    Longhair,
    Unknown,
}

impl HairType {
    /// Checked in this order, first match wins
    const PRIORITY: [HairType; 3] = [HairType::Shorthair, HairType::MediumHair, HairType::Longhair];

    pub fn as_str(&self) -> &'static str {
        match self {
            HairType::Shorthair => "shorthair",
            HairType::MediumHair => "medium hair",
            HairType::Longhair => "longhair",
            HairType::Unknown => "unknown",
        }
    }

    pub fn from_breed(breed: &str) -> Self {
        let lower = breed.to_lowercase();
        Self::PRIORITY
            .into_iter()
            .find(|hair| lower.contains(hair.as_str()))
            .unwrap_or(HairType::Unknown)
    }
}

macro_rules! impl_display_as_str {
    ($($t:ty),*) => {
        $(impl fmt::Display for $t {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        })*
    };
}

impl_display_as_str!(Sex, Neutered, HairType);

/// True for dogs, false for cats, `None` for anything else
pub fn is_dog(animal_type: &str) -> Option<bool> {
    match animal_type.to_lowercase().as_str() {
        "dog" => Some(true),
        "cat" => Some(false),
        _ => None,
    }
}

pub fn has_name(name: &str) -> bool {
    name.to_lowercase() != "unknown"
}

/// Days per age unit
fn unit_days(unit: &str) -> Option<f64> {
    match unit {
        "year" | "years" => Some(365.0),
        "month" | "months" => Some(30.0),
        "week" | "weeks" => Some(7.0),
        "day" | "days" => Some(1.0),
        _ => None,
    }
}

/// Age in days from strings like "2 years"; `None` when unknown or malformed
pub fn days_upon_outcome(age: &str) -> Option<f64> {
    let mut parts = age.split_whitespace();
    let magnitude = parts.next()?;
    if magnitude == "Unknown" {
        return None;
    }
    // f64 parsing accepts "NaN" and "inf", which are not ages
    let magnitude = magnitude.parse::<f64>().ok().filter(|m| m.is_finite())?;
    let factor = unit_days(parts.next()?)?;
    Some(magnitude * factor)
}

/// Append `is_dog`, `has_name`, `sex`, `neutered`, `hair_type` and
/// `days_upon_outcome` to a copy of the table
///
/// Fails if any `animal_type` is neither dog nor cat.
pub fn add_features(table: &Table) -> Result<Table> {
    let animal_types = table.text("animal_type")?;
    let names = table.text("name")?;
    let sex_upon_outcome = table.text("sex_upon_outcome")?;
    let breeds = table.text("breed")?;
    let ages = table.text("age_upon_outcome")?;

    let dogs: Vec<Option<bool>> = animal_types.iter().map(|a| is_dog(a)).collect();
    let mut unexpected: Vec<String> = animal_types
        .iter()
        .zip(&dogs)
        .filter(|(_, dog)| dog.is_none())
        .map(|(animal, _)| animal.clone())
        .collect();
    if !unexpected.is_empty() {
        unexpected.sort();
        unexpected.dedup();
        return Err(ShelterError::UnknownAnimalType(unexpected));
    }

    let mut with_features = table.clone();
    with_features.assign(
        "is_dog",
        Column::Flag(dogs.into_iter().map(|d| d.unwrap_or(false)).collect()),
    )?;
    with_features.assign(
        "has_name",
        Column::Flag(names.iter().map(|n| has_name(n)).collect()),
    )?;
    with_features.assign(
        "sex",
        Column::Text(
            sex_upon_outcome
                .iter()
                .map(|s| Sex::from_sex_upon_outcome(s).to_string())
                .collect(),
        ),
    )?;
    with_features.assign(
        "neutered",
        Column::Text(
            sex_upon_outcome
                .iter()
                .map(|s| Neutered::from_sex_upon_outcome(s).to_string())
                .collect(),
        ),
    )?;
    with_features.assign(
        "hair_type",
        Column::Text(breeds.iter().map(|b| HairType::from_breed(b).to_string()).collect()),
    )?;
    let days: Vec<Option<f64>> = ages.iter().map(|a| days_upon_outcome(a)).collect();
    let missing_ages = days.iter().filter(|d| d.is_none()).count();
    if missing_ages > 0 {
        log::debug!("{} rows have an unknown or unparseable age", missing_ages);
    }
    with_features.assign("days_upon_outcome", Column::Number(days))?;

    Ok(with_features)
}
