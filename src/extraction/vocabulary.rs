//! Unit vocabulary and noise keywords used by the line parser.
//!
//! Built-in tables cover the common report layouts; a JSON file with the same
//! shape can replace them (see [`load_lab_vocabulary_from`]).

use serde::{Deserialize, Serialize};
use std::fs;
use tracing::{info, warn};

use crate::errors::{AppError, AppResult};

/// Mass and mass-per-volume concentrations
pub const MASS_UNITS: &[&str] = &[
    "mg/dL", "mg/dl", "g/dL", "g/dl", "mg/L", "g/L", "µg/dL", "μg/dL", "µg/L", "μg/L",
    "µg/mL", "μg/mL", "mcg/dL", "ng/mL", "ng/ml", "ng/dL", "pg/mL", "pg/ml", "mg/24hrs",
];

/// Molar and equivalent concentrations
pub const MOLAR_UNITS: &[&str] = &[
    "mmol/L", "µmol/L", "μmol/L", "umol/L", "nmol/L", "pmol/L", "mEq/L", "mOsm/kg",
];

pub const PERCENT_UNITS: &[&str] = &["%"];

/// Enzyme and hormone activity
pub const ACTIVITY_UNITS: &[&str] = &[
    "U/L", "IU/L", "mIU/L", "IU/mL", "mIU/mL", "µIU/mL", "μIU/mL", "uIU/mL", "U/mL",
];

/// Cell counts and hematology indices
pub const CELL_COUNT_UNITS: &[&str] = &[
    "cells/µL", "cells/μL", "cells/cumm", "x10^3/µL", "x10^3/μL", "x10^6/µL", "x10^6/μL",
    "10^3/µL", "10^3/μL", "10^6/µL", "10^6/μL", "x10^9/L", "x10^12/L", "10^9/L", "10^12/L",
    "lakhs/cumm", "million/cumm", "mill/cumm", "thou/mm3", "/cumm", "/mm3", "/µL", "/μL",
    "/hpf", "fL", "pg", "mm/hr",
];

/// Substrings marking header, footer and metadata lines
pub const NOISE_KEYWORDS: &[&str] = &[
    "pin", "page", "patient", "report", "reg no", "registration", "collected", "received",
    "reported", "printed", "sample id", "lab no", "doctor", "dr.", "ref by", "referred",
    "address", "phone", "mobile", "email", "www.", "http", "date", "----", "____", "****",
    "signature", "end of report", "method", "interpretation",
];

/// Closed unit list and noise keyword set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabVocabulary {
    pub units: Vec<String>,
    #[serde(default)]
    pub noise_keywords: Vec<String>,
}

impl Default for LabVocabulary {
    fn default() -> Self {
        let units = [
            MASS_UNITS,
            MOLAR_UNITS,
            PERCENT_UNITS,
            ACTIVITY_UNITS,
            CELL_COUNT_UNITS,
        ]
        .iter()
        .flat_map(|group| group.iter())
        .map(|unit| unit.to_string())
        .collect();

        Self {
            units,
            noise_keywords: NOISE_KEYWORDS.iter().map(|k| k.to_string()).collect(),
        }
    }
}

impl LabVocabulary {
    /// Same units, no noise filtering
    pub fn without_noise_keywords(mut self) -> Self {
        self.noise_keywords.clear();
        self
    }

    /// Validate vocabulary entries
    pub fn validate(&self) -> AppResult<()> {
        if self.units.is_empty() {
            return Err(AppError::Config("units cannot be empty".to_string()));
        }
        if let Some(bad) = self
            .units
            .iter()
            .find(|u| u.trim().is_empty() || u.chars().any(char::is_whitespace))
        {
            return Err(AppError::Validation(format!(
                "unit '{}' must be non-empty and contain no whitespace",
                bad
            )));
        }
        if self.noise_keywords.iter().any(|k| k.trim().is_empty()) {
            return Err(AppError::Validation(
                "noise keywords cannot be blank".to_string(),
            ));
        }
        Ok(())
    }
}

fn read_vocabulary(path: &str) -> AppResult<LabVocabulary> {
    let content = fs::read_to_string(path)?;
    let vocabulary: LabVocabulary = serde_json::from_str(&content)?;
    vocabulary.validate()?;
    Ok(vocabulary)
}

/// Load the vocabulary from `explicit_path` (`LAB_VOCABULARY_PATH`), then the
/// usual config locations, then the built-in tables.
pub fn load_lab_vocabulary_from(explicit_path: Option<&str>) -> LabVocabulary {
    if let Some(config_path) = explicit_path {
        match read_vocabulary(config_path) {
            Ok(vocabulary) => {
                info!(path = %config_path, units = vocabulary.units.len(), "Loaded lab vocabulary");
                return vocabulary;
            }
            Err(e) => {
                warn!(
                    "Failed to load lab vocabulary from '{}': {}. Falling back to default paths.",
                    config_path, e
                );
            }
        }
    }

    let possible_paths = [
        "/app/config/lab_vocabulary.json",
        "config/lab_vocabulary.json",
        "../config/lab_vocabulary.json",
    ];

    for config_path in &possible_paths {
        if !std::path::Path::new(config_path).exists() {
            continue;
        }
        match read_vocabulary(config_path) {
            Ok(vocabulary) => {
                info!(path = %config_path, units = vocabulary.units.len(), "Loaded lab vocabulary from fallback path");
                return vocabulary;
            }
            Err(e) => {
                warn!(
                    "Failed to load lab vocabulary at '{}': {}. Trying next path.",
                    config_path, e
                );
            }
        }
    }

    info!("No lab vocabulary file found, using built-in tables");
    LabVocabulary::default()
}
