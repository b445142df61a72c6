//! # Lab Test Extraction
//!
//! Line-level parser that turns OCR text from a lab report into
//! [`LabTestRecord`]s. Every line is handled on its own:
//!
//! 1. filter and normalize ([`normalizer`])
//! 2. find the reference range and numeric tokens ([`numeric`])
//! 3. pick the value, detect the unit, derive the name ([`fields`])
//! 4. flag values outside the range ([`range`])
//!
//! A line that cannot be used is skipped; a line that fails unexpectedly is
//! logged and skipped. Neither stops the rest of the document.

pub mod fields;
pub mod normalizer;
pub mod numeric;
pub mod range;
pub mod types;
pub mod vocabulary;

use tracing::{debug, trace};

use crate::errors::{error_logging, AppError, AppResult};

pub use fields::UnitDetector;
pub use types::{
    ExtractionReport, LabTestRecord, LabTestResponse, LineError, LineOutcome, NormalizedLine,
    NumericToken, RangeMatch, ReferenceRange, SkipReason,
};
pub use vocabulary::{load_lab_vocabulary_from, LabVocabulary};

/// Immutable parser shared across workers
#[derive(Debug, Clone)]
pub struct LabTestExtractor {
    units: UnitDetector,
    noise_keywords: Vec<String>,
}

impl LabTestExtractor {
    /// Parser with the built-in units and noise keywords
    pub fn new() -> Self {
        Self::from_parts(LabVocabulary::default())
    }

    /// Parser with the built-in units and no noise filtering
    pub fn without_noise_filter() -> Self {
        Self::from_parts(LabVocabulary::default().without_noise_keywords())
    }

    /// Parser over a custom vocabulary
    pub fn with_vocabulary(vocabulary: LabVocabulary) -> AppResult<Self> {
        vocabulary.validate()?;
        let units = UnitDetector::new(&vocabulary.units)
            .map_err(|e| AppError::Config(format!("unit vocabulary does not compile: {}", e)))?;
        Ok(Self {
            units,
            noise_keywords: lowercase_keywords(&vocabulary.noise_keywords),
        })
    }

    fn from_parts(vocabulary: LabVocabulary) -> Self {
        // Built-in units are escaped literals, so the alternation always compiles.
        let units = UnitDetector::new(&vocabulary.units).expect("built-in unit table compiles");
        Self {
            units,
            noise_keywords: lowercase_keywords(&vocabulary.noise_keywords),
        }
    }

    pub fn noise_filter_enabled(&self) -> bool {
        !self.noise_keywords.is_empty()
    }

    /// Parse one raw OCR line
    pub fn parse_line(&self, raw: &str) -> Result<LineOutcome, LineError> {
        let line = match normalizer::normalize_line(raw, &self.noise_keywords) {
            Ok(line) => line,
            Err(reason) => return Ok(LineOutcome::Skipped(reason)),
        };

        let range_match = numeric::find_reference_range(&line)?;
        let tokens = numeric::find_numeric_tokens(&line);

        let Some(value) = numeric::choose_test_value(&tokens, range_match.as_ref()) else {
            return Ok(LineOutcome::Skipped(SkipReason::NoValue));
        };

        let unit = self.units.detect(&line);

        let Some(test_name) = fields::extract_test_name(&line, Some(value), &unit, &self.units)
        else {
            return Ok(LineOutcome::Skipped(SkipReason::NoName));
        };

        let reference = range_match.as_ref().map(|m| m.range);
        Ok(LineOutcome::Record(LabTestRecord {
            test_name,
            test_value: value.literal.clone(),
            bio_reference_range: reference.map(|r| r.to_string()),
            test_unit: unit,
            lab_test_out_of_range: range::is_out_of_range(&value.literal, reference.as_ref()),
        }))
    }

    /// Parse a whole OCR blob and keep the tally
    pub fn extract_report(&self, text: &str) -> ExtractionReport {
        let mut report = ExtractionReport::default();

        for (index, raw) in text.lines().enumerate() {
            report.total_lines += 1;
            match self.parse_line(raw) {
                Ok(LineOutcome::Record(record)) => {
                    trace!(line_number = index + 1, test_name = %record.test_name, "Extracted lab test");
                    report.records.push(record);
                }
                Ok(LineOutcome::Skipped(reason)) => {
                    trace!(line_number = index + 1, reason = %reason, "Skipped line");
                    report.skipped.push(reason);
                }
                Err(e) => {
                    error_logging::log_line_error(&e, index + 1, raw);
                    report.line_errors += 1;
                }
            }
        }

        debug!(
            total_lines = report.total_lines,
            records = report.records.len(),
            skipped = report.skipped.len(),
            line_errors = report.line_errors,
            "Extraction finished"
        );
        report
    }

    /// Parse a whole OCR blob into records, in line order
    pub fn extract_tests(&self, text: &str) -> Vec<LabTestRecord> {
        self.extract_report(text).records
    }
}

impl Default for LabTestExtractor {
    fn default() -> Self {
        Self::new()
    }
}

fn lowercase_keywords(keywords: &[String]) -> Vec<String> {
    keywords.iter().map(|k| k.to_lowercase()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(outcome: Result<LineOutcome, LineError>) -> LabTestRecord {
        match outcome {
            Ok(LineOutcome::Record(record)) => record,
            other => panic!("expected a record, got {other:?}"),
        }
    }

    #[test]
    fn test_hemoglobin_line() {
        let extractor = LabTestExtractor::new();
        let rec = record(extractor.parse_line("Hemoglobin 13.5 12.0-15.0 g/dL"));
        assert_eq!(rec.test_name, "Hemoglobin");
        assert_eq!(rec.test_value, "13.5");
        assert_eq!(rec.bio_reference_range.as_deref(), Some("12.0-15.0"));
        assert_eq!(rec.test_unit, "g/dL");
        assert!(!rec.lab_test_out_of_range);
    }

    #[test]
    fn test_integer_range_is_rendered_as_float() {
        let extractor = LabTestExtractor::new();
        let rec = record(extractor.parse_line("Glucose 140 70-110 mg/dL"));
        assert_eq!(rec.bio_reference_range.as_deref(), Some("70.0-110.0"));
        assert!(rec.lab_test_out_of_range);
    }

    #[test]
    fn test_skip_reasons() {
        let extractor = LabTestExtractor::new();
        assert_eq!(
            extractor.parse_line("Sodium 140 145"),
            Ok(LineOutcome::Skipped(SkipReason::NoValue))
        );
        assert_eq!(
            extractor.parse_line("12 13.5 12.0-15.0"),
            Ok(LineOutcome::Skipped(SkipReason::NoName))
        );
        assert_eq!(
            extractor.parse_line("PIN CODE 560001"),
            Ok(LineOutcome::Skipped(SkipReason::NoiseKeyword("pin".to_string())))
        );
    }

    #[test]
    fn test_uppercase_custom_keywords_still_match() {
        let vocabulary = LabVocabulary {
            noise_keywords: vec!["BARCODE".to_string()],
            ..Default::default()
        };
        let extractor = LabTestExtractor::with_vocabulary(vocabulary).unwrap();
        assert_eq!(
            extractor.parse_line("Barcode 123456"),
            Ok(LineOutcome::Skipped(SkipReason::NoiseKeyword(
                "barcode".to_string()
            )))
        );
    }

    #[test]
    fn test_without_noise_filter_keeps_metadata_lines() {
        let extractor = LabTestExtractor::without_noise_filter();
        assert!(!extractor.noise_filter_enabled());
        let rec = record(extractor.parse_line("PIN CODE 560001"));
        assert_eq!(rec.test_name, "PIN CODE");
        assert_eq!(rec.bio_reference_range, None);
    }

    #[test]
    fn test_overflowing_bound_keeps_record_unflagged() {
        let extractor = LabTestExtractor::new();
        let text = format!(
            "Platelets 250 150-{}\nHemoglobin 13.5 12.0-15.0 g/dL",
            "9".repeat(400)
        );
        let report = extractor.extract_report(&text);
        assert_eq!(report.line_errors, 0);
        assert_eq!(report.records.len(), 2);
        assert_eq!(report.records[0].test_name, "Platelets");
        assert_eq!(report.records[0].bio_reference_range.as_deref(), Some("150.0-inf"));
        assert!(!report.records[0].lab_test_out_of_range);
    }

    #[test]
    fn test_invalid_vocabulary_is_rejected() {
        let vocabulary = LabVocabulary {
            units: vec![],
            noise_keywords: vec![],
        };
        assert!(LabTestExtractor::with_vocabulary(vocabulary).is_err());
    }
}
