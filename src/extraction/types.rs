//! Data types produced while turning OCR lines into lab test records.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One OCR line after punctuation cleanup and whitespace collapsing.
///
/// Only the normalizer constructs these, so every instance has already passed
/// the blank/token-count/noise filters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedLine(String);

impl NormalizedLine {
    pub(crate) fn new(text: String) -> Self {
        Self(text)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NormalizedLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A numeric literal found in a line, with its parsed value
#[derive(Debug, Clone, PartialEq)]
pub struct NumericToken {
    /// Text exactly as it appeared, e.g. `"13.5"` or `"12."`
    pub literal: String,
    pub value: f64,
}

/// Inclusive reference interval
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReferenceRange {
    pub low: f64,
    pub high: f64,
}

impl ReferenceRange {
    pub fn contains(&self, value: f64) -> bool {
        self.low <= value && value <= self.high
    }
}

/// Renders as `low-high`, each bound always carrying a decimal point (`12` -> `12.0`).
impl fmt::Display for ReferenceRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}-{:?}", self.low, self.high)
    }
}

/// The leftmost range found in a line together with the literals it was built from
#[derive(Debug, Clone, PartialEq)]
pub struct RangeMatch {
    pub range: ReferenceRange,
    pub low_literal: String,
    pub high_literal: String,
}

impl RangeMatch {
    /// Whether `literal` is textually one of the two range bounds
    pub fn is_bound_literal(&self, literal: &str) -> bool {
        self.low_literal == literal || self.high_literal == literal
    }
}

/// One extracted lab test. Field order and names are the output contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabTestRecord {
    pub test_name: String,
    /// Literal value text, not re-rendered
    pub test_value: String,
    /// `"low-high"` or `null`
    pub bio_reference_range: Option<String>,
    /// Empty string when no unit was recognised
    pub test_unit: String,
    pub lab_test_out_of_range: bool,
}

/// Why a line produced no record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    Blank,
    TooFewTokens,
    NoiseKeyword(String),
    NoValue,
    NoName,
}

impl SkipReason {
    /// Stable label used for metrics
    pub fn label(&self) -> &'static str {
        match self {
            SkipReason::Blank => "blank",
            SkipReason::TooFewTokens => "too_few_tokens",
            SkipReason::NoiseKeyword(_) => "noise_keyword",
            SkipReason::NoValue => "no_value",
            SkipReason::NoName => "no_name",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NoiseKeyword(keyword) => write!(f, "noise keyword '{}'", keyword),
            other => f.write_str(other.label()),
        }
    }
}

/// Result of parsing one line that did not fail
#[derive(Debug, Clone, PartialEq)]
pub enum LineOutcome {
    Record(LabTestRecord),
    Skipped(SkipReason),
}

/// Unexpected failure while parsing one line. The line is dropped, the document continues.
#[derive(Debug, Clone, PartialEq)]
pub enum LineError {
    /// A range bound matched the number pattern but did not parse as a float
    InvalidRangeBound(String),
}

impl fmt::Display for LineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LineError::InvalidRangeBound(literal) => {
                write!(f, "reference range bound '{}' is not a number", literal)
            }
        }
    }
}

impl std::error::Error for LineError {}

/// Per-document envelope written to `<stem>.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabTestResponse {
    pub is_success: bool,
    pub message: String,
    pub data: Vec<LabTestRecord>,
}

pub const SUCCESS_MESSAGE: &str = "Lab tests extracted successfully.";

impl LabTestResponse {
    pub fn success(data: Vec<LabTestRecord>) -> Self {
        Self {
            is_success: true,
            message: SUCCESS_MESSAGE.to_string(),
            data,
        }
    }

    /// Failure envelope; `error` is appended to the fixed prefix
    pub fn failure(error: impl fmt::Display) -> Self {
        Self {
            is_success: false,
            message: format!("Failed to process image: {}", error),
            data: Vec::new(),
        }
    }
}

/// Tally of one document's extraction
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractionReport {
    pub records: Vec<LabTestRecord>,
    pub skipped: Vec<SkipReason>,
    pub line_errors: usize,
    pub total_lines: usize,
}

impl ExtractionReport {
    /// Skip counts grouped by reason label, in first-seen order
    pub fn skipped_by_reason(&self) -> Vec<(&'static str, u64)> {
        let mut counts: Vec<(&'static str, u64)> = Vec::new();
        for reason in &self.skipped {
            let label = reason.label();
            match counts.iter_mut().find(|(l, _)| *l == label) {
                Some((_, count)) => *count += 1,
                None => counts.push((label, 1)),
            }
        }
        counts
    }
}
