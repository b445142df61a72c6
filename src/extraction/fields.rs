//! Unit detection and test name derivation.

use regex::Regex;

use super::numeric::RANGE_REGEX;
use super::types::{NormalizedLine, NumericToken};

const NAME_TRIM_CHARS: &[char] = &['-', '|', ',', ';'];

/// Finds the first vocabulary unit in a line.
///
/// Alternatives are tried longest first so `mg/dL` wins over `g/dL`, and a unit
/// glued to an ASCII letter on either side is not a match (`pg` inside `pgx`).
#[derive(Debug, Clone)]
pub struct UnitDetector {
    pattern: Regex,
}

impl UnitDetector {
    pub fn new(units: &[String]) -> Result<Self, regex::Error> {
        let mut sorted: Vec<&str> = units.iter().map(String::as_str).collect();
        sorted.sort_by(|a, b| b.chars().count().cmp(&a.chars().count()).then(a.cmp(b)));
        sorted.dedup();

        let alternation = sorted
            .iter()
            .map(|unit| regex::escape(unit))
            .collect::<Vec<_>>()
            .join("|");

        let pattern = Regex::new(&format!(r"(?:^|[^A-Za-z])({alternation})(?:$|[^A-Za-z])"))?;
        Ok(Self { pattern })
    }

    /// Byte span of the first unit in `text`
    fn find_span(&self, text: &str) -> Option<(usize, usize)> {
        self.pattern
            .captures(text)
            .and_then(|caps| caps.get(1))
            .map(|m| (m.start(), m.end()))
    }

    /// First unit in the line, or `""`
    pub fn detect(&self, line: &NormalizedLine) -> String {
        self.find_span(line.as_str())
            .map(|(start, end)| line.as_str()[start..end].to_string())
            .unwrap_or_default()
    }

    /// `text` with its first unit occurrence cut out
    fn strip_first(&self, text: &str) -> String {
        match self.find_span(text) {
            Some((start, end)) => format!("{}{}", &text[..start], &text[end..]),
            None => text.to_string(),
        }
    }
}

/// Derive the test name from what is left once the numbers and unit are gone.
///
/// The unit is cut out before the value, then the value literal is removed
/// everywhere it occurs, so a name containing the same digits loses them too
/// (`Vitamin B12` with value `12`).
pub fn extract_test_name(
    line: &NormalizedLine,
    value: Option<&NumericToken>,
    unit: &str,
    units: &UnitDetector,
) -> Option<String> {
    let mut name = RANGE_REGEX.replacen(line.as_str(), 1, "").into_owned();

    // Unit first: its digits (`10^3/µL`) may repeat the value literal.
    if !unit.is_empty() {
        name = units.strip_first(&name);
    }

    if let Some(value) = value {
        name = name.replace(&value.literal, "");
    }

    let collapsed = name.split_whitespace().collect::<Vec<_>>().join(" ");
    let trimmed = collapsed
        .trim_matches(|c: char| c.is_whitespace() || NAME_TRIM_CHARS.contains(&c))
        .to_string();

    if trimmed.chars().count() < 2 || !trimmed.chars().any(char::is_alphabetic) {
        return None;
    }
    Some(trimmed)
}
